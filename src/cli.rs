use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "timbrescope", about = "Onset timbre clustering and sung-note analysis for audio files")]
pub struct Cli {
    /// Config file (defaults to ./timbrescope.toml or the user config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Write the JSON result here instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Pretty-print the JSON result
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Detect onsets and group them by timbre
    Onsets {
        /// Input audio files (WAV, MP3, FLAC, OGG)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Number of timbre clusters
        #[arg(short = 'k', long)]
        clusters: Option<usize>,

        /// Move each onset back to the preceding energy minimum
        #[arg(long)]
        backtrack: bool,
    },

    /// Segment a vocal recording into sustained notes
    Voice {
        /// Input recordings (any container ffmpeg can read)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Decode inputs directly instead of transcoding through ffmpeg
        #[arg(long)]
        no_transcode: bool,

        /// Move each onset back to the preceding energy minimum
        #[arg(long)]
        backtrack: bool,
    },
}

impl Command {
    pub fn inputs(&self) -> &[PathBuf] {
        match self {
            Command::Onsets { inputs, .. } | Command::Voice { inputs, .. } => inputs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_onsets_with_overrides() {
        let cli = Cli::parse_from(["timbrescope", "onsets", "a.wav", "b.wav", "-k", "6", "--backtrack", "--pretty"]);
        assert!(cli.pretty);
        match cli.command {
            Command::Onsets { ref inputs, clusters, backtrack } => {
                assert_eq!(inputs.len(), 2);
                assert_eq!(clusters, Some(6));
                assert!(backtrack);
            }
            _ => panic!("expected onsets"),
        }
    }

    #[test]
    fn parses_voice_with_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["timbrescope", "voice", "take.webm", "--no-transcode", "-o", "out.json"]);
        assert_eq!(cli.output, Some(PathBuf::from("out.json")));
        assert_eq!(cli.command.inputs(), [PathBuf::from("take.webm")]);
        assert!(matches!(cli.command, Command::Voice { no_transcode: true, backtrack: false, .. }));
    }

    #[test]
    fn requires_an_input() {
        assert!(Cli::try_parse_from(["timbrescope", "onsets"]).is_err());
    }
}
