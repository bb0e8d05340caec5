mod api;
mod audio;
mod cli;
mod config;
mod error;
mod transcode;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

use api::Response;
use cli::{Cli, Command};
use config::Config;

#[derive(Serialize)]
struct FileResponse<'a> {
    input: &'a Path,
    response: Response,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect timbrescope.toml / global config
    let config_path = cli.config.clone().or_else(|| {
        let local = PathBuf::from("timbrescope.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join("timbrescope").join("config.toml");
            if xdg.exists() {
                return Some(xdg);
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("timbrescope").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    });
    let mut cfg = match config_path {
        Some(ref path) => match config::load_config(path) {
            Some(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            None => {
                log::warn!("Failed to load config from {}", path.display());
                Config::default()
            }
        },
        None => Config::default(),
    };

    // CLI flags win over the config file
    match cli.command {
        Command::Onsets { clusters, backtrack, .. } => {
            if let Some(k) = clusters {
                cfg.onsets.cluster_count = k;
            }
            cfg.onsets.backtrack |= backtrack;
        }
        Command::Voice { no_transcode, backtrack, .. } => {
            if no_transcode {
                cfg.transcode.enabled = false;
            }
            cfg.voice.backtrack |= backtrack;
        }
    }

    let inputs = cli.command.inputs();
    for input in inputs {
        if !input.exists() {
            anyhow::bail!("Input file not found: {}", input.display());
        }
    }

    log::info!("timbrescope - {} input(s)", inputs.len());

    let pb = if inputs.len() > 1 {
        let pb = ProgressBar::new(inputs.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files ({eta} remaining)")?
                .progress_chars("=>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let responses = inputs
        .par_iter()
        .map(|input| {
            let response = run_one(&cli.command, input, &cfg);
            pb.inc(1);
            response.map(|response| FileResponse { input, response })
        })
        .collect::<Result<Vec<_>>>()?;
    pb.finish_and_clear();

    let failed = responses.iter().filter(|r| r.response.is_error()).count();

    let json = match responses.as_slice() {
        [single] => to_json(&single.response, cli.pretty)?,
        all => to_json(&all, cli.pretty)?,
    };

    match cli.output {
        Some(ref path) => {
            std::fs::write(path, json + "\n")
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote {}", path.display());
        }
        None => println!("{}", json),
    }

    if failed > 0 {
        anyhow::bail!("{} of {} input(s) failed", failed, responses.len());
    }
    Ok(())
}

fn run_one(command: &Command, input: &Path, cfg: &Config) -> Result<Response> {
    let bytes = std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let hint = input.extension().and_then(|e| e.to_str());
    log::info!("Input: {}", input.display());

    Ok(match command {
        Command::Onsets { .. } => api::analyze_onsets(bytes, hint, cfg.onsets.cluster_count, cfg),
        Command::Voice { .. } => api::analyze_voice(bytes, hint, cfg),
    })
}

fn to_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}
