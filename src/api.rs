//! Request boundary: raw upload bytes in, a serializable response out.
//!
//! Both operations catch every failure from transcoding, decoding and
//! analysis and turn it into an [`ErrorBody`], so callers never see an
//! internal error type.

use serde::Serialize;

use crate::audio::analysis;
use crate::audio::decode::decode_bytes;
use crate::audio::features::{OnsetAnalysis, VoiceAnalysis};
use crate::config::Config;
use crate::error::{AnalysisError, Result};
use crate::transcode::ffmpeg::FfmpegTranscoder;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: &'static str,
    #[serde(skip)]
    pub status: u16,
}

impl From<AnalysisError> for ErrorBody {
    fn from(err: AnalysisError) -> Self {
        Self {
            error: err.to_string(),
            kind: err.kind(),
            status: err.status(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Onsets(OnsetAnalysis),
    Voice(VoiceAnalysis),
    Error(ErrorBody),
}

impl Response {
    pub fn status(&self) -> u16 {
        match self {
            Response::Error(body) => body.status,
            _ => 200,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }
}

/// Onset timbre analysis of an uploaded file. `hint` is the file extension,
/// if known.
pub fn analyze_onsets(bytes: Vec<u8>, hint: Option<&str>, cluster_count: usize, cfg: &Config) -> Response {
    let result = (|| -> Result<OnsetAnalysis> {
        cfg.validate()?;
        log::info!("Decoding audio ({} bytes)...", bytes.len());
        let audio = decode_bytes(bytes, hint)?;
        analysis::analyze_onsets(&audio, cluster_count, cfg)
    })();
    respond(result, "onsets", Response::Onsets)
}

/// Voice analysis of a captured recording. The capture is transcoded to WAV
/// first unless transcoding is disabled.
pub fn analyze_voice(bytes: Vec<u8>, hint: Option<&str>, cfg: &Config) -> Response {
    let result = (|| -> Result<VoiceAnalysis> {
        cfg.validate()?;
        let (bytes, hint) = if cfg.transcode.enabled {
            log::info!("Transcoding capture ({} bytes)...", bytes.len());
            let wav = FfmpegTranscoder::new(&cfg.transcode).to_wav(&bytes, hint)?;
            (wav, Some("wav"))
        } else {
            (bytes, hint)
        };
        log::info!("Decoding audio ({} bytes)...", bytes.len());
        let audio = decode_bytes(bytes, hint)?;
        analysis::analyze_voice(&audio, cfg)
    })();
    respond(result, "voice", Response::Voice)
}

fn respond<T>(result: Result<T>, operation: &str, wrap: fn(T) -> Response) -> Response {
    match result {
        Ok(body) => wrap(body),
        Err(err) => {
            log::error!("{} analysis failed: {}", operation, err);
            Response::Error(err.into())
        }
    }
}
