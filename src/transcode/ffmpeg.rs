use std::process::{Command, Stdio};

use crate::config::TranscodeConfig;
use crate::error::{AnalysisError, Result};

/// Runs an external ffmpeg to turn a streamed-capture container (e.g. WebM/Opus)
/// into mono WAV that the in-process decoder understands.
pub struct FfmpegTranscoder {
    binary: String,
    sample_rate: Option<u32>,
}

impl FfmpegTranscoder {
    pub fn new(cfg: &TranscodeConfig) -> Self {
        Self {
            binary: cfg.ffmpeg.clone(),
            sample_rate: cfg.sample_rate,
        }
    }

    fn args(&self, input: &str, output: &str) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".into(),
            "-loglevel".into(), "error".into(),
            "-i".into(), input.to_string(),
            "-vn".into(),
            "-ac".into(), "1".into(),
        ];
        if let Some(sr) = self.sample_rate {
            args.extend(["-ar".to_string(), sr.to_string()]);
        }
        args.extend([
            "-c:a".into(), "pcm_s16le".into(),
            "-f".into(), "wav".into(),
            output.to_string(),
        ]);
        args
    }

    /// Transcode `bytes` to WAV. Every call works in its own temporary
    /// directory, so concurrent calls never share files.
    pub fn to_wav(&self, bytes: &[u8], extension: Option<&str>) -> Result<Vec<u8>> {
        let dir = tempfile::tempdir()
            .map_err(|e| AnalysisError::Transcode(format!("failed to create temp dir: {}", e)))?;
        let input_path = dir.path().join(format!("input.{}", extension.unwrap_or("webm")));
        let output_path = dir.path().join("output.wav");
        std::fs::write(&input_path, bytes)?;

        let input = input_path
            .to_str()
            .ok_or_else(|| AnalysisError::Transcode("temp path is not valid UTF-8".into()))?;
        let output = output_path
            .to_str()
            .ok_or_else(|| AnalysisError::Transcode("temp path is not valid UTF-8".into()))?;

        let result = Command::new(&self.binary)
            .args(self.args(input, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                AnalysisError::Transcode(format!(
                    "failed to spawn {}: {}. Is ffmpeg installed?",
                    self.binary, e
                ))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(AnalysisError::Transcode(format!(
                "{} exited with {}: {}",
                self.binary,
                result.status,
                stderr.trim()
            )));
        }

        let wav = std::fs::read(&output_path)?;
        log::info!("Transcoded {} bytes to {} bytes of WAV", bytes.len(), wav.len());
        Ok(wav)
    }
}
