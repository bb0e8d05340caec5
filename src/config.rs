use serde::Deserialize;
use std::path::Path;

use crate::error::{AnalysisError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub onsets: OnsetConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub transcode: TranscodeConfig,
}

/// Frame grid shared by every feature primitive.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_hop_length")]
    pub hop_length: usize,
    #[serde(default = "default_n_fft")]
    pub n_fft: usize,
    #[serde(default = "default_n_mels")]
    pub n_mels: usize,
    #[serde(default = "default_n_mfcc")]
    pub n_mfcc: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OnsetConfig {
    #[serde(default = "default_cluster_count")]
    pub cluster_count: usize,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_restarts")]
    pub restarts: usize,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default)]
    pub backtrack: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoiceConfig {
    #[serde(default = "default_fmin")]
    pub fmin: f32,
    #[serde(default = "default_fmax")]
    pub fmax: f32,
    #[serde(default = "default_sustain_tolerance")]
    pub sustain_tolerance: f32,
    #[serde(default = "default_percentile_min")]
    pub percentile_min: f32,
    #[serde(default = "default_percentile_max")]
    pub percentile_max: f32,
    #[serde(default = "default_yin_threshold")]
    pub yin_threshold: f32,
    #[serde(default)]
    pub backtrack: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscodeConfig {
    /// Run voice captures through ffmpeg before decoding
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    #[serde(default)]
    pub sample_rate: Option<u32>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            hop_length: default_hop_length(),
            n_fft: default_n_fft(),
            n_mels: default_n_mels(),
            n_mfcc: default_n_mfcc(),
        }
    }
}

impl Default for OnsetConfig {
    fn default() -> Self {
        Self {
            cluster_count: default_cluster_count(),
            seed: 0,
            restarts: default_restarts(),
            max_iterations: default_max_iterations(),
            backtrack: false,
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            fmin: default_fmin(),
            fmax: default_fmax(),
            sustain_tolerance: default_sustain_tolerance(),
            percentile_min: default_percentile_min(),
            percentile_max: default_percentile_max(),
            yin_threshold: default_yin_threshold(),
            backtrack: false,
        }
    }
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ffmpeg: default_ffmpeg(),
            sample_rate: None,
        }
    }
}

fn default_hop_length() -> usize { 512 }
fn default_n_fft() -> usize { 2048 }
fn default_n_mels() -> usize { 128 }
fn default_n_mfcc() -> usize { 13 }
fn default_cluster_count() -> usize { 4 }
fn default_restarts() -> usize { 10 }
fn default_max_iterations() -> usize { 300 }
fn default_fmin() -> f32 { 65.41 } // C2
fn default_fmax() -> f32 { 2093.0 } // C7
fn default_sustain_tolerance() -> f32 { 1.0 }
fn default_percentile_min() -> f32 { 20.0 }
fn default_percentile_max() -> f32 { 80.0 }
fn default_yin_threshold() -> f32 { 0.15 }
fn default_ffmpeg() -> String { "ffmpeg".into() }
fn default_true() -> bool { true }

impl Config {
    pub fn validate(&self) -> Result<()> {
        let a = &self.analysis;
        if a.hop_length == 0 || a.n_fft < 2 {
            return Err(AnalysisError::InvalidInput(format!(
                "hop_length and n_fft must be positive (got {} / {})",
                a.hop_length, a.n_fft
            )));
        }
        if a.n_mels == 0 || a.n_mfcc == 0 || a.n_mfcc > a.n_mels {
            return Err(AnalysisError::InvalidInput(format!(
                "need 0 < n_mfcc <= n_mels (got {} / {})",
                a.n_mfcc, a.n_mels
            )));
        }
        if self.onsets.cluster_count == 0 {
            return Err(AnalysisError::InvalidInput("cluster_count must be at least 1".into()));
        }
        if self.onsets.restarts == 0 {
            return Err(AnalysisError::InvalidInput("restarts must be at least 1".into()));
        }
        let v = &self.voice;
        if !(v.fmin > 0.0 && v.fmin < v.fmax) {
            return Err(AnalysisError::InvalidInput(format!(
                "pitch range must satisfy 0 < fmin < fmax (got {} / {})",
                v.fmin, v.fmax
            )));
        }
        if !(0.0..100.0).contains(&v.percentile_min)
            || v.percentile_max > 100.0
            || v.percentile_min >= v.percentile_max
        {
            return Err(AnalysisError::InvalidInput(format!(
                "percentiles must satisfy 0 <= min < max <= 100 (got {} / {})",
                v.percentile_min, v.percentile_max
            )));
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(cfg) => Some(cfg),
        Err(err) => {
            log::warn!("Ignoring malformed config {}: {}", path.display(), err);
            None
        }
    }
}
