use serde::Serialize;

use crate::error::{AnalysisError, Result};

/// Decoded mono audio for one request.
#[derive(Clone, Debug)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioData {
    pub fn duration(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// One scalar per analysis frame.
#[derive(Clone, Debug)]
pub struct FrameSeries {
    name: &'static str,
    values: Vec<f32>,
}

impl FrameSeries {
    pub fn new(name: &'static str, values: Vec<f32>) -> Self {
        Self { name, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn at(&self, frame: usize) -> Result<f32> {
        self.values
            .get(frame)
            .copied()
            .ok_or(AnalysisError::FrameIndexOutOfRange {
                feature: self.name,
                index: frame,
                len: self.values.len(),
            })
    }
}

/// One feature vector per analysis frame (e.g. MFCCs).
#[derive(Clone, Debug)]
pub struct FeatureTable {
    name: &'static str,
    rows: Vec<Vec<f32>>,
}

impl FeatureTable {
    pub fn new(name: &'static str, rows: Vec<Vec<f32>>) -> Self {
        Self { name, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn at(&self, frame: usize) -> Result<&[f32]> {
        self.rows
            .get(frame)
            .map(Vec::as_slice)
            .ok_or(AnalysisError::FrameIndexOutOfRange {
                feature: self.name,
                index: frame,
                len: self.rows.len(),
            })
    }
}

/// A clustered onset from the timbre pipeline.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OnsetEvent {
    pub time: f32,
    pub cluster: usize,
    /// Spectral centroid at the onset frame (Hz, not normalized)
    pub centroid: f32,
}

/// A sustained note from the voice pipeline.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VoiceEvent {
    pub time: f32,
    /// MIDI note number, 0 when unvoiced
    pub pitch: f32,
    pub duration: f32,
    /// Loudness, percentile-normalized (0.0-1.0)
    pub rms: f32,
    /// Brightness, percentile-normalized (0.0-1.0)
    pub centroid: f32,
    pub bandwidth: f32,
    pub flatness: f32,
    /// Semitones relative to the previous event's pitch
    pub interval: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OnsetAnalysis {
    pub tempo: f32,
    pub duration: f32,
    pub onsets: Vec<OnsetEvent>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VoiceAnalysis {
    pub duration: f32,
    pub events: Vec<VoiceEvent>,
}
