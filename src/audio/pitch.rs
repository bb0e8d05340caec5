//! Monophonic F0 tracking (YIN) on the shared frame grid.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use super::features::FrameSeries;
use super::frames::FrameTimeIndex;

/// Mean power below which a frame is treated as silent.
const SILENCE_POWER: f64 = 1e-7;

#[derive(Clone, Copy, Debug)]
pub struct PitchParams {
    pub fmin: f32,
    pub fmax: f32,
    /// Cumulative-mean-normalized difference threshold
    pub threshold: f32,
    pub frame_length: usize,
    pub hop_length: usize,
}

pub fn hz_to_midi(hz: f32) -> f32 {
    69.0 + 12.0 * (hz / 440.0).log2()
}

/// F0 per frame in MIDI note numbers, 0 for unvoiced frames.
pub fn pitch_track(samples: &[f32], sample_rate: u32, params: &PitchParams) -> FrameSeries {
    let n_frames = FrameTimeIndex::frame_count(samples.len(), params.hop_length);
    let mut tracker = YinTracker::new(sample_rate, params);
    let mut voiced = 0usize;

    let midi: Vec<f32> = (0..n_frames)
        .map(|t| match tracker.estimate(samples, t * params.hop_length) {
            Some(hz) => {
                voiced += 1;
                hz_to_midi(hz)
            }
            None => 0.0,
        })
        .collect();

    log::debug!("Pitch track: {}/{} frames voiced", voiced, n_frames);
    FrameSeries::new("pitch", midi)
}

struct YinTracker {
    sample_rate: f32,
    fmin: f32,
    fmax: f32,
    threshold: f32,
    window: usize,
    tau_min: usize,
    tau_max: usize,
    fft_len: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    segment: Vec<f32>,
    head: Vec<Complex<f32>>,
    full: Vec<Complex<f32>>,
    prefix: Vec<f64>,
    cmnd: Vec<f32>,
}

impl YinTracker {
    fn new(sample_rate: u32, params: &PitchParams) -> Self {
        let sr = sample_rate as f32;
        let window = (params.frame_length / 2).max(1);
        let tau_max = ((sr / params.fmin).ceil() as usize).max(3);
        let tau_min = ((sr / params.fmax).floor() as usize).clamp(2, tau_max - 1);
        let segment_len = window + tau_max + 1;
        let fft_len = segment_len.next_power_of_two();

        let mut planner = FftPlanner::<f32>::new();
        Self {
            sample_rate: sr,
            fmin: params.fmin,
            fmax: params.fmax,
            threshold: params.threshold,
            window,
            tau_min,
            tau_max,
            fft_len,
            forward: planner.plan_fft_forward(fft_len),
            inverse: planner.plan_fft_inverse(fft_len),
            segment: vec![0.0; segment_len],
            head: vec![Complex::new(0.0, 0.0); fft_len],
            full: vec![Complex::new(0.0, 0.0); fft_len],
            prefix: vec![0.0; segment_len + 1],
            cmnd: vec![1.0; tau_max + 2],
        }
    }

    /// Fundamental frequency (Hz) of the window centered on `center`.
    fn estimate(&mut self, samples: &[f32], center: usize) -> Option<f32> {
        let w = self.window;
        let start = center as isize - (w / 2) as isize;
        for (i, slot) in self.segment.iter_mut().enumerate() {
            let idx = start + i as isize;
            *slot = if idx >= 0 && (idx as usize) < samples.len() {
                samples[idx as usize]
            } else {
                0.0
            };
        }

        self.prefix[0] = 0.0;
        for (i, &s) in self.segment.iter().enumerate() {
            self.prefix[i + 1] = self.prefix[i] + (s as f64) * (s as f64);
        }
        let head_energy = self.prefix[w];
        if head_energy / (w as f64) < SILENCE_POWER {
            return None;
        }

        // r[tau] = sum_{j < w} x[j] * x[j + tau], via FFT cross-correlation
        for (i, slot) in self.head.iter_mut().enumerate() {
            *slot = Complex::new(if i < w { self.segment[i] } else { 0.0 }, 0.0);
        }
        for (i, slot) in self.full.iter_mut().enumerate() {
            *slot = Complex::new(self.segment.get(i).copied().unwrap_or(0.0), 0.0);
        }
        self.forward.process(&mut self.head);
        self.forward.process(&mut self.full);
        for (h, f) in self.head.iter_mut().zip(self.full.iter()) {
            *h = h.conj() * f;
        }
        self.inverse.process(&mut self.head);
        let scale = 1.0 / self.fft_len as f64;

        let mut running = 0.0f64;
        self.cmnd[0] = 1.0;
        for tau in 1..=self.tau_max + 1 {
            let shifted = self.prefix[tau + w] - self.prefix[tau];
            let cross = self.head[tau].re as f64 * scale;
            let diff = (head_energy + shifted - 2.0 * cross).max(0.0);
            running += diff;
            self.cmnd[tau] = if running > 0.0 {
                (diff * tau as f64 / running) as f32
            } else {
                1.0
            };
        }

        let mut tau = (self.tau_min..=self.tau_max).find(|&t| self.cmnd[t] < self.threshold)?;
        while tau < self.tau_max && self.cmnd[tau + 1] < self.cmnd[tau] {
            tau += 1;
        }

        let (s0, s1, s2) = (self.cmnd[tau - 1], self.cmnd[tau], self.cmnd[tau + 1]);
        let denom = s0 - 2.0 * s1 + s2;
        let shift = if denom.abs() > 1e-12 {
            (0.5 * (s0 - s2) / denom).clamp(-1.0, 1.0)
        } else {
            0.0
        };
        let hz = self.sample_rate / (tau as f32 + shift);

        (self.fmin..=self.fmax).contains(&hz).then_some(hz)
    }
}
