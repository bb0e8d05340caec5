use rustfft::{num_complex::Complex, FftPlanner};

use super::features::{FeatureTable, FrameSeries};
use super::frames::FrameTimeIndex;
use super::mel::{self, Dct, MelBank};
use crate::config::AnalysisConfig;

/// Per-frame spectral features on the centered `hop_length` grid.
#[derive(Clone, Debug)]
pub struct SpectralFeatures {
    pub rms: FrameSeries,
    /// Hz
    pub centroid: FrameSeries,
    /// Hz
    pub bandwidth: FrameSeries,
    /// 0.0 (tonal) to 1.0 (noise)
    pub flatness: FrameSeries,
    /// Mel band power in dB, one row per frame
    pub log_mel: Vec<Vec<f32>>,
    pub mfcc: FeatureTable,
}

pub fn extract(samples: &[f32], sample_rate: u32, cfg: &AnalysisConfig) -> SpectralFeatures {
    let magnitudes = stft_magnitudes(samples, cfg.n_fft, cfg.hop_length);
    let freqs: Vec<f32> = (0..cfg.n_fft / 2 + 1)
        .map(|k| k as f32 * sample_rate as f32 / cfg.n_fft as f32)
        .collect();

    let rms = frame_rms(samples, cfg.n_fft, cfg.hop_length);
    let centroid = spectral_centroid(&magnitudes, &freqs);
    let bandwidth = spectral_bandwidth(&magnitudes, &freqs, &centroid);
    let flatness = spectral_flatness(&magnitudes);

    let bank = MelBank::new(sample_rate, cfg.n_fft, cfg.n_mels);
    let mut log_mel: Vec<Vec<f32>> = magnitudes
        .iter()
        .map(|frame| {
            let power: Vec<f32> = frame.iter().map(|m| m * m).collect();
            bank.apply(&power)
        })
        .collect();
    mel::power_to_db(&mut log_mel);

    let dct = Dct::new(cfg.n_mels, cfg.n_mfcc);
    let mfcc = FeatureTable::new("mfcc", log_mel.iter().map(|bands| dct.apply(bands)).collect());

    log::debug!(
        "Spectral features: {} frames, {} mel bands, {} MFCCs",
        mfcc.len(),
        bank.n_mels(),
        cfg.n_mfcc
    );

    SpectralFeatures {
        rms: FrameSeries::new("rms", rms),
        centroid: FrameSeries::new("spectral_centroid", centroid),
        bandwidth: FrameSeries::new("spectral_bandwidth", bandwidth),
        flatness: FrameSeries::new("spectral_flatness", flatness),
        log_mel,
        mfcc,
    }
}

/// Copy `len` samples centered on `center`, zero-filled past either edge.
pub fn centered_frame(samples: &[f32], center: usize, len: usize, out: &mut [f32]) {
    let start = center as isize - (len / 2) as isize;
    for (i, slot) in out.iter_mut().enumerate().take(len) {
        let idx = start + i as isize;
        *slot = if idx >= 0 && (idx as usize) < samples.len() {
            samples[idx as usize]
        } else {
            0.0
        };
    }
}

/// Magnitude spectrum (`n_fft / 2 + 1` bins) of each Hann-windowed centered frame.
pub fn stft_magnitudes(samples: &[f32], n_fft: usize, hop_length: usize) -> Vec<Vec<f32>> {
    let n_frames = FrameTimeIndex::frame_count(samples.len(), hop_length);
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n_fft);
    let hann = hann_window(n_fft);

    let mut frame = vec![0.0f32; n_fft];
    let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];
    let mut out = Vec::with_capacity(n_frames);

    for t in 0..n_frames {
        centered_frame(samples, t * hop_length, n_fft, &mut frame);
        for (slot, (&s, &w)) in buffer.iter_mut().zip(frame.iter().zip(hann.iter())) {
            *slot = Complex::new(s * w, 0.0);
        }
        fft.process(&mut buffer);
        out.push(buffer[..n_fft / 2 + 1].iter().map(|c| c.norm()).collect());
    }

    out
}

pub fn frame_rms(samples: &[f32], frame_length: usize, hop_length: usize) -> Vec<f32> {
    let n_frames = FrameTimeIndex::frame_count(samples.len(), hop_length);
    let mut frame = vec![0.0f32; frame_length];
    (0..n_frames)
        .map(|t| {
            centered_frame(samples, t * hop_length, frame_length, &mut frame);
            (frame.iter().map(|s| s * s).sum::<f32>() / frame_length as f32).sqrt()
        })
        .collect()
}

pub fn spectral_centroid(magnitudes: &[Vec<f32>], freqs: &[f32]) -> Vec<f32> {
    magnitudes
        .iter()
        .map(|bins| {
            let total: f32 = bins.iter().sum();
            if total > 1e-10 {
                bins.iter().zip(freqs).map(|(m, f)| m * f).sum::<f32>() / total
            } else {
                0.0
            }
        })
        .collect()
}

/// Second-order spectral spread around the centroid.
pub fn spectral_bandwidth(magnitudes: &[Vec<f32>], freqs: &[f32], centroid: &[f32]) -> Vec<f32> {
    magnitudes
        .iter()
        .zip(centroid)
        .map(|(bins, &c)| {
            let total: f32 = bins.iter().sum();
            if total <= 1e-10 {
                return 0.0;
            }
            let spread: f32 = bins
                .iter()
                .zip(freqs)
                .map(|(m, f)| (m / total) * (f - c).powi(2))
                .sum();
            spread.sqrt()
        })
        .collect()
}

/// Geometric over arithmetic mean of the power spectrum.
pub fn spectral_flatness(magnitudes: &[Vec<f32>]) -> Vec<f32> {
    magnitudes
        .iter()
        .map(|bins| {
            if bins.is_empty() {
                return 1.0;
            }
            let n = bins.len() as f64;
            let mut log_sum = 0.0f64;
            let mut sum = 0.0f64;
            for m in bins {
                let p = ((m * m) as f64).max(mel::AMIN as f64);
                log_sum += p.ln();
                sum += p;
            }
            ((log_sum / n).exp() / (sum / n)) as f32
        })
        .collect()
}

/// Periodic Hann window.
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sr: u32, seconds: f32) -> Vec<f32> {
        let n = (sr as f32 * seconds) as usize;
        (0..n)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / sr as f32).sin())
            .collect()
    }

    #[test]
    fn frames_align_with_frame_grid() {
        let samples = sine(440.0, 22050, 1.0);
        let feats = extract(&samples, 22050, &AnalysisConfig::default());
        let expected = FrameTimeIndex::frame_count(samples.len(), 512);
        assert_eq!(feats.rms.len(), expected);
        assert_eq!(feats.centroid.len(), expected);
        assert_eq!(feats.mfcc.len(), expected);
        assert_eq!(feats.mfcc.at(0).unwrap().len(), 13);
        assert_eq!(feats.log_mel[0].len(), 128);
    }

    #[test]
    fn sine_centroid_tracks_frequency() {
        let samples = sine(1000.0, 22050, 0.5);
        let feats = extract(&samples, 22050, &AnalysisConfig::default());
        let mid = feats.centroid.len() / 2;
        let centroid = feats.centroid.at(mid).unwrap();
        assert!((centroid - 1000.0).abs() < 50.0, "centroid {}", centroid);
        assert!(feats.flatness.at(mid).unwrap() < 0.1);
        assert!(feats.bandwidth.at(mid).unwrap() < 500.0);
    }

    #[test]
    fn steady_sine_rms() {
        let samples = sine(440.0, 16000, 1.0);
        let rms = frame_rms(&samples, 2048, 512);
        let mid = rms[rms.len() / 2];
        assert!((mid - 0.5 / 2f32.sqrt()).abs() < 0.01);
    }

    #[test]
    fn silence_has_flat_empty_spectrum() {
        let samples = vec![0.0; 4096];
        let feats = extract(&samples, 16000, &AnalysisConfig::default());
        assert!(feats.centroid.values().iter().all(|&c| c == 0.0));
        assert!(feats.bandwidth.values().iter().all(|&b| b == 0.0));
        assert!(feats.flatness.values().iter().all(|&f| (f - 1.0).abs() < 1e-6));
    }

    #[test]
    fn centered_frame_zero_pads_edges() {
        let samples = [1.0, 2.0, 3.0];
        let mut out = [9.0; 4];
        centered_frame(&samples, 0, 4, &mut out);
        assert_eq!(out, [0.0, 0.0, 1.0, 2.0]);
        centered_frame(&samples, 2, 4, &mut out);
        assert_eq!(out, [1.0, 2.0, 3.0, 0.0]);
    }
}
