//! Mel filterbank, dB scaling and DCT used for MFCCs and onset strength.

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

pub const AMIN: f32 = 1e-10;
pub const TOP_DB: f32 = 80.0;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

/// Slaney mel scale (linear below 1 kHz, logarithmic above).
pub fn hz_to_mel(hz: f64) -> f64 {
    if hz < MIN_LOG_HZ {
        hz / F_SP
    } else {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    if mel < MIN_LOG_MEL {
        mel * F_SP
    } else {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    }
}

/// Triangular, area-normalized mel filters over `n_fft / 2 + 1` bins.
pub struct MelBank {
    weights: Vec<Vec<f32>>,
}

impl MelBank {
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize) -> Self {
        let n_bins = n_fft / 2 + 1;
        let nyquist = sample_rate as f64 / 2.0;
        let fft_freqs: Vec<f64> = (0..n_bins)
            .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
            .collect();

        let max_mel = hz_to_mel(nyquist);
        let mel_points: Vec<f64> = (0..n_mels + 2)
            .map(|i| mel_to_hz(max_mel * i as f64 / (n_mels + 1) as f64))
            .collect();

        let weights = (0..n_mels)
            .map(|m| {
                let (left, center, right) = (mel_points[m], mel_points[m + 1], mel_points[m + 2]);
                let enorm = 2.0 / (right - left);
                fft_freqs
                    .iter()
                    .map(|&f| {
                        let lower = (f - left) / (center - left);
                        let upper = (right - f) / (right - center);
                        (lower.min(upper).max(0.0) * enorm) as f32
                    })
                    .collect()
            })
            .collect();

        Self { weights }
    }

    pub fn n_mels(&self) -> usize {
        self.weights.len()
    }

    /// Mel band powers for one frame of power spectrum.
    pub fn apply(&self, power: &[f32]) -> Vec<f32> {
        self.weights
            .iter()
            .map(|filter| filter.iter().zip(power).map(|(w, p)| w * p).sum())
            .collect()
    }
}

/// Convert power to dB (ref 1.0), flooring the whole matrix at `max - TOP_DB`.
pub fn power_to_db(frames: &mut [Vec<f32>]) {
    let mut peak = f32::NEG_INFINITY;
    for frame in frames.iter_mut() {
        for v in frame.iter_mut() {
            *v = 10.0 * v.max(AMIN).log10();
            peak = peak.max(*v);
        }
    }
    let floor = peak - TOP_DB;
    for frame in frames.iter_mut() {
        for v in frame.iter_mut() {
            *v = v.max(floor);
        }
    }
}

/// Orthonormal DCT-II, keeping the first `n_out` coefficients.
pub struct Dct {
    basis: Vec<Vec<f32>>,
}

impl Dct {
    pub fn new(n_in: usize, n_out: usize) -> Self {
        let n = n_in as f64;
        let basis = (0..n_out)
            .map(|k| {
                let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
                (0..n_in)
                    .map(|i| {
                        let angle = std::f64::consts::PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n);
                        (scale * angle.cos()) as f32
                    })
                    .collect()
            })
            .collect();
        Self { basis }
    }

    pub fn apply(&self, input: &[f32]) -> Vec<f32> {
        self.basis
            .iter()
            .map(|row| row.iter().zip(input).map(|(b, x)| b * x).sum())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mel_scale_round_trips() {
        for hz in [0.0, 440.0, 999.0, 1000.0, 4000.0, 11025.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 1e-6);
        }
        assert!((hz_to_mel(1000.0) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn filters_peak_inside_their_band() {
        let bank = MelBank::new(22050, 2048, 40);
        assert_eq!(bank.n_mels(), 40);
        let mut power = vec![0.0; 1025];
        power[41] = 1.0; // ~441 Hz
        let bands = bank.apply(&power);
        let loudest = bands
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        let (lo, hi) = (mel_to_hz(hz_to_mel(11025.0) * loudest as f64 / 41.0),
            mel_to_hz(hz_to_mel(11025.0) * (loudest + 2) as f64 / 41.0));
        let freq = 41.0 * 22050.0 / 2048.0;
        assert!(lo <= freq && freq <= hi);
    }

    #[test]
    fn power_to_db_applies_top_db_floor() {
        let mut frames = vec![vec![1.0, 1e-12], vec![100.0, 0.0]];
        power_to_db(&mut frames);
        let peak = frames[1][0];
        assert!((peak - 20.0).abs() < 1e-4);
        assert!(frames[0][0].abs() < 1e-4);
        assert_eq!(frames[0][1], peak - TOP_DB);
        assert_eq!(frames[1][1], peak - TOP_DB);
    }

    #[test]
    fn dct_of_constant_is_dc_only() {
        let dct = Dct::new(8, 4);
        let out = dct.apply(&[1.0; 8]);
        assert!((out[0] - 8f32.sqrt()).abs() < 1e-5);
        for c in &out[1..] {
            assert!(c.abs() < 1e-5);
        }
    }
}
