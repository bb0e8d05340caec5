//! Onset strength, peak picking and the onset resolver.

use super::features::FrameSeries;
use super::frames::FrameTimeIndex;
use super::mel::AMIN;

/// Tempo reported when onsets exist but no interval falls in the plausible range.
pub const DEFAULT_TEMPO_BPM: f32 = 120.0;

/// Detected onsets: ascending, unique frame indices and their times.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OnsetSet {
    pub frames: Vec<usize>,
    pub times: Vec<f32>,
}

impl OnsetSet {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Peak-picking windows, in frames.
#[derive(Clone, Copy, Debug)]
pub struct PeakPickParams {
    pub pre_max: usize,
    pub post_max: usize,
    pub pre_avg: usize,
    pub post_avg: usize,
    pub delta: f32,
    pub wait: usize,
}

impl PeakPickParams {
    pub fn for_rate(sample_rate: u32, hop_length: usize) -> Self {
        let frames = |seconds: f32| (seconds * sample_rate as f32 / hop_length as f32) as usize;
        Self {
            pre_max: frames(0.03),
            post_max: 1,
            pre_avg: frames(0.10),
            post_avg: frames(0.10) + 1,
            delta: 0.07,
            wait: frames(0.03),
        }
    }
}

/// Mean positive dB change across mel bands between consecutive frames.
///
/// The frame before the first is taken to be silence. The result is
/// delayed by `n_fft / (2 * hop)` frames so peaks line up with the
/// attack rather than with the leading edge of the centered window.
pub fn onset_strength(log_mel: &[Vec<f32>], n_fft: usize, hop_length: usize) -> FrameSeries {
    let n_frames = log_mel.len();
    if n_frames == 0 {
        return FrameSeries::new("onset_strength", Vec::new());
    }

    let floor = log_mel
        .iter()
        .flat_map(|bands| bands.iter().copied())
        .fold(f32::INFINITY, f32::min);
    let silence_db = (10.0 * AMIN.log10()).max(floor);
    let silence = vec![silence_db; log_mel[0].len()];

    let flux: Vec<f32> = (0..n_frames)
        .map(|t| {
            let prev = if t == 0 { &silence } else { &log_mel[t - 1] };
            let bands = &log_mel[t];
            if bands.is_empty() {
                return 0.0;
            }
            bands
                .iter()
                .zip(prev.iter())
                .map(|(cur, p)| (cur - p).max(0.0))
                .sum::<f32>()
                / bands.len() as f32
        })
        .collect();

    let shift = n_fft / (2 * hop_length);
    let envelope = (0..n_frames)
        .map(|t| if t >= shift { flux[t - shift] } else { 0.0 })
        .collect();

    FrameSeries::new("onset_strength", envelope)
}

/// Local maxima of the normalized envelope that clear a moving average by `delta`.
pub fn pick_peaks(envelope: &[f32], params: &PeakPickParams) -> Vec<usize> {
    let n = envelope.len();
    let min = envelope.iter().copied().fold(f32::INFINITY, f32::min);
    let max = envelope.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if n == 0 || !(max - min > 0.0) {
        return Vec::new();
    }
    let norm: Vec<f32> = envelope.iter().map(|v| (v - min) / (max - min)).collect();

    let mut peaks = Vec::new();
    let mut last: Option<usize> = None;

    for i in 0..n {
        let x = norm[i];
        if x <= 0.0 {
            continue;
        }

        let max_lo = i.saturating_sub(params.pre_max);
        let max_hi = (i + params.post_max).min(n).max(i + 1);
        let local_max = norm[max_lo..max_hi].iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if x < local_max {
            continue;
        }

        let avg_lo = i.saturating_sub(params.pre_avg);
        let avg_hi = (i + params.post_avg).min(n).max(i + 1);
        let local_mean = norm[avg_lo..avg_hi].iter().sum::<f32>() / (avg_hi - avg_lo) as f32;
        if x < local_mean + params.delta {
            continue;
        }

        if let Some(prev) = last {
            if i <= prev + params.wait {
                continue;
            }
        }
        peaks.push(i);
        last = Some(i);
    }

    peaks
}

/// Move each onset back to the closest preceding local minimum of `energy`.
pub fn backtrack(onsets: &[usize], energy: &[f32]) -> Vec<usize> {
    let mut minima = vec![0usize];
    for i in 1..energy.len().saturating_sub(1) {
        if energy[i] <= energy[i - 1] && energy[i] < energy[i + 1] {
            minima.push(i);
        }
    }

    let mut out: Vec<usize> = onsets
        .iter()
        .map(|&onset| {
            let idx = minima.partition_point(|&m| m <= onset);
            minima[idx.saturating_sub(1)]
        })
        .collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Detect onsets on `envelope` and map them onto the time axis.
pub fn resolve_onsets(
    envelope: &FrameSeries,
    index: &FrameTimeIndex,
    params: &PeakPickParams,
    with_backtrack: bool,
) -> OnsetSet {
    let mut frames = pick_peaks(envelope.values(), params);
    if with_backtrack {
        frames = backtrack(&frames, envelope.values());
    }
    let times = index.frames_to_times(&frames);
    log::debug!("Onset times: {:?}", times);
    OnsetSet { frames, times }
}

/// Median inter-onset interval in the 60-200 BPM range.
pub fn estimate_tempo(onset_times: &[f32]) -> f32 {
    if onset_times.len() < 2 {
        return 0.0;
    }

    let mut reasonable: Vec<f32> = onset_times
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|&i| (0.3..=1.0).contains(&i))
        .collect();

    if reasonable.is_empty() {
        return DEFAULT_TEMPO_BPM;
    }

    reasonable.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    60.0 / reasonable[reasonable.len() / 2]
}
