use super::cluster::{self, KMeansParams};
use super::features::{AudioData, OnsetAnalysis, OnsetEvent, VoiceAnalysis, VoiceEvent};
use super::frames::FrameTimeIndex;
use super::normalize::percentile_normalize;
use super::onset::{self, OnsetSet, PeakPickParams};
use super::pitch::{self, PitchParams};
use super::spectral::{self, SpectralFeatures};
use super::sustain;
use crate::config::Config;
use crate::error::{AnalysisError, Result};

struct FrameAnalysis {
    features: SpectralFeatures,
    index: FrameTimeIndex,
    onsets: OnsetSet,
}

/// Shared front half of both pipelines: spectral features and onsets.
fn analyze_frames(audio: &AudioData, cfg: &Config, with_backtrack: bool) -> Result<FrameAnalysis> {
    if audio.sample_rate == 0 {
        return Err(AnalysisError::InvalidInput("sample rate must be positive".into()));
    }
    let a = &cfg.analysis;

    log::info!("Pass 1: Spectral features (n_fft={}, hop={})...", a.n_fft, a.hop_length);
    let features = spectral::extract(&audio.samples, audio.sample_rate, a);
    let index = FrameTimeIndex::new(a.hop_length, audio.sample_rate, features.rms.len());

    log::info!("Pass 2: Onset detection...");
    let envelope = onset::onset_strength(&features.log_mel, a.n_fft, a.hop_length);
    let peak_params = PeakPickParams::for_rate(audio.sample_rate, a.hop_length);
    let onsets = onset::resolve_onsets(&envelope, &index, &peak_params, with_backtrack);
    log::info!("Detected {} onsets over {} frames", onsets.len(), index.len());

    Ok(FrameAnalysis {
        features,
        index,
        onsets,
    })
}

/// Timbre pipeline: onsets labelled by k-means over MFCC + centroid.
pub fn analyze_onsets(audio: &AudioData, cluster_count: usize, cfg: &Config) -> Result<OnsetAnalysis> {
    if cluster_count == 0 {
        return Err(AnalysisError::InvalidInput("cluster count must be at least 1".into()));
    }
    let duration = audio.duration();
    let frames = analyze_frames(audio, cfg, cfg.onsets.backtrack)?;
    let tempo = onset::estimate_tempo(&frames.onsets.times);
    log::info!("Tempo: {:.1} BPM", tempo);

    if frames.onsets.is_empty() {
        return Ok(OnsetAnalysis {
            tempo,
            duration,
            onsets: Vec::new(),
        });
    }

    log::info!("Pass 3: Timbre clustering...");
    let vectors = cluster::timbre_vectors(
        &frames.onsets.frames,
        &frames.features.mfcc,
        &frames.features.centroid,
    )?;
    let k = cluster::effective_k(cluster_count, vectors.len());
    let params = KMeansParams {
        seed: cfg.onsets.seed,
        restarts: cfg.onsets.restarts,
        max_iterations: cfg.onsets.max_iterations,
    };
    let clusters = cluster::kmeans(&vectors, k, &params);
    log::info!(
        "Clustered {} onsets into {} groups (inertia {:.2})",
        vectors.len(),
        clusters.n_clusters,
        clusters.inertia
    );

    let onsets = frames
        .onsets
        .frames
        .iter()
        .zip(&frames.onsets.times)
        .zip(&clusters.labels)
        .map(|((&frame, &time), &cluster)| {
            Ok(OnsetEvent {
                time,
                cluster,
                centroid: frames.features.centroid.at(frame)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(OnsetAnalysis {
        tempo,
        duration,
        onsets,
    })
}

/// Voice pipeline: one event per sustained, pitched note.
pub fn analyze_voice(audio: &AudioData, cfg: &Config) -> Result<VoiceAnalysis> {
    let duration = audio.duration();
    let v = &cfg.voice;
    let frames = analyze_frames(audio, cfg, v.backtrack)?;

    if frames.onsets.is_empty() {
        return Ok(VoiceAnalysis {
            duration,
            events: Vec::new(),
        });
    }

    log::info!("Pass 3: Pitch tracking ({:.1}-{:.1} Hz)...", v.fmin, v.fmax);
    let pitch_params = PitchParams {
        fmin: v.fmin,
        fmax: v.fmax,
        threshold: v.yin_threshold,
        frame_length: cfg.analysis.n_fft,
        hop_length: cfg.analysis.hop_length,
    };
    let pitch_track = pitch::pitch_track(&audio.samples, audio.sample_rate, &pitch_params);

    log::info!("Pass 4: Sustain segmentation...");
    let notes = sustain::segment(&frames.onsets.times, &pitch_track, &frames.index, v.sustain_tolerance)?;

    let feats = &frames.features;
    let rms = percentile_normalize(feats.rms.values(), v.percentile_min, v.percentile_max);
    let centroid = percentile_normalize(feats.centroid.values(), v.percentile_min, v.percentile_max);

    let events = notes
        .iter()
        .map(|note| {
            let lookup = |values: &[f32], feature: &'static str| {
                values
                    .get(note.frame)
                    .copied()
                    .ok_or(AnalysisError::FrameIndexOutOfRange {
                        feature,
                        index: note.frame,
                        len: values.len(),
                    })
            };
            Ok(VoiceEvent {
                time: note.time,
                pitch: note.pitch,
                duration: note.duration,
                rms: lookup(&rms, "rms")?,
                centroid: lookup(&centroid, "spectral_centroid")?,
                bandwidth: feats.bandwidth.at(note.frame)?,
                flatness: feats.flatness.at(note.frame)?,
                interval: note.interval,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    log::info!("Assembled {} voice events over {:.1}s", events.len(), duration);
    Ok(VoiceAnalysis { duration, events })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::f32::consts::PI;

    pub(crate) fn tone(freq: f32, sr: u32, seconds: f32) -> Vec<f32> {
        let n = (sr as f32 * seconds) as usize;
        (0..n)
            .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / sr as f32).sin())
            .collect()
    }

    /// A4 then C5, the second note entering with a step discontinuity.
    pub(crate) fn two_notes(sr: u32) -> Vec<f32> {
        let mut samples = tone(440.0, sr, 1.0);
        let n = sr as usize;
        samples.extend((0..n).map(|i| 0.5 * (2.0 * PI * 523.251 * i as f32 / sr as f32).cos()));
        samples
    }

    /// Short decaying bursts with alternating bright/dark timbre.
    pub(crate) fn plucks(sr: u32, count: usize, spacing: f32) -> Vec<f32> {
        let total = (sr as f32 * spacing * (count as f32 + 1.0)) as usize;
        let mut samples = vec![0.0f32; total];
        for k in 0..count {
            let start = (sr as f32 * spacing * (k as f32 + 0.5)) as usize;
            let freq = if k % 2 == 0 { 220.0 } else { 1760.0 };
            // let each tail ring out to the end so no pluck is cut off abruptly
            for i in 0..(total - start) {
                let t = i as f32 / sr as f32;
                samples[start + i] += 0.8 * (-t * 20.0).exp() * (2.0 * PI * freq * t).sin();
            }
        }
        samples
    }

    fn audio(samples: Vec<f32>, sample_rate: u32) -> AudioData {
        AudioData {
            samples,
            sample_rate,
        }
    }

    #[test]
    fn silence_yields_no_onsets() {
        let result = analyze_onsets(&audio(vec![0.0; 16000], 16000), 4, &Config::default()).unwrap();
        assert!(result.onsets.is_empty());
        assert_eq!(result.tempo, 0.0);
        assert!((result.duration - 1.0).abs() < 1e-6);
    }

    #[test]
    fn silence_yields_no_voice_events() {
        let result = analyze_voice(&audio(vec![0.0; 16000], 16000), &Config::default()).unwrap();
        assert!(result.events.is_empty());
    }

    #[test]
    fn single_tone_is_one_sustained_event() {
        let result = analyze_voice(&audio(tone(440.0, 22050, 2.0), 22050), &Config::default()).unwrap();
        assert_eq!(result.events.len(), 1, "{:?}", result.events);
        let event = &result.events[0];
        assert!((event.pitch - 69.0).abs() < 0.5, "pitch {}", event.pitch);
        assert!((event.duration - 2.0).abs() < 0.15, "duration {}", event.duration);
        assert_eq!(event.interval, 0.0);
        assert!((0.0..=1.0).contains(&event.rms));
        assert!((0.0..=1.0).contains(&event.centroid));
        assert!((result.duration - 2.0).abs() < 1e-6);
    }

    #[test]
    fn two_notes_give_minor_third_interval() {
        let result = analyze_voice(&audio(two_notes(22050), 22050), &Config::default()).unwrap();
        assert_eq!(result.events.len(), 2, "{:?}", result.events);
        assert!((result.events[0].pitch - 69.0).abs() < 0.5);
        assert!((result.events[1].pitch - 72.0).abs() < 0.5);
        assert!((result.events[1].interval - 3.0).abs() < 0.5);
        assert!(result.events[1].time > result.events[0].time + result.events[0].duration);
    }

    #[test]
    fn onset_times_are_monotonic() {
        let result = analyze_onsets(&audio(plucks(22050, 6, 0.4), 22050), 2, &Config::default()).unwrap();
        assert!(!result.onsets.is_empty());
        for pair in result.onsets.windows(2) {
            assert!(pair[0].time <= pair[1].time);
        }
    }

    #[test]
    fn cluster_labels_stay_below_onset_count() {
        let result = analyze_onsets(&audio(plucks(22050, 3, 0.5), 22050), 10, &Config::default()).unwrap();
        let n = result.onsets.len();
        assert!(n > 0 && n <= 10);
        assert!(result.onsets.iter().all(|o| o.cluster < n));
    }

    #[test]
    fn bright_and_dark_plucks_separate() {
        let result = analyze_onsets(&audio(plucks(22050, 6, 0.4), 22050), 2, &Config::default()).unwrap();
        let bright: Vec<_> = result.onsets.iter().filter(|o| o.centroid > 1000.0).collect();
        let dark: Vec<_> = result.onsets.iter().filter(|o| o.centroid <= 1000.0).collect();
        assert!(!bright.is_empty() && !dark.is_empty());
        assert!(bright.iter().all(|o| o.cluster == bright[0].cluster));
        assert!(dark.iter().all(|o| o.cluster == dark[0].cluster));
        assert_ne!(bright[0].cluster, dark[0].cluster);
    }

    #[test]
    fn clustering_is_reproducible() {
        let samples = plucks(22050, 6, 0.4);
        let cfg = Config::default();
        let a = analyze_onsets(&audio(samples.clone(), 22050), 3, &cfg).unwrap();
        let b = analyze_onsets(&audio(samples, 22050), 3, &cfg).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn zero_clusters_rejected() {
        let err = analyze_onsets(&audio(tone(440.0, 16000, 0.5), 16000), 0, &Config::default()).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }
}
