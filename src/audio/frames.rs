/// Maps between analysis frame indices and time offsets.
#[derive(Clone, Copy, Debug)]
pub struct FrameTimeIndex {
    hop_length: usize,
    sample_rate: u32,
    n_frames: usize,
}

impl FrameTimeIndex {
    pub fn new(hop_length: usize, sample_rate: u32, n_frames: usize) -> Self {
        Self {
            hop_length,
            sample_rate,
            n_frames,
        }
    }

    /// Number of centered frames covering `n_samples`.
    pub fn frame_count(n_samples: usize, hop_length: usize) -> usize {
        1 + n_samples / hop_length
    }

    pub fn len(&self) -> usize {
        self.n_frames
    }

    pub fn frame_to_time(&self, frame: usize) -> f32 {
        (frame as f64 * self.hop_length as f64 / self.sample_rate as f64) as f32
    }

    pub fn frames_to_times(&self, frames: &[usize]) -> Vec<f32> {
        frames.iter().map(|&f| self.frame_to_time(f)).collect()
    }

    /// Closest frame to `time`; ties go to the earlier frame.
    pub fn nearest_frame(&self, time: f32) -> usize {
        if self.n_frames == 0 || time <= 0.0 {
            return 0;
        }
        let last = self.n_frames - 1;
        let position = time as f64 * self.sample_rate as f64 / self.hop_length as f64;
        let lower = (position.floor() as usize).min(last);
        if lower == last {
            return last;
        }
        let upper = lower + 1;
        let d_lower = (time - self.frame_to_time(lower)).abs();
        let d_upper = (self.frame_to_time(upper) - time).abs();
        if d_upper < d_lower {
            upper
        } else {
            lower
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_to_time_uses_hop_and_rate() {
        let index = FrameTimeIndex::new(512, 22050, 100);
        assert_eq!(index.frame_to_time(0), 0.0);
        assert!((index.frame_to_time(43) - 0.998_458).abs() < 1e-5);
    }

    #[test]
    fn nearest_frame_round_trips() {
        let index = FrameTimeIndex::new(512, 16000, 40);
        for frame in 0..40 {
            assert_eq!(index.nearest_frame(index.frame_to_time(frame)), frame);
        }
    }

    #[test]
    fn nearest_frame_clamps_and_breaks_ties_low() {
        let index = FrameTimeIndex::new(128, 1024, 5);
        assert_eq!(index.nearest_frame(-1.0), 0);
        assert_eq!(index.nearest_frame(10.0), 4);
        // halfway between frame 1 (0.125s) and frame 2 (0.25s)
        assert_eq!(index.nearest_frame(0.1875), 1);
        assert_eq!(index.nearest_frame(0.2), 2);
    }

    #[test]
    fn frame_count_matches_centered_framing() {
        assert_eq!(FrameTimeIndex::frame_count(44100, 512), 87);
        assert_eq!(FrameTimeIndex::frame_count(0, 512), 1);
    }
}
