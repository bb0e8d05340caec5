//! Reconciles attack onsets with the continuous pitch track.
//!
//! Each onset claims the run of voiced frames that stay within
//! `tolerance` semitones of its starting pitch. Onsets landing inside a
//! claimed run belong to the note already sounding and are absorbed.

use super::features::FrameSeries;
use super::frames::FrameTimeIndex;
use crate::error::Result;

/// An onset that survived segmentation.
#[derive(Clone, Debug, PartialEq)]
pub struct SustainedNote {
    /// Pitch-track frame nearest the onset
    pub frame: usize,
    pub time: f32,
    /// MIDI, 0 when the onset frame is unvoiced
    pub pitch: f32,
    pub duration: f32,
    /// Semitones from the previous emitted note (0 for the first)
    pub interval: f32,
}

/// Walk forward from `start` while the track stays voiced and within `tolerance`
/// of `pitch`. Returns the exclusive end frame.
pub fn sustain_end(pitch_track: &[f32], start: usize, pitch: f32, tolerance: f32) -> usize {
    let mut end = start;
    while end < pitch_track.len() {
        let p = pitch_track[end];
        if p <= 0.0 || (p - pitch).abs() > tolerance {
            break;
        }
        end += 1;
    }
    end
}

pub fn segment(
    onset_times: &[f32],
    pitch: &FrameSeries,
    index: &FrameTimeIndex,
    tolerance: f32,
) -> Result<Vec<SustainedNote>> {
    let track = pitch.values();
    let mut notes: Vec<SustainedNote> = Vec::new();
    let mut sounding_until: Option<f32> = None;
    let mut previous_pitch: Option<f32> = None;

    for &time in onset_times {
        if let Some(until) = sounding_until {
            if time <= until {
                log::trace!("Onset at {:.3}s absorbed by note sounding until {:.3}s", time, until);
                continue;
            }
        }

        let frame = index.nearest_frame(time);
        let note_pitch = pitch.at(frame)?;
        let end = sustain_end(track, frame, note_pitch, tolerance);

        let (duration, until) = if end > frame {
            let last = index.frame_to_time(end - 1);
            (last - index.frame_to_time(frame), Some(last))
        } else {
            (0.0, None)
        };

        let interval = previous_pitch.map_or(0.0, |prev| note_pitch - prev);
        previous_pitch = Some(note_pitch);
        sounding_until = until;

        notes.push(SustainedNote {
            frame,
            time,
            pitch: note_pitch,
            duration,
            interval,
        });
    }

    log::debug!(
        "Sustain segmentation kept {} of {} onsets",
        notes.len(),
        onset_times.len()
    );
    Ok(notes)
}
