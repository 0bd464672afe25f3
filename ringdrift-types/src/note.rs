use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::MAX_MIDI_PITCH;

/// One slot of a voice's ring: a pitch held for a duration.
///
/// Pitch `0` is the rest sentinel; any positive pitch is a sounding semitone
/// number (MIDI key numbering, 60 = middle C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Note {
    pub pitch: i32,
    pub duration: Duration,
}

impl Note {
    pub const REST_PITCH: i32 = 0;

    pub fn new(pitch: i32, duration: Duration) -> Self {
        Self { pitch, duration }
    }

    pub fn rest(duration: Duration) -> Self {
        Self {
            pitch: Self::REST_PITCH,
            duration,
        }
    }

    pub fn is_sounding(&self) -> bool {
        self.pitch > 0
    }

    pub fn is_rest(&self) -> bool {
        self.pitch == Self::REST_PITCH
    }

    /// Pitch class in `0..12`, wrapping negative pitches upward.
    pub fn pitch_class(&self) -> usize {
        self.pitch.rem_euclid(12) as usize
    }

    /// MIDI key for a sounding note, `None` for rests and out-of-range pitches.
    pub fn midi_key(&self) -> Option<u8> {
        if self.is_sounding() && self.pitch <= MAX_MIDI_PITCH {
            Some(self.pitch as u8)
        } else {
            None
        }
    }
}
