use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, ScaleMask, MAX_MIDI_PITCH};

/// Parameters of one voice's stochastic walk.
///
/// Pitches are inclusive bounds for clamping; fresh random pitches are drawn
/// from `min_pitch..max_pitch`. Each `*_p` field is a denominator: the
/// matching mutation fires with probability `1/p` per step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub min_pitch: i32,
    pub max_pitch: i32,
    pub min_duration: Duration,
    pub max_duration: Duration,
    pub step_duration: Duration,
    pub scale: ScaleMask,
    pub ring_len: usize,
    /// Pitch jitter chance for sounding slots.
    pub note_p: u32,
    /// Duration nudge chance.
    pub time_p: u32,
    /// Sounding/rest toggle chance.
    pub switch_p: u32,
}

impl GeneratorConfig {
    /// Upper-register voice with a 16-slot ring and short, busy notes.
    pub fn lead() -> Self {
        let unit = Duration::from_secs(1);
        Self {
            min_pitch: 48,
            max_pitch: 72,
            min_duration: unit,
            max_duration: unit * 4,
            step_duration: unit / 8,
            scale: ScaleMask::DORIAN,
            ring_len: 16,
            note_p: 4,
            time_p: 2,
            switch_p: 16,
        }
    }

    /// Low drone voice: four long slots that change often.
    pub fn bass() -> Self {
        let unit = Duration::from_secs(1);
        Self {
            min_pitch: 36,
            max_pitch: 60,
            min_duration: unit * 4,
            max_duration: unit * 16,
            step_duration: unit,
            scale: ScaleMask::DORIAN,
            ring_len: 4,
            note_p: 2,
            time_p: 2,
            switch_p: 4,
        }
    }

    /// Check the invariants the generator relies on.
    ///
    /// Both pitch bounds must lie on the scale: quantizing a clamped pitch
    /// then never leaves `min_pitch..=max_pitch`, because a permitted bound
    /// is always nearer than any candidate beyond it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ring_len == 0 {
            return Err(ConfigError::EmptyRing);
        }
        for (field, p) in [
            ("note_p", self.note_p),
            ("time_p", self.time_p),
            ("switch_p", self.switch_p),
        ] {
            if p == 0 {
                return Err(ConfigError::ZeroProbability { field });
            }
        }
        for (field, pitch) in [("min_pitch", self.min_pitch), ("max_pitch", self.max_pitch)] {
            if !(1..=MAX_MIDI_PITCH).contains(&pitch) {
                return Err(ConfigError::PitchOutOfRange { field, pitch });
            }
        }
        if self.min_pitch > self.max_pitch {
            return Err(ConfigError::InvertedPitchRange {
                min: self.min_pitch,
                max: self.max_pitch,
            });
        }
        if self.min_duration > self.max_duration {
            return Err(ConfigError::InvertedDurationRange {
                min: self.min_duration,
                max: self.max_duration,
            });
        }
        for (field, pitch) in [("min_pitch", self.min_pitch), ("max_pitch", self.max_pitch)] {
            if !self.scale.contains_pitch(pitch) {
                return Err(ConfigError::PitchOffScale { field, pitch });
            }
        }
        Ok(())
    }
}

impl Default for GeneratorConfig {
    /// The plain fixed profile: one octave of C major, eight quick slots.
    fn default() -> Self {
        Self {
            min_pitch: 60,
            max_pitch: 72,
            min_duration: Duration::from_millis(250),
            max_duration: Duration::from_secs(1),
            step_duration: Duration::from_millis(250),
            scale: ScaleMask::MAJOR,
            ring_len: 8,
            note_p: 4,
            time_p: 4,
            switch_p: 8,
        }
    }
}

/// Named base configurations a voice can start from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Profile {
    #[default]
    Default,
    Lead,
    Bass,
}

impl Profile {
    pub const ALL: [Profile; 3] = [Profile::Default, Profile::Lead, Profile::Bass];

    pub fn name(&self) -> &'static str {
        match self {
            Profile::Default => "default",
            Profile::Lead => "lead",
            Profile::Bass => "bass",
        }
    }

    pub fn config(&self) -> GeneratorConfig {
        match self {
            Profile::Default => GeneratorConfig::default(),
            Profile::Lead => GeneratorConfig::lead(),
            Profile::Bass => GeneratorConfig::bass(),
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        let wanted = s.trim().to_lowercase();
        Self::ALL.iter().copied().find(|p| p.name() == wanted)
    }
}
