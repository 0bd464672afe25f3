use serde::{Deserialize, Serialize};

use crate::{ConfigError, Note};

/// Set of permitted pitch classes, indexed by `pitch mod 12` (0 = C).
///
/// Always permits at least one class: every constructor rejects the empty
/// mask, so [`ScaleMask::quantize`] always terminates with a permitted pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[bool; 12]", into = "[bool; 12]")]
pub struct ScaleMask([bool; 12]);

impl ScaleMask {
    pub const MAJOR: ScaleMask = ScaleMask([
        true, false, true, false, true, true, false, true, false, true, false, true,
    ]);
    pub const DORIAN: ScaleMask = ScaleMask([
        true, false, true, true, false, true, false, true, false, true, true, false,
    ]);
    pub const BLACK_KEYS: ScaleMask = ScaleMask([
        false, true, false, true, false, false, true, false, true, false, true, false,
    ]);
    pub const MINOR_PENTATONIC: ScaleMask = ScaleMask([
        true, false, false, true, false, true, false, true, false, false, true, false,
    ]);
    pub const CHROMATIC: ScaleMask = ScaleMask([true; 12]);

    pub fn new(classes: [bool; 12]) -> Result<Self, ConfigError> {
        if classes.iter().any(|&c| c) {
            Ok(Self(classes))
        } else {
            Err(ConfigError::EmptyScale)
        }
    }

    /// Build a mask from a list of pitch classes (`0..12`, duplicates allowed).
    pub fn from_pitch_classes(pcs: &[u8]) -> Result<Self, ConfigError> {
        let mut classes = [false; 12];
        for &pc in pcs {
            if pc >= 12 {
                return Err(ConfigError::InvalidPitchClass(pc));
            }
            classes[pc as usize] = true;
        }
        Self::new(classes)
    }

    pub fn contains_pitch(&self, pitch: i32) -> bool {
        self.0[pitch.rem_euclid(12) as usize]
    }

    /// Permitted pitch classes in ascending order.
    pub fn pitch_classes(&self) -> impl Iterator<Item = u8> + '_ {
        (0u8..12).filter(move |&pc| self.0[pc as usize])
    }

    /// Snap a note's pitch to the nearest permitted pitch class.
    ///
    /// Permitted pitches are returned unchanged. Otherwise candidates are
    /// searched at distance 1, 2, ... with the lower one tried first, so ties
    /// resolve downward. The octave is the original pitch truncated toward
    /// zero, which makes pitches below 0 snap relative to octave 0 rather
    /// than to their floor octave.
    pub fn quantize(&self, note: Note) -> Note {
        Note {
            pitch: self.quantize_pitch(note.pitch),
            ..note
        }
    }

    pub fn quantize_pitch(&self, pitch: i32) -> i32 {
        let class = pitch.rem_euclid(12);
        if self.0[class as usize] {
            return pitch;
        }
        let octave = pitch / 12;
        // Distance 6 reaches every class from either side.
        for d in 1..=6 {
            let lower = class - d;
            if self.0[lower.rem_euclid(12) as usize] {
                return octave * 12 + lower;
            }
            let upper = class + d;
            if self.0[upper.rem_euclid(12) as usize] {
                return octave * 12 + upper;
            }
        }
        pitch
    }
}

impl Default for ScaleMask {
    fn default() -> Self {
        Self::MAJOR
    }
}

impl TryFrom<[bool; 12]> for ScaleMask {
    type Error = ConfigError;

    fn try_from(classes: [bool; 12]) -> Result<Self, Self::Error> {
        Self::new(classes)
    }
}

impl From<ScaleMask> for [bool; 12] {
    fn from(mask: ScaleMask) -> Self {
        mask.0
    }
}

/// Scales selectable by name from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NamedScale {
    Major,
    Dorian,
    BlackKeys,
    MinorPentatonic,
    Chromatic,
}

impl NamedScale {
    pub const ALL: [NamedScale; 5] = [
        NamedScale::Major,
        NamedScale::Dorian,
        NamedScale::BlackKeys,
        NamedScale::MinorPentatonic,
        NamedScale::Chromatic,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            NamedScale::Major => "major",
            NamedScale::Dorian => "dorian",
            NamedScale::BlackKeys => "black-keys",
            NamedScale::MinorPentatonic => "minor-pentatonic",
            NamedScale::Chromatic => "chromatic",
        }
    }

    pub fn mask(&self) -> ScaleMask {
        match self {
            NamedScale::Major => ScaleMask::MAJOR,
            NamedScale::Dorian => ScaleMask::DORIAN,
            NamedScale::BlackKeys => ScaleMask::BLACK_KEYS,
            NamedScale::MinorPentatonic => ScaleMask::MINOR_PENTATONIC,
            NamedScale::Chromatic => ScaleMask::CHROMATIC,
        }
    }

    /// Case-insensitive lookup; `_` and `-` are interchangeable.
    pub fn from_name(s: &str) -> Option<Self> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        Self::ALL.iter().copied().find(|scale| scale.name() == wanted)
    }
}
