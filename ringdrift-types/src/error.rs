use std::time::Duration;

/// Rejected voice or scale parameters.
///
/// Raised at construction time so the engine never runs with a config whose
/// behaviour is undefined (an empty scale never quantizes, a zero
/// probability denominator divides by zero).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptyScale,
    InvalidPitchClass(u8),
    EmptyRing,
    ZeroProbability {
        field: &'static str,
    },
    PitchOutOfRange {
        field: &'static str,
        pitch: i32,
    },
    InvertedPitchRange {
        min: i32,
        max: i32,
    },
    InvertedDurationRange {
        min: Duration,
        max: Duration,
    },
    PitchOffScale {
        field: &'static str,
        pitch: i32,
    },
    ChannelOutOfRange(u8),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyScale => write!(f, "scale must permit at least one pitch class"),
            Self::InvalidPitchClass(pc) => write!(f, "pitch class {} is not in 0..12", pc),
            Self::EmptyRing => write!(f, "ring_len must be at least 1"),
            Self::ZeroProbability { field } => {
                write!(f, "{} must be at least 1 (event chance is 1/{})", field, field)
            }
            Self::PitchOutOfRange { field, pitch } => {
                write!(f, "{} = {} is outside the sounding range 1..=127", field, pitch)
            }
            Self::InvertedPitchRange { min, max } => {
                write!(f, "min_pitch {} is above max_pitch {}", min, max)
            }
            Self::InvertedDurationRange { min, max } => {
                write!(f, "min_duration {:?} is above max_duration {:?}", min, max)
            }
            Self::PitchOffScale { field, pitch } => {
                write!(f, "{} = {} is not a pitch class of the scale", field, pitch)
            }
            Self::ChannelOutOfRange(ch) => write!(f, "channel {} is outside 0..=15", ch),
        }
    }
}

impl std::error::Error for ConfigError {}
