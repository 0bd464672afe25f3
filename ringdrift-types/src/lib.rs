//! # ringdrift-types
//!
//! Plain data shared by the ringdrift engine and its binary: notes, scale
//! masks with their quantizer, and the per-voice generator configuration.
//! Nothing here touches threads, clocks or devices.

mod error;
pub mod generator_config;
pub mod note;
pub mod scale;
pub mod voice;

pub use error::ConfigError;
pub use generator_config::{GeneratorConfig, Profile};
pub use note::Note;
pub use scale::{NamedScale, ScaleMask};
pub use voice::VoiceConfig;

/// Highest MIDI key number.
pub const MAX_MIDI_PITCH: i32 = 127;

/// Highest MIDI channel index (channels are 0-based on the wire).
pub const MAX_MIDI_CHANNEL: u8 = 15;
