use serde::{Deserialize, Serialize};

use crate::{ConfigError, GeneratorConfig, MAX_MIDI_CHANNEL};

/// One independent voice: its walk parameters and the output channel it
/// plays on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    pub channel: u8,
    pub generator: GeneratorConfig,
}

impl VoiceConfig {
    pub fn new(channel: u8, generator: GeneratorConfig) -> Self {
        Self { channel, generator }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel > MAX_MIDI_CHANNEL {
            return Err(ConfigError::ChannelOutOfRange(self.channel));
        }
        self.generator.validate()
    }
}
