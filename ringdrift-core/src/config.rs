use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::session::SessionOptions;
use ringdrift_types::{
    ConfigError, GeneratorConfig, NamedScale, Profile, ScaleMask, VoiceConfig,
};

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    session: SessionSection,
    voices: Option<Vec<VoiceEntry>>,
}

#[derive(Deserialize, Default, Debug, Clone)]
#[serde(deny_unknown_fields)]
struct SessionSection {
    velocity: Option<u8>,
    grace_ms: Option<u64>,
    seed: Option<u64>,
    device: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
struct VoiceEntry {
    channel: u8,
    profile: Option<String>,
    scale: Option<String>,
    pitch_classes: Option<Vec<u8>>,
    min_pitch: Option<i32>,
    max_pitch: Option<i32>,
    min_duration_ms: Option<u64>,
    max_duration_ms: Option<u64>,
    step_duration_ms: Option<u64>,
    ring_len: Option<usize>,
    note_p: Option<u32>,
    time_p: Option<u32>,
    switch_p: Option<u32>,
}

#[derive(Debug)]
pub enum ConfigLoadError {
    Io { path: PathBuf, source: std::io::Error },
    Toml(toml::de::Error),
    Invalid(String),
    UnknownProfile { index: usize, name: String },
    UnknownScale { index: usize, name: String },
    Voice { index: usize, source: ConfigError },
}

impl std::fmt::Display for ConfigLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "could not read {}: {}", path.display(), source),
            Self::Toml(e) => write!(f, "malformed config: {}", e),
            Self::Invalid(msg) => write!(f, "invalid config: {}", msg),
            Self::UnknownProfile { index, name } => {
                let known: Vec<&str> = Profile::ALL.iter().map(|p| p.name()).collect();
                write!(
                    f,
                    "voice {}: unknown profile '{}' (expected one of {})",
                    index,
                    name,
                    known.join(", ")
                )
            }
            Self::UnknownScale { index, name } => {
                let known: Vec<&str> = NamedScale::ALL.iter().map(|s| s.name()).collect();
                write!(
                    f,
                    "voice {}: unknown scale '{}' (expected one of {})",
                    index,
                    name,
                    known.join(", ")
                )
            }
            Self::Voice { index, source } => write!(f, "voice {}: {}", index, source),
        }
    }
}

impl std::error::Error for ConfigLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Toml(e) => Some(e),
            Self::Voice { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for ConfigLoadError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml(e)
    }
}

/// Session and voice settings: the embedded defaults with one layer of
/// overrides on top.
#[derive(Debug, Clone)]
pub struct Config {
    session: SessionSection,
    voices: Vec<VoiceEntry>,
}

impl Config {
    /// Embedded defaults merged with the user file, if there is one. A user
    /// file that cannot be read or parsed is logged and skipped.
    pub fn load() -> Self {
        Self::load_with_user(user_config_path())
    }

    fn load_with_user(path: Option<PathBuf>) -> Self {
        let mut config = Self::embedded();

        if let Some(path) = path {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                        Ok(user) => {
                            log::info!(target: "config", "loaded {}", path.display());
                            config.merge(user);
                        }
                        Err(e) => {
                            log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                        }
                    },
                    Err(e) => {
                        log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
                    }
                }
            }
        }

        config
    }

    /// Embedded defaults merged with an explicitly named file. Unlike
    /// [`Config::load`], any problem with the file is an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigLoadError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&contents)?;
        log::info!(target: "config", "loaded {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigLoadError> {
        let user: ConfigFile = toml::from_str(contents)?;
        let mut config = Self::embedded();
        config.merge(user);
        Ok(config)
    }

    fn embedded() -> Self {
        let base: ConfigFile =
            toml::from_str(DEFAULT_CONFIG).expect("Failed to parse embedded config.toml");
        Self {
            session: base.session,
            voices: base.voices.unwrap_or_default(),
        }
    }

    fn merge(&mut self, user: ConfigFile) {
        merge_session(&mut self.session, user.session);
        if let Some(voices) = user.voices {
            self.voices = voices;
        }
    }

    pub fn session_options(&self) -> Result<SessionOptions, ConfigLoadError> {
        let fallback = SessionOptions::default();
        let velocity = self.session.velocity.unwrap_or(fallback.velocity);
        if !(1..=127).contains(&velocity) {
            return Err(ConfigLoadError::Invalid(format!(
                "velocity {} is outside 1..=127",
                velocity
            )));
        }
        Ok(SessionOptions {
            velocity,
            grace: self
                .session
                .grace_ms
                .map(Duration::from_millis)
                .unwrap_or(fallback.grace),
            seed: self.session.seed,
        })
    }

    /// Output port selector (index or name substring), if configured.
    pub fn device(&self) -> Option<&str> {
        self.session.device.as_deref()
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Resolve every `[[voices]]` entry into a validated [`VoiceConfig`].
    pub fn voices(&self) -> Result<Vec<VoiceConfig>, ConfigLoadError> {
        self.voices
            .iter()
            .enumerate()
            .map(|(index, entry)| resolve_voice(index, entry))
            .collect()
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ringdrift").join("config.toml"))
}

fn merge_session(base: &mut SessionSection, user: SessionSection) {
    if user.velocity.is_some() {
        base.velocity = user.velocity;
    }
    if user.grace_ms.is_some() {
        base.grace_ms = user.grace_ms;
    }
    if user.seed.is_some() {
        base.seed = user.seed;
    }
    if user.device.is_some() {
        base.device = user.device;
    }
}

fn resolve_voice(index: usize, entry: &VoiceEntry) -> Result<VoiceConfig, ConfigLoadError> {
    let profile = match entry.profile.as_deref() {
        Some(name) => Profile::from_name(name).ok_or_else(|| ConfigLoadError::UnknownProfile {
            index,
            name: name.to_string(),
        })?,
        None => Profile::default(),
    };
    let mut generator: GeneratorConfig = profile.config();

    match (entry.scale.as_deref(), entry.pitch_classes.as_deref()) {
        (Some(_), Some(_)) => {
            return Err(ConfigLoadError::Invalid(format!(
                "voice {}: set either scale or pitch_classes, not both",
                index
            )))
        }
        (Some(name), None) => {
            generator.scale = NamedScale::from_name(name)
                .ok_or_else(|| ConfigLoadError::UnknownScale {
                    index,
                    name: name.to_string(),
                })?
                .mask();
        }
        (None, Some(pcs)) => {
            generator.scale = ScaleMask::from_pitch_classes(pcs)
                .map_err(|source| ConfigLoadError::Voice { index, source })?;
        }
        (None, None) => {}
    }

    if let Some(v) = entry.min_pitch {
        generator.min_pitch = v;
    }
    if let Some(v) = entry.max_pitch {
        generator.max_pitch = v;
    }
    if let Some(ms) = entry.min_duration_ms {
        generator.min_duration = Duration::from_millis(ms);
    }
    if let Some(ms) = entry.max_duration_ms {
        generator.max_duration = Duration::from_millis(ms);
    }
    if let Some(ms) = entry.step_duration_ms {
        generator.step_duration = Duration::from_millis(ms);
    }
    if let Some(v) = entry.ring_len {
        generator.ring_len = v;
    }
    if let Some(v) = entry.note_p {
        generator.note_p = v;
    }
    if let Some(v) = entry.time_p {
        generator.time_p = v;
    }
    if let Some(v) = entry.switch_p {
        generator.switch_p = v;
    }

    let voice = VoiceConfig::new(entry.channel, generator);
    voice
        .validate()
        .map_err(|source| ConfigLoadError::Voice { index, source })?;
    Ok(voice)
}
