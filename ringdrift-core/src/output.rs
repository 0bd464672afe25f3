//! Output capability and the multiplexer that shares it between voices.

use std::sync::{Arc, Mutex, MutexGuard};

/// Failure opening or writing to an output sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputError {
    Init(String),
    PortNotFound(String),
    Connect(String),
    Send(String),
}

impl std::fmt::Display for OutputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init(e) => write!(f, "failed to initialize MIDI output: {}", e),
            Self::PortNotFound(sel) => write!(f, "no MIDI output port matches '{}'", sel),
            Self::Connect(e) => write!(f, "failed to connect to MIDI port: {}", e),
            Self::Send(e) => write!(f, "failed to send MIDI message: {}", e),
        }
    }
}

impl std::error::Error for OutputError {}

/// Something that can sound and release notes.
///
/// Channels are 0-based, keys and velocities are 7-bit. Each call is one
/// discrete event; implementations need no internal locking because
/// [`SharedOutput`] serializes access.
pub trait NoteSink: Send {
    fn note_on(&mut self, channel: u8, key: u8, velocity: u8) -> Result<(), OutputError>;
    fn note_off(&mut self, channel: u8, key: u8, velocity: u8) -> Result<(), OutputError>;
}

impl<S: NoteSink + ?Sized> NoteSink for Box<S> {
    fn note_on(&mut self, channel: u8, key: u8, velocity: u8) -> Result<(), OutputError> {
        (**self).note_on(channel, key, velocity)
    }

    fn note_off(&mut self, channel: u8, key: u8, velocity: u8) -> Result<(), OutputError> {
        (**self).note_off(channel, key, velocity)
    }
}

/// One sink shared by every voice.
///
/// The lock is taken for exactly one call, never across a note's hold time,
/// so voices keep independent timing while the sink sees whole events only.
pub struct SharedOutput<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for SharedOutput<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: NoteSink> SharedOutput<S> {
    pub fn new(sink: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sink)),
        }
    }

    pub fn note_on(&self, channel: u8, key: u8, velocity: u8) -> Result<(), OutputError> {
        self.lock().note_on(channel, key, velocity)
    }

    pub fn note_off(&self, channel: u8, key: u8, velocity: u8) -> Result<(), OutputError> {
        self.lock().note_off(channel, key, velocity)
    }

    /// Take the sink back once every other clone has been dropped.
    pub fn into_inner(self) -> Option<S> {
        Arc::try_unwrap(self.inner)
            .ok()
            .map(|m| m.into_inner().unwrap_or_else(|e| e.into_inner()))
    }

    // A voice that panicked mid-call poisons the mutex; the sink itself
    // holds no partial state between calls, so keep serving the others.
    fn lock(&self) -> MutexGuard<'_, S> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            log::warn!(target: "output", "recovering output lock poisoned by a failed voice");
            poisoned.into_inner()
        })
    }
}

/// Dry-run sink: logs every event instead of sending it anywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NoteSink for LogSink {
    fn note_on(&mut self, channel: u8, key: u8, velocity: u8) -> Result<(), OutputError> {
        log::info!(target: "output", "ch{:<2} on  {:>3} vel {}", channel, key, velocity);
        Ok(())
    }

    fn note_off(&mut self, channel: u8, key: u8, _velocity: u8) -> Result<(), OutputError> {
        log::info!(target: "output", "ch{:<2} off {:>3}", channel, key);
        Ok(())
    }
}
