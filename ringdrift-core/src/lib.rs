//! # ringdrift-core
//!
//! The running engine: per-voice note generators that mutate a ring of
//! notes forever, players that turn those notes into timed note-on/note-off
//! pairs, and the session that runs every voice against one shared output
//! and stops them together.
//!
//! Each voice is two threads joined by a rendezvous channel:
//!
//! ```text
//! gen-<n> --Note--> voice-<n> --note_on/note_off--> SharedOutput --> NoteSink
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ringdrift_core::{Config, LogSink, Session};
//!
//! let config = Config::load();
//! let voices = config.voices()?;
//! let session = Session::start(&voices, LogSink, config.session_options()?)?;
//!
//! // Blocks until one byte (or EOF) arrives on stdin, then stops every voice.
//! let report = session.wait_for(|| {
//!     use std::io::Read;
//!     std::io::stdin().read(&mut [0u8; 1]).map(|_| ())
//! });
//! println!("{} notes played", report.notes_played());
//! ```
//!
//! ## Module Overview
//!
//! - [`generator`]: the ring of notes, its mutation step and the driver thread
//! - [`player`]: the per-voice note-on/hold/note-off state machine
//! - [`output`]: the [`NoteSink`] capability and the [`SharedOutput`] lock
//! - [`session`]: starts, stops and reports on a set of voices
//! - [`cancel`]: the one-shot broadcast stop signal
//! - [`config`]: TOML settings (embedded defaults plus user overrides)
//! - [`midi`]: midir port listing and the MIDI [`NoteSink`]

pub mod cancel;
pub mod config;
pub mod generator;
pub mod midi;
pub mod output;
pub mod player;
pub mod session;

pub use cancel::{CancelSignal, CancelToken};
pub use config::{Config, ConfigLoadError};
pub use generator::{Generator, DriverReport};
pub use output::{LogSink, NoteSink, OutputError, SharedOutput};
pub use player::{Player, PlayerReport, StopReason};
pub use session::{Session, SessionError, SessionOptions, SessionReport, TaskOutcome, VoiceReport};

pub use ringdrift_types as types;
