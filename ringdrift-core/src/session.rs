//! Orchestration: start every voice against one shared output, wait for a
//! trigger, then cancel and give in-flight note-offs time to flush.

use std::io;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::cancel::{CancelSignal, CancelToken};
use crate::generator::{spawn_driver, DriverReport, Generator};
use crate::output::{NoteSink, SharedOutput};
use crate::player::{spawn_player, Player, PlayerReport, DEFAULT_VELOCITY};
use ringdrift_types::{ConfigError, Note, VoiceConfig};

pub const DEFAULT_GRACE: Duration = Duration::from_secs(1);

const JOIN_POLL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub velocity: u8,
    /// How long shutdown waits for voices to release their notes.
    pub grace: Duration,
    /// Base seed for every voice's generator; `None` draws from the OS.
    pub seed: Option<u64>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            velocity: DEFAULT_VELOCITY,
            grace: DEFAULT_GRACE,
            seed: None,
        }
    }
}

#[derive(Debug)]
pub enum SessionError {
    NoVoices,
    InvalidVoice { index: usize, source: ConfigError },
    Spawn(io::Error),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoVoices => write!(f, "no voices configured"),
            Self::InvalidVoice { index, source } => write!(f, "voice {}: {}", index, source),
            Self::Spawn(e) => write!(f, "failed to spawn voice thread: {}", e),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidVoice { source, .. } => Some(source),
            Self::Spawn(e) => Some(e),
            Self::NoVoices => None,
        }
    }
}

impl From<io::Error> for SessionError {
    fn from(e: io::Error) -> Self {
        Self::Spawn(e)
    }
}

/// How one voice thread ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome<T> {
    Finished(T),
    Panicked,
    /// Still running at the end of the grace period; detached.
    Abandoned,
}

impl<T> TaskOutcome<T> {
    pub fn finished(&self) -> Option<&T> {
        match self {
            TaskOutcome::Finished(t) => Some(t),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceReport {
    pub index: usize,
    pub channel: u8,
    pub player: TaskOutcome<PlayerReport>,
    pub generator: TaskOutcome<DriverReport>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub voices: Vec<VoiceReport>,
}

impl SessionReport {
    pub fn notes_played(&self) -> u64 {
        self.voices
            .iter()
            .filter_map(|v| v.player.finished())
            .map(|r| r.notes_played)
            .sum()
    }

    pub fn all_finished(&self) -> bool {
        self.voices.iter().all(|v| {
            matches!(v.player, TaskOutcome::Finished(_))
                && matches!(v.generator, TaskOutcome::Finished(_))
        })
    }
}

struct VoiceThreads {
    index: usize,
    channel: u8,
    generator: JoinHandle<DriverReport>,
    player: JoinHandle<PlayerReport>,
}

/// A running set of voices sharing one output.
///
/// Dropping a session without calling [`Session::shutdown`] still fires the
/// cancel signal, so every voice releases its note and exits.
pub struct Session<S> {
    cancel: CancelSignal,
    voices: Vec<VoiceThreads>,
    grace: Duration,
    output: SharedOutput<S>,
}

impl<S: NoteSink + 'static> Session<S> {
    /// Validate every voice, then spawn one generator and one player thread
    /// per voice. Nothing is started if any voice is invalid.
    pub fn start(
        voices: &[VoiceConfig],
        sink: S,
        options: SessionOptions,
    ) -> Result<Self, SessionError> {
        if voices.is_empty() {
            return Err(SessionError::NoVoices);
        }
        for (index, voice) in voices.iter().enumerate() {
            voice
                .validate()
                .map_err(|source| SessionError::InvalidVoice { index, source })?;
        }

        let mut seeds = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut session = Self {
            cancel: CancelSignal::new(),
            voices: Vec::with_capacity(voices.len()),
            grace: options.grace,
            output: SharedOutput::new(sink),
        };

        for (index, voice) in voices.iter().enumerate() {
            let generator = Generator::new(voice.generator.clone(), StdRng::from_rng(&mut seeds))
                .map_err(|source| SessionError::InvalidVoice { index, source })?;
            match session.spawn_voice(index, voice.channel, options.velocity, generator) {
                Ok(threads) => session.voices.push(threads),
                Err(e) => {
                    log::error!(target: "session", "could not start voice {}: {}", index, e);
                    session.abort();
                    return Err(SessionError::Spawn(e));
                }
            }
            log::info!(
                target: "session",
                "voice {} on ch{}: pitch {}..={}, ring {}",
                index,
                voice.channel,
                voice.generator.min_pitch,
                voice.generator.max_pitch,
                voice.generator.ring_len
            );
        }

        Ok(session)
    }

    fn spawn_voice(
        &self,
        index: usize,
        channel: u8,
        velocity: u8,
        generator: Generator<StdRng>,
    ) -> io::Result<VoiceThreads> {
        // Rendezvous: the generator only runs ahead by the note being played.
        let (tx, rx) = crossbeam_channel::bounded::<Note>(0);
        let player = Player::new(channel, velocity, self.output.clone());
        let player = spawn_player(format!("voice-{}", index), player, rx, self.cancel.token())?;
        let generator = match spawn_driver(format!("gen-{}", index), generator, tx, self.cancel.token()) {
            Ok(handle) => handle,
            Err(e) => {
                reap_orphan(index, player);
                return Err(e);
            }
        };
        Ok(VoiceThreads {
            index,
            channel,
            generator,
            player,
        })
    }
}

impl<S> Session<S> {
    // Voices already running exit promptly once cancelled, so joining here
    // cannot hang on a note's hold time.
    fn abort(&mut self) {
        self.cancel.fire();
        for voice in self.voices.drain(..) {
            let _ = voice.player.join();
            let _ = voice.generator.join();
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.token()
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Block on `trigger`, then shut down. Any completion of the trigger,
    /// error included, counts.
    pub fn wait_for<F>(self, trigger: F) -> SessionReport
    where
        F: FnOnce() -> io::Result<()>,
    {
        if let Err(e) = trigger() {
            log::warn!(target: "session", "control input failed ({}), stopping", e);
        }
        self.shutdown()
    }

    /// Fire the cancel signal and collect every voice within the grace
    /// period. Threads still running at the deadline are detached.
    pub fn shutdown(mut self) -> SessionReport {
        self.cancel.fire();
        let voices = std::mem::take(&mut self.voices);
        log::info!(target: "session", "stopping {} voices", voices.len());

        let deadline = Instant::now() + self.grace;
        while Instant::now() < deadline
            && !voices
                .iter()
                .all(|v| v.player.is_finished() && v.generator.is_finished())
        {
            thread::sleep(JOIN_POLL);
        }

        let voices: Vec<VoiceReport> = voices
            .into_iter()
            .map(|v| {
                let player = collect(v.player, v.index, "player");
                let generator = collect(v.generator, v.index, "generator");
                VoiceReport {
                    index: v.index,
                    channel: v.channel,
                    player,
                    generator,
                }
            })
            .collect();
        SessionReport { voices }
    }
}

impl<S> Drop for Session<S> {
    fn drop(&mut self) {
        self.cancel.fire();
    }
}

// A player whose generator never started sees its channel close at once
// (the sender went down with the failed spawn) and stops as exhausted.
fn reap_orphan(index: usize, player: JoinHandle<PlayerReport>) -> TaskOutcome<PlayerReport> {
    match player.join() {
        Ok(report) => TaskOutcome::Finished(report),
        Err(_) => {
            log::error!(target: "session", "voice {} player panicked", index);
            TaskOutcome::Panicked
        }
    }
}

fn collect<T>(handle: JoinHandle<T>, index: usize, role: &str) -> TaskOutcome<T> {
    if !handle.is_finished() {
        log::warn!(target: "session", "voice {} {} still running after grace period", index, role);
        return TaskOutcome::Abandoned;
    }
    match handle.join() {
        Ok(report) => TaskOutcome::Finished(report),
        Err(_) => {
            log::error!(target: "session", "voice {} {} panicked", index, role);
            TaskOutcome::Panicked
        }
    }
}
