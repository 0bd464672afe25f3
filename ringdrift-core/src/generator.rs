//! Ring-based stochastic note generator.
//!
//! Each voice owns a fixed ring of note slots. Every step mutates the slot
//! under the cursor in place and hands the result downstream, so a voice
//! drifts slowly rather than drawing independent notes: a slot remembers
//! what it played last lap.
//!
//! `Generator` itself is a plain step function (and an infinite iterator).
//! `spawn_driver` runs it on its own thread, feeding a rendezvous channel and
//! stopping as soon as the session is cancelled or the player goes away.

use std::io;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::cancel::CancelToken;
use ringdrift_types::{ConfigError, GeneratorConfig, Note};

/// Largest pitch jitter applied in one mutation, in semitones.
const MAX_JITTER: i32 = 6;

pub struct Generator<R = StdRng> {
    config: GeneratorConfig,
    ring: Vec<Note>,
    cursor: usize,
    rng: R,
}

impl Generator<StdRng> {
    /// Generator with a reproducible stream for `seed`.
    pub fn seeded(config: GeneratorConfig, seed: u64) -> Result<Self, ConfigError> {
        Self::new(config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Generator<R> {
    /// Validate `config` and fill the ring: quantized random pitches on even
    /// slots, rests on odd ones, all at `min_duration`.
    pub fn new(config: GeneratorConfig, mut rng: R) -> Result<Self, ConfigError> {
        config.validate()?;
        let ring = (0..config.ring_len)
            .map(|i| {
                if i % 2 == 0 {
                    let pitch = draw_pitch(&config, &mut rng);
                    config.scale.quantize(Note::new(pitch, config.min_duration))
                } else {
                    Note::rest(config.min_duration)
                }
            })
            .collect();
        Ok(Self {
            config,
            ring,
            cursor: 0,
            rng,
        })
    }

    pub fn ring(&self) -> &[Note] {
        &self.ring
    }

    /// Index of the slot the next `step` will mutate.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Mutate the slot under the cursor, advance, and return the new note.
    pub fn step(&mut self) -> Note {
        let slot = self.cursor;
        let note = mutate(&self.config, self.ring[slot], &mut self.rng);
        self.ring[slot] = note;
        self.cursor = (slot + 1) % self.ring.len();
        log::trace!(target: "generator", "slot {} -> {:?}", slot, note);
        note
    }
}

impl<R: Rng> Iterator for Generator<R> {
    type Item = Note;

    /// Never returns `None`: the ring is revisited forever.
    fn next(&mut self) -> Option<Note> {
        Some(self.step())
    }
}

/// One mutation of a slot.
///
/// In order: maybe jitter a sounding pitch, maybe toggle sounding/rest (a
/// note that starts sounding gets a fresh pitch), clamp and quantize if
/// sounding, maybe nudge the duration by one step and clamp it. A jitter
/// never silences a note; only the toggle does.
pub fn mutate<R: Rng + ?Sized>(config: &GeneratorConfig, note: Note, rng: &mut R) -> Note {
    let mut pitch = note.pitch;
    let mut sounding = note.is_sounding();

    if sounding && chance(rng, config.note_p) {
        pitch += rng.random_range(-MAX_JITTER..=MAX_JITTER);
    }

    if chance(rng, config.switch_p) {
        sounding = !sounding;
        pitch = if sounding {
            draw_pitch(config, rng)
        } else {
            Note::REST_PITCH
        };
    }

    if sounding {
        pitch = config
            .scale
            .quantize_pitch(pitch.clamp(config.min_pitch, config.max_pitch));
    }

    let mut duration = note.duration;
    if chance(rng, config.time_p) {
        duration = match rng.random_range(-1i32..=1) {
            -1 => duration.saturating_sub(config.step_duration),
            1 => duration.saturating_add(config.step_duration),
            _ => duration,
        };
        duration = duration.clamp(config.min_duration, config.max_duration);
    }

    Note::new(pitch, duration)
}

/// True with probability `1/denominator`.
fn chance<R: Rng + ?Sized>(rng: &mut R, denominator: u32) -> bool {
    rng.random_ratio(1, denominator.max(1))
}

/// Uniform pitch in `min_pitch..max_pitch`, or `min_pitch` for a
/// single-pitch range.
fn draw_pitch<R: Rng + ?Sized>(config: &GeneratorConfig, rng: &mut R) -> i32 {
    if config.max_pitch > config.min_pitch {
        rng.random_range(config.min_pitch..config.max_pitch)
    } else {
        config.min_pitch
    }
}

/// Why a generator driver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverExit {
    Cancelled,
    /// The player dropped its receiver.
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverReport {
    pub exit: DriverExit,
    /// Notes actually received by the player.
    pub delivered: u64,
}

/// Run `generator` on a named thread, handing each note to `notes`.
///
/// `notes` should be a rendezvous channel (`bounded(0)`) so generation is
/// paced by playback. Each hand-off races the cancel signal; the thread
/// returns once either wins for cancellation or the receiver disconnects.
pub fn spawn_driver<R>(
    name: String,
    mut generator: Generator<R>,
    notes: Sender<Note>,
    cancel: CancelToken,
) -> io::Result<JoinHandle<DriverReport>>
where
    R: Rng + Send + 'static,
{
    thread::Builder::new().name(name).spawn(move || {
        let mut delivered = 0u64;
        let exit = loop {
            let note = generator.step();
            crossbeam_channel::select! {
                send(notes, note) -> res => {
                    // At shutdown the player drops its receiver as soon as it
                    // sees the signal, so both arms can be ready together.
                    if res.is_err() {
                        break if cancel.is_cancelled() {
                            DriverExit::Cancelled
                        } else {
                            DriverExit::Disconnected
                        };
                    }
                    delivered += 1;
                }
                recv(cancel.receiver()) -> _ => break DriverExit::Cancelled,
            }
        };
        log::debug!(
            target: "generator",
            "{} stopped ({:?}) after {} notes",
            thread::current().name().unwrap_or("generator"),
            exit,
            delivered
        );
        DriverReport { exit, delivered }
    })
}
