//! Per-voice timed playback.
//!
//! A player takes notes from its generator one at a time, sounds them on the
//! shared output, holds them for their duration, and releases them. The hold
//! races the session's cancel signal, and a sounding note is always released
//! on the way out whichever side wins, so shutdown never leaves a stuck note.

use std::io;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;

use crate::cancel::CancelToken;
use crate::output::{NoteSink, SharedOutput};
use ringdrift_types::Note;

pub const DEFAULT_VELOCITY: u8 = 100;

/// Why a player stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    /// The generator side of the channel closed.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlayerState {
    AwaitingNote,
    Sounding(Note, u8),
    Silent(Note),
    Waiting(Note, Option<u8>),
    Stopped(StopReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerReport {
    pub reason: StopReason,
    /// Note-ons the sink accepted.
    pub notes_played: u64,
    pub rests: u64,
    pub write_errors: u64,
}

impl PlayerReport {
    fn new() -> Self {
        Self {
            reason: StopReason::Exhausted,
            notes_played: 0,
            rests: 0,
            write_errors: 0,
        }
    }
}

pub struct Player<S> {
    channel: u8,
    velocity: u8,
    output: SharedOutput<S>,
}

impl<S: NoteSink> Player<S> {
    pub fn new(channel: u8, velocity: u8, output: SharedOutput<S>) -> Self {
        Self {
            channel,
            velocity,
            output,
        }
    }

    /// Play notes from `notes` until cancelled or the channel closes.
    pub fn run(&self, notes: &Receiver<Note>, cancel: &CancelToken) -> PlayerReport {
        let mut report = PlayerReport::new();
        let mut state = PlayerState::AwaitingNote;
        loop {
            state = match state {
                PlayerState::AwaitingNote => match next_note(notes, cancel) {
                    Err(reason) => PlayerState::Stopped(reason),
                    Ok(note) => match note.midi_key() {
                        Some(key) => PlayerState::Sounding(note, key),
                        None => {
                            if note.is_sounding() {
                                log::warn!(
                                    target: "player",
                                    "ch{}: pitch {} has no MIDI key, holding silence",
                                    self.channel,
                                    note.pitch
                                );
                            }
                            PlayerState::Silent(note)
                        }
                    },
                },
                // select! may hand over a ready note even after the signal
                // fired, so check once more before anything is sounded.
                PlayerState::Sounding(_, _) if cancel.is_cancelled() => {
                    PlayerState::Stopped(StopReason::Cancelled)
                }
                PlayerState::Sounding(note, key) => {
                    match self.output.note_on(self.channel, key, self.velocity) {
                        Ok(()) => report.notes_played += 1,
                        Err(e) => {
                            report.write_errors += 1;
                            log::warn!(target: "player", "ch{}: note-on {} failed: {}", self.channel, key, e);
                        }
                    }
                    PlayerState::Waiting(note, Some(key))
                }
                PlayerState::Silent(note) => {
                    report.rests += 1;
                    PlayerState::Waiting(note, None)
                }
                PlayerState::Waiting(note, key) => {
                    let cancelled = cancel.wait_timeout(note.duration);
                    if let Some(key) = key {
                        if let Err(e) = self.output.note_off(self.channel, key, self.velocity) {
                            report.write_errors += 1;
                            log::warn!(target: "player", "ch{}: note-off {} failed: {}", self.channel, key, e);
                        }
                    }
                    if cancelled {
                        PlayerState::Stopped(StopReason::Cancelled)
                    } else {
                        PlayerState::AwaitingNote
                    }
                }
                PlayerState::Stopped(reason) => {
                    report.reason = reason;
                    return report;
                }
            };
            log::trace!(target: "player", "ch{} -> {:?}", self.channel, state);
        }
    }
}

// Either side may win when both are ready.
fn next_note(notes: &Receiver<Note>, cancel: &CancelToken) -> Result<Note, StopReason> {
    crossbeam_channel::select! {
        recv(cancel.receiver()) -> _ => Err(StopReason::Cancelled),
        recv(notes) -> msg => msg.map_err(|_| StopReason::Exhausted),
    }
}

/// Run `player` on a named thread.
pub fn spawn_player<S>(
    name: String,
    player: Player<S>,
    notes: Receiver<Note>,
    cancel: CancelToken,
) -> io::Result<JoinHandle<PlayerReport>>
where
    S: NoteSink + 'static,
{
    thread::Builder::new().name(name).spawn(move || {
        let report = player.run(&notes, &cancel);
        log::debug!(
            target: "player",
            "ch{} stopped ({:?}): {} notes, {} rests, {} write errors",
            player.channel,
            report.reason,
            report.notes_played,
            report.rests,
            report.write_errors
        );
        report
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelSignal;
    use crate::output::OutputError;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Ev {
        On(u8, u8, u8),
        Off(u8, u8),
    }

    #[derive(Clone, Default)]
    struct Log(Arc<Mutex<Vec<Ev>>>);

    impl NoteSink for Log {
        fn note_on(&mut self, channel: u8, key: u8, velocity: u8) -> Result<(), OutputError> {
            self.0.lock().unwrap().push(Ev::On(channel, key, velocity));
            Ok(())
        }

        fn note_off(&mut self, channel: u8, key: u8, _velocity: u8) -> Result<(), OutputError> {
            self.0.lock().unwrap().push(Ev::Off(channel, key));
            Ok(())
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn plays_queued_notes_then_stops_when_exhausted() {
        let log = Log::default();
        let player = Player::new(4, 90, SharedOutput::new(log.clone()));
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(Note::new(60, ms(5))).unwrap();
        tx.send(Note::rest(ms(5))).unwrap();
        tx.send(Note::new(67, ms(5))).unwrap();
        drop(tx);
        let signal = CancelSignal::new();

        let report = player.run(&rx, &signal.token());

        assert_eq!(report.reason, StopReason::Exhausted);
        assert_eq!(report.notes_played, 2);
        assert_eq!(report.rests, 1);
        assert_eq!(report.write_errors, 0);
        assert_eq!(
            *log.0.lock().unwrap(),
            vec![
                Ev::On(4, 60, 90),
                Ev::Off(4, 60),
                Ev::On(4, 67, 90),
                Ev::Off(4, 67)
            ]
        );
    }

    #[test]
    fn holds_for_the_note_duration() {
        let log = Log::default();
        let player = Player::new(0, DEFAULT_VELOCITY, SharedOutput::new(log));
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(Note::new(60, ms(40))).unwrap();
        tx.send(Note::rest(ms(40))).unwrap();
        drop(tx);
        let signal = CancelSignal::new();
        let start = Instant::now();
        player.run(&rx, &signal.token());
        assert!(start.elapsed() >= ms(80));
    }

    #[test]
    fn cancel_releases_the_held_note() {
        let log = Log::default();
        let player = Player::new(1, DEFAULT_VELOCITY, SharedOutput::new(log.clone()));
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(Note::new(62, Duration::from_secs(30))).unwrap();
        tx.send(Note::new(64, ms(5))).unwrap();
        let mut signal = CancelSignal::new();
        let token = signal.token();

        let handle = std::thread::spawn(move || player.run(&rx, &token));
        std::thread::sleep(ms(30));
        signal.fire();
        let report = handle.join().unwrap();

        assert_eq!(report.reason, StopReason::Cancelled);
        assert_eq!(
            *log.0.lock().unwrap(),
            vec![Ev::On(1, 62, 100), Ev::Off(1, 62)]
        );
        drop(tx);
    }

    #[test]
    fn already_cancelled_player_emits_nothing() {
        let log = Log::default();
        let player = Player::new(1, DEFAULT_VELOCITY, SharedOutput::new(log.clone()));
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(Note::new(62, Duration::from_secs(30))).unwrap();
        let mut signal = CancelSignal::new();
        signal.fire();

        let report = player.run(&rx, &signal.token());

        assert_eq!(report.reason, StopReason::Cancelled);
        assert_eq!(report.notes_played, 0);
        assert!(log.0.lock().unwrap().is_empty());
    }

    struct FailingSink;

    impl NoteSink for FailingSink {
        fn note_on(&mut self, _: u8, _: u8, _: u8) -> Result<(), OutputError> {
            Err(OutputError::Send("device unplugged".into()))
        }

        fn note_off(&mut self, _: u8, _: u8, _: u8) -> Result<(), OutputError> {
            Err(OutputError::Send("device unplugged".into()))
        }
    }

    #[test]
    fn write_errors_are_counted_not_fatal() {
        let player = Player::new(0, DEFAULT_VELOCITY, SharedOutput::new(FailingSink));
        let (tx, rx) = crossbeam_channel::unbounded();
        for _ in 0..3 {
            tx.send(Note::new(60, ms(1))).unwrap();
        }
        drop(tx);
        let signal = CancelSignal::new();

        let report = player.run(&rx, &signal.token());

        assert_eq!(report.reason, StopReason::Exhausted);
        assert_eq!(report.notes_played, 0);
        // one failed note-on and one failed note-off per note
        assert_eq!(report.write_errors, 6);
    }

    /// Rejects every other note-on.
    struct FlakySink(u32);

    impl NoteSink for FlakySink {
        fn note_on(&mut self, _: u8, _: u8, _: u8) -> Result<(), OutputError> {
            self.0 += 1;
            if self.0 % 2 == 0 {
                Err(OutputError::Send("buffer full".into()))
            } else {
                Ok(())
            }
        }

        fn note_off(&mut self, _: u8, _: u8, _: u8) -> Result<(), OutputError> {
            Ok(())
        }
    }

    #[test]
    fn only_accepted_note_ons_count_as_played() {
        let player = Player::new(0, DEFAULT_VELOCITY, SharedOutput::new(FlakySink(0)));
        let (tx, rx) = crossbeam_channel::unbounded();
        for _ in 0..4 {
            tx.send(Note::new(60, ms(1))).unwrap();
        }
        drop(tx);
        let signal = CancelSignal::new();

        let report = player.run(&rx, &signal.token());

        assert_eq!(report.notes_played, 2);
        assert_eq!(report.write_errors, 2);
    }

    #[test]
    fn unplayable_pitch_is_held_as_silence() {
        let log = Log::default();
        let player = Player::new(0, DEFAULT_VELOCITY, SharedOutput::new(log.clone()));
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(Note::new(200, ms(1))).unwrap();
        drop(tx);
        let signal = CancelSignal::new();

        let report = player.run(&rx, &signal.token());

        assert_eq!(report.rests, 1);
        assert!(log.0.lock().unwrap().is_empty());
    }
}
