#![allow(dead_code)]
//! Test harness utilities for ringdrift-core integration tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ringdrift_core::{NoteSink, OutputError};
use ringdrift_types::{GeneratorConfig, VoiceConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    On,
    Off,
}

#[derive(Debug, Clone, Copy)]
pub struct Event {
    pub kind: Kind,
    pub channel: u8,
    pub key: u8,
    pub velocity: u8,
    pub at: Instant,
}

/// A sink that records every call and notices if two calls ever overlap.
///
/// Clones share the same log, so a test keeps one clone and hands the
/// other to the session.
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<Event>>>,
    in_call: Arc<AtomicBool>,
    overlaps: Arc<AtomicUsize>,
    /// Time spent inside each call, to widen any interleaving window.
    dwell: Duration,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dwell(dwell: Duration) -> Self {
        Self {
            dwell,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn events_on(&self, channel: u8) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.channel == channel)
            .collect()
    }

    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    fn record(&self, kind: Kind, channel: u8, key: u8, velocity: u8) {
        if self.in_call.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        if !self.dwell.is_zero() {
            std::thread::sleep(self.dwell);
        }
        self.events.lock().unwrap().push(Event {
            kind,
            channel,
            key,
            velocity,
            at: Instant::now(),
        });
        self.in_call.store(false, Ordering::SeqCst);
    }
}

impl NoteSink for RecordingSink {
    fn note_on(&mut self, channel: u8, key: u8, velocity: u8) -> Result<(), OutputError> {
        self.record(Kind::On, channel, key, velocity);
        Ok(())
    }

    fn note_off(&mut self, channel: u8, key: u8, velocity: u8) -> Result<(), OutputError> {
        self.record(Kind::Off, channel, key, velocity);
        Ok(())
    }
}

/// Check one channel's events alternate on/off with matching keys. The
/// last note may be left open only if `allow_open` is set.
pub fn assert_balanced(events: &[Event], allow_open: bool) {
    let mut open: Option<u8> = None;
    for (i, e) in events.iter().enumerate() {
        match (e.kind, open) {
            (Kind::On, None) => open = Some(e.key),
            (Kind::Off, Some(key)) => {
                assert_eq!(e.key, key, "event {}: note-off for the wrong key", i);
                open = None;
            }
            (Kind::On, Some(key)) => panic!("event {}: note-on while {} still sounding", i, key),
            (Kind::Off, None) => panic!("event {}: note-off with nothing sounding", i),
        }
    }
    if !allow_open {
        assert!(open.is_none(), "note {:?} left sounding", open);
    }
}

/// A voice with millisecond timings so tests see many notes quickly.
pub fn fast_voice(channel: u8) -> VoiceConfig {
    VoiceConfig::new(
        channel,
        GeneratorConfig {
            min_duration: Duration::from_millis(1),
            max_duration: Duration::from_millis(6),
            step_duration: Duration::from_millis(1),
            ..Default::default()
        },
    )
}

/// A voice whose notes last far longer than any test. Its first note
/// sounds (the toggle is practically never taken), so it is on the wire
/// almost as soon as the session starts.
pub fn slow_voice(channel: u8) -> VoiceConfig {
    VoiceConfig::new(
        channel,
        GeneratorConfig {
            min_duration: Duration::from_secs(30),
            max_duration: Duration::from_secs(60),
            step_duration: Duration::from_secs(30),
            switch_p: u32::MAX,
            ..Default::default()
        },
    )
}

/// Poll `cond` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}
