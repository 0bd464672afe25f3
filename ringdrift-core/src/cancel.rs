//! One-shot broadcast shutdown signal.
//!
//! Built on a crossbeam channel that never carries a message: firing drops
//! the only sender, and every receiver then reports disconnection forever.
//! That makes the signal usable directly inside `crossbeam_channel::select!`.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

/// Owning side of the signal. Fires at most once; dropping it also fires.
pub struct CancelSignal {
    sender: Option<Sender<()>>,
    token: CancelToken,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(0);
        Self {
            sender: Some(tx),
            token: CancelToken { rx },
        }
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Broadcast cancellation. Later calls are no-ops.
    pub fn fire(&mut self) {
        if self.sender.take().is_some() {
            log::debug!(target: "session", "cancellation fired");
        }
    }

    pub fn is_fired(&self) -> bool {
        self.sender.is_none()
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Observing side of the signal; cheap to clone into every task.
#[derive(Clone)]
pub struct CancelToken {
    rx: Receiver<()>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Sleep for up to `timeout`, waking early on cancellation.
    ///
    /// Returns `true` if the signal fired before the timeout elapsed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) | Ok(()) => true,
        }
    }

    /// Receiver for use as a `recv(..)` arm in `select!`; it becomes ready
    /// (disconnected) once the signal fires.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn starts_unfired() {
        let signal = CancelSignal::new();
        assert!(!signal.is_fired());
        assert!(!signal.token().is_cancelled());
    }

    #[test]
    fn all_tokens_observe_fire() {
        let mut signal = CancelSignal::new();
        let a = signal.token();
        let b = a.clone();
        signal.fire();
        assert!(signal.is_fired());
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
        // never resets
        assert!(a.is_cancelled());
        assert!(signal.token().is_cancelled());
    }

    #[test]
    fn fire_twice_is_harmless() {
        let mut signal = CancelSignal::new();
        signal.fire();
        signal.fire();
        assert!(signal.token().is_cancelled());
    }

    #[test]
    fn dropping_signal_cancels() {
        let signal = CancelSignal::new();
        let token = signal.token();
        drop(signal);
        assert!(token.is_cancelled());
    }

    #[test]
    fn wait_timeout_elapses_when_unfired() {
        let signal = CancelSignal::new();
        let token = signal.token();
        let start = Instant::now();
        assert!(!token.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn wait_timeout_wakes_on_fire() {
        let mut signal = CancelSignal::new();
        let token = signal.token();
        let waiter = std::thread::spawn(move || {
            let start = Instant::now();
            let cancelled = token.wait_timeout(Duration::from_secs(10));
            (cancelled, start.elapsed())
        });
        std::thread::sleep(Duration::from_millis(20));
        signal.fire();
        let (cancelled, elapsed) = waiter.join().unwrap();
        assert!(cancelled);
        assert!(elapsed < Duration::from_secs(5));
    }
}
