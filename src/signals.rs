//! Scoped blocking of asynchronous signals.
//!
//! The dynamic loader is not reentrant with respect to the runtime's timer and
//! I/O signal handlers, so every loader call runs inside an
//! [`AsyncSignalBlock`]. The previous mask is restored when the guard drops.

#[cfg(unix)]
use nix::sys::signal::{pthread_sigmask, SigSet, SigmaskHow, Signal};

#[cfg(unix)]
const ASYNC_SIGNALS: [Signal; 5] = [
    Signal::SIGALRM,
    Signal::SIGVTALRM,
    Signal::SIGIO,
    Signal::SIGCHLD,
    Signal::SIGPROF,
];

#[cfg(unix)]
fn async_set() -> SigSet {
    let mut set = SigSet::empty();
    for signal in ASYNC_SIGNALS {
        set.add(signal);
    }
    set
}

/// Blocks asynchronous signals on the current thread until dropped.
#[must_use = "signals are unblocked as soon as the guard is dropped"]
pub struct AsyncSignalBlock {
    #[cfg(unix)]
    previous: Option<SigSet>,
}

impl AsyncSignalBlock {
    #[cfg(unix)]
    pub fn new() -> Self {
        let mut previous = SigSet::empty();
        match pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&async_set()), Some(&mut previous)) {
            Ok(()) => AsyncSignalBlock {
                previous: Some(previous),
            },
            Err(errno) => {
                tracing::warn!(%errno, "failed to block asynchronous signals");
                AsyncSignalBlock { previous: None }
            }
        }
    }

    #[cfg(not(unix))]
    pub fn new() -> Self {
        AsyncSignalBlock {}
    }
}

impl Default for AsyncSignalBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AsyncSignalBlock {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(previous) = self.previous.take() {
            if let Err(errno) = pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&previous), None) {
                tracing::warn!(%errno, "failed to restore signal mask");
            }
        }
    }
}

/// Whether every asynchronous signal is currently blocked on this thread.
#[cfg(unix)]
pub fn async_signals_blocked() -> bool {
    let mut current = SigSet::empty();
    if pthread_sigmask(SigmaskHow::SIG_BLOCK, None, Some(&mut current)).is_err() {
        return false;
    }
    ASYNC_SIGNALS.iter().all(|signal| current.contains(*signal))
}

#[cfg(not(unix))]
pub fn async_signals_blocked() -> bool {
    false
}
