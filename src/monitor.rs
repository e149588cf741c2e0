//! Raw monitors for profiler agents.
//!
//! A raw monitor is a named, non-reentrant lock with a single wait set. It is
//! independent of managed object monitors and may be used from threads the
//! runtime does not know about.
//!
//! Waiters sleep on a notification epoch rather than on the condition
//! variable alone: a `notify_all` that lands between a waiter releasing the
//! lock and going to sleep still wakes it.

use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::MonitorError;

/// How a [`RawMonitor::wait`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Notified,
    TimedOut,
}

#[derive(Debug, Default)]
struct MonitorState {
    owner: Option<ThreadId>,
    notify_epoch: u64,
}

#[derive(Debug)]
pub struct RawMonitor {
    name: String,
    state: Mutex<MonitorState>,
    /// Signalled when ownership is given up.
    entry: Condvar,
    /// Signalled by `notify_all`.
    waiters: Condvar,
}

impl RawMonitor {
    pub fn new(name: impl Into<String>) -> Self {
        RawMonitor {
            name: name.into(),
            state: Mutex::new(MonitorState::default()),
            entry: Condvar::new(),
            waiters: Condvar::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the calling thread holds the monitor.
    pub fn is_held_by_current(&self) -> bool {
        self.state.lock().owner == Some(thread::current().id())
    }

    /// Blocks until the monitor is free, then takes it.
    pub fn enter(&self) -> Result<(), MonitorError> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.owner == Some(me) {
            return Err(MonitorError::Reentered(self.name.clone()));
        }
        while state.owner.is_some() {
            self.entry.wait(&mut state);
        }
        state.owner = Some(me);
        Ok(())
    }

    pub fn exit(&self) -> Result<(), MonitorError> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.owner != Some(me) {
            return Err(MonitorError::NotOwner(self.name.clone()));
        }
        state.owner = None;
        self.entry.notify_one();
        Ok(())
    }

    /// Releases the monitor, sleeps until notified or `millis` elapse, and
    /// takes the monitor back before returning.
    ///
    /// `millis <= 0` waits without a deadline.
    pub fn wait(&self, millis: i64) -> Result<WaitOutcome, MonitorError> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.owner != Some(me) {
            return Err(MonitorError::NotOwner(self.name.clone()));
        }

        let epoch = state.notify_epoch;
        state.owner = None;
        self.entry.notify_one();

        let deadline = u64::try_from(millis)
            .ok()
            .filter(|ms| *ms > 0)
            .map(|ms| Instant::now() + Duration::from_millis(ms));

        let outcome = loop {
            if state.notify_epoch != epoch {
                break WaitOutcome::Notified;
            }
            match deadline {
                Some(deadline) => {
                    if self.waiters.wait_until(&mut state, deadline).timed_out() {
                        break if state.notify_epoch != epoch {
                            WaitOutcome::Notified
                        } else {
                            WaitOutcome::TimedOut
                        };
                    }
                }
                None => self.waiters.wait(&mut state),
            }
        };

        while state.owner.is_some() {
            self.entry.wait(&mut state);
        }
        state.owner = Some(me);
        Ok(outcome)
    }

    /// Wakes every thread currently waiting on the monitor.
    pub fn notify_all(&self) {
        let mut state = self.state.lock();
        state.notify_epoch = state.notify_epoch.wrapping_add(1);
        self.waiters.notify_all();
    }
}
