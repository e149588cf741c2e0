//! Thread introspection for profiler agents.
//!
//! Agents name threads by their `JNIEnv*`. Every query first pins the
//! thread through the scheduler, so its control block and saved stack stay
//! put while they are read, and unpins it when the [`PinnedThread`] guard
//! goes out of scope.

use std::ffi::c_void;
use std::sync::Arc;

use tracing::debug;

use crate::error::ThreadError;
use crate::runtime::{DaemonSpec, EnvId, LineNumberEntry, MethodId, ObjectId, Scheduler, SchedulerState, StackOrigin, StackSlot, ThreadHandle};
use crate::sys::jni::jint;
use crate::sys::jvmpi;

/// Stack size of agent-created system threads.
pub const SYSTEM_THREAD_STACK_SIZE: usize = 32 * 1024;

/// Managed priorities (`java.lang.Thread.{MIN,NORM,MAX}_PRIORITY`).
pub const MIN_PRIORITY: jint = 1;
pub const NORM_PRIORITY: jint = 5;
pub const MAX_PRIORITY: jint = 10;

/// Maps a profiler priority constant onto the managed scale.
pub fn managed_priority(priority: jint) -> Option<jint> {
    match priority {
        jvmpi::JVMPI_MINIMUM_PRIORITY => Some(MIN_PRIORITY),
        jvmpi::JVMPI_NORMAL_PRIORITY => Some(NORM_PRIORITY),
        jvmpi::JVMPI_MAXIMUM_PRIORITY => Some(MAX_PRIORITY),
        _ => None,
    }
}

/// A thread held in place by the scheduler.
pub struct PinnedThread<'a> {
    scheduler: &'a dyn Scheduler,
    handle: ThreadHandle,
}

impl PinnedThread<'_> {
    pub fn handle(&self) -> ThreadHandle {
        self.handle
    }
}

impl Drop for PinnedThread<'_> {
    fn drop(&mut self) {
        self.scheduler.release(self.handle);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Runnable,
    MonitorWait,
    CondvarWait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadStatus {
    pub state: ThreadState,
    pub interrupted: bool,
}

impl ThreadStatus {
    /// The `JVMPI_THREAD_*` bit set.
    pub fn to_raw(self) -> jint {
        let base = match self.state {
            ThreadState::Runnable => jvmpi::JVMPI_THREAD_RUNNABLE,
            ThreadState::MonitorWait => jvmpi::JVMPI_THREAD_MONITOR_WAIT,
            ThreadState::CondvarWait => jvmpi::JVMPI_THREAD_CONDVAR_WAIT,
        };
        if self.interrupted {
            base | jvmpi::JVMPI_THREAD_INTERRUPTED
        } else {
            base
        }
    }
}

/// One frame of a call trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallFrame {
    pub method: MethodId,
    /// Source line, or -1 when unknown.
    pub line: i32,
}

/// Source line for `pc`: the line of the entry with the greatest
/// `start_pc <= pc`, or -1.
pub fn line_for_pc(lines: &[LineNumberEntry], pc: usize) -> i32 {
    lines
        .iter()
        .filter(|entry| entry.start_pc <= pc)
        .fold(None::<&LineNumberEntry>, |best, entry| match best {
            Some(b) if b.start_pc > entry.start_pc => Some(b),
            _ => Some(entry),
        })
        .map_or(-1, |entry| entry.line)
}

#[derive(Clone)]
pub struct ThreadBridge {
    scheduler: Arc<dyn Scheduler>,
    system_stack_size: usize,
}

impl ThreadBridge {
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        ThreadBridge {
            scheduler,
            system_stack_size: SYSTEM_THREAD_STACK_SIZE,
        }
    }

    pub fn with_system_stack_size(mut self, size: usize) -> Self {
        self.system_stack_size = size;
        self
    }

    pub fn scheduler(&self) -> &dyn Scheduler {
        &*self.scheduler
    }

    pub fn resolve(&self, env: EnvId) -> Option<PinnedThread<'_>> {
        let handle = self.scheduler.pin(env)?;
        Some(PinnedThread {
            scheduler: &*self.scheduler,
            handle,
        })
    }

    fn pinned(&self, env: EnvId) -> Result<PinnedThread<'_>, ThreadError> {
        self.resolve(env).ok_or(ThreadError::InvalidEnv(env))
    }

    pub fn status(&self, env: EnvId) -> Result<ThreadStatus, ThreadError> {
        let thread = self.pinned(env)?;
        let handle = thread.handle();
        let s = &*self.scheduler;

        let state = if s.blocked_on_mutex(handle) {
            ThreadState::MonitorWait
        } else if s.blocked_on_condvar(handle) {
            ThreadState::CondvarWait
        } else {
            match s.state(handle) {
                SchedulerState::Running => ThreadState::Runnable,
                SchedulerState::Suspended => ThreadState::MonitorWait,
            }
        };

        Ok(ThreadStatus {
            state,
            interrupted: s.is_interrupted(handle),
        })
    }

    /// Up to `max_depth` frames of `env`'s stack, innermost first.
    ///
    /// The calling thread is walked from the current point; any other thread
    /// from the frame saved when it was last switched out. Frames that do not
    /// belong to a managed method are skipped without using up depth. An
    /// unknown environment yields an empty trace.
    pub fn call_trace(&self, env: EnvId, max_depth: usize) -> Vec<CallFrame> {
        let Some(thread) = self.resolve(env) else {
            debug!(?env, "call trace requested for unknown environment");
            return Vec::new();
        };
        let handle = thread.handle();
        let origin = if self.scheduler.is_current(handle) {
            StackOrigin::Current
        } else {
            StackOrigin::TopFrame
        };

        let mut frames = Vec::with_capacity(max_depth.min(64));
        for slot in self.scheduler.walk_stack(handle, origin) {
            if frames.len() >= max_depth {
                break;
            }
            let (method, pc) = match slot {
                StackSlot::End => break,
                StackSlot::Frame { method: None, .. } => continue,
                StackSlot::Frame { method: Some(method), pc } => (method, pc),
            };
            let line = method.lines.as_deref().map_or(-1, |lines| line_for_pc(lines, pc));
            frames.push(CallFrame { method: method.id, line });
        }
        frames
    }

    pub fn thread_local(&self, env: EnvId) -> Option<*mut c_void> {
        let thread = self.resolve(env)?;
        Some(self.scheduler.profiler_data(thread.handle()))
    }

    pub fn set_thread_local(&self, env: EnvId, value: *mut c_void) -> Result<(), ThreadError> {
        let thread = self.pinned(env)?;
        self.scheduler.set_profiler_data(thread.handle(), value);
        Ok(())
    }

    pub fn suspend(&self, env: EnvId) -> Result<(), ThreadError> {
        let thread = self.pinned(env)?;
        self.scheduler.suspend(thread.handle());
        Ok(())
    }

    pub fn resume(&self, env: EnvId) -> Result<(), ThreadError> {
        let thread = self.pinned(env)?;
        self.scheduler.resume(thread.handle());
        Ok(())
    }

    /// Suspends each thread in turn; one failure does not stop the rest.
    pub fn suspend_list(&self, envs: &[EnvId]) -> Vec<Result<(), ThreadError>> {
        envs.iter().map(|env| self.suspend(*env)).collect()
    }

    pub fn resume_list(&self, envs: &[EnvId]) -> Vec<Result<(), ThreadError>> {
        envs.iter().map(|env| self.resume(*env)).collect()
    }

    pub fn has_run(&self, env: EnvId) -> Result<bool, ThreadError> {
        let thread = self.pinned(env)?;
        Ok(self.scheduler.has_run(thread.handle()))
    }

    pub fn thread_object(&self, env: EnvId) -> Option<ObjectId> {
        let thread = self.resolve(env)?;
        Some(self.scheduler.thread_object(thread.handle()))
    }

    pub fn current_cpu_time(&self) -> i64 {
        self.scheduler.current_cpu_time()
    }

    /// Starts a daemon for the agent.
    ///
    /// `priority` is one of the `JVMPI_*_PRIORITY` constants; anything else is
    /// refused before a thread is created.
    pub fn create_system_thread(
        &self,
        name: &str,
        priority: jint,
        entry: impl FnOnce() + Send + 'static,
    ) -> Result<(), ThreadError> {
        let mapped = managed_priority(priority).ok_or(ThreadError::InvalidPriority(priority))?;
        let spec = DaemonSpec {
            name: name.to_string(),
            priority: mapped,
            stack_size: self.system_stack_size,
        };
        debug!(name, priority = mapped, stack_size = spec.stack_size, "starting system thread");
        self.scheduler
            .spawn_daemon(spec, Box::new(entry))
            .map_err(|reason| ThreadError::Spawn {
                name: name.to_string(),
                reason,
            })
    }
}
