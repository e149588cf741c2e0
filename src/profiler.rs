//! The runtime side of one profiler agent.
//!
//! [`Profiler`] bundles the event dispatcher, the thread bridge and the
//! collector controls behind a single value. The C function table in
//! [`crate::interface`] forwards every slot to a method here.

use std::sync::Arc;

use tracing::info;

use crate::dispatcher::EventDispatcher;
use crate::runtime::{ClassId, GarbageCollector, MethodId, ObjectId, RuntimeObjects, Scheduler};
use crate::sys::jni::jint;
use crate::thread::{ThreadBridge, SYSTEM_THREAD_STACK_SIZE};

/// Called by `ProfilerExit`. If the hook returns, the process exits anyway.
pub type ExitHook = Arc<dyn Fn(jint) + Send + Sync>;

#[derive(Clone)]
pub struct ProfilerConfig {
    pub exit_hook: ExitHook,
    pub system_thread_stack_size: usize,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        ProfilerConfig {
            exit_hook: Arc::new(|code: jint| std::process::exit(code)),
            system_thread_stack_size: SYSTEM_THREAD_STACK_SIZE,
        }
    }
}

impl ProfilerConfig {
    pub fn with_exit_hook(mut self, hook: impl Fn(jint) + Send + Sync + 'static) -> Self {
        self.exit_hook = Arc::new(hook);
        self
    }

    pub fn with_system_thread_stack_size(mut self, size: usize) -> Self {
        self.system_thread_stack_size = size;
        self
    }
}

pub struct Profiler {
    events: EventDispatcher,
    threads: ThreadBridge,
    gc: Arc<dyn GarbageCollector>,
    objects: Arc<dyn RuntimeObjects>,
    exit_hook: ExitHook,
}

impl Profiler {
    pub fn new(
        config: ProfilerConfig,
        gc: Arc<dyn GarbageCollector>,
        scheduler: Arc<dyn Scheduler>,
        objects: Arc<dyn RuntimeObjects>,
    ) -> Self {
        Profiler {
            events: EventDispatcher::new(gc.clone(), scheduler.clone(), objects.clone()),
            threads: ThreadBridge::new(scheduler).with_system_stack_size(config.system_thread_stack_size),
            gc,
            objects,
            exit_hook: config.exit_hook,
        }
    }

    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    pub fn threads(&self) -> &ThreadBridge {
        &self.threads
    }

    pub fn disable_gc(&self) {
        self.gc.disable();
    }

    pub fn enable_gc(&self) {
        self.gc.enable();
    }

    pub fn run_gc(&self) {
        self.gc.collect();
    }

    /// Declaring class of `method`.
    pub fn method_class(&self, method: MethodId) -> Option<ClassId> {
        self.objects.method(method).map(|m| m.class)
    }

    /// Object ids and local references share one representation here, so
    /// both conversions are the identity.
    pub fn object_id_to_reference(&self, object: ObjectId) -> ObjectId {
        object
    }

    pub fn reference_to_object_id(&self, reference: ObjectId) -> ObjectId {
        reference
    }

    /// Shuts the VM down on the agent's behalf.
    pub fn exit(&self, code: jint) -> ! {
        info!(code, "profiler requested VM exit");
        (self.exit_hook)(code);
        std::process::exit(code)
    }
}
