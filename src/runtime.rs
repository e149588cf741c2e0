//! The runtime surfaces the bridge consumes.
//!
//! The garbage collector, the thread scheduler and the class metadata store
//! live elsewhere in the VM. The bridge only talks to them through the
//! traits below, which keeps every component testable with in-memory fakes.

use std::ffi::c_void;
use std::sync::Arc;

use crate::sys::jni::jint;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub usize);

        impl $name {
            /// Reinterprets a raw pointer handed across the C boundary.
            pub fn from_ptr<T>(ptr: *mut T) -> Option<Self> {
                if ptr.is_null() {
                    None
                } else {
                    Some($name(ptr as usize))
                }
            }

            /// The pointer form used in C records.
            pub fn as_ptr<T>(self) -> *mut T {
                self.0 as *mut T
            }
        }
    };
}

opaque_id!(
    /// Identity of a thread's native environment (`JNIEnv*`).
    EnvId
);
opaque_id!(
    /// Identity of a managed object.
    ObjectId
);
opaque_id!(
    /// Identity of a loaded class.
    ClassId
);
opaque_id!(
    /// Identity of a method.
    MethodId
);
opaque_id!(
    /// The scheduler's control block for a thread.
    ThreadHandle
);

// =============================================================================
// Class metadata
// =============================================================================

/// One row of a method's line-number table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumberEntry {
    /// Code address where the line begins; same space as frame pcs.
    pub start_pc: usize,
    pub line: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    pub id: MethodId,
    pub class: ClassId,
    pub name: String,
    pub signature: String,
    /// Address of the first instruction.
    pub code_start: usize,
    pub lines: Option<Vec<LineNumberEntry>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: String,
    pub signature: String,
}

/// Element type of an array class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Reference,
    Boolean,
    Char,
    Float,
    Double,
    Byte,
    Short,
    Int,
    Long,
}

impl ElementType {
    /// Maps a primitive descriptor character (`I`, `Z`, ...).
    pub fn from_descriptor(c: char) -> Option<Self> {
        Some(match c {
            'Z' => ElementType::Boolean,
            'C' => ElementType::Char,
            'F' => ElementType::Float,
            'D' => ElementType::Double,
            'B' => ElementType::Byte,
            'S' => ElementType::Short,
            'I' => ElementType::Int,
            'J' => ElementType::Long,
            'L' | '[' => ElementType::Reference,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
    pub id: ClassId,
    /// Internal form, e.g. `java/lang/String`.
    pub name: String,
    pub source_file: Option<String>,
    pub interface_count: usize,
    pub methods: Vec<Arc<MethodInfo>>,
    pub static_fields: Vec<FieldInfo>,
    pub instance_fields: Vec<FieldInfo>,
    /// `Some` for array classes.
    pub array_element: Option<ElementType>,
}

/// What the runtime knows about a `java.lang.Thread` object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadDescriptor {
    pub thread: ObjectId,
    pub name: Option<String>,
    pub group_name: Option<String>,
    pub parent_name: Option<String>,
    pub env: EnvId,
}

/// Lookup of runtime entities by identity.
pub trait RuntimeObjects: Send + Sync {
    fn class(&self, id: ClassId) -> Option<Arc<ClassInfo>>;

    /// Class of a live object.
    fn class_of(&self, object: ObjectId) -> Option<Arc<ClassInfo>>;

    fn method(&self, id: MethodId) -> Option<Arc<MethodInfo>>;

    /// Describes a `java.lang.Thread` object.
    fn thread(&self, thread: ObjectId) -> Option<ThreadDescriptor>;
}

// =============================================================================
// Garbage collector
// =============================================================================

/// The collector operations the bridge relies on.
///
/// `disable`/`enable` must nest: the collector stays disabled until every
/// `disable` has been matched.
pub trait GarbageCollector: Send + Sync {
    fn disable(&self);
    fn enable(&self);
    fn object_size(&self, object: ObjectId) -> usize;
    fn collect(&self);
}

/// Keeps the collector paused for as long as the token lives.
#[must_use = "the collector resumes as soon as the pause is dropped"]
pub struct GcPause<'a> {
    gc: &'a dyn GarbageCollector,
}

impl<'a> GcPause<'a> {
    pub fn new(gc: &'a dyn GarbageCollector) -> Self {
        gc.disable();
        GcPause { gc }
    }
}

impl Drop for GcPause<'_> {
    fn drop(&mut self) {
        self.gc.enable();
    }
}

// =============================================================================
// Scheduler
// =============================================================================

/// Raw scheduler state of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    Suspended,
}

/// Where a stack walk begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOrigin {
    /// The caller's own, currently executing frame.
    Current,
    /// The last frame saved when the thread was switched out.
    TopFrame,
}

/// One entry of a walked stack, innermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackSlot {
    Frame {
        /// `None` for frames that do not belong to a managed method.
        method: Option<Arc<MethodInfo>>,
        pc: usize,
    },
    End,
}

/// Parameters for a daemon thread started on behalf of the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonSpec {
    pub name: String,
    /// Priority on the managed `java.lang.Thread` scale.
    pub priority: jint,
    pub stack_size: usize,
}

pub type ThreadEntry = Box<dyn FnOnce() + Send + 'static>;

/// The thread scheduler operations the bridge relies on.
///
/// `pin` keeps the thread's control block (and its saved stack) stable until
/// the matching `release`. Callers go through [`crate::thread::PinnedThread`]
/// which pairs the two automatically.
pub trait Scheduler: Send + Sync {
    fn pin(&self, env: EnvId) -> Option<ThreadHandle>;
    fn release(&self, thread: ThreadHandle);

    /// Environment of the calling thread, if it is attached.
    fn current_env(&self) -> Option<EnvId>;
    fn is_current(&self, thread: ThreadHandle) -> bool;

    fn state(&self, thread: ThreadHandle) -> SchedulerState;
    fn blocked_on_mutex(&self, thread: ThreadHandle) -> bool;
    fn blocked_on_condvar(&self, thread: ThreadHandle) -> bool;
    fn is_interrupted(&self, thread: ThreadHandle) -> bool;
    fn has_run(&self, thread: ThreadHandle) -> bool;

    fn walk_stack(&self, thread: ThreadHandle, origin: StackOrigin) -> Vec<StackSlot>;

    fn suspend(&self, thread: ThreadHandle);
    fn resume(&self, thread: ThreadHandle);

    /// The per-thread slot reserved for the profiler agent.
    fn profiler_data(&self, thread: ThreadHandle) -> *mut c_void;
    fn set_profiler_data(&self, thread: ThreadHandle, value: *mut c_void);

    fn thread_object(&self, thread: ThreadHandle) -> ObjectId;

    /// CPU time consumed by the calling thread, in nanoseconds.
    fn current_cpu_time(&self) -> i64;

    /// Starts a daemon that is not listed among ordinary managed threads.
    fn spawn_daemon(&self, spec: DaemonSpec, entry: ThreadEntry) -> Result<(), String>;
}
