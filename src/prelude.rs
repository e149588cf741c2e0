//! Common imports for hosting the native bridge.
//!
//! Covers the types a VM touches when wiring the bridge in; the runtime
//! traits are included because every host has to implement them.

pub use crate::config::NativeConfig;
pub use crate::dispatcher::{EventDispatcher, EventSink, RequestTarget};
pub use crate::error::{LinkageError, LoadError};
pub use crate::event::{Event, EventData, EventKind};
pub use crate::interface::{install_profiler, jvmpi_interface};
#[cfg(feature = "dlopen")]
pub use crate::library::LibloadingLoader;
pub use crate::library::{DynamicLoader, NativeEntry};
pub use crate::linker::NativeLinker;
pub use crate::monitor::RawMonitor;
pub use crate::profiler::{Profiler, ProfilerConfig};
pub use crate::resolver::{MethodDesc, NativeCode, NativeMethod, TrampolineGenerator};
pub use crate::runtime::{
    ClassId, ClassInfo, EnvId, GarbageCollector, MethodId, MethodInfo, ObjectId, RuntimeObjects, Scheduler,
};
pub use crate::sys::{jni, jvmpi};
