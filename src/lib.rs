//! # jvm-native-bridge
//!
//! The native-interop layer of a managed runtime: loading JNI libraries,
//! binding `native` methods to their code, and serving JVMPI profiler agents.
//!
//! - **Library registry**: reference-counted table of `dlopen`ed libraries,
//!   with `JNI_OnLoad` run once per library
//! - **Method resolution**: stub name, short JNI name, long JNI name, in that
//!   order; unresolved methods raise `UnsatisfiedLinkError` when called
//! - **Raw monitors**: named, non-reentrant locks with timed wait
//! - **Thread introspection**: status, call traces, suspend/resume and
//!   agent-owned system threads
//! - **Events**: the JVMPI event set, an enable bitmap, explicit requests,
//!   and the C function table handed to the agent
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use jvm_native_bridge::prelude::*;
//!
//! let linker = NativeLinker::new(NativeConfig::default(), LibloadingLoader, Arc::new(MyTrampolines));
//! linker.init_default_library()?;
//!
//! let method = NativeMethod::new(MethodDesc::new("java/io/FileDescriptor", "sync", "()V"));
//! match linker.link(&method).entry_point() {
//!     Ok(code) => call_native(code),
//!     Err(link_error) => throw(LinkageError::EXCEPTION_CLASS, &link_error.to_string()),
//! }
//! ```
//!
//! Serving a profiler agent:
//!
//! ```rust,ignore
//! use jvm_native_bridge::prelude::*;
//!
//! let profiler = Profiler::new(ProfilerConfig::default(), gc, scheduler, objects);
//! let profiler = install_profiler(profiler)?;
//!
//! // In the VM's GetEnv(JVMPI_VERSION_1) path:
//! let table = jvmpi_interface(jvmpi::JVMPI_VERSION_1)?;
//!
//! // At the runtime's hook points:
//! profiler.events().class_loaded(&class_info);
//! profiler.events().thread_started(thread_object);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │            Profiler agent (C, via JVMPI_Interface)       │
//! ├─────────────────────────────────────────────────────────┤
//! │   interface - function table, trampolines, C events      │
//! │   profiler  - one Profiler per process                   │
//! │   dispatcher, event - bitmap, requests, GC pause         │
//! │   thread, monitor - introspection, raw monitors          │
//! ├─────────────────────────────────────────────────────────┤
//! │   linker - NativeLinker: one lock over registry+resolver │
//! │   resolver, mangle - symbol names, bindings              │
//! │   library - LibraryRegistry, DynamicLoader               │
//! ├─────────────────────────────────────────────────────────┤
//! │   runtime - GC, scheduler and metadata traits            │
//! │   sys::jni, sys::jvmpi - raw ABI                         │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`sys::jni`] | Raw JNI types and constants |
//! | [`sys::jvmpi`] | Raw JVMPI records, constants and function table |
//! | [`library`] | Library slots, reference counts, `JNI_OnLoad` |
//! | [`mangle`] | JNI name mangling and candidate names |
//! | [`resolver`] | Binding native methods to code |
//! | [`linker`] | **Start here** for loading and linking |
//! | [`config`] | Library search path and naming |
//! | [`monitor`] | Raw monitors |
//! | [`thread`] | Thread status, traces, system threads |
//! | [`event`], [`dispatcher`] | Profiler events and delivery |
//! | [`profiler`], [`interface`] | **Start here** for serving an agent |
//! | [`runtime`] | Traits the hosting VM implements |
//!
//! ## Features
//!
//! | Feature | Default | Effect |
//! |---------|---------|--------|
//! | `dlopen` | yes | [`library::LibloadingLoader`] backed by `libloading` |

pub mod sys;

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod interface;
pub mod library;
pub mod linker;
pub mod mangle;
pub mod monitor;
pub mod profiler;
pub mod resolver;
pub mod runtime;
pub mod signals;
pub mod thread;

pub mod prelude;

pub use crate::sys::jni;
pub use crate::sys::jvmpi;

pub use config::NativeConfig;
pub use error::{ConfigError, EventError, InterfaceError, LinkageError, LoadError, MonitorError, ThreadError, UnloadError};
pub use linker::NativeLinker;
pub use profiler::{Profiler, ProfilerConfig};
