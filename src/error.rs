//! Error types for the native bridge.
//!
//! Resource failures (library loading, monitors, threads) are returned to the
//! immediate caller. Link failures are carried inside the method binding and
//! only surface when the method is invoked.

use std::path::Path;

use thiserror::Error;

use crate::event::EventKind;
use crate::runtime::EnvId;
use crate::sys::jni::jint;

/// Failure to bring a native library into the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// Every slot of the registry is occupied.
    #[error("Too many open libraries")]
    CapacityExceeded,

    /// The loader could not find or open the file.
    #[error("{file}: not found.\n{detail}")]
    NotFound { file: String, detail: String },

    /// Any other loader complaint, passed through verbatim.
    #[error("{0}")]
    Open(String),

    /// The loader failed without saying why.
    #[error("Unknown error")]
    Unknown,
}

impl LoadError {
    /// Classifies the loader's error text for `path`.
    pub fn classify(path: &str, detail: Option<&str>) -> Self {
        match detail {
            None => LoadError::Unknown,
            Some(detail) if detail.contains("ile not found") || detail.contains("annot open") => {
                let file = Path::new(path)
                    .file_name()
                    .and_then(|name| name.to_str())
                    .unwrap_or(path);
                LoadError::NotFound {
                    file: file.to_string(),
                    detail: detail.to_string(),
                }
            }
            Some(detail) => LoadError::Open(detail.to_string()),
        }
    }

    /// Writes the message into a caller-owned diagnostic buffer.
    pub fn write_diagnostic(&self, buf: &mut [u8]) -> usize {
        write_c_diagnostic(buf, &self.to_string())
    }
}

/// Failure to release a library slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UnloadError {
    #[error("slot 0 holds the runtime's own native library and is never unloaded")]
    Reserved,

    #[error("no library loaded at index {0}")]
    NotLoaded(usize),
}

/// No candidate symbol resolved for a native method.
///
/// Raised as `java/lang/UnsatisfiedLinkError` when the method is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to locate native function:\t{class}.{method}{signature}")]
pub struct LinkageError {
    pub class: String,
    pub method: String,
    pub signature: String,
}

impl LinkageError {
    /// Class name of the managed exception this error turns into.
    pub const EXCEPTION_CLASS: &'static str = "java/lang/UnsatisfiedLinkError";
}

/// Misuse of a raw monitor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    #[error("raw monitor `{0}` is already owned by the calling thread")]
    Reentered(String),

    #[error("raw monitor `{0}` is not owned by the calling thread")]
    NotOwner(String),
}

/// Failure of a thread introspection or control request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThreadError {
    #[error("no live thread for environment {0:?}")]
    InvalidEnv(EnvId),

    #[error("invalid system thread priority {0}")]
    InvalidPriority(jint),

    #[error("failed to start system thread `{name}`: {reason}")]
    Spawn { name: String, reason: String },
}

/// Failure of an event control request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// The kind can never be produced by this runtime.
    #[error("event {0:?} is not available")]
    NotAvailable(EventKind),

    /// The raw event number is outside the known set.
    #[error("unknown event type {0}")]
    UnknownKind(jint),

    /// The request named an object, class or thread the runtime does not know.
    #[error("request target for {0:?} does not exist")]
    InvalidTarget(EventKind),
}

/// Failure to vend the profiler interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InterfaceError {
    #[error("unsupported profiler interface version {0:#x}")]
    UnsupportedVersion(jint),

    #[error("profiler interface already vended as version {active:#x}, refusing {requested:#x}")]
    VersionConflict { active: jint, requested: jint },

    #[error("no profiler installed")]
    NotInstalled,

    #[error("a profiler is already installed")]
    AlreadyInstalled,
}

/// Failure to bootstrap the native layer from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Failed to locate native library \"{library}\" in path:\n\t{path}")]
    DefaultLibraryNotFound { library: String, path: String },

    /// Something other than the runtime's library was loaded into slot 0
    /// before bootstrap.
    #[error("native library slot 0 is reserved for \"{library}\" but holds {occupant}")]
    ReservedSlotTaken { library: String, occupant: String },

    /// The runtime's library was already loaded outside slot 0.
    #[error("native library {library} is already loaded at index {index}, not in the reserved slot")]
    DefaultLibraryMisplaced { library: String, index: usize },
}

/// Copies `msg` into a fixed-size C buffer.
///
/// The result is always NUL-terminated within `buf`; the message is truncated
/// if needed. Returns the number of message bytes written (excluding NUL).
pub fn write_c_diagnostic(buf: &mut [u8], msg: &str) -> usize {
    let Some(room) = buf.len().checked_sub(1) else {
        return 0;
    };
    let n = msg.len().min(room);
    buf[..n].copy_from_slice(&msg.as_bytes()[..n]);
    buf[n] = 0;
    n
}
