//! Raw ABI definitions shared with native code.
//!
//! - [`jni`]: primitive types and the library initializer signature
//! - [`jvmpi`]: profiler interface constants, event records, and the
//!   function table handed to an agent

pub mod jni;
pub mod jvmpi;
