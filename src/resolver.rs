//! Binding native methods to library code.
//!
//! Resolution tries the stub name, then the short JNI name, then the long JNI
//! name. The first hit is wrapped in a trampoline; if nothing matches, the
//! method is bound to a stub that raises `UnsatisfiedLinkError` when called.
//! Either way the outcome is recorded once per method and never recomputed.

use std::sync::{Arc, OnceLock};

use tracing::{debug, warn};

use crate::error::LinkageError;
use crate::library::{DynamicLoader, LibraryRegistry, NativeEntry};
use crate::mangle::SymbolNaming;

/// Identity of a native method as written in the class file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDesc {
    /// Internal form, e.g. `java/io/FileDescriptor`.
    pub class_name: String,
    pub name: String,
    /// Descriptor, e.g. `(I)V`.
    pub signature: String,
}

impl MethodDesc {
    pub fn new(class_name: impl Into<String>, name: impl Into<String>, signature: impl Into<String>) -> Self {
        MethodDesc {
            class_name: class_name.into(),
            name: name.into(),
            signature: signature.into(),
        }
    }
}

/// Which naming convention produced the match.
///
/// JNI functions take a `JNIEnv*` and class/receiver before the declared
/// arguments, so the trampoline needs to know.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingConvention {
    Stub,
    Jni,
}

/// Produces code that adapts the native calling convention to the runtime's.
pub trait TrampolineGenerator: Send + Sync {
    fn generate(&self, method: &MethodDesc, target: NativeEntry, convention: NamingConvention) -> NativeEntry;
}

/// A method bound to native code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeBinding {
    pub symbol: String,
    pub target: NativeEntry,
    pub trampoline: NativeEntry,
    pub convention: NamingConvention,
}

/// The recorded outcome of resolving a native method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeCode {
    Bound(NativeBinding),
    /// Calling the method raises this error.
    Unsatisfied(LinkageError),
}

impl NativeCode {
    pub fn is_bound(&self) -> bool {
        matches!(self, NativeCode::Bound(_))
    }

    /// The code to jump to, or the link error the call must raise.
    pub fn entry_point(&self) -> Result<NativeEntry, LinkageError> {
        match self {
            NativeCode::Bound(binding) => Ok(binding.trampoline),
            NativeCode::Unsatisfied(error) => Err(error.clone()),
        }
    }

    pub fn binding(&self) -> Option<&NativeBinding> {
        match self {
            NativeCode::Bound(binding) => Some(binding),
            NativeCode::Unsatisfied(_) => None,
        }
    }
}

/// A native method together with its (lazily computed) binding.
#[derive(Debug)]
pub struct NativeMethod {
    desc: MethodDesc,
    code: OnceLock<NativeCode>,
}

impl NativeMethod {
    pub fn new(desc: MethodDesc) -> Self {
        NativeMethod {
            desc,
            code: OnceLock::new(),
        }
    }

    pub fn desc(&self) -> &MethodDesc {
        &self.desc
    }

    /// The binding, if resolution has already happened.
    pub fn code(&self) -> Option<&NativeCode> {
        self.code.get()
    }

    /// Whether the method was bound through the JNI convention.
    pub fn is_jni(&self) -> bool {
        matches!(
            self.code.get(),
            Some(NativeCode::Bound(NativeBinding {
                convention: NamingConvention::Jni,
                ..
            }))
        )
    }

    pub(crate) fn code_or_init(&self, init: impl FnOnce(&MethodDesc) -> NativeCode) -> &NativeCode {
        self.code.get_or_init(|| init(&self.desc))
    }
}

/// Derives candidate names and binds methods to library code.
#[derive(Clone)]
pub struct NativeResolver {
    naming: SymbolNaming,
    trampolines: Arc<dyn TrampolineGenerator>,
}

impl NativeResolver {
    pub fn new(naming: SymbolNaming, trampolines: Arc<dyn TrampolineGenerator>) -> Self {
        NativeResolver { naming, trampolines }
    }

    pub fn naming(&self) -> &SymbolNaming {
        &self.naming
    }

    /// Resolves `method` against `libraries` without recording the outcome.
    pub fn resolve<L: DynamicLoader>(&self, libraries: &LibraryRegistry<L>, method: &MethodDesc) -> NativeCode {
        let stub = self.naming.stub_name(&method.class_name, &method.name);
        debug!(class = %method.class_name, method = %method.name, signature = %method.signature, stub = %stub, "resolving native method");

        let found = self
            .lookup(libraries, stub, NamingConvention::Stub)
            .or_else(|| {
                let short = self.naming.jni_short_name(&method.class_name, &method.name);
                self.lookup(libraries, short, NamingConvention::Jni)
            })
            .or_else(|| {
                let long = self
                    .naming
                    .jni_long_name(&method.class_name, &method.name, &method.signature);
                self.lookup(libraries, long, NamingConvention::Jni)
            });

        match found {
            Some((symbol, target, convention)) => {
                let trampoline = self.trampolines.generate(method, target, convention);
                NativeCode::Bound(NativeBinding {
                    symbol,
                    target,
                    trampoline,
                    convention,
                })
            }
            None => {
                let error = LinkageError {
                    class: method.class_name.clone(),
                    method: method.name.clone(),
                    signature: method.signature.clone(),
                };
                warn!(%error, "binding method to unsatisfied-link stub");
                NativeCode::Unsatisfied(error)
            }
        }
    }

    /// Binds `method` on first use; later calls return the recorded binding.
    pub fn link<'m, L: DynamicLoader>(&self, libraries: &LibraryRegistry<L>, method: &'m NativeMethod) -> &'m NativeCode {
        method.code_or_init(|desc| self.resolve(libraries, desc))
    }

    fn lookup<L: DynamicLoader>(
        &self,
        libraries: &LibraryRegistry<L>,
        symbol: String,
        convention: NamingConvention,
    ) -> Option<(String, NativeEntry, NamingConvention)> {
        let target = libraries.lookup_symbol(&symbol)?;
        Some((symbol, target, convention))
    }
}
