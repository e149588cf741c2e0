//! The native linker: library registry and method resolver under one lock.
//!
//! Every load, unload, symbol lookup and first-time method resolution takes
//! the same mutex, so callers never observe a half-updated registry.
//! `JNI_OnLoad` runs after the mutex is released: initializers routinely call
//! back into the VM to register or link natives.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::NativeConfig;
use crate::error::{ConfigError, LoadError, UnloadError};
use crate::library::{canonical_path, DynamicLoader, LibraryRegistry, NativeEntry, RESERVED_SLOT};
use crate::resolver::{NativeCode, NativeMethod, NativeResolver, TrampolineGenerator};
use crate::sys::jni;

pub struct NativeLinker<L: DynamicLoader> {
    config: NativeConfig,
    libraries: Mutex<LibraryRegistry<L>>,
    resolver: NativeResolver,
    library_path: Mutex<Option<String>>,
}

impl<L: DynamicLoader> NativeLinker<L> {
    pub fn new(config: NativeConfig, loader: L, trampolines: Arc<dyn TrampolineGenerator>) -> Self {
        let libraries = LibraryRegistry::new(loader, config.max_libraries);
        let resolver = NativeResolver::new(config.naming.clone(), trampolines);
        NativeLinker {
            config,
            libraries: Mutex::new(libraries),
            resolver,
            library_path: Mutex::new(None),
        }
    }

    /// Sets the `JavaVM*` passed to `JNI_OnLoad`.
    pub fn with_vm(self, vm: *mut jni::JavaVM) -> Self {
        let libraries = self.libraries.into_inner().with_vm(vm);
        NativeLinker {
            libraries: Mutex::new(libraries),
            ..self
        }
    }

    pub fn config(&self) -> &NativeConfig {
        &self.config
    }

    /// Finds the runtime's own library on the search path and loads it.
    ///
    /// The first candidate that opens wins and must land in slot 0. If slot 0
    /// is already taken by another library, nothing is loaded.
    pub fn init_default_library(&self) -> Result<usize, ConfigError> {
        let path = self.config.library_path();
        debug!(library_path = %path, "initializing native layer");
        *self.library_path.lock() = Some(path.clone());

        let candidates = self.config.default_library_candidates();
        if let Some(occupant) = self.libraries.lock().path(RESERVED_SLOT) {
            if candidates.iter().any(|candidate| canonical_path(candidate) == occupant) {
                debug!(library = %occupant, "default native library already loaded");
                return Ok(RESERVED_SLOT);
            }
            return Err(ConfigError::ReservedSlotTaken {
                library: self.config.native_library.clone(),
                occupant: occupant.to_string(),
            });
        }

        for candidate in candidates {
            let mut libraries = self.libraries.lock();
            match libraries.load_deferred(&candidate, 1) {
                Ok((RESERVED_SLOT, initializer)) => {
                    drop(libraries);
                    if let Some(initializer) = initializer {
                        initializer.run();
                    }
                    info!(library = %candidate, index = RESERVED_SLOT, "default native library loaded");
                    return Ok(RESERVED_SLOT);
                }
                Ok((index, _)) => {
                    // Either the library was already loaded elsewhere or slot 0
                    // was taken meanwhile; give the reference back.
                    if let Err(error) = libraries.unload(index) {
                        debug!(index, %error, "releasing misplaced default library");
                    }
                    return Err(ConfigError::DefaultLibraryMisplaced {
                        library: candidate,
                        index,
                    });
                }
                Err(error) => debug!(library = %candidate, %error, "default library candidate rejected"),
            }
        }

        Err(ConfigError::DefaultLibraryNotFound {
            library: self.config.native_library.clone(),
            path,
        })
    }

    /// The search path composed by [`Self::init_default_library`], or the
    /// path it would use.
    pub fn library_path(&self) -> String {
        self.library_path
            .lock()
            .clone()
            .unwrap_or_else(|| self.config.library_path())
    }

    pub fn load_library(&self, path: &str) -> Result<usize, LoadError> {
        self.load_library_with_refs(path, 1)
    }

    /// Loads `path` under the lock, then runs its `JNI_OnLoad` with the lock
    /// released so the initializer can link and look up symbols itself.
    pub fn load_library_with_refs(&self, path: &str, initial_refs: usize) -> Result<usize, LoadError> {
        let (index, initializer) = self.libraries.lock().load_deferred(path, initial_refs)?;
        if let Some(initializer) = initializer {
            initializer.run();
        }
        Ok(index)
    }

    pub fn unload_library(&self, index: usize) -> Result<(), UnloadError> {
        self.libraries.lock().unload(index)
    }

    pub fn find_symbol(&self, name: &str) -> Option<NativeEntry> {
        self.libraries.lock().lookup_symbol(name)
    }

    /// Binds `method` on first use.
    pub fn link<'m>(&self, method: &'m NativeMethod) -> &'m NativeCode {
        if let Some(code) = method.code() {
            return code;
        }
        let libraries = self.libraries.lock();
        self.resolver.link(&libraries, method)
    }

    /// Runs `f` with the registry locked.
    pub fn with_libraries<R>(&self, f: impl FnOnce(&mut LibraryRegistry<L>) -> R) -> R {
        f(&mut self.libraries.lock())
    }
}
