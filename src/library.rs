//! Registry of loaded native libraries.
//!
//! Libraries live in a fixed number of slots addressed by index. Slot 0 holds
//! the runtime's own native library and is never unloaded. Loading a path that
//! is already present only bumps its reference count.
//!
//! The registry performs no locking of its own; [`crate::linker::NativeLinker`]
//! wraps it in the single lock that also covers method resolution.

use std::ffi::c_void;
use std::fmt;
use std::ptr::{self, NonNull};

use tracing::debug;

use crate::error::{LoadError, UnloadError};
use crate::signals::AsyncSignalBlock;
use crate::sys::jni;

/// Index of the always-resident runtime library.
pub const RESERVED_SLOT: usize = 0;

/// Number of slots when no capacity is configured.
pub const DEFAULT_CAPACITY: usize = 16;

/// Address of a symbol inside a loaded library.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeEntry(NonNull<c_void>);

// Code addresses are plain values; the library that owns them is pinned by
// the registry's reference count.
unsafe impl Send for NativeEntry {}
unsafe impl Sync for NativeEntry {}

impl NativeEntry {
    pub fn new(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(NativeEntry)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }
}

impl fmt::Debug for NativeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeEntry({:p})", self.0)
    }
}

/// The operating system's dynamic loader.
pub trait DynamicLoader {
    type Library;

    /// Opens `path`. On failure returns the loader's error text, if it has any.
    fn open(&mut self, path: &str) -> Result<Self::Library, Option<String>>;

    fn symbol(&self, library: &Self::Library, name: &str) -> Option<NativeEntry>;

    fn close(&mut self, library: Self::Library);
}

/// `dlopen`-backed loader built on `libloading`.
#[cfg(feature = "dlopen")]
#[derive(Debug, Default, Clone, Copy)]
pub struct LibloadingLoader;

#[cfg(feature = "dlopen")]
impl DynamicLoader for LibloadingLoader {
    type Library = libloading::Library;

    fn open(&mut self, path: &str) -> Result<Self::Library, Option<String>> {
        unsafe { libloading::Library::new(path) }.map_err(|e| match e {
            libloading::Error::DlOpenUnknown | libloading::Error::LoadLibraryExWUnknown => None,
            other => Some(other.to_string()),
        })
    }

    fn symbol(&self, library: &Self::Library, name: &str) -> Option<NativeEntry> {
        let symbol = unsafe { library.get::<*mut c_void>(name.as_bytes()) }.ok()?;
        NativeEntry::new(*symbol)
    }

    fn close(&mut self, library: Self::Library) {
        if let Err(e) = library.close() {
            debug!(error = %e, "native library close reported an error");
        }
    }
}

/// The `JavaVM*` passed to each library's `JNI_OnLoad`.
#[derive(Debug, Clone, Copy)]
struct InitializerArg(*mut jni::JavaVM);

// The VM structure is process-global and outlives every library.
unsafe impl Send for InitializerArg {}
unsafe impl Sync for InitializerArg {}

/// A freshly opened library's `JNI_OnLoad`, not yet called.
#[must_use = "the library stays uninitialized until the initializer runs"]
#[derive(Debug)]
pub struct Initializer {
    index: usize,
    entry: NativeEntry,
    vm: InitializerArg,
}

impl Initializer {
    /// Slot of the library this initializer belongs to.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Calls `JNI_OnLoad(vm, NULL)` and returns the JNI version it reports.
    pub fn run(self) -> jni::jint {
        // SAFETY: `JNI_OnLoad` has one fixed signature in the JNI ABI.
        let on_load: jni::JNI_OnLoad = unsafe { std::mem::transmute(self.entry.as_ptr()) };
        let version = unsafe { on_load(self.vm.0, ptr::null_mut()) };
        debug!(index = self.index, version, "JNI_OnLoad returned");
        version
    }
}

struct LibrarySlot<H> {
    handle: H,
    path: String,
    refs: usize,
}

/// Fixed-capacity, reference-counted table of open libraries.
pub struct LibraryRegistry<L: DynamicLoader> {
    loader: L,
    slots: Vec<Option<LibrarySlot<L::Library>>>,
    vm: InitializerArg,
}

impl<L: DynamicLoader> LibraryRegistry<L> {
    pub fn new(loader: L, capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        LibraryRegistry {
            loader,
            slots,
            vm: InitializerArg(ptr::null_mut()),
        }
    }

    /// Sets the `JavaVM*` handed to `JNI_OnLoad` of subsequently opened libraries.
    pub fn with_vm(mut self, vm: *mut jni::JavaVM) -> Self {
        self.vm = InitializerArg(vm);
        self
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ref_count(&self, index: usize) -> Option<usize> {
        self.slot(index).map(|slot| slot.refs)
    }

    pub fn path(&self, index: usize) -> Option<&str> {
        self.slot(index).map(|slot| slot.path.as_str())
    }

    /// Index of the library registered under `path`, if any.
    pub fn find(&self, path: &str) -> Option<usize> {
        self.find_key(&canonical_path(path))
    }

    fn find_key(&self, key: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| matches!(slot, Some(s) if s.path == key))
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    fn slot(&self, index: usize) -> Option<&LibrarySlot<L::Library>> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Loads `path`, or takes another reference on it if it is already loaded.
    ///
    /// A fresh library starts with `initial_refs` references and has its
    /// `JNI_OnLoad` (if exported) called once, before this returns.
    pub fn load(&mut self, path: &str, initial_refs: usize) -> Result<usize, LoadError> {
        let (index, initializer) = self.load_deferred(path, initial_refs)?;
        if let Some(initializer) = initializer {
            initializer.run();
        }
        Ok(index)
    }

    /// Like [`Self::load`], but hands a fresh library's `JNI_OnLoad` back to
    /// the caller instead of running it.
    ///
    /// The initializer may call back into the VM, so a caller that holds a
    /// lock around the registry must release it before [`Initializer::run`].
    pub fn load_deferred(&mut self, path: &str, initial_refs: usize) -> Result<(usize, Option<Initializer>), LoadError> {
        let key = canonical_path(path);

        if let Some(index) = self.find_key(&key) {
            if let Some(slot) = self.slots[index].as_mut() {
                slot.refs += 1;
                debug!(library = %slot.path, index, refs = slot.refs, "native library LOAD (shared)");
            }
            return Ok((index, None));
        }

        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(LoadError::CapacityExceeded)?;

        let handle = {
            let _signals = AsyncSignalBlock::new();
            self.loader.open(&key)
        }
        .map_err(|detail| LoadError::classify(&key, detail.as_deref()))?;

        let entry = {
            let _signals = AsyncSignalBlock::new();
            self.loader.symbol(&handle, jni::JNI_ONLOAD_SYMBOL)
        };

        debug!(library = %key, index, refs = initial_refs, "native library LOAD");
        self.slots[index] = Some(LibrarySlot {
            handle,
            path: key,
            refs: initial_refs,
        });

        let initializer = entry.map(|entry| Initializer {
            index,
            entry,
            vm: self.vm,
        });
        Ok((index, initializer))
    }

    /// Drops one reference on the library at `index`, closing it at zero.
    pub fn unload(&mut self, index: usize) -> Result<(), UnloadError> {
        if index == RESERVED_SLOT {
            return Err(UnloadError::Reserved);
        }
        let entry = self.slots.get_mut(index).ok_or(UnloadError::NotLoaded(index))?;
        let slot = entry.as_mut().ok_or(UnloadError::NotLoaded(index))?;

        slot.refs = slot.refs.saturating_sub(1);
        debug!(library = %slot.path, index, refs = slot.refs, "native library UNLOAD");
        if slot.refs > 0 {
            return Ok(());
        }

        if let Some(slot) = entry.take() {
            let _signals = AsyncSignalBlock::new();
            self.loader.close(slot.handle);
        }
        Ok(())
    }

    /// Looks `name` up in every loaded library; the lowest index wins.
    pub fn lookup_symbol(&self, name: &str) -> Option<NativeEntry> {
        let _signals = AsyncSignalBlock::new();
        for (index, slot) in self.slots.iter().enumerate() {
            let Some(slot) = slot else { continue };
            match self.loader.symbol(&slot.handle, name) {
                Some(entry) => {
                    debug!(symbol = name, index, library = %slot.path, "found native symbol");
                    return Some(entry);
                }
                None => debug!(symbol = name, index, library = %slot.path, "symbol not in library"),
            }
        }
        None
    }
}

/// Normalized registry key for `path`.
///
/// Paths that exist on disk are canonicalized; anything else (a bare soname
/// the loader resolves through its own search) is kept as given.
pub fn canonical_path(path: &str) -> String {
    std::fs::canonicalize(path)
        .ok()
        .and_then(|p| p.to_str().map(str::to_owned))
        .unwrap_or_else(|| path.to_string())
}
