#![allow(dead_code)]

use std::cell::Cell;
use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use jvm_native_bridge::library::{DynamicLoader, NativeEntry};
use jvm_native_bridge::resolver::{MethodDesc, NamingConvention, TrampolineGenerator};
use jvm_native_bridge::runtime::*;
use jvm_native_bridge::signals::async_signals_blocked;
use jvm_native_bridge::sys::jni;

pub fn entry(addr: usize) -> NativeEntry {
    NativeEntry::new(addr as *mut c_void).expect("non-null address")
}

// =============================================================================
// Loader
// =============================================================================

thread_local! {
    static ON_LOAD_CALLS: Cell<usize> = Cell::new(0);
}

/// `JNI_OnLoad` that counts calls made on the current thread.
pub unsafe extern "system" fn counting_on_load(_vm: *mut jni::JavaVM, reserved: *mut c_void) -> jni::jint {
    assert!(reserved.is_null());
    ON_LOAD_CALLS.with(|c| c.set(c.get() + 1));
    jni::JNI_VERSION_1_4
}

pub fn on_load_calls() -> usize {
    ON_LOAD_CALLS.with(Cell::get)
}

#[derive(Default, Clone)]
pub struct FakeLibrary {
    symbols: HashMap<String, NativeEntry>,
    failure: Option<Option<String>>,
}

impl FakeLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn symbol(mut self, name: &str, addr: usize) -> Self {
        self.symbols.insert(name.to_string(), entry(addr));
        self
    }

    pub fn with_on_load(self) -> Self {
        self.with_initializer(counting_on_load)
    }

    pub fn with_initializer(mut self, f: jni::JNI_OnLoad) -> Self {
        let entry = NativeEntry::new(f as *mut c_void).expect("function pointer");
        self.symbols.insert("JNI_OnLoad".to_string(), entry);
        self
    }

    /// Opening fails with `detail` as the loader's message.
    pub fn failing(detail: Option<&str>) -> Self {
        FakeLibrary {
            symbols: HashMap::new(),
            failure: Some(detail.map(str::to_string)),
        }
    }
}

#[derive(Default)]
pub struct FakeLoader {
    libraries: HashMap<String, FakeLibrary>,
    pub opened: Vec<String>,
    pub closed: Vec<String>,
    pub signals_blocked_on_open: Vec<bool>,
    pub signals_blocked_on_symbol: Mutex<Vec<bool>>,
    pub signals_blocked_on_close: Vec<bool>,
}

impl FakeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_library(mut self, path: &str, library: FakeLibrary) -> Self {
        self.libraries.insert(path.to_string(), library);
        self
    }
}

impl DynamicLoader for FakeLoader {
    type Library = String;

    fn open(&mut self, path: &str) -> Result<String, Option<String>> {
        self.signals_blocked_on_open.push(async_signals_blocked());
        match self.libraries.get(path) {
            Some(FakeLibrary { failure: Some(detail), .. }) => Err(detail.clone()),
            Some(_) => {
                self.opened.push(path.to_string());
                Ok(path.to_string())
            }
            None => Err(Some(format!("{path}: cannot open shared object file: No such file or directory"))),
        }
    }

    fn symbol(&self, library: &String, name: &str) -> Option<NativeEntry> {
        self.signals_blocked_on_symbol.lock().unwrap().push(async_signals_blocked());
        self.libraries.get(library)?.symbols.get(name).copied()
    }

    fn close(&mut self, library: String) {
        self.signals_blocked_on_close.push(async_signals_blocked());
        self.closed.push(library);
    }
}

// =============================================================================
// Trampolines
// =============================================================================

#[derive(Default)]
pub struct RecordingTrampolines {
    pub generated: Mutex<Vec<(MethodDesc, NamingConvention)>>,
}

impl RecordingTrampolines {
    pub fn count(&self) -> usize {
        self.generated.lock().unwrap().len()
    }
}

impl TrampolineGenerator for RecordingTrampolines {
    fn generate(&self, method: &MethodDesc, target: NativeEntry, convention: NamingConvention) -> NativeEntry {
        self.generated.lock().unwrap().push((method.clone(), convention));
        entry(target.as_ptr() as usize + 0x10)
    }
}

// =============================================================================
// Garbage collector
// =============================================================================

#[derive(Default)]
pub struct FakeGc {
    depth: AtomicI64,
    pub disables: AtomicUsize,
    pub collections: AtomicUsize,
    sizes: Mutex<HashMap<ObjectId, usize>>,
}

impl FakeGc {
    pub fn depth(&self) -> i64 {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn set_size(&self, object: ObjectId, size: usize) {
        self.sizes.lock().unwrap().insert(object, size);
    }
}

impl GarbageCollector for FakeGc {
    fn disable(&self) {
        self.disables.fetch_add(1, Ordering::SeqCst);
        self.depth.fetch_add(1, Ordering::SeqCst);
    }

    fn enable(&self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }

    fn object_size(&self, object: ObjectId) -> usize {
        self.sizes.lock().unwrap().get(&object).copied().unwrap_or(16)
    }

    fn collect(&self) {
        self.collections.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Scheduler
// =============================================================================

#[derive(Debug, Clone)]
pub struct FakeThread {
    pub state: SchedulerState,
    pub on_mutex: bool,
    pub on_condvar: bool,
    pub interrupted: bool,
    pub has_run: bool,
    pub current_stack: Vec<StackSlot>,
    pub saved_stack: Vec<StackSlot>,
    pub profiler_data: usize,
    pub object: ObjectId,
    pub suspends: usize,
    pub resumes: usize,
}

impl FakeThread {
    pub fn new(object: ObjectId) -> Self {
        FakeThread {
            state: SchedulerState::Running,
            on_mutex: false,
            on_condvar: false,
            interrupted: false,
            has_run: true,
            current_stack: vec![StackSlot::End],
            saved_stack: vec![StackSlot::End],
            profiler_data: 0,
            object,
            suspends: 0,
            resumes: 0,
        }
    }
}

#[derive(Default)]
pub struct FakeScheduler {
    pub threads: Mutex<HashMap<EnvId, FakeThread>>,
    pub current: Mutex<Option<EnvId>>,
    pub pins: AtomicI64,
    pub daemons: Mutex<Vec<DaemonSpec>>,
    pub refuse_spawn: Mutex<Option<String>>,
    pub cpu_time: AtomicI64,
}

impl FakeScheduler {
    pub fn add_thread(&self, env: EnvId, thread: FakeThread) {
        self.threads.lock().unwrap().insert(env, thread);
    }

    pub fn set_current(&self, env: Option<EnvId>) {
        *self.current.lock().unwrap() = env;
    }

    pub fn thread(&self, env: EnvId) -> FakeThread {
        self.threads.lock().unwrap()[&env].clone()
    }

    pub fn update(&self, env: EnvId, f: impl FnOnce(&mut FakeThread)) {
        f(self.threads.lock().unwrap().get_mut(&env).expect("known thread"));
    }

    pub fn active_pins(&self) -> i64 {
        self.pins.load(Ordering::SeqCst)
    }

    fn with<R>(&self, handle: ThreadHandle, f: impl FnOnce(&mut FakeThread) -> R) -> R {
        f(self
            .threads
            .lock()
            .unwrap()
            .get_mut(&EnvId(handle.0))
            .expect("pinned thread exists"))
    }
}

impl Scheduler for FakeScheduler {
    fn pin(&self, env: EnvId) -> Option<ThreadHandle> {
        if self.threads.lock().unwrap().contains_key(&env) {
            self.pins.fetch_add(1, Ordering::SeqCst);
            Some(ThreadHandle(env.0))
        } else {
            None
        }
    }

    fn release(&self, _thread: ThreadHandle) {
        self.pins.fetch_sub(1, Ordering::SeqCst);
    }

    fn current_env(&self) -> Option<EnvId> {
        *self.current.lock().unwrap()
    }

    fn is_current(&self, thread: ThreadHandle) -> bool {
        *self.current.lock().unwrap() == Some(EnvId(thread.0))
    }

    fn state(&self, thread: ThreadHandle) -> SchedulerState {
        self.with(thread, |t| t.state)
    }

    fn blocked_on_mutex(&self, thread: ThreadHandle) -> bool {
        self.with(thread, |t| t.on_mutex)
    }

    fn blocked_on_condvar(&self, thread: ThreadHandle) -> bool {
        self.with(thread, |t| t.on_condvar)
    }

    fn is_interrupted(&self, thread: ThreadHandle) -> bool {
        self.with(thread, |t| t.interrupted)
    }

    fn has_run(&self, thread: ThreadHandle) -> bool {
        self.with(thread, |t| t.has_run)
    }

    fn walk_stack(&self, thread: ThreadHandle, origin: StackOrigin) -> Vec<StackSlot> {
        self.with(thread, |t| match origin {
            StackOrigin::Current => t.current_stack.clone(),
            StackOrigin::TopFrame => t.saved_stack.clone(),
        })
    }

    fn suspend(&self, thread: ThreadHandle) {
        self.with(thread, |t| {
            t.suspends += 1;
            t.state = SchedulerState::Suspended;
        })
    }

    fn resume(&self, thread: ThreadHandle) {
        self.with(thread, |t| {
            t.resumes += 1;
            t.state = SchedulerState::Running;
        })
    }

    fn profiler_data(&self, thread: ThreadHandle) -> *mut c_void {
        self.with(thread, |t| t.profiler_data as *mut c_void)
    }

    fn set_profiler_data(&self, thread: ThreadHandle, value: *mut c_void) {
        self.with(thread, |t| t.profiler_data = value as usize)
    }

    fn thread_object(&self, thread: ThreadHandle) -> ObjectId {
        self.with(thread, |t| t.object)
    }

    fn current_cpu_time(&self) -> i64 {
        self.cpu_time.load(Ordering::SeqCst)
    }

    fn spawn_daemon(&self, spec: DaemonSpec, entry: ThreadEntry) -> Result<(), String> {
        if let Some(reason) = self.refuse_spawn.lock().unwrap().clone() {
            return Err(reason);
        }
        self.daemons.lock().unwrap().push(spec);
        entry();
        Ok(())
    }
}

// =============================================================================
// Runtime objects
// =============================================================================

#[derive(Default)]
pub struct FakeObjects {
    pub classes: Mutex<HashMap<ClassId, Arc<ClassInfo>>>,
    pub instances: Mutex<HashMap<ObjectId, ClassId>>,
    pub methods: Mutex<HashMap<MethodId, Arc<MethodInfo>>>,
    pub threads: Mutex<HashMap<ObjectId, ThreadDescriptor>>,
}

impl FakeObjects {
    pub fn add_class(&self, class: ClassInfo) -> Arc<ClassInfo> {
        let class = Arc::new(class);
        for method in &class.methods {
            self.methods.lock().unwrap().insert(method.id, method.clone());
        }
        self.classes.lock().unwrap().insert(class.id, class.clone());
        class
    }

    pub fn add_object(&self, object: ObjectId, class: ClassId) {
        self.instances.lock().unwrap().insert(object, class);
    }

    pub fn add_thread(&self, desc: ThreadDescriptor) {
        self.threads.lock().unwrap().insert(desc.thread, desc);
    }
}

impl RuntimeObjects for FakeObjects {
    fn class(&self, id: ClassId) -> Option<Arc<ClassInfo>> {
        self.classes.lock().unwrap().get(&id).cloned()
    }

    fn class_of(&self, object: ObjectId) -> Option<Arc<ClassInfo>> {
        let class = *self.instances.lock().unwrap().get(&object)?;
        self.class(class)
    }

    fn method(&self, id: MethodId) -> Option<Arc<MethodInfo>> {
        self.methods.lock().unwrap().get(&id).cloned()
    }

    fn thread(&self, thread: ObjectId) -> Option<ThreadDescriptor> {
        self.threads.lock().unwrap().get(&thread).cloned()
    }
}

// =============================================================================
// Builders
// =============================================================================

pub fn method(id: usize, class: usize, name: &str, signature: &str, lines: Option<&[(usize, i32)]>) -> Arc<MethodInfo> {
    Arc::new(MethodInfo {
        id: MethodId(id),
        class: ClassId(class),
        name: name.to_string(),
        signature: signature.to_string(),
        code_start: 0x4000,
        lines: lines.map(|rows| {
            rows.iter()
                .map(|&(start_pc, line)| LineNumberEntry { start_pc, line })
                .collect()
        }),
    })
}

pub fn field(name: &str, signature: &str) -> FieldInfo {
    FieldInfo {
        name: name.to_string(),
        signature: signature.to_string(),
    }
}

pub fn class(id: usize, name: &str) -> ClassInfo {
    ClassInfo {
        id: ClassId(id),
        name: name.to_string(),
        source_file: None,
        interface_count: 0,
        methods: Vec::new(),
        static_fields: Vec::new(),
        instance_fields: Vec::new(),
        array_element: None,
    }
}

pub fn frame(method: &Arc<MethodInfo>, pc: usize) -> StackSlot {
    StackSlot::Frame {
        method: Some(method.clone()),
        pc,
    }
}

pub fn foreign_frame(pc: usize) -> StackSlot {
    StackSlot::Frame { method: None, pc }
}

/// GC, scheduler and object store wired together.
pub struct FakeRuntime {
    pub gc: Arc<FakeGc>,
    pub scheduler: Arc<FakeScheduler>,
    pub objects: Arc<FakeObjects>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        FakeRuntime {
            gc: Arc::new(FakeGc::default()),
            scheduler: Arc::new(FakeScheduler::default()),
            objects: Arc::new(FakeObjects::default()),
        }
    }
}
