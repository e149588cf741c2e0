//! The `JVMPI_Interface` function table.
//!
//! The runtime installs one [`Profiler`] per process with
//! [`install_profiler`]. An agent then obtains the function table through
//! [`jvmpi_interface`], stores its `NotifyEvent` callback into it, and from
//! then on receives every posted event in C form.
//!
//! Every slot is an `extern "system"` trampoline that looks up the global
//! profiler and forwards to it, translating errors into `JVMPI_*`/`JNI_*`
//! return codes.

use std::ffi::{c_char, c_void, CStr, CString};
use std::ptr::{self, NonNull};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::dispatcher::{EventSink, RequestTarget};
use crate::error::{EventError, InterfaceError};
use crate::event::{ClassLoadData, Event, EventData, EventKind, FieldSummary};
use crate::monitor::RawMonitor;
use crate::profiler::Profiler;
use crate::runtime::{ClassId, EnvId, MethodId, ObjectId};
use crate::sys::jni::{self, jboolean, jint, jlong, jmethodID, jobject, JNIEnv};
use crate::sys::jvmpi::*;

// =============================================================================
// Global state
// =============================================================================

static GLOBAL_PROFILER: OnceLock<Profiler> = OnceLock::new();

static VENDED: Mutex<Option<VendedTable>> = parking_lot::const_mutex(None);

#[derive(Clone, Copy)]
struct VendedTable {
    version: jint,
    table: NonNull<JVMPI_Interface>,
}

// The table is leaked and lives for the rest of the process.
unsafe impl Send for VendedTable {}
unsafe impl Sync for VendedTable {}

/// Makes `profiler` the process-wide target of the function table.
pub fn install_profiler(profiler: Profiler) -> Result<&'static Profiler, InterfaceError> {
    GLOBAL_PROFILER
        .set(profiler)
        .map_err(|_| InterfaceError::AlreadyInstalled)?;
    GLOBAL_PROFILER.get().ok_or(InterfaceError::NotInstalled)
}

pub fn installed_profiler() -> Option<&'static Profiler> {
    GLOBAL_PROFILER.get()
}

/// Vends the function table for `version`.
///
/// Only one agent is supported per process: asking again for the same
/// version returns the same table, asking for another version fails.
pub fn jvmpi_interface(version: jint) -> Result<*mut JVMPI_Interface, InterfaceError> {
    if version != JVMPI_VERSION_1 && version != JVMPI_VERSION_1_1 {
        warn!(version, "refusing unsupported profiler interface version");
        return Err(InterfaceError::UnsupportedVersion(version));
    }
    let profiler = installed_profiler().ok_or(InterfaceError::NotInstalled)?;

    let mut vended = VENDED.lock();
    if let Some(existing) = *vended {
        if existing.version == version {
            return Ok(existing.table.as_ptr());
        }
        warn!(active = existing.version, requested = version, "profiler interface already vended");
        return Err(InterfaceError::VersionConflict {
            active: existing.version,
            requested: version,
        });
    }

    let table = NonNull::from(Box::leak(Box::new(function_table(version))));
    *vended = Some(VendedTable { version, table });
    profiler.events().set_sink(Arc::new(AgentSink { table }));
    debug!(version, "profiler interface vended");
    Ok(table.as_ptr())
}

/// The `jint` form of [`jvmpi_interface`], for `GetEnv`-style callers.
///
/// # Safety
///
/// `out` must be null or valid for a pointer write.
pub unsafe fn jvmpi_interface_raw(version: jint, out: *mut *mut c_void) -> jint {
    if out.is_null() {
        return jni::JNI_ERR;
    }
    match jvmpi_interface(version) {
        Ok(table) => {
            *out = table.cast();
            jni::JNI_OK
        }
        Err(InterfaceError::UnsupportedVersion(_)) => {
            *out = ptr::null_mut();
            jni::JNI_EVERSION
        }
        Err(_) => {
            *out = ptr::null_mut();
            jni::JNI_ERR
        }
    }
}

fn function_table(version: jint) -> JVMPI_Interface {
    JVMPI_Interface {
        version,
        NotifyEvent: None,
        EnableEvent: Some(enable_event),
        DisableEvent: Some(disable_event),
        RequestEvent: Some(request_event),
        GetCallTrace: Some(get_call_trace),
        ProfilerExit: Some(profiler_exit),
        RawMonitorCreate: Some(raw_monitor_create),
        RawMonitorEnter: Some(raw_monitor_enter),
        RawMonitorExit: Some(raw_monitor_exit),
        RawMonitorWait: Some(raw_monitor_wait),
        RawMonitorNotifyAll: Some(raw_monitor_notify_all),
        RawMonitorDestroy: Some(raw_monitor_destroy),
        GetCurrentThreadCpuTime: Some(get_current_thread_cpu_time),
        SuspendThread: Some(suspend_thread),
        ResumeThread: Some(resume_thread),
        GetThreadStatus: Some(get_thread_status),
        ThreadHasRun: Some(thread_has_run),
        CreateSystemThread: Some(create_system_thread),
        SetThreadLocalStorage: Some(set_thread_local_storage),
        GetThreadLocalStorage: Some(get_thread_local_storage),
        DisableGC: Some(disable_gc),
        EnableGC: Some(enable_gc),
        RunGC: Some(run_gc),
        GetThreadObject: Some(get_thread_object),
        GetMethodClass: Some(get_method_class),
        jobjectID2jobject: Some(object_id_to_jobject),
        jobject2jobjectID: Some(jobject_to_object_id),
        SuspendThreadList: Some(suspend_thread_list),
        ResumeThreadList: Some(resume_thread_list),
    }
}

// =============================================================================
// Event delivery to the agent
// =============================================================================

struct AgentSink {
    table: NonNull<JVMPI_Interface>,
}

unsafe impl Send for AgentSink {}
unsafe impl Sync for AgentSink {}

impl EventSink for AgentSink {
    fn notify(&self, event: &Event) {
        // The agent writes NotifyEvent after receiving the table.
        let notify = unsafe { ptr::read_volatile(ptr::addr_of!((*self.table.as_ptr()).NotifyEvent)) };
        let Some(notify) = notify else {
            return;
        };
        with_c_event(event, |raw| unsafe { notify(raw) });
    }
}

/// Backing storage for the pointers inside a `JVMPI_Event`.
#[derive(Default)]
struct CEventStorage {
    strings: Vec<CString>,
    methods: Vec<JVMPI_Method>,
    statics: Vec<JVMPI_Field>,
    instances: Vec<JVMPI_Field>,
}

impl CEventStorage {
    fn c_str(&mut self, s: &str) -> *mut c_char {
        match CString::new(s) {
            Ok(owned) => {
                let ptr = owned.as_ptr() as *mut c_char;
                self.strings.push(owned);
                ptr
            }
            Err(_) => ptr::null_mut(),
        }
    }

    fn opt_c_str(&mut self, s: Option<&str>) -> *mut c_char {
        s.map_or(ptr::null_mut(), |s| self.c_str(s))
    }

    fn fields(&mut self, fields: &[FieldSummary]) -> Vec<JVMPI_Field> {
        fields
            .iter()
            .map(|f| JVMPI_Field {
                field_name: self.c_str(&f.name),
                field_signature: self.c_str(&f.signature),
            })
            .collect()
    }

    fn class_load(&mut self, data: &ClassLoadData) -> JVMPI_ClassLoadData {
        let methods: Vec<JVMPI_Method> = data
            .methods
            .iter()
            .map(|m| JVMPI_Method {
                method_name: self.c_str(&m.name),
                method_signature: self.c_str(&m.signature),
                start_lineno: m.start_line,
                end_lineno: m.end_line,
                method_id: m.id.as_ptr(),
            })
            .collect();
        self.methods = methods;
        self.statics = self.fields(&data.statics);
        self.instances = self.fields(&data.instances);

        JVMPI_ClassLoadData {
            class_name: self.c_str(&data.name),
            source_name: self.opt_c_str(data.source_name.as_deref()),
            num_interfaces: saturating_jint(data.interface_count),
            num_methods: saturating_jint(self.methods.len()),
            methods: self.methods.as_mut_ptr(),
            num_static_fields: saturating_jint(self.statics.len()),
            statics: self.statics.as_mut_ptr(),
            num_instance_fields: saturating_jint(self.instances.len()),
            instances: self.instances.as_mut_ptr(),
            class_id: data.class.as_ptr(),
        }
    }
}

/// Counts and sizes past `jint::MAX` are reported as `jint::MAX` rather than wrapping negative.
fn saturating_jint(n: usize) -> jint {
    jint::try_from(n).unwrap_or(jint::MAX)
}

/// Converts `event` to its C layout and calls `f` while the layout is valid.
pub fn with_c_event<R>(event: &Event, f: impl FnOnce(*mut JVMPI_Event) -> R) -> R {
    let mut storage = CEventStorage::default();
    // SAFETY: every member of the union is plain pointers and integers.
    let mut u: JVMPI_EventData = unsafe { std::mem::zeroed() };

    match &event.data {
        EventData::ClassLoad(data) => u.class_load = storage.class_load(data),
        EventData::ClassUnload { class } => {
            u.class_unload = JVMPI_ClassUnloadData {
                class_id: class.as_ptr(),
            }
        }
        EventData::ObjectAlloc(data) => {
            u.obj_alloc = JVMPI_ObjAllocData {
                arena_id: data.arena_id,
                class_id: data.class.as_ptr(),
                is_array: data.is_array,
                size: saturating_jint(data.size),
                obj_id: data.object.as_ptr(),
            }
        }
        EventData::ObjectFree { object } => {
            u.obj_free = JVMPI_ObjFreeData {
                obj_id: object.as_ptr(),
            }
        }
        EventData::ThreadStart(data) => {
            u.thread_start = JVMPI_ThreadStartData {
                thread_name: storage.opt_c_str(data.thread_name.as_deref()),
                group_name: storage.opt_c_str(data.group_name.as_deref()),
                parent_name: storage.opt_c_str(data.parent_name.as_deref()),
                thread_id: data.thread.as_ptr(),
                thread_env_id: data.env.as_ptr(),
            }
        }
        EventData::GcFinish(stats) => {
            u.gc_info = JVMPI_GcInfoData {
                used_objects: stats.used_objects,
                used_object_space: stats.used_object_space,
                total_object_space: stats.total_object_space,
            }
        }
        EventData::ThreadEnd
        | EventData::GcStart
        | EventData::JvmInitDone
        | EventData::JvmShutDown
        | EventData::DataDumpRequest
        | EventData::DataResetRequest => {}
    }

    let mut raw = JVMPI_Event {
        event_type: event.raw_type(),
        env_id: event.env_id.map_or(ptr::null_mut(), EnvId::as_ptr),
        u,
    };
    let result = f(&mut raw);
    drop(storage);
    result
}

// =============================================================================
// Trampolines
// =============================================================================

fn event_status(result: Result<(), EventError>) -> jint {
    match result {
        Ok(()) => JVMPI_SUCCESS,
        Err(EventError::NotAvailable(_)) | Err(EventError::UnknownKind(_)) => JVMPI_NOT_AVAILABLE,
        Err(EventError::InvalidTarget(_)) => JVMPI_FAIL,
    }
}

fn env_id(env: *mut JNIEnv) -> Option<EnvId> {
    EnvId::from_ptr(env)
}

unsafe extern "system" fn enable_event(event_type: jint, _arg: *mut c_void) -> jint {
    let Some(profiler) = installed_profiler() else { return JVMPI_FAIL };
    event_status(profiler.events().enable_raw(event_type))
}

unsafe extern "system" fn disable_event(event_type: jint, _arg: *mut c_void) -> jint {
    let Some(profiler) = installed_profiler() else { return JVMPI_FAIL };
    event_status(profiler.events().disable_raw(event_type))
}

unsafe extern "system" fn request_event(event_type: jint, arg: *mut c_void) -> jint {
    let Some(profiler) = installed_profiler() else { return JVMPI_FAIL };
    let Some(kind) = EventKind::from_raw(event_type) else {
        return JVMPI_NOT_AVAILABLE;
    };
    let target = match kind {
        EventKind::ClassLoad => ClassId::from_ptr(arg).map(RequestTarget::Class),
        EventKind::ObjectAlloc => ObjectId::from_ptr(arg).map(RequestTarget::Object),
        EventKind::ThreadStart => ObjectId::from_ptr(arg).map(RequestTarget::Thread),
        _ => return JVMPI_NOT_AVAILABLE,
    };
    match target {
        Some(target) => event_status(profiler.events().request(kind, target)),
        None => JVMPI_FAIL,
    }
}

unsafe extern "system" fn get_call_trace(trace: *mut JVMPI_CallTrace, depth: jint) {
    let Some(trace) = trace.as_mut() else { return };
    trace.num_frames = 0;
    let Some(profiler) = installed_profiler() else { return };
    let Some(env) = env_id(trace.env_id) else { return };
    if trace.frames.is_null() || depth <= 0 {
        return;
    }

    let frames = profiler.threads().call_trace(env, depth as usize);
    for (i, frame) in frames.iter().enumerate() {
        *trace.frames.add(i) = JVMPI_CallFrame {
            lineno: frame.line,
            method_id: frame.method.as_ptr(),
        };
    }
    trace.num_frames = saturating_jint(frames.len());
}

unsafe extern "system" fn profiler_exit(code: jint) {
    match installed_profiler() {
        Some(profiler) => profiler.exit(code),
        None => std::process::exit(code),
    }
}

unsafe extern "system" fn raw_monitor_create(lock_name: *mut c_char) -> JVMPI_RawMonitor {
    let name = if lock_name.is_null() {
        String::new()
    } else {
        CStr::from_ptr(lock_name).to_string_lossy().into_owned()
    };
    Box::into_raw(Box::new(RawMonitor::new(name))).cast()
}

unsafe fn monitor<'a>(lock_id: JVMPI_RawMonitor) -> Option<&'a RawMonitor> {
    lock_id.cast::<RawMonitor>().as_ref()
}

unsafe extern "system" fn raw_monitor_enter(lock_id: JVMPI_RawMonitor) {
    if let Some(Err(e)) = monitor(lock_id).map(RawMonitor::enter) {
        warn!(error = %e, "RawMonitorEnter");
    }
}

unsafe extern "system" fn raw_monitor_exit(lock_id: JVMPI_RawMonitor) {
    if let Some(Err(e)) = monitor(lock_id).map(RawMonitor::exit) {
        warn!(error = %e, "RawMonitorExit");
    }
}

unsafe extern "system" fn raw_monitor_wait(lock_id: JVMPI_RawMonitor, ms: jlong) {
    if let Some(Err(e)) = monitor(lock_id).map(|m| m.wait(ms)) {
        warn!(error = %e, "RawMonitorWait");
    }
}

unsafe extern "system" fn raw_monitor_notify_all(lock_id: JVMPI_RawMonitor) {
    if let Some(m) = monitor(lock_id) {
        m.notify_all();
    }
}

unsafe extern "system" fn raw_monitor_destroy(lock_id: JVMPI_RawMonitor) {
    if !lock_id.is_null() {
        drop(Box::from_raw(lock_id.cast::<RawMonitor>()));
    }
}

unsafe extern "system" fn get_current_thread_cpu_time() -> jlong {
    installed_profiler().map_or(0, |p| p.threads().current_cpu_time())
}

unsafe extern "system" fn suspend_thread(env: *mut JNIEnv) {
    if let (Some(profiler), Some(env)) = (installed_profiler(), env_id(env)) {
        if let Err(e) = profiler.threads().suspend(env) {
            debug!(error = %e, "SuspendThread");
        }
    }
}

unsafe extern "system" fn resume_thread(env: *mut JNIEnv) {
    if let (Some(profiler), Some(env)) = (installed_profiler(), env_id(env)) {
        if let Err(e) = profiler.threads().resume(env) {
            debug!(error = %e, "ResumeThread");
        }
    }
}

unsafe extern "system" fn get_thread_status(env: *mut JNIEnv) -> jint {
    match (installed_profiler(), env_id(env)) {
        (Some(profiler), Some(env)) => profiler
            .threads()
            .status(env)
            .map_or(JVMPI_FAIL, |status| status.to_raw()),
        _ => JVMPI_FAIL,
    }
}

unsafe extern "system" fn thread_has_run(env: *mut JNIEnv) -> jboolean {
    match (installed_profiler(), env_id(env)) {
        (Some(profiler), Some(env)) if profiler.threads().has_run(env).unwrap_or(false) => jni::JNI_TRUE,
        _ => jni::JNI_FALSE,
    }
}

unsafe extern "system" fn create_system_thread(
    name: *mut c_char,
    priority: jint,
    f: Option<JvmpiSystemThreadEntry>,
) -> jint {
    let (Some(profiler), Some(f)) = (installed_profiler(), f) else {
        return jni::JNI_ERR;
    };
    let name = if name.is_null() {
        String::new()
    } else {
        CStr::from_ptr(name).to_string_lossy().into_owned()
    };
    match profiler
        .threads()
        .create_system_thread(&name, priority, move || f(ptr::null_mut()))
    {
        Ok(()) => jni::JNI_OK,
        Err(e) => {
            warn!(error = %e, "CreateSystemThread");
            jni::JNI_ERR
        }
    }
}

unsafe extern "system" fn set_thread_local_storage(env: *mut JNIEnv, value: *mut c_void) {
    if let (Some(profiler), Some(env)) = (installed_profiler(), env_id(env)) {
        if let Err(e) = profiler.threads().set_thread_local(env, value) {
            debug!(error = %e, "SetThreadLocalStorage");
        }
    }
}

unsafe extern "system" fn get_thread_local_storage(env: *mut JNIEnv) -> *mut c_void {
    match (installed_profiler(), env_id(env)) {
        (Some(profiler), Some(env)) => profiler.threads().thread_local(env).unwrap_or(ptr::null_mut()),
        _ => ptr::null_mut(),
    }
}

unsafe extern "system" fn disable_gc() {
    if let Some(profiler) = installed_profiler() {
        profiler.disable_gc();
    }
}

unsafe extern "system" fn enable_gc() {
    if let Some(profiler) = installed_profiler() {
        profiler.enable_gc();
    }
}

unsafe extern "system" fn run_gc() {
    if let Some(profiler) = installed_profiler() {
        profiler.run_gc();
    }
}

unsafe extern "system" fn get_thread_object(env: *mut JNIEnv) -> jobjectID {
    match (installed_profiler(), env_id(env)) {
        (Some(profiler), Some(env)) => profiler
            .threads()
            .thread_object(env)
            .map_or(ptr::null_mut(), ObjectId::as_ptr),
        _ => ptr::null_mut(),
    }
}

unsafe extern "system" fn get_method_class(mid: jmethodID) -> jobjectID {
    match (installed_profiler(), MethodId::from_ptr(mid)) {
        (Some(profiler), Some(method)) => profiler
            .method_class(method)
            .map_or(ptr::null_mut(), ClassId::as_ptr),
        _ => ptr::null_mut(),
    }
}

unsafe extern "system" fn object_id_to_jobject(jid: jobjectID) -> jobject {
    match (installed_profiler(), ObjectId::from_ptr(jid)) {
        (Some(profiler), Some(object)) => profiler.object_id_to_reference(object).as_ptr(),
        _ => ptr::null_mut(),
    }
}

unsafe extern "system" fn jobject_to_object_id(jobj: jobject) -> jobjectID {
    match (installed_profiler(), ObjectId::from_ptr(jobj)) {
        (Some(profiler), Some(reference)) => profiler.reference_to_object_id(reference).as_ptr(),
        _ => ptr::null_mut(),
    }
}

unsafe fn thread_list(
    req_count: jint,
    req_list: *mut *mut JNIEnv,
    results: *mut jint,
    op: impl Fn(&Profiler, &[EnvId]) -> Vec<Result<(), crate::error::ThreadError>>,
) {
    if req_count <= 0 || req_list.is_null() || results.is_null() {
        return;
    }
    let count = req_count as usize;
    let raw = std::slice::from_raw_parts(req_list, count);
    let out = std::slice::from_raw_parts_mut(results, count);

    let Some(profiler) = installed_profiler() else {
        out.fill(JVMPI_FAIL);
        return;
    };

    // Null entries cannot name a thread; give them an id no scheduler knows.
    let envs: Vec<EnvId> = raw.iter().map(|env| env_id(*env).unwrap_or(EnvId(0))).collect();
    for (slot, status) in out.iter_mut().zip(op(profiler, &envs)) {
        *slot = if status.is_ok() { JVMPI_SUCCESS } else { JVMPI_FAIL };
    }
}

unsafe extern "system" fn suspend_thread_list(req_count: jint, req_list: *mut *mut JNIEnv, results: *mut jint) {
    thread_list(req_count, req_list, results, |p, envs| p.threads().suspend_list(envs));
}

unsafe extern "system" fn resume_thread_list(req_count: jint, req_list: *mut *mut JNIEnv, results: *mut jint) {
    thread_list(req_count, req_list, results, |p, envs| p.threads().resume_list(envs));
}
