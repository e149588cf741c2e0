// jvm-native-bridge/src/sys/jvmpi.rs
//
// JVMPI (JVM Profiler Interface) ABI for the runtime side.
//
// Layouts follow jvmpi.h from the 1.1 interface. Version 1 and 1.1 share the
// same function table; only the `version` field differs.

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]

use std::os::raw::{c_char, c_void};

use crate::sys::jni::{jboolean, jint, jlong, jmethodID, jobject, JNIEnv};

// --- Versions ---
pub const JVMPI_VERSION_1: jint = 0x10000001;
pub const JVMPI_VERSION_1_1: jint = 0x10000002;

// --- Return codes ---
pub const JVMPI_SUCCESS: jint = 0;
pub const JVMPI_NOT_AVAILABLE: jint = 1;
pub const JVMPI_FAIL: jint = -1;

// --- Thread status ---
pub const JVMPI_THREAD_RUNNABLE: jint = 1;
pub const JVMPI_THREAD_MONITOR_WAIT: jint = 2;
pub const JVMPI_THREAD_CONDVAR_WAIT: jint = 3;
pub const JVMPI_THREAD_SUSPENDED: jint = 0x8000;
pub const JVMPI_THREAD_INTERRUPTED: jint = 0x4000;

// --- System thread priorities ---
pub const JVMPI_MINIMUM_PRIORITY: jint = 1;
pub const JVMPI_MAXIMUM_PRIORITY: jint = 2;
pub const JVMPI_NORMAL_PRIORITY: jint = 3;

// --- Object kinds reported in OBJECT_ALLOC ---
pub const JVMPI_NORMAL_OBJECT: jint = 0;
pub const JVMPI_CLASS: jint = 2;
pub const JVMPI_BOOLEAN: jint = 4;
pub const JVMPI_CHAR: jint = 5;
pub const JVMPI_FLOAT: jint = 6;
pub const JVMPI_DOUBLE: jint = 7;
pub const JVMPI_BYTE: jint = 8;
pub const JVMPI_SHORT: jint = 9;
pub const JVMPI_INT: jint = 10;
pub const JVMPI_LONG: jint = 11;

// --- Event types ---
pub const JVMPI_EVENT_METHOD_ENTRY: jint = 1;
pub const JVMPI_EVENT_METHOD_ENTRY2: jint = 2;
pub const JVMPI_EVENT_METHOD_EXIT: jint = 3;
pub const JVMPI_EVENT_OBJECT_ALLOC: jint = 4;
pub const JVMPI_EVENT_OBJECT_FREE: jint = 5;
pub const JVMPI_EVENT_OBJECT_MOVE: jint = 6;
pub const JVMPI_EVENT_COMPILED_METHOD_LOAD: jint = 7;
pub const JVMPI_EVENT_COMPILED_METHOD_UNLOAD: jint = 8;
pub const JVMPI_EVENT_INSTRUCTION_START: jint = 9;
pub const JVMPI_EVENT_THREAD_START: jint = 33;
pub const JVMPI_EVENT_THREAD_END: jint = 34;
pub const JVMPI_EVENT_CLASS_LOAD_HOOK: jint = 35;
pub const JVMPI_EVENT_HEAP_DUMP: jint = 37;
pub const JVMPI_EVENT_JNI_GLOBALREF_ALLOC: jint = 38;
pub const JVMPI_EVENT_JNI_GLOBALREF_FREE: jint = 39;
pub const JVMPI_EVENT_JNI_WEAK_GLOBALREF_ALLOC: jint = 40;
pub const JVMPI_EVENT_JNI_WEAK_GLOBALREF_FREE: jint = 41;
pub const JVMPI_EVENT_CLASS_LOAD: jint = 42;
pub const JVMPI_EVENT_CLASS_UNLOAD: jint = 43;
pub const JVMPI_EVENT_DATA_DUMP_REQUEST: jint = 44;
pub const JVMPI_EVENT_DATA_RESET_REQUEST: jint = 45;
pub const JVMPI_EVENT_JVM_INIT_DONE: jint = 46;
pub const JVMPI_EVENT_JVM_SHUT_DOWN: jint = 47;
pub const JVMPI_EVENT_ARENA_NEW: jint = 48;
pub const JVMPI_EVENT_ARENA_DELETE: jint = 49;
pub const JVMPI_EVENT_OBJECT_DUMP: jint = 50;
pub const JVMPI_EVENT_MONITOR_CONTENDED_ENTER: jint = 51;
pub const JVMPI_EVENT_MONITOR_CONTENDED_ENTERED: jint = 52;
pub const JVMPI_EVENT_MONITOR_CONTENDED_EXIT: jint = 53;
pub const JVMPI_EVENT_MONITOR_WAIT: jint = 54;
pub const JVMPI_EVENT_MONITOR_WAITED: jint = 55;
pub const JVMPI_EVENT_MONITOR_DUMP: jint = 56;
pub const JVMPI_EVENT_GC_START: jint = 57;
pub const JVMPI_EVENT_GC_FINISH: jint = 58;
pub const JVMPI_EVENT_RAW_MONITOR_CONTENDED_ENTER: jint = 59;
pub const JVMPI_EVENT_RAW_MONITOR_CONTENDED_ENTERED: jint = 60;
pub const JVMPI_EVENT_RAW_MONITOR_CONTENDED_EXIT: jint = 61;

pub const JVMPI_MAX_EVENT_TYPE_VAL: jint = 61;

/// OR'd into `event_type` when the agent asked for the event explicitly.
pub const JVMPI_REQUESTED_EVENT: jint = 0x10000000;

pub type jobjectID = *mut c_void;
pub type JVMPI_RawMonitor = *mut c_void;

// --- Event payload records ---

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct JVMPI_Method {
    pub method_name: *mut c_char,
    pub method_signature: *mut c_char,
    pub start_lineno: jint,
    pub end_lineno: jint,
    pub method_id: jmethodID,
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct JVMPI_Field {
    pub field_name: *mut c_char,
    pub field_signature: *mut c_char,
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct JVMPI_Lineno {
    pub offset: jint,
    pub lineno: jint,
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct JVMPI_CallFrame {
    pub lineno: jint,
    pub method_id: jmethodID,
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct JVMPI_CallTrace {
    pub env_id: *mut JNIEnv,
    pub num_frames: jint,
    pub frames: *mut JVMPI_CallFrame,
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct JVMPI_ClassLoadData {
    pub class_name: *mut c_char,
    pub source_name: *mut c_char,
    pub num_interfaces: jint,
    pub num_methods: jint,
    pub methods: *mut JVMPI_Method,
    pub num_static_fields: jint,
    pub statics: *mut JVMPI_Field,
    pub num_instance_fields: jint,
    pub instances: *mut JVMPI_Field,
    pub class_id: jobjectID,
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct JVMPI_ClassUnloadData {
    pub class_id: jobjectID,
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct JVMPI_ObjAllocData {
    pub arena_id: jint,
    pub class_id: jobjectID,
    pub is_array: jint,
    pub size: jint,
    pub obj_id: jobjectID,
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct JVMPI_ObjFreeData {
    pub obj_id: jobjectID,
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct JVMPI_ThreadStartData {
    pub thread_name: *mut c_char,
    pub group_name: *mut c_char,
    pub parent_name: *mut c_char,
    pub thread_id: jobjectID,
    pub thread_env_id: *mut JNIEnv,
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct JVMPI_GcInfoData {
    pub used_objects: jlong,
    pub used_object_space: jlong,
    pub total_object_space: jlong,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub union JVMPI_EventData {
    pub class_load: JVMPI_ClassLoadData,
    pub class_unload: JVMPI_ClassUnloadData,
    pub obj_alloc: JVMPI_ObjAllocData,
    pub obj_free: JVMPI_ObjFreeData,
    pub thread_start: JVMPI_ThreadStartData,
    pub gc_info: JVMPI_GcInfoData,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct JVMPI_Event {
    pub event_type: jint,
    pub env_id: *mut JNIEnv,
    pub u: JVMPI_EventData,
}

// --- Function table ---

pub type JvmpiNotifyEventFn = unsafe extern "system" fn(event: *mut JVMPI_Event);
pub type JvmpiEventControlFn = unsafe extern "system" fn(event_type: jint, arg: *mut c_void) -> jint;
pub type JvmpiGetCallTraceFn = unsafe extern "system" fn(trace: *mut JVMPI_CallTrace, depth: jint);
pub type JvmpiProfilerExitFn = unsafe extern "system" fn(code: jint);
pub type JvmpiRawMonitorCreateFn = unsafe extern "system" fn(lock_name: *mut c_char) -> JVMPI_RawMonitor;
pub type JvmpiRawMonitorFn = unsafe extern "system" fn(lock_id: JVMPI_RawMonitor);
pub type JvmpiRawMonitorWaitFn = unsafe extern "system" fn(lock_id: JVMPI_RawMonitor, ms: jlong);
pub type JvmpiCpuTimeFn = unsafe extern "system" fn() -> jlong;
pub type JvmpiThreadFn = unsafe extern "system" fn(env: *mut JNIEnv);
pub type JvmpiThreadStatusFn = unsafe extern "system" fn(env: *mut JNIEnv) -> jint;
pub type JvmpiThreadHasRunFn = unsafe extern "system" fn(env: *mut JNIEnv) -> jboolean;
pub type JvmpiSystemThreadEntry = unsafe extern "system" fn(arg: *mut c_void);
pub type JvmpiCreateSystemThreadFn =
    unsafe extern "system" fn(name: *mut c_char, priority: jint, f: Option<JvmpiSystemThreadEntry>) -> jint;
pub type JvmpiSetThreadLocalFn = unsafe extern "system" fn(env: *mut JNIEnv, ptr: *mut c_void);
pub type JvmpiGetThreadLocalFn = unsafe extern "system" fn(env: *mut JNIEnv) -> *mut c_void;
pub type JvmpiGcFn = unsafe extern "system" fn();
pub type JvmpiGetThreadObjectFn = unsafe extern "system" fn(env: *mut JNIEnv) -> jobjectID;
pub type JvmpiGetMethodClassFn = unsafe extern "system" fn(mid: jmethodID) -> jobjectID;
pub type JvmpiObjectIdToJobjectFn = unsafe extern "system" fn(jid: jobjectID) -> jobject;
pub type JvmpiJobjectToObjectIdFn = unsafe extern "system" fn(jobj: jobject) -> jobjectID;
pub type JvmpiThreadListFn =
    unsafe extern "system" fn(req_count: jint, req_list: *mut *mut JNIEnv, results: *mut jint);

/// The function table handed to a profiler agent.
///
/// `NotifyEvent` is written by the agent; every other slot is filled in by
/// the runtime.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct JVMPI_Interface {
    pub version: jint,

    pub NotifyEvent: Option<JvmpiNotifyEventFn>,

    pub EnableEvent: Option<JvmpiEventControlFn>,
    pub DisableEvent: Option<JvmpiEventControlFn>,
    pub RequestEvent: Option<JvmpiEventControlFn>,

    pub GetCallTrace: Option<JvmpiGetCallTraceFn>,

    pub ProfilerExit: Option<JvmpiProfilerExitFn>,

    pub RawMonitorCreate: Option<JvmpiRawMonitorCreateFn>,
    pub RawMonitorEnter: Option<JvmpiRawMonitorFn>,
    pub RawMonitorExit: Option<JvmpiRawMonitorFn>,
    pub RawMonitorWait: Option<JvmpiRawMonitorWaitFn>,
    pub RawMonitorNotifyAll: Option<JvmpiRawMonitorFn>,
    pub RawMonitorDestroy: Option<JvmpiRawMonitorFn>,

    pub GetCurrentThreadCpuTime: Option<JvmpiCpuTimeFn>,
    pub SuspendThread: Option<JvmpiThreadFn>,
    pub ResumeThread: Option<JvmpiThreadFn>,
    pub GetThreadStatus: Option<JvmpiThreadStatusFn>,
    pub ThreadHasRun: Option<JvmpiThreadHasRunFn>,
    pub CreateSystemThread: Option<JvmpiCreateSystemThreadFn>,

    pub SetThreadLocalStorage: Option<JvmpiSetThreadLocalFn>,
    pub GetThreadLocalStorage: Option<JvmpiGetThreadLocalFn>,

    pub DisableGC: Option<JvmpiGcFn>,
    pub EnableGC: Option<JvmpiGcFn>,
    pub RunGC: Option<JvmpiGcFn>,

    pub GetThreadObject: Option<JvmpiGetThreadObjectFn>,
    pub GetMethodClass: Option<JvmpiGetMethodClassFn>,

    pub jobjectID2jobject: Option<JvmpiObjectIdToJobjectFn>,
    pub jobject2jobjectID: Option<JvmpiJobjectToObjectIdFn>,

    pub SuspendThreadList: Option<JvmpiThreadListFn>,
    pub ResumeThreadList: Option<JvmpiThreadListFn>,
}
