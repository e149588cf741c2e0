// jvm-native-bridge/src/sys/jni.rs
//
// The slice of the JNI ABI that the native bridge touches: primitive and
// reference types, status codes, and the shape of the per-library
// initializer (`JNI_OnLoad`).
//
// The invocation and native-interface vtables are owned by the interpreter;
// the bridge only ever passes `JavaVM*` / `JNIEnv*` through, so both are
// opaque here.

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]

use std::ffi::c_void;

// =============================================================================
// Primitive Types
// =============================================================================

pub type jint = i32;
pub type jlong = i64;
pub type jboolean = u8;

// =============================================================================
// Reference Types (opaque pointers)
// =============================================================================

pub type jobject = *mut c_void;

pub type jmethodID = *mut c_void;

// =============================================================================
// Constants
// =============================================================================

pub const JNI_OK: jint = 0;
pub const JNI_ERR: jint = -1;
pub const JNI_EVERSION: jint = -3;

pub const JNI_TRUE: jboolean = 1;
pub const JNI_FALSE: jboolean = 0;

pub const JNI_VERSION_1_4: jint = 0x00010004;

// =============================================================================
// Opaque VM structures
// =============================================================================

/// Opaque invocation interface; only ever handled by pointer.
#[repr(C)]
pub struct JavaVM {
    _private: [u8; 0],
}

/// Opaque per-thread native interface; only ever handled by pointer.
#[repr(C)]
pub struct JNIEnv {
    _private: [u8; 0],
}

/// Symbol looked up in every freshly opened library.
pub const JNI_ONLOAD_SYMBOL: &str = "JNI_OnLoad";

/// `jint JNI_OnLoad(JavaVM *vm, void *reserved)`
pub type JNI_OnLoad = unsafe extern "system" fn(vm: *mut JavaVM, reserved: *mut c_void) -> jint;
