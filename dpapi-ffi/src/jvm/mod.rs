//! JNI bridge. Maps the Java `NativeBridge` native methods onto [`dpapi`].
//!
//! All functions follow the naming convention:
//!   `Java_com_dpapi_bridge_NativeBridge_<methodName>`
//!
//! Failures never return partial results: the function returns null with a
//! pending Java exception.

mod native_bridge;

use dpapi::{ProtectionError, ProtectionResult, Unprotected};
use jni::JNIEnv;
use jni::objects::{JByteArray, JObject, JString, JThrowable, JValue};
use jni::sys::{jbyteArray, jint, jobject};
use std::ptr;
use tracing::warn;
use zeroize::Zeroizing;

/// Thrown with `(String message, int code)` when the OS rejects a call.
pub(crate) const PROTECTION_EXCEPTION: &str = "com/dpapi/bridge/DataProtectionException";

/// Built with `(byte[] data, String description)` by `unprotectWithDescription`.
const UNPROTECTED_DATA: &str = "com/dpapi/bridge/UnprotectedData";

const NULL_POINTER_EXCEPTION: &str = "java/lang/NullPointerException";
const ILLEGAL_STATE_EXCEPTION: &str = "java/lang/IllegalStateException";

/// Copies a Java byte array. `Ok(None)` for a null reference. The copy is
/// wiped on drop.
pub(crate) fn read_bytes(
    env: &mut JNIEnv,
    array: &JByteArray,
) -> jni::errors::Result<Option<Zeroizing<Vec<u8>>>> {
    if array.is_null() {
        return Ok(None);
    }
    env.convert_byte_array(array).map(|bytes| Some(Zeroizing::new(bytes)))
}

/// Reads an optional Java string. `Ok(None)` for a null reference.
pub(crate) fn read_string(env: &mut JNIEnv, s: &JString) -> jni::errors::Result<Option<String>> {
    if s.is_null() {
        return Ok(None);
    }
    env.get_string(s).map(|s| Some(s.into()))
}

/// Throws `NullPointerException(message)`; returns null for the caller to hand back.
pub(crate) fn throw_null_pointer(env: &mut JNIEnv, message: &str) -> jbyteArray {
    let _ = env.throw_new(NULL_POINTER_EXCEPTION, message);
    ptr::null_mut()
}

/// Surfaces a JNI failure. Leaves an exception the JVM already raised in place.
pub(crate) fn throw_jni_error(env: &mut JNIEnv, err: jni::errors::Error) -> jbyteArray {
    if !env.exception_check().unwrap_or(false) {
        let _ = env.throw_new(ILLEGAL_STATE_EXCEPTION, err.to_string());
    }
    ptr::null_mut()
}

/// Throws `DataProtectionException` carrying the OS code. Falls back to the
/// message-only constructor when the `(String, int)` one is missing.
pub(crate) fn throw_protection_error(env: &mut JNIEnv, err: &ProtectionError) {
    warn!(code = err.code(), "throwing {PROTECTION_EXCEPTION}: {err}");
    if throw_with_code(env, err).is_err() {
        let _ = env.exception_clear();
        let _ = env.throw_new(PROTECTION_EXCEPTION, err.message());
    }
}

fn throw_with_code(env: &mut JNIEnv, err: &ProtectionError) -> jni::errors::Result<()> {
    let message = env.new_string(err.message())?;
    // HRESULT-style codes above i32::MAX keep their bit pattern, as Java ints do.
    let code = err.code() as jint;
    let exception = env.new_object(
        PROTECTION_EXCEPTION,
        "(Ljava/lang/String;I)V",
        &[JValue::Object(&message), JValue::Int(code)],
    )?;
    env.throw(JThrowable::from(exception))
}

/// Converts a protection result into a Java byte array, or null with a
/// pending exception.
pub(crate) fn to_java_bytes(env: &mut JNIEnv, result: ProtectionResult<Vec<u8>>) -> jbyteArray {
    match result {
        Ok(bytes) => {
            let bytes = Zeroizing::new(bytes);
            match env.byte_array_from_slice(&bytes) {
                Ok(array) => array.into_raw(),
                Err(err) => throw_jni_error(env, err),
            }
        }
        Err(err) => {
            throw_protection_error(env, &err);
            ptr::null_mut()
        }
    }
}

/// Converts an unprotect result into an `UnprotectedData`, or null with a
/// pending exception.
pub(crate) fn to_java_unprotected(
    env: &mut JNIEnv,
    result: ProtectionResult<Unprotected>,
) -> jobject {
    let opened = match result {
        Ok(opened) => opened,
        Err(err) => {
            throw_protection_error(env, &err);
            return ptr::null_mut();
        }
    };
    match new_unprotected(env, opened) {
        Ok(object) => object.into_raw(),
        Err(err) => throw_jni_error(env, err),
    }
}

fn new_unprotected<'local>(
    env: &mut JNIEnv<'local>,
    opened: Unprotected,
) -> jni::errors::Result<JObject<'local>> {
    let data = Zeroizing::new(opened.data);
    let array = env.byte_array_from_slice(&data)?;
    let description = match opened.description {
        Some(description) => JObject::from(env.new_string(description)?),
        None => JObject::null(),
    };
    env.new_object(
        UNPROTECTED_DATA,
        "([BLjava/lang/String;)V",
        &[JValue::Object(&array), JValue::Object(&description)],
    )
}
