//! JNI wrappers for protect and unprotect.

use dpapi::{ProtectOptions, Scope};
use jni::JNIEnv;
use jni::objects::{JByteArray, JClass, JString};
use jni::sys::{JNI_FALSE, JNI_TRUE, jboolean, jbyteArray, jobject};

use super::{
    read_bytes, read_string, throw_jni_error, throw_null_pointer, to_java_bytes,
    to_java_unprotected,
};

// ── Protection ───────────────────────────────────────────────────────────

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_dpapi_bridge_NativeBridge_protect(
    mut env: JNIEnv,
    _class: JClass,
    input: JByteArray,
    entropy: JByteArray,
    local_machine: jboolean,
) -> jbyteArray {
    let input = match read_bytes(&mut env, &input) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return throw_null_pointer(&mut env, "Must provide input"),
        Err(err) => return throw_jni_error(&mut env, err),
    };
    let entropy = match read_bytes(&mut env, &entropy) {
        Ok(bytes) => bytes,
        Err(err) => return throw_jni_error(&mut env, err),
    };
    let scope = Scope::from_local_machine(local_machine != JNI_FALSE);

    let result = dpapi::protect(&input, entropy.as_deref().map(Vec::as_slice), scope);
    to_java_bytes(&mut env, result)
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_dpapi_bridge_NativeBridge_unprotect(
    mut env: JNIEnv,
    _class: JClass,
    input: JByteArray,
    entropy: JByteArray,
) -> jbyteArray {
    let input = match read_bytes(&mut env, &input) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return throw_null_pointer(&mut env, "Must provide input"),
        Err(err) => return throw_jni_error(&mut env, err),
    };
    let entropy = match read_bytes(&mut env, &entropy) {
        Ok(bytes) => bytes,
        Err(err) => return throw_jni_error(&mut env, err),
    };

    let result = dpapi::unprotect(&input, entropy.as_deref().map(Vec::as_slice));
    to_java_bytes(&mut env, result)
}

// ── Descriptions ─────────────────────────────────────────────────────────

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_dpapi_bridge_NativeBridge_protectWithDescription(
    mut env: JNIEnv,
    _class: JClass,
    input: JByteArray,
    entropy: JByteArray,
    local_machine: jboolean,
    description: JString,
) -> jbyteArray {
    let input = match read_bytes(&mut env, &input) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return throw_null_pointer(&mut env, "Must provide input"),
        Err(err) => return throw_jni_error(&mut env, err),
    };
    let entropy = match read_bytes(&mut env, &entropy) {
        Ok(bytes) => bytes,
        Err(err) => return throw_jni_error(&mut env, err),
    };
    let description = match read_string(&mut env, &description) {
        Ok(description) => description,
        Err(err) => return throw_jni_error(&mut env, err),
    };
    let mut options = ProtectOptions::new(Scope::from_local_machine(local_machine != JNI_FALSE));
    options.description = description;

    let result =
        dpapi::protect_with_options(&input, entropy.as_deref().map(Vec::as_slice), &options);
    to_java_bytes(&mut env, result)
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_dpapi_bridge_NativeBridge_unprotectWithDescription(
    mut env: JNIEnv,
    _class: JClass,
    input: JByteArray,
    entropy: JByteArray,
) -> jobject {
    let input = match read_bytes(&mut env, &input) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return throw_null_pointer(&mut env, "Must provide input"),
        Err(err) => return throw_jni_error(&mut env, err),
    };
    let entropy = match read_bytes(&mut env, &entropy) {
        Ok(bytes) => bytes,
        Err(err) => return throw_jni_error(&mut env, err),
    };

    let result = dpapi::unprotect_with_description(&input, entropy.as_deref().map(Vec::as_slice));
    to_java_unprotected(&mut env, result)
}

// ── Platform ─────────────────────────────────────────────────────────────

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_dpapi_bridge_NativeBridge_isSupported(
    _env: JNIEnv,
    _class: JClass,
) -> jboolean {
    if dpapi::is_supported() { JNI_TRUE } else { JNI_FALSE }
}
