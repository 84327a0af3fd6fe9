//! C ABI exports for the Windows data protection bridge.
//!
//! This crate exposes [`dpapi`] to managed runtimes:
//! - .NET and other FFI hosts (P/Invoke against the `dpapi_*` exports)
//! - the JVM (JNI, behind the `jni` feature)
//!
//! All functions use C-compatible types and report failure via [`DpapiError`].
//! When a call returns [`DpapiError::ProtectionFailed`], the OS error code and
//! message are available on the same thread from [`dpapi_last_error_code`]
//! and [`dpapi_last_error_message`].

#[cfg(feature = "jni")]
mod jvm;

use dpapi::{ProtectOptions, ProtectionError, ProtectionResult, Scope};
use std::cell::RefCell;
use std::ffi::{CStr, CString, c_char};
use std::ptr;
use thiserror::Error;
use tracing::warn;
use zeroize::Zeroize;

/// Status codes returned by FFI functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DpapiError {
    /// Operation succeeded.
    #[error("ok")]
    Ok = 0,
    /// Null pointer argument.
    #[error("null pointer argument")]
    NullPointer = 1,
    /// Invalid UTF-8 string.
    #[error("invalid UTF-8 string")]
    InvalidUtf8 = 2,
    /// Inconsistent pointer/length pair.
    #[error("invalid argument")]
    InvalidArgument = 3,
    /// The OS rejected the request; see `dpapi_last_error_*`.
    #[error("protection failed")]
    ProtectionFailed = 4,
}

thread_local! {
    static LAST_ERROR: RefCell<Option<ProtectionError>> = const { RefCell::new(None) };
}

fn set_last_error(err: ProtectionError) {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(err));
}

fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

fn last_error() -> Option<ProtectionError> {
    LAST_ERROR.with(|slot| slot.borrow().clone())
}

/// Reads a required input buffer. Null is accepted only for an empty buffer.
unsafe fn input_slice<'a>(data: *const u8, len: usize) -> Result<&'a [u8], DpapiError> {
    if data.is_null() {
        return if len == 0 { Ok(&[]) } else { Err(DpapiError::NullPointer) };
    }
    // SAFETY: caller guarantees `len` readable bytes at `data`.
    Ok(unsafe { std::slice::from_raw_parts(data, len) })
}

/// Reads optional entropy. Null means absent; a non-null pointer with length 0
/// is an explicit empty entropy.
unsafe fn entropy_slice<'a>(
    entropy: *const u8,
    len: usize,
) -> Result<Option<&'a [u8]>, DpapiError> {
    if entropy.is_null() {
        return if len == 0 { Ok(None) } else { Err(DpapiError::InvalidArgument) };
    }
    // SAFETY: caller guarantees `len` readable bytes at `entropy`.
    Ok(Some(unsafe { std::slice::from_raw_parts(entropy, len) }))
}

unsafe fn optional_cstr<'a>(s: *const c_char) -> Result<Option<&'a str>, DpapiError> {
    if s.is_null() {
        return Ok(None);
    }
    // SAFETY: caller guarantees a NUL-terminated string.
    match unsafe { CStr::from_ptr(s) }.to_str() {
        Ok(s) => Ok(Some(s)),
        Err(_) => Err(DpapiError::InvalidUtf8),
    }
}

/// Hands `data` to the caller; it must be released with `dpapi_free_bytes`.
unsafe fn write_bytes(data: Vec<u8>, out_data: *mut *mut u8, out_len: *mut usize) {
    let boxed = data.into_boxed_slice();
    // SAFETY: out-pointers were checked for null by the caller.
    unsafe {
        *out_len = boxed.len();
        *out_data = Box::into_raw(boxed) as *mut u8;
    }
}

fn fail(status: DpapiError) -> DpapiError {
    warn!("rejected FFI call: {status}");
    status
}

fn record(err: ProtectionError) -> DpapiError {
    set_last_error(err);
    DpapiError::ProtectionFailed
}

unsafe fn run_protect(
    data: *const u8,
    data_len: usize,
    entropy: *const u8,
    entropy_len: usize,
    options: Result<ProtectOptions, DpapiError>,
    out_data: *mut *mut u8,
    out_len: *mut usize,
) -> DpapiError { unsafe {
    clear_last_error();
    if out_data.is_null() || out_len.is_null() {
        return fail(DpapiError::NullPointer);
    }
    *out_data = ptr::null_mut();
    *out_len = 0;

    let input = match input_slice(data, data_len) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let entropy = match entropy_slice(entropy, entropy_len) {
        Ok(e) => e,
        Err(e) => return fail(e),
    };
    let options = match options {
        Ok(o) => o,
        Err(e) => return fail(e),
    };

    match dpapi::protect_with_options(input, entropy, &options) {
        Ok(sealed) => {
            write_bytes(sealed, out_data, out_len);
            DpapiError::Ok
        }
        Err(err) => record(err),
    }
}}

unsafe fn run_unprotect(
    data: *const u8,
    data_len: usize,
    entropy: *const u8,
    entropy_len: usize,
    out_data: *mut *mut u8,
    out_len: *mut usize,
    out_description: Option<*mut *mut c_char>,
) -> DpapiError { unsafe {
    clear_last_error();
    if out_data.is_null()
        || out_len.is_null()
        || out_description.is_some_and(|p| p.is_null())
    {
        return fail(DpapiError::NullPointer);
    }
    *out_data = ptr::null_mut();
    *out_len = 0;
    if let Some(out_description) = out_description {
        *out_description = ptr::null_mut();
    }

    let input = match input_slice(data, data_len) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let entropy = match entropy_slice(entropy, entropy_len) {
        Ok(e) => e,
        Err(e) => return fail(e),
    };

    let result: ProtectionResult<_> = match out_description {
        Some(_) => dpapi::unprotect_with_description(input, entropy),
        None => dpapi::unprotect(input, entropy).map(|data| dpapi::Unprotected {
            data,
            description: None,
        }),
    };
    match result {
        Ok(opened) => {
            write_bytes(opened.data, out_data, out_len);
            if let (Some(out_description), Some(description)) =
                (out_description, opened.description)
            {
                *out_description = CString::new(description)
                    .map(CString::into_raw)
                    .unwrap_or(ptr::null_mut());
            }
            DpapiError::Ok
        }
        Err(err) => record(err),
    }
}}

// ============================================================================
// Core Functions
// ============================================================================

/// Installs a stderr `tracing` subscriber filtered by `RUST_LOG` (default
/// `info`). Calling it more than once has no effect.
#[unsafe(no_mangle)]
pub extern "C" fn dpapi_init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Returns the library version as a string.
///
/// # Safety
/// - The returned string is statically allocated and must not be freed.
#[unsafe(no_mangle)]
pub extern "C" fn dpapi_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

/// Returns true when the OS data-protection API is available.
#[unsafe(no_mangle)]
pub extern "C" fn dpapi_is_supported() -> bool {
    dpapi::is_supported()
}

// ============================================================================
// Protection Functions
// ============================================================================

/// Protects a buffer for the current user, or for the machine when
/// `local_machine` is true.
///
/// # Safety
/// - `data` must point to `data_len` readable bytes, or be null with `data_len == 0`.
/// - `entropy` must point to `entropy_len` readable bytes, or be null (absent)
///   with `entropy_len == 0`.
/// - `out_data` and `out_len` must be valid pointers.
/// - The returned data must be freed with `dpapi_free_bytes`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dpapi_protect(
    data: *const u8,
    data_len: usize,
    entropy: *const u8,
    entropy_len: usize,
    local_machine: bool,
    out_data: *mut *mut u8,
    out_len: *mut usize,
) -> DpapiError { unsafe {
    let options = Ok(ProtectOptions::new(Scope::from_local_machine(local_machine)));
    run_protect(data, data_len, entropy, entropy_len, options, out_data, out_len)
}}

/// Like `dpapi_protect`, also storing `description` in the blob.
///
/// # Safety
/// - Same as `dpapi_protect`.
/// - `description` must be a valid null-terminated UTF-8 string, or null for none.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dpapi_protect_with_description(
    data: *const u8,
    data_len: usize,
    entropy: *const u8,
    entropy_len: usize,
    local_machine: bool,
    description: *const c_char,
    out_data: *mut *mut u8,
    out_len: *mut usize,
) -> DpapiError { unsafe {
    let options = optional_cstr(description).map(|description| ProtectOptions {
        scope: Scope::from_local_machine(local_machine),
        description: description.map(str::to_owned),
    });
    run_protect(data, data_len, entropy, entropy_len, options, out_data, out_len)
}}

/// Recovers a buffer produced by `dpapi_protect`.
///
/// # Safety
/// - `data` and `entropy` follow the rules of `dpapi_protect`.
/// - `out_data` and `out_len` must be valid pointers.
/// - The returned data must be freed with `dpapi_free_bytes`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dpapi_unprotect(
    data: *const u8,
    data_len: usize,
    entropy: *const u8,
    entropy_len: usize,
    out_data: *mut *mut u8,
    out_len: *mut usize,
) -> DpapiError { unsafe {
    run_unprotect(data, data_len, entropy, entropy_len, out_data, out_len, None)
}}

/// Like `dpapi_unprotect`, also returning the stored description.
///
/// # Safety
/// - Same as `dpapi_unprotect`.
/// - `out_description` must be a valid pointer. It receives null when the blob
///   has no description; otherwise a string to free with `dpapi_free_string`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dpapi_unprotect_with_description(
    data: *const u8,
    data_len: usize,
    entropy: *const u8,
    entropy_len: usize,
    out_data: *mut *mut u8,
    out_len: *mut usize,
    out_description: *mut *mut c_char,
) -> DpapiError { unsafe {
    run_unprotect(
        data,
        data_len,
        entropy,
        entropy_len,
        out_data,
        out_len,
        Some(out_description),
    )
}}

// ============================================================================
// Error Reporting
// ============================================================================

/// Returns the OS error code of this thread's last failed call, or 0.
#[unsafe(no_mangle)]
pub extern "C" fn dpapi_last_error_code() -> u32 {
    last_error().map_or(0, |err| err.code())
}

/// Returns the message of this thread's last failed call, formatted as
/// `"<description> (error code <code>)"`, or null.
///
/// # Safety
/// - The returned string must be freed with `dpapi_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn dpapi_last_error_message() -> *mut c_char {
    match last_error() {
        Some(err) => CString::new(err.message())
            .map(CString::into_raw)
            .unwrap_or(ptr::null_mut()),
        None => ptr::null_mut(),
    }
}

// ============================================================================
// Memory
// ============================================================================

/// Frees a string allocated by this library.
///
/// # Safety
/// - `s` must be a string allocated by this library, or null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dpapi_free_string(s: *mut c_char) { unsafe {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}}

/// Wipes and frees a byte buffer allocated by this library.
///
/// # Safety
/// - `data` must be a pointer allocated by this library with length `len`, or null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dpapi_free_bytes(data: *mut u8, len: usize) { unsafe {
    if !data.is_null() && len > 0 {
        let mut boxed = Box::from_raw(std::slice::from_raw_parts_mut(data, len));
        boxed.zeroize();
        drop(boxed);
    }
}}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn take_bytes(data: *mut u8, len: usize) -> Vec<u8> {
        let copy = if len == 0 {
            Vec::new()
        } else {
            unsafe { std::slice::from_raw_parts(data, len) }.to_vec()
        };
        unsafe { dpapi_free_bytes(data, len) };
        copy
    }

    fn take_string(s: *mut c_char) -> Option<String> {
        if s.is_null() {
            return None;
        }
        let copy = unsafe { CStr::from_ptr(s) }.to_str().unwrap().to_owned();
        unsafe { dpapi_free_string(s) };
        Some(copy)
    }

    #[test]
    fn entropy_slice_distinguishes_absent_from_empty() {
        let empty = [0u8; 0];
        assert_eq!(unsafe { entropy_slice(empty.as_ptr(), 0) }, Ok(Some(&[][..])));
        assert_eq!(unsafe { entropy_slice(ptr::null(), 0) }, Ok(None));
    }

    #[test]
    fn entropy_slice_rejects_null_with_length() {
        assert_eq!(unsafe { entropy_slice(ptr::null(), 4) }, Err(DpapiError::InvalidArgument));
    }

    #[test]
    fn version_returns_valid_string() {
        let version = dpapi_version();
        assert!(!version.is_null());
        let version_str = unsafe { CStr::from_ptr(version) }.to_str().unwrap();
        assert_eq!(version_str, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn supported_matches_core() {
        assert_eq!(dpapi_is_supported(), dpapi::is_supported());
    }

    #[test]
    fn init_logging_is_idempotent() {
        dpapi_init_logging();
        dpapi_init_logging();
    }

    #[test]
    fn protect_with_null_out_pointers_returns_error() {
        let data = b"value";
        let result = unsafe {
            dpapi_protect(
                data.as_ptr(),
                data.len(),
                ptr::null(),
                0,
                false,
                ptr::null_mut(),
                ptr::null_mut(),
            )
        };
        assert_eq!(result, DpapiError::NullPointer);
    }

    #[test]
    fn protect_with_null_data_and_length_returns_error() {
        let mut out_data = ptr::null_mut();
        let mut out_len = 0;
        let result = unsafe {
            dpapi_protect(ptr::null(), 4, ptr::null(), 0, false, &mut out_data, &mut out_len)
        };
        assert_eq!(result, DpapiError::NullPointer);
        assert!(out_data.is_null());
        assert_eq!(out_len, 0);
    }

    #[test]
    fn null_entropy_with_length_is_invalid() {
        let data = b"value";
        let mut out_data = ptr::null_mut();
        let mut out_len = 0;
        let result = unsafe {
            dpapi_unprotect(data.as_ptr(), data.len(), ptr::null(), 8, &mut out_data, &mut out_len)
        };
        assert_eq!(result, DpapiError::InvalidArgument);
        assert_eq!(dpapi_last_error_code(), 0);
    }

    #[test]
    fn invalid_utf8_description_is_rejected() {
        let data = b"value";
        let description = [0xffu8, 0xfe, 0x00];
        let mut out_data = ptr::null_mut();
        let mut out_len = 0;
        let result = unsafe {
            dpapi_protect_with_description(
                data.as_ptr(),
                data.len(),
                ptr::null(),
                0,
                false,
                description.as_ptr() as *const c_char,
                &mut out_data,
                &mut out_len,
            )
        };
        assert_eq!(result, DpapiError::InvalidUtf8);
    }

    #[test]
    fn unprotect_with_description_requires_out_description() {
        let data = b"value";
        let mut out_data = ptr::null_mut();
        let mut out_len = 0;
        let result = unsafe {
            dpapi_unprotect_with_description(
                data.as_ptr(),
                data.len(),
                ptr::null(),
                0,
                &mut out_data,
                &mut out_len,
                ptr::null_mut(),
            )
        };
        assert_eq!(result, DpapiError::NullPointer);
    }

    #[test]
    fn no_last_error_message_before_failure() {
        clear_last_error();
        assert_eq!(dpapi_last_error_code(), 0);
        assert!(dpapi_last_error_message().is_null());
    }

    #[test]
    fn free_functions_accept_null() {
        unsafe {
            dpapi_free_bytes(ptr::null_mut(), 0);
            dpapi_free_bytes(ptr::null_mut(), 16);
            dpapi_free_string(ptr::null_mut());
        }
    }

    #[test]
    fn status_display() {
        assert_eq!(DpapiError::ProtectionFailed.to_string(), "protection failed");
        assert_eq!(DpapiError::ProtectionFailed as i32, 4);
    }

    #[cfg(not(windows))]
    #[test]
    fn protect_reports_not_supported() {
        let data = b"an input value";
        let entropy = b"some entropy";
        let mut out_data = ptr::null_mut();
        let mut out_len = 0;
        let result = unsafe {
            dpapi_protect(
                data.as_ptr(),
                data.len(),
                entropy.as_ptr(),
                entropy.len(),
                true,
                &mut out_data,
                &mut out_len,
            )
        };
        assert_eq!(result, DpapiError::ProtectionFailed);
        assert!(out_data.is_null());
        assert_eq!(dpapi_last_error_code(), dpapi::ERROR_NOT_SUPPORTED);
        assert_eq!(
            take_string(dpapi_last_error_message()).as_deref(),
            Some("The request is not supported. (error code 50)")
        );
    }

    #[cfg(not(windows))]
    #[test]
    fn unprotect_reports_not_supported() {
        let mut out_data = ptr::null_mut();
        let mut out_len = 0;
        let result = unsafe {
            dpapi_unprotect(ptr::null(), 0, ptr::null(), 0, &mut out_data, &mut out_len)
        };
        assert_eq!(result, DpapiError::ProtectionFailed);
        assert_eq!(dpapi_last_error_code(), dpapi::ERROR_NOT_SUPPORTED);
        assert_eq!(take_bytes(out_data, out_len), Vec::<u8>::new());
    }

    #[cfg(windows)]
    #[test]
    fn protect_unprotect_roundtrip() {
        let data = b"an input value";
        let entropy = b"some entropy";

        let mut sealed = ptr::null_mut();
        let mut sealed_len = 0;
        let result = unsafe {
            dpapi_protect(
                data.as_ptr(),
                data.len(),
                entropy.as_ptr(),
                entropy.len(),
                false,
                &mut sealed,
                &mut sealed_len,
            )
        };
        assert_eq!(result, DpapiError::Ok);
        let sealed = take_bytes(sealed, sealed_len);

        let mut opened = ptr::null_mut();
        let mut opened_len = 0;
        let result = unsafe {
            dpapi_unprotect(
                sealed.as_ptr(),
                sealed.len(),
                entropy.as_ptr(),
                entropy.len(),
                &mut opened,
                &mut opened_len,
            )
        };
        assert_eq!(result, DpapiError::Ok);
        assert_eq!(take_bytes(opened, opened_len), data.to_vec());
    }

    #[cfg(windows)]
    #[test]
    fn empty_entropy_roundtrip() {
        let data = b"an input value";
        let entropy = [0u8; 0];

        let mut sealed = ptr::null_mut();
        let mut sealed_len = 0;
        let result = unsafe {
            dpapi_protect(
                data.as_ptr(),
                data.len(),
                entropy.as_ptr(),
                0,
                false,
                &mut sealed,
                &mut sealed_len,
            )
        };
        assert_eq!(result, DpapiError::Ok);
        let sealed = take_bytes(sealed, sealed_len);

        let mut opened = ptr::null_mut();
        let mut opened_len = 0;
        let result = unsafe {
            dpapi_unprotect(
                sealed.as_ptr(),
                sealed.len(),
                entropy.as_ptr(),
                0,
                &mut opened,
                &mut opened_len,
            )
        };
        assert_eq!(result, DpapiError::Ok);
        assert_eq!(take_bytes(opened, opened_len), data.to_vec());
    }

    #[cfg(windows)]
    #[test]
    fn wrong_entropy_sets_last_error() {
        let data = b"an input value";
        let sealed = dpapi::protect(data, Some(b"some entropy"), Scope::CurrentUser).unwrap();
        let other = b"different entropy";

        let mut out_data = ptr::null_mut();
        let mut out_len = 0;
        let result = unsafe {
            dpapi_unprotect(
                sealed.as_ptr(),
                sealed.len(),
                other.as_ptr(),
                other.len(),
                &mut out_data,
                &mut out_len,
            )
        };
        assert_eq!(result, DpapiError::ProtectionFailed);
        assert_eq!(dpapi_last_error_code(), dpapi::ERROR_INVALID_DATA);
        let message = take_string(dpapi_last_error_message()).unwrap();
        assert!(message.ends_with("(error code 13)"));
    }

    #[cfg(windows)]
    #[test]
    fn description_roundtrip() {
        let data = b"an input value";
        let description = CString::new("vault key").unwrap();

        let mut sealed = ptr::null_mut();
        let mut sealed_len = 0;
        let result = unsafe {
            dpapi_protect_with_description(
                data.as_ptr(),
                data.len(),
                ptr::null(),
                0,
                false,
                description.as_ptr(),
                &mut sealed,
                &mut sealed_len,
            )
        };
        assert_eq!(result, DpapiError::Ok);
        let sealed = take_bytes(sealed, sealed_len);

        let mut opened = ptr::null_mut();
        let mut opened_len = 0;
        let mut stored = ptr::null_mut();
        let result = unsafe {
            dpapi_unprotect_with_description(
                sealed.as_ptr(),
                sealed.len(),
                ptr::null(),
                0,
                &mut opened,
                &mut opened_len,
                &mut stored,
            )
        };
        assert_eq!(result, DpapiError::Ok);
        assert_eq!(take_bytes(opened, opened_len), data.to_vec());
        assert_eq!(take_string(stored).as_deref(), Some("vault key"));
    }
}
