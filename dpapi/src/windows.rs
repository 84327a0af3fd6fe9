//! DPAPI calls on Windows.

use crate::blob::{BorrowedBlob, LocalBlob, LocalWideString, to_wide};
use crate::error::{ProtectionError, ProtectionResult};
use crate::options::ProtectOptions;
use crate::scope::{self, CRYPTPROTECT_LOCAL_MACHINE, CRYPTPROTECT_UI_FORBIDDEN};
use std::ptr;
use windows_sys::Win32::Foundation::GetLastError;
use windows_sys::Win32::Security::Cryptography::{
    self as cryptography, CryptProtectData, CryptUnprotectData,
};
use windows_sys::Win32::System::Diagnostics::Debug::{
    FORMAT_MESSAGE_ALLOCATE_BUFFER, FORMAT_MESSAGE_FROM_SYSTEM, FORMAT_MESSAGE_IGNORE_INSERTS,
    FormatMessageW,
};

const _: () = assert!(CRYPTPROTECT_UI_FORBIDDEN == cryptography::CRYPTPROTECT_UI_FORBIDDEN);
const _: () = assert!(CRYPTPROTECT_LOCAL_MACHINE == cryptography::CRYPTPROTECT_LOCAL_MACHINE);

/// MAKELANGID(LANG_NEUTRAL, SUBLANG_DEFAULT)
const LANG_NEUTRAL_SUBLANG_DEFAULT: u32 = 0x0400;

pub(crate) fn protect(
    data: &[u8],
    entropy: Option<&[u8]>,
    options: &ProtectOptions,
) -> ProtectionResult<Vec<u8>> {
    let input = BorrowedBlob::new(data)?;
    let entropy = entropy.map(BorrowedBlob::new).transpose()?;
    let description = options.description.as_deref().map(to_wide).transpose()?;
    let mut output = LocalBlob::ciphertext();

    // SAFETY: every pointer is either null or borrowed for the duration of the call.
    let ok = unsafe {
        CryptProtectData(
            input.as_ptr(),
            description.as_ref().map_or(ptr::null(), |d| d.as_ptr()),
            entropy.as_ref().map_or(ptr::null(), BorrowedBlob::as_ptr),
            ptr::null(),
            ptr::null(),
            options.scope.protect_flags(),
            output.as_mut_ptr(),
        )
    };
    if ok == 0 {
        return Err(last_error());
    }
    Ok(output.to_vec())
}

pub(crate) fn unprotect(
    data: &[u8],
    entropy: Option<&[u8]>,
    want_description: bool,
) -> ProtectionResult<(Vec<u8>, Option<String>)> {
    let input = BorrowedBlob::new(data)?;
    let entropy = entropy.map(BorrowedBlob::new).transpose()?;
    let mut description = LocalWideString::null();
    let mut output = LocalBlob::plaintext();

    // SAFETY: as in `protect`; the description out-pointer is owned by the guard.
    let ok = unsafe {
        CryptUnprotectData(
            input.as_ptr(),
            if want_description {
                description.as_out_ptr()
            } else {
                ptr::null_mut()
            },
            entropy.as_ref().map_or(ptr::null(), BorrowedBlob::as_ptr),
            ptr::null(),
            ptr::null(),
            scope::unprotect_flags(),
            output.as_mut_ptr(),
        )
    };
    if ok == 0 {
        return Err(last_error());
    }
    Ok((output.to_vec(), description.to_string_lossy()))
}

pub(crate) fn describe_error(code: u32) -> String {
    let mut message = LocalWideString::null();
    // SAFETY: with ALLOCATE_BUFFER the buffer argument is an out-pointer to a PWSTR.
    let len = unsafe {
        FormatMessageW(
            FORMAT_MESSAGE_ALLOCATE_BUFFER
                | FORMAT_MESSAGE_FROM_SYSTEM
                | FORMAT_MESSAGE_IGNORE_INSERTS,
            ptr::null(),
            code,
            LANG_NEUTRAL_SUBLANG_DEFAULT,
            message.as_out_ptr().cast(),
            0,
            ptr::null(),
        )
    };
    if len == 0 {
        return "Unknown error".to_string();
    }
    message
        .to_string_lossy()
        .unwrap_or_else(|| "Unknown error".to_string())
}

/// Reads the thread's last OS error. Must run before any other OS call.
fn last_error() -> ProtectionError {
    // SAFETY: no preconditions.
    let code = unsafe { GetLastError() };
    ProtectionError::from_os_code(code)
}
