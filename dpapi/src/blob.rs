//! Buffer views handed to the OS and guards over buffers the OS hands back.

use crate::error::{ERROR_INVALID_PARAMETER, ProtectionError, ProtectionResult};
use std::marker::PhantomData;
use std::ptr;
use windows_sys::Win32::Foundation::LocalFree;
use windows_sys::Win32::Security::Cryptography::CRYPT_INTEGER_BLOB;
use windows_sys::core::PWSTR;
use zeroize::Zeroize;

/// A caller slice described as a `DATA_BLOB`. Borrows the slice, so the view
/// cannot outlive the memory it points at.
pub(crate) struct BorrowedBlob<'a> {
    raw: CRYPT_INTEGER_BLOB,
    _bytes: PhantomData<&'a [u8]>,
}

impl<'a> BorrowedBlob<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> ProtectionResult<Self> {
        let len = u32::try_from(bytes.len())
            .map_err(|_| ProtectionError::from_os_code(ERROR_INVALID_PARAMETER))?;
        Ok(Self {
            raw: CRYPT_INTEGER_BLOB {
                cbData: len,
                // The OS only reads input blobs.
                pbData: bytes.as_ptr().cast_mut(),
            },
            _bytes: PhantomData,
        })
    }

    pub(crate) fn as_ptr(&self) -> *const CRYPT_INTEGER_BLOB {
        &self.raw
    }
}

/// Output blob allocated by the OS with `LocalAlloc`. Released with
/// `LocalFree` on drop; wiped first when it may hold plaintext.
pub(crate) struct LocalBlob {
    raw: CRYPT_INTEGER_BLOB,
    wipe: bool,
}

impl LocalBlob {
    pub(crate) fn ciphertext() -> Self {
        Self::empty(false)
    }

    pub(crate) fn plaintext() -> Self {
        Self::empty(true)
    }

    fn empty(wipe: bool) -> Self {
        Self {
            raw: CRYPT_INTEGER_BLOB {
                cbData: 0,
                pbData: ptr::null_mut(),
            },
            wipe,
        }
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut CRYPT_INTEGER_BLOB {
        &mut self.raw
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        if self.raw.pbData.is_null() || self.raw.cbData == 0 {
            return &[];
        }
        // SAFETY: the OS filled pbData/cbData with a live LocalAlloc buffer.
        unsafe { std::slice::from_raw_parts(self.raw.pbData, self.raw.cbData as usize) }
    }

    pub(crate) fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }
}

impl Drop for LocalBlob {
    fn drop(&mut self) {
        if self.raw.pbData.is_null() {
            return;
        }
        if self.wipe && self.raw.cbData > 0 {
            // SAFETY: see `as_slice`; we hold the only reference.
            let bytes = unsafe {
                std::slice::from_raw_parts_mut(self.raw.pbData, self.raw.cbData as usize)
            };
            bytes.zeroize();
        }
        // SAFETY: pbData was allocated by the OS with LocalAlloc.
        unsafe { LocalFree(self.raw.pbData.cast()) };
    }
}

/// NUL-terminated UTF-16 string allocated by the OS with `LocalAlloc`.
pub(crate) struct LocalWideString(PWSTR);

impl LocalWideString {
    pub(crate) fn null() -> Self {
        Self(ptr::null_mut())
    }

    /// Out-parameter for OS calls that allocate the string.
    pub(crate) fn as_out_ptr(&mut self) -> *mut PWSTR {
        &mut self.0
    }

    /// Decodes the string; `None` when null or empty.
    pub(crate) fn to_string_lossy(&self) -> Option<String> {
        if self.0.is_null() {
            return None;
        }
        // SAFETY: the OS returned a NUL-terminated string.
        let len = unsafe { wide_len(self.0) };
        if len == 0 {
            return None;
        }
        // SAFETY: `len` units up to the terminator are readable.
        let units = unsafe { std::slice::from_raw_parts(self.0, len) };
        Some(String::from_utf16_lossy(units))
    }
}

impl Drop for LocalWideString {
    fn drop(&mut self) {
        if !self.0.is_null() {
            // SAFETY: allocated by the OS with LocalAlloc.
            unsafe { LocalFree(self.0.cast()) };
        }
    }
}

/// Encodes `s` as NUL-terminated UTF-16 for the OS. Interior NULs would
/// silently truncate the string, so they are rejected.
pub(crate) fn to_wide(s: &str) -> ProtectionResult<Vec<u16>> {
    if s.contains('\0') {
        return Err(ProtectionError::from_os_code(ERROR_INVALID_PARAMETER));
    }
    Ok(s.encode_utf16().chain(std::iter::once(0)).collect())
}

unsafe fn wide_len(s: *const u16) -> usize {
    let mut len = 0;
    // SAFETY: caller guarantees a NUL terminator.
    while unsafe { *s.add(len) } != 0 {
        len += 1;
    }
    len
}
