//! Fallback for targets without DPAPI: every call fails with
//! `ERROR_NOT_SUPPORTED`.

use crate::error::{
    ERROR_INVALID_DATA, ERROR_INVALID_PARAMETER, ERROR_NOT_SUPPORTED, ProtectionError,
    ProtectionResult,
};
use crate::options::ProtectOptions;

pub(crate) fn protect(
    _data: &[u8],
    _entropy: Option<&[u8]>,
    _options: &ProtectOptions,
) -> ProtectionResult<Vec<u8>> {
    Err(ProtectionError::from_os_code(ERROR_NOT_SUPPORTED))
}

pub(crate) fn unprotect(
    _data: &[u8],
    _entropy: Option<&[u8]>,
    _want_description: bool,
) -> ProtectionResult<(Vec<u8>, Option<String>)> {
    Err(ProtectionError::from_os_code(ERROR_NOT_SUPPORTED))
}

/// English system text for the codes this crate raises itself.
pub(crate) fn describe_error(code: u32) -> String {
    match code {
        ERROR_INVALID_DATA => "The data is invalid.",
        ERROR_NOT_SUPPORTED => "The request is not supported.",
        ERROR_INVALID_PARAMETER => "The parameter is incorrect.",
        _ => "Unknown error",
    }
    .to_string()
}
