//! Safe bindings to the Windows data protection API.
//!
//! Wraps `CryptProtectData` and `CryptUnprotectData`:
//! - symmetric protection keyed to the current user or the local machine
//! - optional caller-supplied entropy that must match on both calls
//! - OS failures surfaced as [`ProtectionError`] with the system code and message
//!
//! The OS does all of the cryptography; this crate only marshals buffers and
//! translates errors. Caller buffers are borrowed for the duration of a call
//! and every buffer the OS allocates is released before the call returns.
//!
//! On targets other than Windows the crate still builds, and every call fails
//! with `ERROR_NOT_SUPPORTED` (code 50).
//!
//! ```no_run
//! use dpapi::{Scope, protect, unprotect};
//!
//! let entropy = b"per-install salt";
//! let sealed = protect(b"secret", Some(entropy), Scope::CurrentUser)?;
//! assert_eq!(unprotect(&sealed, Some(entropy))?, b"secret");
//! # Ok::<(), dpapi::ProtectionError>(())
//! ```

mod error;
mod options;
mod scope;

#[cfg(windows)]
mod blob;
#[cfg(windows)]
mod windows;
#[cfg(windows)]
use windows as platform;

#[cfg(not(windows))]
mod unsupported;
#[cfg(not(windows))]
use unsupported as platform;

pub use error::{
    ERROR_INVALID_DATA, ERROR_INVALID_PARAMETER, ERROR_NOT_SUPPORTED, ProtectionError,
    ProtectionResult,
};
pub use options::ProtectOptions;
pub use scope::Scope;

use tracing::{debug, warn};

/// Result of [`unprotect_with_description`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unprotected {
    /// The original bytes.
    pub data: Vec<u8>,
    /// Description stored at protect time, if any.
    pub description: Option<String>,
}

/// Whether this target has the OS data-protection API.
pub fn is_supported() -> bool {
    cfg!(windows)
}

/// Protects `data` for `scope`.
///
/// `entropy` is optional extra secret material; the same value must be given
/// to [`unprotect`]. `None` and `Some(&[])` are passed to the OS as-is (a null
/// pointer versus an empty blob).
pub fn protect(data: &[u8], entropy: Option<&[u8]>, scope: Scope) -> ProtectionResult<Vec<u8>> {
    protect_with_options(data, entropy, &ProtectOptions::new(scope))
}

/// Protects `data` with full [`ProtectOptions`], including a stored description.
pub fn protect_with_options(
    data: &[u8],
    entropy: Option<&[u8]>,
    options: &ProtectOptions,
) -> ProtectionResult<Vec<u8>> {
    debug!(
        len = data.len(),
        scope = ?options.scope,
        has_entropy = entropy.is_some(),
        "protecting data"
    );
    platform::protect(data, entropy, options)
        .inspect_err(|e| warn!(code = e.code(), "protect failed: {e}"))
}

/// Recovers data produced by [`protect`]. Fails if `entropy` differs from the
/// value used at protect time, the blob was altered, or it belongs to another
/// user.
pub fn unprotect(data: &[u8], entropy: Option<&[u8]>) -> ProtectionResult<Vec<u8>> {
    unprotect_inner(data, entropy, false).map(|(data, _)| data)
}

/// Like [`unprotect`], also returning the description stored in the blob.
pub fn unprotect_with_description(
    data: &[u8],
    entropy: Option<&[u8]>,
) -> ProtectionResult<Unprotected> {
    let (data, description) = unprotect_inner(data, entropy, true)?;
    Ok(Unprotected { data, description })
}

fn unprotect_inner(
    data: &[u8],
    entropy: Option<&[u8]>,
    want_description: bool,
) -> ProtectionResult<(Vec<u8>, Option<String>)> {
    debug!(len = data.len(), has_entropy = entropy.is_some(), "unprotecting data");
    platform::unprotect(data, entropy, want_description)
        .inspect_err(|e| warn!(code = e.code(), "unprotect failed: {e}"))
}
