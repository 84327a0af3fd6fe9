//! Protection error type.

use thiserror::Error;

/// Result type for protection operations.
pub type ProtectionResult<T> = Result<T, ProtectionError>;

/// `ERROR_INVALID_DATA`: wrong entropy, tampered blob or scope mismatch.
pub const ERROR_INVALID_DATA: u32 = 13;

/// `ERROR_NOT_SUPPORTED`: raised on every call on non-Windows targets.
pub const ERROR_NOT_SUPPORTED: u32 = 50;

/// `ERROR_INVALID_PARAMETER`: input is not a protected blob, or cannot be
/// expressed to the OS (length or description).
pub const ERROR_INVALID_PARAMETER: u32 = 87;

/// Failure reported by the OS data-protection primitives.
///
/// Carries the numeric OS error code and the system's description of it.
/// The display form is `"<description> (error code <code>)"`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{description} (error code {code})")]
pub struct ProtectionError {
    code: u32,
    description: String,
}

impl ProtectionError {
    /// Creates an error from a code and a description. Trailing whitespace
    /// (system messages end in CRLF) is trimmed.
    pub fn new(code: u32, description: impl Into<String>) -> Self {
        let mut description = description.into();
        description.truncate(description.trim_end().len());
        Self { code, description }
    }

    /// Creates an error for `code`, looking its description up from the system.
    pub fn from_os_code(code: u32) -> Self {
        Self::new(code, crate::platform::describe_error(code))
    }

    /// The OS error code.
    pub fn code(&self) -> u32 {
        self.code
    }

    /// The system description of the code, without the code suffix.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The full caller-facing message.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// True when the OS rejected the blob contents (wrong entropy, tampering,
    /// foreign scope).
    pub fn is_invalid_data(&self) -> bool {
        self.code == ERROR_INVALID_DATA
    }

    /// True when the call failed because the platform has no DPAPI.
    pub fn is_not_supported(&self) -> bool {
        self.code == ERROR_NOT_SUPPORTED
    }
}
