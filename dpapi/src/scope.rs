//! Protection scope and the flag word passed to the OS.

use serde::{Deserialize, Serialize};

/// Never show UI; fail instead.
pub(crate) const CRYPTPROTECT_UI_FORBIDDEN: u32 = 0x1;

/// Bind the blob to the machine rather than the calling user.
pub(crate) const CRYPTPROTECT_LOCAL_MACHINE: u32 = 0x4;

/// Identity a protected blob is bound to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Only the account that protected the data can unprotect it.
    #[default]
    CurrentUser,
    /// Any process on the local machine can unprotect the data.
    LocalMachine,
}

impl Scope {
    /// Maps the `local_machine` boolean used by the FFI surfaces.
    pub fn from_local_machine(local_machine: bool) -> Self {
        if local_machine {
            Scope::LocalMachine
        } else {
            Scope::CurrentUser
        }
    }

    pub fn is_local_machine(self) -> bool {
        matches!(self, Scope::LocalMachine)
    }

    /// Flags for `CryptProtectData`.
    pub(crate) fn protect_flags(self) -> u32 {
        match self {
            Scope::CurrentUser => CRYPTPROTECT_UI_FORBIDDEN,
            Scope::LocalMachine => CRYPTPROTECT_UI_FORBIDDEN | CRYPTPROTECT_LOCAL_MACHINE,
        }
    }
}

/// Flags for `CryptUnprotectData`. The scope is recorded in the blob itself.
pub(crate) fn unprotect_flags() -> u32 {
    CRYPTPROTECT_UI_FORBIDDEN
}
