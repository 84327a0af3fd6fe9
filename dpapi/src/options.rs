//! Per-call protection options.

use crate::scope::Scope;
use serde::{Deserialize, Serialize};

/// Options for [`protect_with_options`](crate::protect_with_options).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectOptions {
    /// Identity the blob is bound to.
    pub scope: Scope,

    /// Human-readable label stored inside the blob. Readable without the key,
    /// but covered by the blob's integrity check.
    pub description: Option<String>,
}

impl ProtectOptions {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            description: None,
        }
    }

    /// Sets the description stored in the blob.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl From<Scope> for ProtectOptions {
    fn from(scope: Scope) -> Self {
        Self::new(scope)
    }
}
