//! Registry configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// What an accessor does when its id is already cached from another definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedefinitionPolicy {
    /// Log a warning and return the cached store.
    #[default]
    Warn,
    /// Return the cached store silently.
    Ignore,
    /// Fail the accessor call with `StoreError::Redefined`.
    Error,
}

/// Knobs for a [`Registry`](crate::registry::Registry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Keep a disposed store's slice in the shared state tree.
    pub retain_state_on_dispose: bool,

    pub redefinition: RedefinitionPolicy,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            retain_state_on_dispose: true,
            redefinition: RedefinitionPolicy::Warn,
        }
    }
}

impl RegistryConfig {
    /// Parse a JSON document; missing keys take their defaults.
    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }
}
