// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Prefix used when none is configured.
pub const DEFAULT_KEY_PREFIX: &str = "DRFCV";

/// What the engine does when the cache backend fails during a bulk read or write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendFailure {
    /// Return the backend error to the caller.
    #[default]
    Propagate,
    /// Log the failure and carry on as if every key missed and nothing needed writing.
    TreatAsMiss,
}

/// Settings for one instance cache.
///
/// Every field has a default, so partial documents deserialize:
///
/// ```
/// use instacache::Settings;
/// use std::time::Duration;
///
/// let settings: Settings = serde_json::from_str(r#"{"key_prefix": "C", "ttl": 300}"#).unwrap();
/// assert_eq!(settings.key_prefix, "C");
/// assert_eq!(settings.ttl, Some(Duration::from_secs(300)));
/// assert!(settings.enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// First segment of every cache key.
    pub key_prefix: String,
    /// Lifetime of written entries, at least one second and truncated to whole
    /// seconds when (de)serialized. `None` never expires.
    #[serde(with = "ttl_seconds")]
    pub ttl: Option<Duration>,
    /// When false, reads go straight to the loaders and nothing is cached or invalidated.
    pub enabled: bool,
    /// Run the invalidator for deleted entities, rebuilt from their last cached data.
    pub cascade_on_delete: bool,
    /// Reaction to backend faults during bulk reads and writes.
    pub backend_failure: BackendFailure,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_owned(),
            ttl: None,
            enabled: true,
            cascade_on_delete: false,
            backend_failure: BackendFailure::Propagate,
        }
    }
}

impl Settings {
    /// Checks that the settings can produce valid cache keys.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error for an empty prefix or one containing whitespace
    /// or control characters, and for a zero TTL.
    pub fn validate(&self) -> Result<(), Error> {
        if self.key_prefix.is_empty() {
            return Err(Error::config("key prefix must not be empty"));
        }
        if self.key_prefix.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(Error::config(format!(
                "key prefix {:?} contains whitespace or control characters",
                self.key_prefix
            )));
        }
        if self.ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(Error::config("ttl must be positive; use no ttl for entries that never expire"));
        }
        if let Some(ttl) = self.ttl.filter(|ttl| ttl.as_secs() == 0) {
            return Err(Error::config(format!("ttl {ttl:?} is shorter than one second; ttls are kept in whole seconds")));
        }
        Ok(())
    }
}

mod ttl_seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[expect(clippy::ref_option, reason = "signature required by serde's `with` attribute")]
    pub(super) fn serialize<S: Serializer>(ttl: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match ttl {
            Some(ttl) => serializer.serialize_some(&ttl.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
    }
}
