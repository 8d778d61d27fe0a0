//! # Configuration
//!
//! Policy knobs for the custody service. Every field has a default, so a
//! JSON config file only needs the values it changes:
//!
//! ```json
//! { "database_path": "keys.db", "duplicate_policy": "replace" }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Largest public-key prefix a masked view may reveal, in bytes.
pub const MAX_MASK_PREFIX_LEN: usize = 8;

/// Default public-key prefix shown in masked views, in bytes.
pub const DEFAULT_MASK_PREFIX_LEN: usize = 8;

/// Default SQLite busy timeout in milliseconds.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// What to do when a keypair is requested for a session id that already
/// has a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Refuse while the existing record is live. An expired but unswept
    /// record is replaced.
    #[default]
    Reject,
    /// Always replace the existing record.
    Replace,
}

/// Whether session keys may be used once their expiry has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecapsulationPolicy {
    /// Only sessions whose expiry is still in the future may be used.
    #[default]
    ActiveOnly,
    /// Expired sessions stay usable until they are swept or revoked.
    AllowExpired,
}

/// Custody service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustodyConfig {
    /// Path to the SQLite file (None for in-memory)
    pub database_path: Option<PathBuf>,
    /// Number of leading public-key bytes shown in masked views
    pub mask_prefix_len: usize,
    /// Policy for repeated generation on the same session id
    pub duplicate_policy: DuplicatePolicy,
    /// Policy for using expired-but-unswept sessions
    pub decapsulation_policy: DecapsulationPolicy,
    /// How long SQLite waits on a locked database before failing
    pub busy_timeout_ms: u64,
}

impl Default for CustodyConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            mask_prefix_len: DEFAULT_MASK_PREFIX_LEN,
            duplicate_policy: DuplicatePolicy::default(),
            decapsulation_policy: DecapsulationPolicy::default(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl CustodyConfig {
    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every value is within its allowed range.
    pub fn validate(&self) -> Result<()> {
        if self.mask_prefix_len > MAX_MASK_PREFIX_LEN {
            return Err(Error::InvalidConfig(format!(
                "mask_prefix_len {} exceeds the maximum of {} bytes",
                self.mask_prefix_len, MAX_MASK_PREFIX_LEN
            )));
        }
        if self.busy_timeout_ms == 0 {
            return Err(Error::InvalidConfig("busy_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    /// Busy timeout as a [`Duration`].
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CustodyConfig::default();
        assert_eq!(config.mask_prefix_len, 8);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Reject);
        assert_eq!(config.decapsulation_policy, DecapsulationPolicy::ActiveOnly);
        assert!(config.database_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config: CustodyConfig =
            serde_json::from_str(r#"{ "duplicate_policy": "replace", "mask_prefix_len": 4 }"#)
                .unwrap();
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Replace);
        assert_eq!(config.mask_prefix_len, 4);
        assert_eq!(config.decapsulation_policy, DecapsulationPolicy::ActiveOnly);
        assert_eq!(config.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);
    }

    #[test]
    fn test_oversized_prefix_rejected() {
        let config = CustodyConfig {
            mask_prefix_len: 9,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "database_path": "keys.db", "decapsulation_policy": "allow_expired" }}"#
        )
        .unwrap();

        let config = CustodyConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.database_path, Some(PathBuf::from("keys.db")));
        assert_eq!(config.decapsulation_policy, DecapsulationPolicy::AllowExpired);
    }

    #[test]
    fn test_from_json_file_rejects_bad_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "busy_timeout_ms": 0 }}"#).unwrap();
        assert!(CustodyConfig::from_json_file(file.path()).is_err());
    }
}
