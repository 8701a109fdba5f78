//! Engine configuration
//!
//! Loaded once at startup, before an engine is installed:
//!
//! ```toml
//! pattern_cache_capacity = 1000
//! system_accounts = ["000000000000"]
//!
//! [host_keys]
//! "euca:hostname" = "node-1"
//! ```

use crate::error::ConfigurationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use validator::{Validate, ValidationError};

static ACCOUNT_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{12}$").expect("account number pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Compiled wildcard patterns kept in the LRU cache
    #[validate(range(min = 1, max = 1_000_000))]
    pub pattern_cache_capacity: usize,

    /// Accounts whose principals may act on resources of any account
    #[validate(custom(function = "validate_accounts"))]
    pub system_accounts: Vec<String>,

    /// Fixed host-scoped condition keys
    pub host_keys: BTreeMap<String, String>,
}

fn validate_accounts(accounts: &Vec<String>) -> Result<(), ValidationError> {
    if accounts.iter().all(|account| ACCOUNT_NUMBER.is_match(account)) {
        Ok(())
    } else {
        Err(ValidationError::new("account_number"))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            pattern_cache_capacity: 1000,
            system_accounts: Vec::new(),
            host_keys: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigurationError> {
        let config: EngineConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn is_system_account(&self, account_number: &str) -> bool {
        self.system_accounts.iter().any(|a| a == account_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
pattern_cache_capacity = 16
system_accounts = ["000000000000"]

[host_keys]
"euca:hostname" = "node-1"
"#
        )
        .unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.pattern_cache_capacity, 16);
        assert!(config.is_system_account("000000000000"));
        assert!(!config.is_system_account("000000000001"));
        assert_eq!(config.host_keys["euca:hostname"], "node-1");
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let err = EngineConfig::from_toml_str("pattern_cache_capacity = 0").unwrap_err();
        assert!(matches!(err, ConfigurationError::Validation(_)));
    }

    #[test]
    fn test_rejects_bad_account() {
        let err = EngineConfig::from_toml_str(r#"system_accounts = ["admin"]"#).unwrap_err();
        assert!(matches!(err, ConfigurationError::Validation(_)));
    }

    #[test]
    fn test_rejects_unknown_field() {
        let err = EngineConfig::from_toml_str("cache = 5").unwrap_err();
        assert!(matches!(err, ConfigurationError::Toml(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::from_file("/nonexistent/engine.toml").unwrap_err();
        assert!(matches!(err, ConfigurationError::Io(_)));
    }
}
