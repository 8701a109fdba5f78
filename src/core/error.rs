//! Error types for policy evaluation
//!
//! A policy-derived Deny is a [`Decision`](crate::iam::Decision), not an error.
//! The types here cover misconfiguration, key resolution faults, and the
//! audit-oriented projection of a Deny for callers that want one.

use crate::iam::{DenyReason, QuotaScope};
use thiserror::Error;

/// Fatal configuration problems. These block serving.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("No policy engine has been installed")]
    NotInstalled,

    #[error("Invalid qualified name: {0}")]
    InvalidName(String),

    #[error("Failed to parse engine configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Engine configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to compute a single condition key value.
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Condition key {key} failed: {source}")]
    Failed {
        key: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Authorization errors.
///
/// `Denied` and `QuotaExceeded` are only produced when a caller explicitly
/// projects a decision into a `Result` to build an audit message.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Access denied to {description}: {reason}")]
    Denied {
        description: String,
        reason: DenyReason,
    },

    #[error(
        "Quota exceeded for {description}: {scope} usage {usage} + {requested} exceeds limit {limit}"
    )]
    QuotaExceeded {
        description: String,
        scope: QuotaScope,
        usage: u64,
        requested: u64,
        limit: u64,
    },

    #[error("Failed to resolve condition key {key}: {source}")]
    KeyResolution {
        key: String,
        #[source]
        source: KeyError,
    },

    #[error("Unable to determine usage for {description}: {source}")]
    Usage {
        description: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl AuthError {
    /// True for the outcomes a caller should treat as an ordinary refusal
    /// rather than a fault.
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            AuthError::Denied { .. } | AuthError::QuotaExceeded { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
