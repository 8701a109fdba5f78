//! Validation for vendor-qualified identifiers
//!
//! Actions and resource types are always evaluated in their qualified form,
//! `vendor:name` (e.g. `ec2:runinstances`, `ec2:instance`). This module
//! provides the validated [`QualifiedName`] used throughout evaluation.

use crate::error::ConfigurationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pattern for valid vendor prefixes (kebab-case, like `ec2` or `elasticloadbalancing`)
static VENDOR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").expect("vendor pattern"));

/// A validated `vendor:name` identifier
///
/// Both parts are stored lowercase, so `ec2:RunInstances` and
/// `ec2:runinstances` are the same action.
///
/// # Rules
/// - Vendor: lowercase letters, numbers and hyphens, not starting or ending with a hyphen
/// - Name: non-empty, no `:` and no whitespace
///
/// # Examples
///
/// ```
/// use iam_engine::QualifiedName;
///
/// let action = QualifiedName::new("ec2", "RunInstances").unwrap();
/// assert_eq!(action.to_string(), "ec2:runinstances");
///
/// assert!(QualifiedName::new("", "RunInstances").is_err());
/// assert!(QualifiedName::new("ec2", "a:b").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QualifiedName {
    vendor: String,
    name: String,
}

impl QualifiedName {
    /// Maximum length of either part
    const MAX_LENGTH: usize = 128;

    /// Create a validated qualified name from its parts
    pub fn new(vendor: &str, name: &str) -> Result<Self, ConfigurationError> {
        let vendor = vendor.trim().to_ascii_lowercase();
        let name = name.trim().to_ascii_lowercase();
        Self::validate_vendor(&vendor)?;
        Self::validate_name(&name)?;
        Ok(QualifiedName { vendor, name })
    }

    /// Parse `vendor:name`
    pub fn parse(qualified: &str) -> Result<Self, ConfigurationError> {
        match qualified.split_once(':') {
            Some((vendor, name)) => Self::new(vendor, name),
            None => Err(ConfigurationError::InvalidName(format!(
                "'{}' is not of the form vendor:name",
                qualified
            ))),
        }
    }

    fn validate_vendor(vendor: &str) -> Result<(), ConfigurationError> {
        if vendor.is_empty() {
            return Err(ConfigurationError::InvalidName(
                "vendor cannot be empty".to_string(),
            ));
        }
        if vendor.len() > Self::MAX_LENGTH || !VENDOR_PATTERN.is_match(vendor) {
            return Err(ConfigurationError::InvalidName(format!(
                "vendor '{}' must be lowercase letters, numbers, and hyphens",
                vendor
            )));
        }
        Ok(())
    }

    fn validate_name(name: &str) -> Result<(), ConfigurationError> {
        if name.is_empty() {
            return Err(ConfigurationError::InvalidName(
                "name cannot be empty".to_string(),
            ));
        }
        if name.len() > Self::MAX_LENGTH {
            return Err(ConfigurationError::InvalidName(format!(
                "name too long (max {} characters)",
                Self::MAX_LENGTH
            )));
        }
        if name.contains(':') || name.chars().any(char::is_whitespace) {
            return Err(ConfigurationError::InvalidName(format!(
                "name '{}' cannot contain ':' or whitespace",
                name
            )));
        }
        Ok(())
    }

    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.vendor, self.name)
    }
}

impl TryFrom<String> for QualifiedName {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        QualifiedName::parse(&value)
    }
}

impl From<QualifiedName> for String {
    fn from(value: QualifiedName) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(QualifiedName::new("ec2", "RunInstances").is_ok());
        assert!(QualifiedName::new("elasticloadbalancing", "loadbalancer").is_ok());
        assert!(QualifiedName::new("s3", "object").is_ok());
        assert!(QualifiedName::new("my-svc2", "x").is_ok());
    }

    #[test]
    fn test_invalid_names() {
        assert!(QualifiedName::new("", "action").is_err()); // empty vendor
        assert!(QualifiedName::new("ec2", "").is_err()); // empty name
        assert!(QualifiedName::new("-ec2", "action").is_err()); // leading hyphen
        assert!(QualifiedName::new("ec_2", "action").is_err()); // underscore
        assert!(QualifiedName::new("ec2", "run instances").is_err()); // space
        assert!(QualifiedName::new("ec2", "a:b").is_err()); // colon
    }

    #[test]
    fn test_normalization() {
        let name = QualifiedName::new(" EC2 ", "DescribeInstances").unwrap();
        assert_eq!(name.vendor(), "ec2");
        assert_eq!(name.name(), "describeinstances");
        assert_eq!(
            name,
            QualifiedName::parse("ec2:describeinstances").unwrap()
        );
    }

    #[test]
    fn test_parse() {
        let name = QualifiedName::parse("iam:CreateUser").unwrap();
        assert_eq!(name.to_string(), "iam:createuser");
        assert!(QualifiedName::parse("createuser").is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let name = QualifiedName::parse("ec2:instance").unwrap();
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"ec2:instance\"");
        let parsed: QualifiedName = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, name);
        assert!(serde_json::from_str::<QualifiedName>("\"nocolon\"").is_err());
    }
}
