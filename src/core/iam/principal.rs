//! Principals and account ownership
//!
//! A principal is the identity a decision is evaluated for. Its bound policy
//! versions are already resident when evaluation starts; loading them is the
//! job of whatever storage layer constructs the principal.

use super::pattern::{CaseSensitivity, PatternMatcher};
use super::policy::PolicyVersion;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Kind of identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalType {
    User,
    Role,
    Account,
}

impl fmt::Display for PrincipalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrincipalType::User => write!(f, "user"),
            PrincipalType::Role => write!(f, "role"),
            PrincipalType::Account => write!(f, "account"),
        }
    }
}

/// An authenticated identity and the policies bound to it
#[derive(Debug, Clone)]
pub struct Principal {
    id: String,
    name: String,
    account_number: String,
    principal_type: PrincipalType,
    system_admin: bool,
    policies: Vec<Arc<PolicyVersion>>,
}

impl Principal {
    pub fn new(
        principal_type: PrincipalType,
        name: impl Into<String>,
        account_number: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Principal {
            id: name.clone(),
            name,
            account_number: account_number.into(),
            principal_type,
            system_admin: false,
            policies: Vec::new(),
        }
    }

    pub fn user(name: impl Into<String>, account_number: impl Into<String>) -> Self {
        Self::new(PrincipalType::User, name, account_number)
    }

    pub fn role(name: impl Into<String>, account_number: impl Into<String>) -> Self {
        Self::new(PrincipalType::Role, name, account_number)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Mark as an administrator of the system account
    pub fn as_system_admin(mut self) -> Self {
        self.system_admin = true;
        self
    }

    /// Bind a policy version; order of binding is evaluation order
    pub fn with_policy(mut self, policy: Arc<PolicyVersion>) -> Self {
        self.policies.push(policy);
        self
    }

    pub fn with_policies(mut self, policies: impl IntoIterator<Item = Arc<PolicyVersion>>) -> Self {
        self.policies.extend(policies);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn account_number(&self) -> &str {
        &self.account_number
    }

    pub fn principal_type(&self) -> PrincipalType {
        self.principal_type
    }

    pub fn is_system_admin(&self) -> bool {
        self.system_admin
    }

    /// Bound policies in evaluation order (account, group, then own)
    pub fn policies(&self) -> &[Arc<PolicyVersion>] {
        &self.policies
    }
}

/// Explicit principal identity for cross-account checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalOverride {
    pub principal_type: PrincipalType,
    pub name: String,
}

impl PrincipalOverride {
    pub fn new(principal_type: PrincipalType, name: impl Into<String>) -> Self {
        PrincipalOverride {
            principal_type,
            name: name.into(),
        }
    }
}

/// The principal identity a context is evaluated as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectivePrincipal {
    pub principal_type: PrincipalType,
    pub name: String,
    pub account_number: String,
}

impl fmt::Display for EffectivePrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.principal_type, self.name)
    }
}

/// Owning account of the target resource, resolved once at the boundary
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResourceAccount {
    /// Not owned by an account, or ownership is not being checked
    #[default]
    Unowned,
    Account(String),
}

impl ResourceAccount {
    pub fn account(number: impl Into<String>) -> Self {
        ResourceAccount::Account(number.into())
    }

    pub fn account_number(&self) -> Option<&str> {
        match self {
            ResourceAccount::Unowned => None,
            ResourceAccount::Account(number) => Some(number),
        }
    }
}

impl From<Option<&str>> for ResourceAccount {
    fn from(value: Option<&str>) -> Self {
        match value {
            Some(number) => ResourceAccount::account(number),
            None => ResourceAccount::Unowned,
        }
    }
}

/// An entry of a resource policy statement's `Principal` element
///
/// Accepted forms: `*`, a bare account number, `arn:aws:iam::<acct>:root`,
/// `arn:aws:iam::<acct>:<type>/<name>`, and `<type>:<name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalPattern {
    Any,
    Account(String),
    Named {
        account_number: Option<String>,
        principal_type: PrincipalType,
        name: String,
    },
    /// Unrecognised entry; never matches
    Invalid(String),
}

impl PrincipalPattern {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == "*" {
            return PrincipalPattern::Any;
        }
        if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
            return PrincipalPattern::Account(raw.to_string());
        }

        if let Some(rest) = raw.strip_prefix("arn:") {
            let parts: Vec<&str> = rest.splitn(5, ':').collect();
            if parts.len() == 5 && parts[1] == "iam" {
                let account = parts[3].to_string();
                if parts[4] == "root" {
                    return PrincipalPattern::Account(account);
                }
                if let Some((kind, name)) = parts[4].split_once('/') {
                    if let Some(principal_type) = Self::parse_type(kind) {
                        return PrincipalPattern::Named {
                            account_number: Some(account),
                            principal_type,
                            name: name.to_string(),
                        };
                    }
                }
            }
            return PrincipalPattern::Invalid(raw.to_string());
        }

        match raw.split_once(':') {
            Some((kind, name)) => match Self::parse_type(kind) {
                Some(principal_type) => PrincipalPattern::Named {
                    account_number: None,
                    principal_type,
                    name: name.to_string(),
                },
                None => PrincipalPattern::Invalid(raw.to_string()),
            },
            None => PrincipalPattern::Invalid(raw.to_string()),
        }
    }

    fn parse_type(kind: &str) -> Option<PrincipalType> {
        match kind.to_ascii_lowercase().as_str() {
            "user" => Some(PrincipalType::User),
            "role" => Some(PrincipalType::Role),
            "account" => Some(PrincipalType::Account),
            _ => None,
        }
    }

    pub fn matches(&self, matcher: &PatternMatcher, principal: &EffectivePrincipal) -> bool {
        match self {
            PrincipalPattern::Any => true,
            PrincipalPattern::Account(number) => *number == principal.account_number,
            PrincipalPattern::Named {
                account_number,
                principal_type,
                name,
            } => {
                account_number
                    .as_ref()
                    .map_or(true, |number| *number == principal.account_number)
                    && *principal_type == principal.principal_type
                    && matcher.matches(name, &principal.name, CaseSensitivity::Sensitive)
            }
            PrincipalPattern::Invalid(_) => false,
        }
    }
}
