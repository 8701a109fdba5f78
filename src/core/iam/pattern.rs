//! Pattern matching for IAM actions and resources
//!
//! Supports wildcards anywhere in a pattern:
//! - `*` - Matches any run of characters, including none (e.g. `ec2:Describe*`)
//! - `?` - Matches exactly one character
//!
//! Action patterns compare case-insensitively; resource names are
//! case-sensitive. Resource patterns accept `*`, `vendor:type/name` and ARN
//! forms (`arn:aws:ec2:::instance/i-*`). An ARN with an account segment only
//! covers resources owned by a matching account.

use super::cache::PatternCache;
use super::principal::ResourceAccount;
use crate::validation::QualifiedName;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Whether a comparison folds ASCII case
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseSensitivity {
    Sensitive,
    Insensitive,
}

/// Wildcard matcher backed by a compiled-pattern cache
#[derive(Debug)]
pub struct PatternMatcher {
    cache: PatternCache,
}

impl PatternMatcher {
    /// Create a matcher caching up to `cache_capacity` compiled patterns
    pub fn new(cache_capacity: usize) -> Self {
        PatternMatcher {
            cache: PatternCache::new(cache_capacity),
        }
    }

    /// Check if a value matches a wildcard pattern
    ///
    /// # Examples
    /// ```
    /// use iam_engine::iam::{CaseSensitivity, PatternMatcher};
    ///
    /// let matcher = PatternMatcher::new(16);
    /// assert!(matcher.matches("ec2:Describe*", "ec2:describeinstances", CaseSensitivity::Insensitive));
    /// assert!(!matcher.matches("ec2:Describe*", "ec2:createinstances", CaseSensitivity::Insensitive));
    /// assert!(matcher.matches("i-12?", "i-123", CaseSensitivity::Sensitive));
    /// ```
    pub fn matches(&self, pattern: &str, value: &str, case: CaseSensitivity) -> bool {
        if pattern == "*" {
            return true;
        }

        let ignore_case = case == CaseSensitivity::Insensitive;

        // Literal patterns need no regex
        if !Self::has_wildcard(pattern) {
            return if ignore_case {
                pattern.eq_ignore_ascii_case(value)
            } else {
                pattern == value
            };
        }

        match self.compiled(pattern, ignore_case) {
            Some(regex) => regex.is_match(value),
            None => false,
        }
    }

    /// Number of compiled patterns currently cached
    pub fn cached_patterns(&self) -> usize {
        self.cache.len()
    }

    /// Drop all compiled patterns
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn has_wildcard(pattern: &str) -> bool {
        pattern.contains(['*', '?'])
    }

    fn compiled(&self, pattern: &str, ignore_case: bool) -> Option<Arc<Regex>> {
        if let Some(regex) = self.cache.get(pattern, ignore_case) {
            return Some(regex);
        }

        match Regex::new(&Self::glob_to_regex(pattern, ignore_case)) {
            Ok(regex) => {
                let regex = Arc::new(regex);
                self.cache.put(pattern, ignore_case, Arc::clone(&regex));
                Some(regex)
            }
            Err(e) => {
                // Only reachable if the pattern exceeds the regex size limit
                warn!(pattern, error = %e, "Unable to compile wildcard pattern");
                None
            }
        }
    }

    /// Translate a glob into an anchored regex
    fn glob_to_regex(pattern: &str, ignore_case: bool) -> String {
        let mut re = String::with_capacity(pattern.len() * 2 + 8);
        re.push_str(if ignore_case { "(?is)^" } else { "(?s)^" });

        let mut literal = String::new();
        for ch in pattern.chars() {
            match ch {
                '*' | '?' => {
                    re.push_str(&regex::escape(&literal));
                    literal.clear();
                    re.push_str(if ch == '*' { ".*" } else { "." });
                }
                _ => literal.push(ch),
            }
        }
        re.push_str(&regex::escape(&literal));
        re.push('$');
        re
    }
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// A resource pattern from a statement's `Resource` element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResourcePattern {
    /// `*` - every resource of every type
    Any,
    /// A qualified type pattern plus a resource-name pattern
    ///
    /// `account` is the ARN account segment; `None` covers every account.
    Typed {
        account: Option<String>,
        resource_type: String,
        name: String,
    },
    /// A bare name pattern, applicable to any resource type
    Name(String),
}

impl ResourcePattern {
    /// Parse a resource pattern
    ///
    /// ```
    /// use iam_engine::iam::ResourcePattern;
    ///
    /// assert_eq!(ResourcePattern::parse("*"), ResourcePattern::Any);
    /// assert_eq!(
    ///     ResourcePattern::parse("arn:aws:ec2:::instance/i-*"),
    ///     ResourcePattern::Typed { account: None, resource_type: "ec2:instance".into(), name: "i-*".into() }
    /// );
    /// assert_eq!(
    ///     ResourcePattern::parse("arn:aws:ec2::000000000001:instance/i-*"),
    ///     ResourcePattern::Typed {
    ///         account: Some("000000000001".into()),
    ///         resource_type: "ec2:instance".into(),
    ///         name: "i-*".into(),
    ///     }
    /// );
    /// ```
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == "*" {
            return ResourcePattern::Any;
        }

        if let Some(rest) = raw.strip_prefix("arn:") {
            // partition:vendor:region:account:type/name
            let parts: Vec<&str> = rest.splitn(5, ':').collect();
            if parts.len() == 5 {
                let account = Some(parts[3].trim()).filter(|a| !a.is_empty() && *a != "*");
                return Self::typed(account, parts[1], parts[4]);
            }
            return ResourcePattern::Name(raw.to_string());
        }

        match raw.split_once(':') {
            Some((vendor, rest)) => Self::typed(None, vendor, rest),
            None => ResourcePattern::Name(raw.to_string()),
        }
    }

    fn typed(account: Option<&str>, vendor: &str, rest: &str) -> Self {
        let (resource_type, name) = match rest.split_once('/') {
            Some((resource_type, name)) => (resource_type, name),
            None => (rest, "*"),
        };
        ResourcePattern::Typed {
            account: account.map(str::to_string),
            resource_type: format!("{}:{}", vendor, resource_type),
            name: name.to_string(),
        }
    }

    /// True for the universal `*` pattern
    pub fn is_any(&self) -> bool {
        matches!(self, ResourcePattern::Any)
    }

    /// Check if this pattern covers the given resource
    ///
    /// A typed pattern never matches when the resource type is unknown, and
    /// a pattern naming an account never matches an unowned resource.
    pub fn matches(
        &self,
        matcher: &PatternMatcher,
        resource_account: &ResourceAccount,
        resource_type: Option<&QualifiedName>,
        resource_name: &str,
    ) -> bool {
        match self {
            ResourcePattern::Any => true,
            ResourcePattern::Name(name) => {
                matcher.matches(name, resource_name, CaseSensitivity::Sensitive)
            }
            ResourcePattern::Typed {
                account,
                resource_type: type_pattern,
                name,
            } => match resource_type {
                Some(resource_type) => {
                    Self::account_matches(matcher, account.as_deref(), resource_account)
                        && matcher.matches(
                        type_pattern,
                        &resource_type.to_string(),
                        CaseSensitivity::Insensitive,
                    ) && matcher.matches(name, resource_name, CaseSensitivity::Sensitive)
                }
                None => false,
            },
        }
    }

    fn account_matches(
        matcher: &PatternMatcher,
        pattern: Option<&str>,
        resource_account: &ResourceAccount,
    ) -> bool {
        match (pattern, resource_account.account_number()) {
            (None, _) => true,
            (Some(pattern), Some(account)) => {
                matcher.matches(pattern, account, CaseSensitivity::Sensitive)
            }
            (Some(_), None) => false,
        }
    }
}

impl From<String> for ResourcePattern {
    fn from(value: String) -> Self {
        ResourcePattern::parse(&value)
    }
}

impl From<&str> for ResourcePattern {
    fn from(value: &str) -> Self {
        ResourcePattern::parse(value)
    }
}

impl From<ResourcePattern> for String {
    fn from(value: ResourcePattern) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ResourcePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourcePattern::Any => write!(f, "*"),
            ResourcePattern::Typed {
                account: None,
                resource_type,
                name,
            } => write!(f, "{}/{}", resource_type, name),
            ResourcePattern::Typed {
                account: Some(account),
                resource_type,
                name,
            } => {
                let (vendor, local) = resource_type
                    .split_once(':')
                    .unwrap_or(("*", resource_type.as_str()));
                write!(f, "arn:aws:{}::{}:{}/{}", vendor, account, local, name)
            }
            ResourcePattern::Name(name) => write!(f, "{}", name),
        }
    }
}
