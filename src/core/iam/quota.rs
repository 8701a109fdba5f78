//! Quota evaluation for `Limit` statements
//!
//! Every matching limit contributes a ceiling for its scope; the lowest
//! ceiling per scope wins. An allocation is refused when current usage plus
//! the requested quantity would exceed any scope's ceiling.

use super::context::EvaluationContext;
use super::matcher::StatementMatcher;
use super::pattern::PatternMatcher;
use super::principal::Principal;
use crate::error::AuthError;
use crate::validation::QualifiedName;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::debug;

/// Who a quota ceiling is counted against
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QuotaScope {
    /// All resources owned by the principal's account
    Account,
    /// Resources owned by the principal itself
    User,
}

impl fmt::Display for QuotaScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaScope::Account => write!(f, "account"),
            QuotaScope::User => write!(f, "user"),
        }
    }
}

/// Ceiling carried by a `Limit` statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QuotaLimit {
    pub resource_type: QualifiedName,
    pub maximum: u64,
    pub scope: QuotaScope,
}

impl QuotaLimit {
    pub fn new(resource_type: QualifiedName, maximum: u64, scope: QuotaScope) -> Self {
        QuotaLimit {
            resource_type,
            maximum,
            scope,
        }
    }
}

/// Source of current resource usage
pub trait UsageProvider: Send + Sync {
    fn current_usage(
        &self,
        scope: QuotaScope,
        principal: &Principal,
        resource_type: &QualifiedName,
    ) -> anyhow::Result<u64>;
}

/// Usage counters held in memory, keyed by scope owner and resource type
#[derive(Debug, Default)]
pub struct InMemoryUsage {
    counters: RwLock<HashMap<(QuotaScope, String, QualifiedName), u64>>,
}

impl InMemoryUsage {
    pub fn new() -> Self {
        Self::default()
    }

    fn owner(scope: QuotaScope, principal: &Principal) -> String {
        match scope {
            QuotaScope::Account => principal.account_number().to_string(),
            QuotaScope::User => format!("{}/{}", principal.account_number(), principal.id()),
        }
    }

    pub fn set(&self, scope: QuotaScope, principal: &Principal, resource_type: &QualifiedName, usage: u64) {
        let owner = Self::owner(scope, principal);
        self.counters
            .write()
            .insert((scope, owner, resource_type.clone()), usage);
    }

    /// Record an allocation against both scopes
    pub fn record(&self, principal: &Principal, resource_type: &QualifiedName, quantity: u64) {
        let mut counters = self.counters.write();
        for scope in [QuotaScope::Account, QuotaScope::User] {
            let key = (scope, Self::owner(scope, principal), resource_type.clone());
            let counter = counters.entry(key).or_insert(0);
            *counter = counter.saturating_add(quantity);
        }
    }
}

impl UsageProvider for InMemoryUsage {
    fn current_usage(
        &self,
        scope: QuotaScope,
        principal: &Principal,
        resource_type: &QualifiedName,
    ) -> anyhow::Result<u64> {
        let key = (scope, Self::owner(scope, principal), resource_type.clone());
        Ok(self.counters.read().get(&key).copied().unwrap_or(0))
    }
}

/// Outcome of a quota check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaDecision {
    Allow,
    Deny {
        scope: QuotaScope,
        limit: u64,
        usage: u64,
        requested: u64,
    },
}

impl QuotaDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, QuotaDecision::Allow)
    }

    /// Project into a `Result` for callers building audit messages
    pub fn into_result(self, description: impl Into<String>) -> Result<(), AuthError> {
        match self {
            QuotaDecision::Allow => Ok(()),
            QuotaDecision::Deny {
                scope,
                limit,
                usage,
                requested,
            } => Err(AuthError::QuotaExceeded {
                description: description.into(),
                scope,
                usage,
                requested,
                limit,
            }),
        }
    }
}

pub struct QuotaEvaluator<'a> {
    patterns: &'a PatternMatcher,
    usage: &'a dyn UsageProvider,
}

impl<'a> QuotaEvaluator<'a> {
    pub fn new(patterns: &'a PatternMatcher, usage: &'a dyn UsageProvider) -> Self {
        QuotaEvaluator { patterns, usage }
    }

    /// Check an allocation of `quantity` resources against matching limits
    ///
    /// Without a resource type or matching limit the allocation is allowed.
    pub fn evaluate(
        &self,
        context: &EvaluationContext,
        resource_name: &str,
        quantity: u64,
    ) -> Result<QuotaDecision, AuthError> {
        let resource_type = match context.resource_type() {
            Some(resource_type) => resource_type,
            None => return Ok(QuotaDecision::Allow),
        };

        let limits = StatementMatcher::new(self.patterns).matching_limits(context, resource_name);
        let mut ceilings: BTreeMap<QuotaScope, u64> = BTreeMap::new();
        for limit in limits {
            ceilings
                .entry(limit.scope)
                .and_modify(|ceiling| *ceiling = (*ceiling).min(limit.maximum))
                .or_insert(limit.maximum);
        }

        for (scope, limit) in ceilings {
            let usage = self
                .usage
                .current_usage(scope, context.principal(), resource_type)
                .map_err(|source| AuthError::Usage {
                    description: context.describe_quota(resource_name, quantity),
                    source,
                })?;

            let exceeded = match usage.checked_add(quantity) {
                Some(total) => total > limit,
                None => true,
            };
            if exceeded {
                debug!(
                    request_id = %context.request_id(),
                    scope = %scope,
                    usage,
                    quantity,
                    limit,
                    "Quota exceeded"
                );
                return Ok(QuotaDecision::Deny {
                    scope,
                    limit,
                    usage,
                    requested: quantity,
                });
            }
        }

        Ok(QuotaDecision::Allow)
    }
}
