//! Effect resolution
//!
//! Turns the statements that matched a request into a [`Decision`]. An
//! explicit Deny always wins. An Allow only wins when the requester is
//! entitled to act on the owning account of the target resource.

use super::contract::ContractMap;
use super::matcher::MatchedStatement;
use super::policy::Effect;
use super::principal::{EffectivePrincipal, ResourceAccount};
use crate::error::AuthError;
use std::fmt;
use tracing::debug;

/// Why a request was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// A matching Deny statement
    ExplicitDeny {
        policy_id: String,
        sid: Option<String>,
    },
    /// No matching Allow statement
    ImplicitDeny,
    /// Allowed by identity policies, but the resource belongs to another
    /// account whose resource policy grants nothing
    CrossAccount,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::ExplicitDeny {
                policy_id,
                sid: Some(sid),
            } => write!(f, "explicit deny by statement {} of policy {}", sid, policy_id),
            DenyReason::ExplicitDeny { policy_id, sid: None } => {
                write!(f, "explicit deny by policy {}", policy_id)
            }
            DenyReason::ImplicitDeny => write!(f, "no statement allows the request"),
            DenyReason::CrossAccount => write!(f, "resource is owned by another account"),
        }
    }
}

/// Outcome of an authorization evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Access granted, with the contracts of the winning statements
    Allow { contracts: ContractMap },
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow { .. })
    }

    /// Contracts of an Allow; empty for a Deny
    pub fn contracts(&self) -> Option<&ContractMap> {
        match self {
            Decision::Allow { contracts } => Some(contracts),
            Decision::Deny(_) => None,
        }
    }

    /// Project into a `Result` for callers building audit messages
    pub fn into_result(self, description: impl Into<String>) -> Result<ContractMap, AuthError> {
        match self {
            Decision::Allow { contracts } => Ok(contracts),
            Decision::Deny(reason) => Err(AuthError::Denied {
                description: description.into(),
                reason,
            }),
        }
    }
}

/// Ownership facts needed to decide entitlement
#[derive(Debug, Clone, Copy)]
pub struct Ownership<'a> {
    pub resource_account: &'a ResourceAccount,
    pub principal: &'a EffectivePrincipal,
    /// Principal is an administrator of the system account
    pub system_admin: bool,
    /// Skip the ownership check entirely (probe mode)
    pub ignore: bool,
}

impl Ownership<'_> {
    fn same_account(&self) -> bool {
        match self.resource_account.account_number() {
            None => true,
            Some(account) => account == self.principal.account_number,
        }
    }
}

pub struct EffectResolver;

impl EffectResolver {
    pub fn resolve(matched: &[MatchedStatement<'_>], ownership: Ownership<'_>) -> Decision {
        if let Some(deny) = matched.iter().find(|m| m.effect() == Effect::Deny) {
            return Decision::Deny(DenyReason::ExplicitDeny {
                policy_id: deny.policy.policy_id().to_string(),
                sid: deny.statement.sid.clone(),
            });
        }

        let allows: Vec<&MatchedStatement<'_>> = matched
            .iter()
            .filter(|m| m.effect() == Effect::Allow)
            .collect();
        if allows.is_empty() {
            return Decision::Deny(DenyReason::ImplicitDeny);
        }

        // Cross-account access needs both sides to agree
        let granted_by_both = allows.iter().any(|m| m.from_resource_policy())
            && allows.iter().any(|m| !m.from_resource_policy());
        let entitled = ownership.ignore
            || ownership.system_admin
            || ownership.same_account()
            || granted_by_both;
        if !entitled {
            return Decision::Deny(DenyReason::CrossAccount);
        }

        Decision::Allow {
            contracts: Self::collect_contracts(&allows),
        }
    }

    fn collect_contracts(allows: &[&MatchedStatement<'_>]) -> ContractMap {
        let mut contracts = ContractMap::new();
        for matched in allows {
            if let Some(contract) = &matched.statement.contract {
                if let Some(previous) = contracts.insert(contract.contract_type, contract.clone()) {
                    debug!(
                        contract_type = %contract.contract_type,
                        replaced = %previous.value,
                        value = %contract.value,
                        "Duplicate contract, keeping the last one"
                    );
                }
            }
        }
        contracts
    }
}
