//! Identity and Access Management (IAM) policy evaluation
//!
//! Provides policy-based authorization with:
//! - Allow/Deny statements with explicit deny precedence
//! - Wildcard pattern matching for actions, resources and principals
//! - Condition evaluation (String, Numeric, Date, Bool, IP address operations)
//! - Cross-account ownership checks and resource-based policies
//! - `Limit` statements evaluated as resource quotas, independently of Allow/Deny
//! - Contracts attached to Allow statements and delivered on success
//! - LRU caching of compiled wildcard patterns

pub mod ambient;
mod cache;
mod condition;
mod context;
mod contract;
mod effect;
mod engine;
mod keys;
mod matcher;
mod pattern;
mod policy;
mod principal;
mod quota;
mod slot;

pub use cache::PatternCache;
pub use condition::{CidrRange, Condition, ConditionOperator};
pub use context::EvaluationContext;
pub use contract::{Contract, ContractMap, ContractSink, ContractType, RequestContracts};
pub use effect::{Decision, DenyReason, EffectResolver, Ownership};
pub use engine::{AuthorizationRequest, DefaultPolicyEngine, EngineBuilder, PolicyEngine};
pub use keys::{
    evaluate_host_keys, ConditionKey, HostKeys, KeyRegistry, KeyScope, KeySnapshot, StaticKey,
    StaticKeyRegistry, CURRENT_TIME, SECURE_TRANSPORT, SOURCE_IP,
};
pub use matcher::{MatchMode, MatchedStatement, StatementMatcher};
pub use pattern::{CaseSensitivity, PatternMatcher, ResourcePattern};
pub use policy::{Effect, PolicyDocument, PolicyScope, PolicyVersion, Statement};
pub use principal::{
    EffectivePrincipal, Principal, PrincipalOverride, PrincipalPattern, PrincipalType,
    ResourceAccount,
};
pub use quota::{InMemoryUsage, QuotaDecision, QuotaEvaluator, QuotaLimit, QuotaScope, UsageProvider};
pub use slot::EngineSlot;
