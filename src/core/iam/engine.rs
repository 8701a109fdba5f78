//! Policy engine
//!
//! [`PolicyEngine`] is the seam between the facade and the evaluation
//! algorithms. [`DefaultPolicyEngine`] wires the statement matcher, effect
//! resolver and quota evaluator together; it is built once with
//! [`EngineBuilder`] and installed into an [`EngineSlot`](super::EngineSlot).

use super::context::EvaluationContext;
use super::effect::{Decision, EffectResolver, Ownership};
use super::keys::{HostKeys, KeyRegistry, KeySnapshot, StaticKey, StaticKeyRegistry};
use super::matcher::{MatchMode, StatementMatcher};
use super::pattern::PatternMatcher;
use super::policy::PolicyVersion;
use super::principal::{Principal, PrincipalOverride, ResourceAccount};
use super::quota::{InMemoryUsage, QuotaDecision, QuotaEvaluator, UsageProvider};
use crate::config::EngineConfig;
use crate::error::{ConfigurationError, Result};
use crate::validation::QualifiedName;
use std::fmt;
use std::sync::Arc;
use tracing::trace;
use validator::Validate;

/// What an authorization evaluation is asked to decide
#[derive(Debug, Clone, Default)]
pub struct AuthorizationRequest {
    pub mode: MatchMode,
    /// Resource-based policy merged with the identity policies
    pub resource_policy: Option<Arc<PolicyVersion>>,
    pub resource_account: ResourceAccount,
    pub resource_name: String,
}

impl AuthorizationRequest {
    pub fn new(resource_account: ResourceAccount, resource_name: impl Into<String>) -> Self {
        AuthorizationRequest {
            mode: MatchMode::All,
            resource_policy: None,
            resource_account,
            resource_name: resource_name.into(),
        }
    }

    /// Resource-agnostic probe; see [`MatchMode::Unconditional`]
    pub fn unconditional() -> Self {
        AuthorizationRequest {
            mode: MatchMode::Unconditional,
            ..Self::default()
        }
    }

    pub fn with_resource_policy(mut self, policy: Arc<PolicyVersion>) -> Self {
        self.resource_policy = Some(policy);
        self
    }
}

/// Evaluates authorization and quota decisions
pub trait PolicyEngine: Send + Sync {
    /// Bind a principal, qualified names and keys into a context
    ///
    /// `keys` are the caller's request keys; host-scoped keys are merged in
    /// and take precedence.
    fn create_evaluation_context(
        &self,
        resource_type: Option<QualifiedName>,
        action: QualifiedName,
        principal: Arc<Principal>,
        keys: KeySnapshot,
        policies: Vec<Arc<PolicyVersion>>,
        principal_override: Option<PrincipalOverride>,
    ) -> Result<EvaluationContext>;

    /// Decide Allow or Deny; a Deny is a value, not an error
    fn evaluate_authorization(
        &self,
        context: &EvaluationContext,
        request: &AuthorizationRequest,
    ) -> Result<Decision>;

    /// Check an allocation against matching `Limit` statements
    fn evaluate_quota(
        &self,
        context: &EvaluationContext,
        resource_name: &str,
        quantity: u64,
    ) -> Result<QuotaDecision>;

    /// Host-scoped condition keys of this process
    fn host_keys(&self) -> Result<KeySnapshot>;
}

pub struct DefaultPolicyEngine {
    config: EngineConfig,
    patterns: PatternMatcher,
    host_keys: HostKeys,
    usage: Arc<dyn UsageProvider>,
}

impl DefaultPolicyEngine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Pattern matcher, exposed for cache inspection
    pub fn patterns(&self) -> &PatternMatcher {
        &self.patterns
    }

    fn is_system_admin(&self, principal: &Principal) -> bool {
        principal.is_system_admin() || self.config.is_system_account(principal.account_number())
    }
}

impl Default for DefaultPolicyEngine {
    fn default() -> Self {
        DefaultPolicyEngine {
            config: EngineConfig::default(),
            patterns: PatternMatcher::default(),
            host_keys: HostKeys::empty(),
            usage: Arc::new(InMemoryUsage::new()),
        }
    }
}

impl PolicyEngine for DefaultPolicyEngine {
    fn create_evaluation_context(
        &self,
        resource_type: Option<QualifiedName>,
        action: QualifiedName,
        principal: Arc<Principal>,
        keys: KeySnapshot,
        policies: Vec<Arc<PolicyVersion>>,
        principal_override: Option<PrincipalOverride>,
    ) -> Result<EvaluationContext> {
        let keys = KeySnapshot::merge(self.host_keys.snapshot()?, &keys);
        Ok(EvaluationContext::new(
            resource_type,
            action,
            principal,
            keys,
            policies,
            principal_override,
        ))
    }

    fn evaluate_authorization(
        &self,
        context: &EvaluationContext,
        request: &AuthorizationRequest,
    ) -> Result<Decision> {
        let matched = StatementMatcher::new(&self.patterns).matching(
            context,
            request.resource_policy.as_deref(),
            request.mode,
            &request.resource_account,
            &request.resource_name,
        );
        trace!(
            request_id = %context.request_id(),
            action = %context.action(),
            matched = matched.len(),
            "Matched statements"
        );

        let ownership = Ownership {
            resource_account: &request.resource_account,
            principal: context.effective_principal(),
            system_admin: self.is_system_admin(context.principal()),
            ignore: request.mode == MatchMode::Unconditional,
        };
        Ok(EffectResolver::resolve(&matched, ownership))
    }

    fn evaluate_quota(
        &self,
        context: &EvaluationContext,
        resource_name: &str,
        quantity: u64,
    ) -> Result<QuotaDecision> {
        QuotaEvaluator::new(&self.patterns, self.usage.as_ref()).evaluate(
            context,
            resource_name,
            quantity,
        )
    }

    fn host_keys(&self) -> Result<KeySnapshot> {
        self.host_keys.snapshot().cloned()
    }
}

impl fmt::Debug for DefaultPolicyEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultPolicyEngine")
            .field("config", &self.config)
            .field("patterns", &self.patterns)
            .field("host_keys", &self.host_keys)
            .finish()
    }
}

/// Configuration phase for a [`DefaultPolicyEngine`]
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    registry: Option<Arc<dyn KeyRegistry>>,
    usage: Option<Arc<dyn UsageProvider>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Source of host-scoped keys; replaces the `host_keys` table of the config
    pub fn key_registry(mut self, registry: Arc<dyn KeyRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn usage_provider(mut self, usage: Arc<dyn UsageProvider>) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn build(self) -> std::result::Result<DefaultPolicyEngine, ConfigurationError> {
        self.config.validate()?;

        let registry = match self.registry {
            Some(registry) => registry,
            None => {
                let registry = self
                    .config
                    .host_keys
                    .iter()
                    .fold(StaticKeyRegistry::new(), |registry, (name, value)| {
                        registry.with_key(StaticKey::host(name, value))
                    });
                Arc::new(registry)
            }
        };

        Ok(DefaultPolicyEngine {
            patterns: PatternMatcher::new(self.config.pattern_cache_capacity),
            host_keys: HostKeys::new(registry),
            usage: self
                .usage
                .unwrap_or_else(|| Arc::new(InMemoryUsage::new())),
            config: self.config,
        })
    }
}
