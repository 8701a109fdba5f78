//! Boolean permission checks
//!
//! [`Permissions`] is the surface the rest of a service calls. Every check
//! returns a plain `bool`: expected denials are logged at debug level and
//! evaluation faults at error level, and neither escapes as an error. Callers
//! that need the reason for an audit message use the [`PolicyEngine`] API
//! directly.
//!
//! ```
//! use iam_engine::iam::{DefaultPolicyEngine, EngineSlot, Effect, KeySnapshot, PolicyScope, PolicyVersion, Principal, Statement};
//! use iam_engine::Permissions;
//! use std::sync::Arc;
//!
//! let slot = Arc::new(EngineSlot::with_engine(DefaultPolicyEngine::default()));
//! let permissions = Permissions::new(slot);
//!
//! let policy = Arc::new(PolicyVersion::new(
//!     "run-instances",
//!     "000000000001",
//!     PolicyScope::User,
//!     vec![Statement::new(Effect::Allow, ["ec2:RunInstances"], ["*"])],
//! ));
//! let alice = Arc::new(Principal::user("alice", "000000000001").with_policy(policy));
//! let auth = permissions.create_auth_context(alice, KeySnapshot::new()).unwrap();
//!
//! assert!(permissions.is_authorized("ec2", "instance", "i-123", Some("000000000001"), "RunInstances", &auth));
//! assert!(!permissions.is_authorized("ec2", "instance", "i-123", Some("000000000001"), "TerminateInstances", &auth));
//! ```

use crate::error::AuthError;
use crate::iam::{
    ambient, AuthorizationRequest, ContractMap, ContractSink, Decision, EngineSlot,
    EvaluationContext, KeySnapshot, PolicyEngine, PolicyVersion, Principal, PrincipalOverride,
    QuotaDecision, ResourceAccount,
};
use crate::validation::QualifiedName;
use std::sync::Arc;
use tracing::{debug, error};

/// A request principal with its policies and evaluated keys
#[derive(Debug, Clone)]
pub struct AuthContext {
    principal: Arc<Principal>,
    policies: Vec<Arc<PolicyVersion>>,
    keys: KeySnapshot,
}

impl AuthContext {
    /// Bind the principal's own policies
    pub fn new(principal: Arc<Principal>, keys: KeySnapshot) -> Self {
        let policies = principal.policies().to_vec();
        AuthContext {
            principal,
            policies,
            keys,
        }
    }

    pub fn principal(&self) -> &Arc<Principal> {
        &self.principal
    }

    pub fn policies(&self) -> &[Arc<PolicyVersion>] {
        &self.policies
    }

    pub fn keys(&self) -> &KeySnapshot {
        &self.keys
    }

    /// Build an evaluation context for one qualified action
    pub fn evaluation_context(
        &self,
        engine: &dyn PolicyEngine,
        resource_type: Option<QualifiedName>,
        action: QualifiedName,
        principal_override: Option<PrincipalOverride>,
    ) -> Result<EvaluationContext, AuthError> {
        engine.create_evaluation_context(
            resource_type,
            action,
            Arc::clone(&self.principal),
            self.keys.clone(),
            self.policies.clone(),
            principal_override,
        )
    }
}

/// Deferred source of an [`AuthContext`]
///
/// Implemented by `AuthContext` itself and by any
/// `Fn() -> Result<AuthContext, AuthError>` closure.
pub trait AuthContextSupplier {
    fn supply(&self) -> Result<AuthContext, AuthError>;
}

impl AuthContextSupplier for AuthContext {
    fn supply(&self) -> Result<AuthContext, AuthError> {
        Ok(self.clone())
    }
}

impl<F> AuthContextSupplier for F
where
    F: Fn() -> Result<AuthContext, AuthError>,
{
    fn supply(&self) -> Result<AuthContext, AuthError> {
        self()
    }
}

/// Permission checks against the engine installed in an [`EngineSlot`]
#[derive(Debug, Clone)]
pub struct Permissions {
    slot: Arc<EngineSlot>,
}

impl Permissions {
    pub fn new(slot: Arc<EngineSlot>) -> Self {
        Permissions { slot }
    }

    pub fn slot(&self) -> &Arc<EngineSlot> {
        &self.slot
    }

    fn engine(&self) -> Result<Arc<dyn PolicyEngine>, AuthError> {
        Ok(self.slot.engine()?)
    }

    /// Bind a principal and its request keys, merged with the host keys
    pub fn create_auth_context(
        &self,
        principal: Arc<Principal>,
        request_keys: KeySnapshot,
    ) -> Result<AuthContext, AuthError> {
        let host = self.engine()?.host_keys()?;
        Ok(AuthContext::new(
            principal,
            KeySnapshot::merge(&host, &request_keys),
        ))
    }

    /// A supplier that builds the auth context on first use by each check
    pub fn create_auth_context_supplier(
        &self,
        principal: Arc<Principal>,
        request_keys: KeySnapshot,
    ) -> impl AuthContextSupplier + Send + Sync + 'static {
        let permissions = self.clone();
        move || permissions.create_auth_context(Arc::clone(&principal), request_keys.clone())
    }

    /// Host-scoped condition keys of the installed engine
    pub fn evaluate_host_keys(&self) -> Result<KeySnapshot, AuthError> {
        self.engine()?.host_keys()
    }

    /// Build an evaluation context for `vendor:action` on `vendor:resource_type`
    ///
    /// # Panics
    ///
    /// Panics if `vendor` or `action` is empty.
    pub fn create_evaluation_context(
        &self,
        vendor: &str,
        resource_type: Option<&str>,
        action: &str,
        auth: &AuthContext,
    ) -> Result<EvaluationContext, AuthError> {
        self.evaluation_context(vendor, resource_type, action, auth, None)
    }

    fn evaluation_context(
        &self,
        vendor: &str,
        resource_type: Option<&str>,
        action: &str,
        auth: &AuthContext,
        principal_override: Option<PrincipalOverride>,
    ) -> Result<EvaluationContext, AuthError> {
        assert!(!vendor.is_empty(), "vendor must not be empty");
        assert!(!action.is_empty(), "action must not be empty");

        let resource_type = resource_type
            .map(|resource_type| QualifiedName::new(vendor, resource_type))
            .transpose()?;
        let action = QualifiedName::new(vendor, action)?;
        auth.evaluation_context(
            self.engine()?.as_ref(),
            resource_type,
            action,
            principal_override,
        )
    }

    /// Check access to a named resource owned by `resource_account`
    ///
    /// On Allow, contracts go to the active [`ambient`] request scope, if any.
    ///
    /// # Panics
    ///
    /// Panics if `vendor` or `action` is empty.
    pub fn is_authorized(
        &self,
        vendor: &str,
        resource_type: &str,
        resource_name: &str,
        resource_account: Option<&str>,
        action: &str,
        auth: &impl AuthContextSupplier,
    ) -> bool {
        let context = auth
            .supply()
            .and_then(|auth| self.evaluation_context(vendor, Some(resource_type), action, &auth, None));
        match context {
            Ok(context) => self.is_authorized_in_context(
                &context,
                &ResourceAccount::from(resource_account),
                resource_name,
                None,
            ),
            Err(e) => {
                error!(error = %e, "Exception in resource access to {}:{}", resource_type, resource_name);
                false
            }
        }
    }

    /// Check access with an already built context
    ///
    /// Contracts go to `sink` when given, otherwise to the ambient scope.
    pub fn is_authorized_in_context(
        &self,
        context: &EvaluationContext,
        resource_account: &ResourceAccount,
        resource_name: &str,
        sink: Option<&dyn ContractSink>,
    ) -> bool {
        let request = AuthorizationRequest::new(resource_account.clone(), resource_name);
        self.authorize(context, &request, sink)
    }

    /// Check access to a resource that carries its own resource-based policy
    ///
    /// `principal_override` names the identity the resource policy's
    /// `Principal` element is matched against.
    ///
    /// # Panics
    ///
    /// Panics if `vendor` or `action` is empty.
    #[allow(clippy::too_many_arguments)]
    pub fn is_authorized_with_resource_policy(
        &self,
        vendor: &str,
        resource_type: &str,
        resource_name: &str,
        resource_account: Option<&str>,
        resource_policy: Arc<PolicyVersion>,
        action: &str,
        principal_override: Option<PrincipalOverride>,
        auth: &impl AuthContextSupplier,
    ) -> bool {
        let context = auth.supply().and_then(|auth| {
            self.evaluation_context(vendor, Some(resource_type), action, &auth, principal_override)
        });
        match context {
            Ok(context) => {
                let request =
                    AuthorizationRequest::new(ResourceAccount::from(resource_account), resource_name)
                        .with_resource_policy(resource_policy);
                self.authorize(&context, &request, None)
            }
            Err(e) => {
                error!(error = %e, "Exception in resource access to {}:{}", resource_type, resource_name);
                false
            }
        }
    }

    /// Resource-agnostic probe for `vendor:action`
    ///
    /// Only unconditional statements are considered and a Deny scoped to a
    /// particular resource is not seen. Use it to decide what to offer in a
    /// user interface, never to permit an operation.
    ///
    /// # Panics
    ///
    /// Panics if `vendor` or `action` is empty.
    pub fn perhaps_authorized(
        &self,
        vendor: &str,
        action: &str,
        auth: &impl AuthContextSupplier,
    ) -> bool {
        let decision = auth
            .supply()
            .and_then(|auth| self.evaluation_context(vendor, None, action, &auth, None))
            .and_then(|context| {
                self.engine()?
                    .evaluate_authorization(&context, &AuthorizationRequest::unconditional())
            });

        match decision {
            Ok(Decision::Allow { .. }) => true,
            Ok(Decision::Deny(reason)) => {
                debug!("Denied access for action {}:{}: {}", vendor, action, reason);
                false
            }
            Err(e) => {
                error!(error = %e, "Exception in access for action {}:{}", vendor, action);
                false
            }
        }
    }

    /// Check whether `quantity` more resources may be allocated
    ///
    /// Only `Limit` statements are consulted; authorization to perform the
    /// action is a separate check.
    ///
    /// # Panics
    ///
    /// Panics if `vendor` or `action` is empty.
    pub fn can_allocate(
        &self,
        vendor: &str,
        resource_type: &str,
        resource_name: &str,
        action: &str,
        auth: &impl AuthContextSupplier,
        quantity: u64,
    ) -> bool {
        let context = auth
            .supply()
            .and_then(|auth| self.evaluation_context(vendor, Some(resource_type), action, &auth, None));
        match context {
            Ok(context) => self.can_allocate_in_context(&context, resource_name, quantity),
            Err(e) => {
                error!(error = %e, "Exception in resource allocation for {}:{}", resource_type, resource_name);
                false
            }
        }
    }

    pub fn can_allocate_in_context(
        &self,
        context: &EvaluationContext,
        resource_name: &str,
        quantity: u64,
    ) -> bool {
        let decision = self
            .engine()
            .and_then(|engine| engine.evaluate_quota(context, resource_name, quantity));

        match decision {
            Ok(QuotaDecision::Allow) => true,
            Ok(deny @ QuotaDecision::Deny { .. }) => {
                if let Err(e) = deny.into_result(context.describe_quota(resource_name, quantity)) {
                    debug!(request_id = %context.request_id(), "Denied resource allocation: {}", e);
                }
                false
            }
            Err(e) => {
                error!(
                    request_id = %context.request_id(),
                    error = %e,
                    "Exception in resource allocation of {}",
                    context.describe_quota(resource_name, quantity)
                );
                false
            }
        }
    }

    fn authorize(
        &self,
        context: &EvaluationContext,
        request: &AuthorizationRequest,
        sink: Option<&dyn ContractSink>,
    ) -> bool {
        let decision = self
            .engine()
            .and_then(|engine| engine.evaluate_authorization(context, request));

        match decision {
            Ok(Decision::Allow { contracts }) => {
                deliver(context, contracts, sink);
                true
            }
            Ok(Decision::Deny(reason)) => {
                debug!(
                    request_id = %context.request_id(),
                    "Denied resource access to {}: {}",
                    context.describe(&request.resource_account, &request.resource_name),
                    reason
                );
                false
            }
            Err(e) => {
                error!(
                    request_id = %context.request_id(),
                    error = %e,
                    "Exception in resource access to {}",
                    context.describe(&request.resource_account, &request.resource_name)
                );
                false
            }
        }
    }
}

fn deliver(context: &EvaluationContext, contracts: ContractMap, sink: Option<&dyn ContractSink>) {
    match sink {
        Some(sink) => sink.set_contracts(contracts),
        None => {
            if !ambient::push(contracts) {
                debug!(request_id = %context.request_id(), "Not in a request context");
            }
        }
    }
}
