//! Per-call evaluation context
//!
//! An [`EvaluationContext`] binds everything one decision needs: who is
//! asking, for which qualified action and resource type, with which resolved
//! keys, under which policies. It is immutable once built and is consumed by
//! the evaluation it was built for.

use super::keys::KeySnapshot;
use super::policy::{PolicyVersion, Statement};
use super::principal::{EffectivePrincipal, Principal, PrincipalOverride, ResourceAccount};
use crate::validation::QualifiedName;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug)]
pub struct EvaluationContext {
    request_id: Uuid,
    principal: Arc<Principal>,
    effective: EffectivePrincipal,
    resource_type: Option<QualifiedName>,
    action: QualifiedName,
    keys: KeySnapshot,
    policies: Vec<Arc<PolicyVersion>>,
}

impl EvaluationContext {
    /// Build a context; engines call this after resolving keys
    pub fn new(
        resource_type: Option<QualifiedName>,
        action: QualifiedName,
        principal: Arc<Principal>,
        keys: KeySnapshot,
        policies: Vec<Arc<PolicyVersion>>,
        principal_override: Option<PrincipalOverride>,
    ) -> Self {
        let effective = match principal_override {
            Some(PrincipalOverride {
                principal_type,
                name,
            }) => EffectivePrincipal {
                principal_type,
                name,
                account_number: principal.account_number().to_string(),
            },
            None => EffectivePrincipal {
                principal_type: principal.principal_type(),
                name: principal.name().to_string(),
                account_number: principal.account_number().to_string(),
            },
        };

        EvaluationContext {
            request_id: Uuid::new_v4(),
            principal,
            effective,
            resource_type,
            action,
            keys,
            policies,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Identity used for principal matching (override applied)
    pub fn effective_principal(&self) -> &EffectivePrincipal {
        &self.effective
    }

    pub fn resource_type(&self) -> Option<&QualifiedName> {
        self.resource_type.as_ref()
    }

    pub fn action(&self) -> &QualifiedName {
        &self.action
    }

    pub fn keys(&self) -> &KeySnapshot {
        &self.keys
    }

    pub fn policies(&self) -> &[Arc<PolicyVersion>] {
        &self.policies
    }

    /// All statements of the bound identity policies, in order
    pub fn statements(&self) -> impl Iterator<Item = (&PolicyVersion, &Statement)> {
        self.policies.iter().flat_map(|policy| {
            policy
                .statements()
                .iter()
                .map(move |statement| (policy.as_ref(), statement))
        })
    }

    /// Human-readable description of an access request, for audit messages
    pub fn describe(&self, resource_account: &ResourceAccount, resource_name: &str) -> String {
        let mut description = self.describe_resource(resource_name);
        if let Some(account) = resource_account.account_number() {
            description.push_str(&format!(" (account {})", account));
        }
        description.push_str(&format!(
            " for action {} by {}",
            self.action, self.effective
        ));
        description
    }

    /// Human-readable description of an allocation request
    pub fn describe_quota(&self, resource_name: &str, quantity: u64) -> String {
        format!(
            "{} x {} for action {} by {}",
            quantity,
            self.describe_resource(resource_name),
            self.action,
            self.effective
        )
    }

    fn describe_resource(&self, resource_name: &str) -> String {
        match (&self.resource_type, resource_name.is_empty()) {
            (Some(resource_type), false) => format!("{}/{}", resource_type, resource_name),
            (Some(resource_type), true) => resource_type.to_string(),
            (None, false) => resource_name.to_string(),
            (None, true) => "*".to_string(),
        }
    }
}
