//! # iam-engine - Policy-based authorization and quota evaluation
//!
//! Given a principal, a requested action on a resource, and the policies bound
//! to that principal, `iam-engine` decides Allow or Deny and, separately,
//! whether a resource quota permits an allocation.
//!
//! - **Explicit deny precedence**: any matching Deny overrides every Allow
//! - **Wildcards** in action, resource and principal patterns (`ec2:Describe*`)
//! - **Conditions** over host-scoped and request-scoped keys
//! - **Cross-account checks** with resource-based policies
//! - **Quotas** from `Limit` statements, independent of Allow/Deny
//! - **Contracts**: obligations an Allow attaches for downstream enforcement
//!
//! ## Quick Start
//!
//! ```rust
//! use iam_engine::iam::{DefaultPolicyEngine, EngineSlot, KeySnapshot, PolicyDocument, PolicyScope, Principal};
//! use iam_engine::Permissions;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Startup: build and install the engine once
//! let slot = Arc::new(EngineSlot::new());
//! slot.install(DefaultPolicyEngine::builder().build()?);
//! let permissions = Permissions::new(Arc::clone(&slot));
//!
//! // Policies are published as immutable versions bound to a principal
//! let policy = PolicyDocument::from_json(r#"{
//!     "Version": "2012-10-17",
//!     "Statement": [
//!         {"Effect": "Allow", "Action": ["ec2:*"], "Resource": ["*"]},
//!         {"Effect": "Deny", "Action": ["ec2:TerminateInstances"], "Resource": ["*"]}
//!     ]
//! }"#)?
//! .into_version("ec2-operator", "000000000001", PolicyScope::User);
//! let alice = Arc::new(Principal::user("alice", "000000000001").with_policy(Arc::new(policy)));
//!
//! // Serving: one auth context per request
//! let auth = permissions.create_auth_context(alice, KeySnapshot::new())?;
//! assert!(permissions.is_authorized("ec2", "instance", "i-123", Some("000000000001"), "RunInstances", &auth));
//! assert!(!permissions.is_authorized("ec2", "instance", "i-123", Some("000000000001"), "TerminateInstances", &auth));
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod permissions;

// Re-export core modules so crate:: paths in core resolve
pub use core::{config, error, iam, validation};

pub use crate::core::{
    config::EngineConfig,
    error::{AuthError, ConfigurationError, KeyError, Result},
    iam::{Decision, DenyReason, EngineSlot, PolicyEngine, QuotaDecision},
    validation::QualifiedName,
};
pub use permissions::{AuthContext, AuthContextSupplier, Permissions};
