//! IAM Policy document structure
//!
//! Policies define what actions are allowed, denied or limited on resources.
//! A [`PolicyDocument`] is the editable form; once bound to a principal it is
//! published as an immutable, versioned [`PolicyVersion`].

use super::condition::Condition;
use super::contract::Contract;
use super::keys::KeySnapshot;
use super::pattern::{CaseSensitivity, PatternMatcher, ResourcePattern};
use super::principal::{EffectivePrincipal, PrincipalPattern, ResourceAccount};
use super::quota::QuotaLimit;
use crate::validation::QualifiedName;
use serde::{Deserialize, Serialize};

/// Effect of a policy statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    /// Allow the action
    Allow,
    /// Deny the action (takes precedence over Allow)
    Deny,
    /// Cap the amount of a resource that may be allocated
    Limit,
}

/// A single policy statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    /// Statement ID (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    /// Effect of this statement
    pub effect: Effect,

    /// Action patterns this statement applies to (e.g. `ec2:Describe*`)
    pub action: Vec<String>,

    /// Resource patterns this statement applies to (supports wildcards)
    pub resource: Vec<ResourcePattern>,

    /// Principals a resource policy statement applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Vec<String>>,

    /// Conditions that must all hold for the statement to apply
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub condition: Vec<Condition>,

    /// Obligation delivered when this statement grants access
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<Contract>,

    /// Ceiling carried by a `Limit` statement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota: Option<QuotaLimit>,
}

impl Statement {
    /// Create a new statement
    pub fn new<A, R>(effect: Effect, action: A, resource: R) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<ResourcePattern>,
    {
        Statement {
            sid: None,
            effect,
            action: action.into_iter().map(Into::into).collect(),
            resource: resource.into_iter().map(Into::into).collect(),
            principal: None,
            condition: Vec::new(),
            contract: None,
            quota: None,
        }
    }

    /// Create a `Limit` statement carrying a quota
    pub fn limit<A, R>(action: A, resource: R, quota: QuotaLimit) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<ResourcePattern>,
    {
        let mut statement = Self::new(Effect::Limit, action, resource);
        statement.quota = Some(quota);
        statement
    }

    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition.push(condition);
        self
    }

    pub fn with_contract(mut self, contract: Contract) -> Self {
        self.contract = Some(contract);
        self
    }

    pub fn with_principal<P>(mut self, principals: P) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
    {
        self.principal = Some(principals.into_iter().map(Into::into).collect());
        self
    }

    /// Check if any action pattern covers the qualified action
    pub fn matches_action(&self, matcher: &PatternMatcher, action: &QualifiedName) -> bool {
        let action = action.to_string();
        self.action
            .iter()
            .any(|pattern| matcher.matches(pattern, &action, CaseSensitivity::Insensitive))
    }

    /// Check if any resource pattern covers the resource
    pub fn matches_resource(
        &self,
        matcher: &PatternMatcher,
        resource_account: &ResourceAccount,
        resource_type: Option<&QualifiedName>,
        resource_name: &str,
    ) -> bool {
        self.resource.iter().any(|pattern| {
            pattern.matches(matcher, resource_account, resource_type, resource_name)
        })
    }

    /// Check the `Principal` element; statements without one apply to anyone
    pub fn matches_principal(&self, matcher: &PatternMatcher, principal: &EffectivePrincipal) -> bool {
        match &self.principal {
            None => true,
            Some(patterns) => patterns
                .iter()
                .any(|raw| PrincipalPattern::parse(raw).matches(matcher, principal)),
        }
    }

    /// Check that every condition holds against the snapshot
    pub fn conditions_hold(&self, snapshot: &KeySnapshot, matcher: &PatternMatcher) -> bool {
        self.condition
            .iter()
            .all(|condition| condition.evaluate(snapshot, matcher))
    }

    pub fn is_unconditional(&self) -> bool {
        self.condition.is_empty()
    }

    /// True when one of the resource patterns is the universal `*`
    pub fn covers_all_resources(&self) -> bool {
        self.resource.iter().any(ResourcePattern::is_any)
    }
}

/// Editable IAM policy document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    /// Policy language version
    pub version: String,

    /// List of policy statements
    pub statement: Vec<Statement>,
}

impl PolicyDocument {
    /// Create a new empty policy
    pub fn new() -> Self {
        PolicyDocument {
            version: "2012-10-17".to_string(),
            statement: Vec::new(),
        }
    }

    /// Add a statement to this policy
    pub fn add_statement(&mut self, statement: Statement) {
        self.statement.push(statement);
    }

    /// Builder form of [`add_statement`](Self::add_statement)
    pub fn with_statement(mut self, statement: Statement) -> Self {
        self.add_statement(statement);
        self
    }

    /// Parse policy from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize policy to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Validate policy structure
    pub fn validate(&self) -> Result<(), String> {
        if self.statement.is_empty() {
            return Err("Policy must have at least one statement".to_string());
        }

        for (i, stmt) in self.statement.iter().enumerate() {
            if stmt.action.is_empty() {
                return Err(format!("Statement {} has no actions", i));
            }
            if stmt.resource.is_empty() {
                return Err(format!("Statement {} has no resources", i));
            }
            match (stmt.effect, &stmt.quota) {
                (Effect::Limit, None) => {
                    return Err(format!("Statement {} is a Limit without a quota", i));
                }
                (Effect::Allow | Effect::Deny, Some(_)) => {
                    return Err(format!("Statement {} carries a quota but is not a Limit", i));
                }
                _ => {}
            }
            if stmt.contract.is_some() && stmt.effect != Effect::Allow {
                return Err(format!("Statement {} attaches a contract but is not an Allow", i));
            }
            if let Some(condition) = stmt.condition.iter().find(|c| c.values.is_empty()) {
                return Err(format!(
                    "Statement {} has a {:?} condition on {} without values",
                    i, condition.operator, condition.key
                ));
            }
        }

        Ok(())
    }

    /// Publish as an immutable policy version
    pub fn into_version(
        self,
        policy_id: impl Into<String>,
        account_number: impl Into<String>,
        scope: PolicyScope,
    ) -> PolicyVersion {
        PolicyVersion::new(policy_id, account_number, scope, self.statement)
    }
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// Where a policy is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyScope {
    Account,
    Group,
    User,
    Role,
    /// Attached to the target resource rather than an identity
    Resource,
}

/// Immutable, versioned policy owned by an account
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyVersion {
    policy_id: String,
    version_id: String,
    account_number: String,
    scope: PolicyScope,
    statements: Vec<Statement>,
}

impl PolicyVersion {
    pub fn new(
        policy_id: impl Into<String>,
        account_number: impl Into<String>,
        scope: PolicyScope,
        statements: Vec<Statement>,
    ) -> Self {
        PolicyVersion {
            policy_id: policy_id.into(),
            version_id: "v1".to_string(),
            account_number: account_number.into(),
            scope,
            statements,
        }
    }

    pub fn with_version_id(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = version_id.into();
        self
    }

    pub fn policy_id(&self) -> &str {
        &self.policy_id
    }

    pub fn version_id(&self) -> &str {
        &self.version_id
    }

    pub fn account_number(&self) -> &str {
        &self.account_number
    }

    pub fn scope(&self) -> PolicyScope {
        self.scope
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn is_resource_policy(&self) -> bool {
        self.scope == PolicyScope::Resource
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iam::{ConditionOperator, ContractType, QuotaScope};

    fn action(name: &str) -> QualifiedName {
        QualifiedName::parse(name).unwrap()
    }

    #[test]
    fn test_policy_creation() {
        let mut policy = PolicyDocument::new();
        assert_eq!(policy.statement.len(), 0);

        policy.add_statement(Statement::new(
            Effect::Allow,
            ["ec2:RunInstances"],
            ["*"],
        ));

        assert_eq!(policy.statement.len(), 1);
    }

    #[test]
    fn test_policy_json_roundtrip() {
        let policy = PolicyDocument::new().with_statement(
            Statement::new(Effect::Allow, ["ec2:Describe*", "ec2:RunInstances"], ["*"])
                .with_condition(Condition::new(
                    ConditionOperator::StringEquals,
                    "aws:username",
                    ["alice"],
                ))
                .with_contract(Contract::new(ContractType::MaxKeys, "50")),
        );

        let json = policy.to_json().unwrap();
        let parsed = PolicyDocument::from_json(&json).unwrap();

        assert_eq!(parsed, policy);
        assert_eq!(parsed.statement[0].action.len(), 2);
    }

    #[test]
    fn test_policy_from_iam_json() {
        let json = r#"{
            "Version": "2012-10-17",
            "Statement": [
                {"Effect": "Allow", "Action": ["ec2:*"], "Resource": ["arn:aws:ec2:::instance/*"]},
                {"Effect": "Limit", "Action": ["ec2:RunInstances"], "Resource": ["*"],
                 "Quota": {"ResourceType": "ec2:instance", "Maximum": 5, "Scope": "Account"}}
            ]
        }"#;
        let policy = PolicyDocument::from_json(json).unwrap();
        assert!(policy.validate().is_ok());
        assert_eq!(
            policy.statement[1].quota.as_ref().map(|q| q.scope),
            Some(QuotaScope::Account)
        );
    }

    #[test]
    fn test_policy_validation() {
        let empty_policy = PolicyDocument::new();
        assert!(empty_policy.validate().is_err());

        let valid_policy =
            PolicyDocument::new().with_statement(Statement::new(Effect::Allow, ["ec2:*"], ["*"]));
        assert!(valid_policy.validate().is_ok());

        let no_quota = PolicyDocument::new().with_statement(Statement::new(
            Effect::Limit,
            ["ec2:RunInstances"],
            ["*"],
        ));
        assert!(no_quota.validate().is_err());

        let deny_contract = PolicyDocument::new().with_statement(
            Statement::new(Effect::Deny, ["ec2:*"], ["*"])
                .with_contract(Contract::new(ContractType::MaxKeys, "1")),
        );
        assert!(deny_contract.validate().is_err());

        let empty_condition = PolicyDocument::new().with_statement(
            Statement::new(Effect::Allow, ["ec2:*"], ["*"]).with_condition(Condition::new(
                ConditionOperator::NotIpAddress,
                "aws:sourceip",
                Vec::<String>::new(),
            )),
        );
        assert!(empty_condition.validate().is_err());
    }

    #[test]
    fn test_statement_matching() {
        let m = PatternMatcher::default();
        let stmt = Statement::new(Effect::Allow, ["ec2:Describe*"], ["ec2:instance/i-*"]);
        let instance = QualifiedName::new("ec2", "instance").unwrap();

        assert!(stmt.matches_action(&m, &action("ec2:DescribeInstances")));
        assert!(!stmt.matches_action(&m, &action("ec2:CreateInstances")));
        let own = ResourceAccount::Unowned;
        assert!(stmt.matches_resource(&m, &own, Some(&instance), "i-123"));
        assert!(!stmt.matches_resource(&m, &own, Some(&instance), "vol-1"));
        assert!(!stmt.covers_all_resources());
        assert!(stmt.is_unconditional());
    }

    #[test]
    fn test_published_version_is_read_only() {
        let version = PolicyDocument::new()
            .with_statement(Statement::new(Effect::Allow, ["ec2:*"], ["*"]))
            .into_version("p-1", "000000000001", PolicyScope::User)
            .with_version_id("v3");

        assert_eq!(version.policy_id(), "p-1");
        assert_eq!(version.version_id(), "v3");
        assert_eq!(version.account_number(), "000000000001");
        assert_eq!(version.statements().len(), 1);
        assert!(!version.is_resource_policy());
    }
}
