//! Property-based tests for policy evaluation
//!
//! Uses proptest to verify decision invariants hold across random policies

use iam_engine::iam::{
    AuthorizationRequest, CaseSensitivity, Decision, DefaultPolicyEngine, DenyReason, Effect,
    KeySnapshot, PatternMatcher, PolicyEngine, PolicyScope, PolicyVersion, Principal,
    ResourceAccount, Statement,
};
use iam_engine::QualifiedName;
use proptest::prelude::*;
use std::sync::Arc;

const ACCOUNT: &str = "000000000001";

fn action_pattern() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("ec2:*".to_string()),
        Just("*".to_string()),
        "[A-Z][a-z]{1,6}\\*?".prop_map(|name| format!("ec2:{}", name)),
        "[A-Z][a-z]{1,6}".prop_map(|name| format!("s3:{}", name)),
    ]
}

fn resource_pattern() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("*".to_string()),
        "i-[0-9]{1,2}\\*?".prop_map(|name| format!("ec2:instance/{}", name)),
        "vol-[0-9]".prop_map(|name| format!("ec2:volume/{}", name)),
    ]
}

fn statement() -> impl Strategy<Value = Statement> {
    (
        prop_oneof![Just(Effect::Allow), Just(Effect::Deny)],
        prop::collection::vec(action_pattern(), 1..3),
        prop::collection::vec(resource_pattern(), 1..3),
    )
        .prop_map(|(effect, actions, resources)| Statement::new(effect, actions, resources))
}

fn decide(engine: &DefaultPolicyEngine, statements: Vec<Statement>, action: &str, name: &str) -> Decision {
    let policy = Arc::new(PolicyVersion::new("p", ACCOUNT, PolicyScope::User, statements));
    let principal = Arc::new(Principal::user("alice", ACCOUNT).with_policy(policy));
    let policies = principal.policies().to_vec();
    let ctx = engine
        .create_evaluation_context(
            Some(QualifiedName::new("ec2", "instance").unwrap()),
            QualifiedName::new("ec2", action).unwrap(),
            principal,
            KeySnapshot::new(),
            policies,
            None,
        )
        .unwrap();
    engine
        .evaluate_authorization(&ctx, &AuthorizationRequest::new(ResourceAccount::account(ACCOUNT), name))
        .unwrap()
}

proptest! {
    #[test]
    fn prop_decisions_are_deterministic(
        statements in prop::collection::vec(statement(), 0..8),
        action in "[A-Z][a-z]{1,6}",
        name in "i-[0-9]{1,3}",
    ) {
        let engine = DefaultPolicyEngine::default();
        let first = decide(&engine, statements.clone(), &action, &name);
        let second = decide(&engine, statements.clone(), &action, &name);
        prop_assert_eq!(&first, &second);

        // A fresh engine with a cold cache agrees
        let cold = decide(&DefaultPolicyEngine::default(), statements, &action, &name);
        prop_assert_eq!(first, cold);
    }

    #[test]
    fn prop_universal_deny_always_wins(
        statements in prop::collection::vec(statement(), 0..8),
        action in "[A-Z][a-z]{1,6}",
        name in "i-[0-9]{1,3}",
    ) {
        let engine = DefaultPolicyEngine::default();
        let mut statements = statements;
        statements.push(Statement::new(Effect::Deny, ["ec2:*"], ["*"]).with_sid("DenyAll"));

        let decision = decide(&engine, statements, &action, &name);
        let is_explicit_deny = matches!(decision, Decision::Deny(DenyReason::ExplicitDeny { .. }));
        prop_assert!(is_explicit_deny);
    }

    #[test]
    fn prop_statement_order_is_irrelevant(
        statements in prop::collection::vec(statement(), 0..8),
        action in "[A-Z][a-z]{1,6}",
        name in "i-[0-9]{1,3}",
    ) {
        let engine = DefaultPolicyEngine::default();
        let forward = decide(&engine, statements.clone(), &action, &name);
        let mut reversed = statements;
        reversed.reverse();
        let backward = decide(&engine, reversed, &action, &name);
        prop_assert_eq!(forward.is_allowed(), backward.is_allowed());
    }

    #[test]
    fn prop_no_statements_is_implicit_deny(
        action in "[A-Z][a-z]{1,6}",
        name in "[a-z0-9-]{1,12}",
    ) {
        let engine = DefaultPolicyEngine::default();
        prop_assert_eq!(
            decide(&engine, Vec::new(), &action, &name),
            Decision::Deny(DenyReason::ImplicitDeny)
        );
    }

    #[test]
    fn prop_literal_pattern_is_string_equality(
        pattern in "[a-zA-Z0-9.+()-]{0,16}",
        value in "[a-zA-Z0-9.+()-]{0,16}",
    ) {
        let matcher = PatternMatcher::default();
        prop_assert_eq!(
            matcher.matches(&pattern, &value, CaseSensitivity::Sensitive),
            pattern == value
        );
        prop_assert_eq!(
            matcher.matches(&pattern, &value, CaseSensitivity::Insensitive),
            pattern.eq_ignore_ascii_case(&value)
        );
    }

    #[test]
    fn prop_prefix_wildcard_matches_extensions(
        prefix in "[a-z0-9:-]{0,12}",
        suffix in "[a-z0-9:/-]{0,12}",
    ) {
        let matcher = PatternMatcher::new(8);
        let pattern = format!("{}*", prefix);
        let value = format!("{}{}", prefix, suffix);
        prop_assert!(matcher.matches(&pattern, &value, CaseSensitivity::Sensitive));
    }
}
