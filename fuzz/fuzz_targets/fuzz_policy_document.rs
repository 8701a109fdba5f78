#![no_main]
use iam_engine::iam::{
    AuthorizationRequest, DefaultPolicyEngine, KeySnapshot, PolicyDocument, PolicyEngine,
    PolicyScope, Principal, ResourceAccount,
};
use iam_engine::QualifiedName;
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(document) = PolicyDocument::from_json(json) else {
        return;
    };
    if document.validate().is_err() {
        return;
    }

    let policy = Arc::new(document.into_version("fuzz", "000000000001", PolicyScope::User));
    let principal = Arc::new(Principal::user("fuzz", "000000000001").with_policy(policy));
    let policies = principal.policies().to_vec();
    let engine = DefaultPolicyEngine::default();
    let Ok(ctx) = engine.create_evaluation_context(
        QualifiedName::new("ec2", "instance").ok(),
        QualifiedName::new("ec2", "RunInstances").unwrap(),
        principal,
        KeySnapshot::new().with("aws:sourceip", "10.0.0.1"),
        policies,
        None,
    ) else {
        return;
    };

    let request = AuthorizationRequest::new(ResourceAccount::Unowned, "i-1");
    let first = engine.evaluate_authorization(&ctx, &request).unwrap();
    assert_eq!(first, engine.evaluate_authorization(&ctx, &request).unwrap());
    let _ = engine.evaluate_quota(&ctx, "i-1", 1);
});
