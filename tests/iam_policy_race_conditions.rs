//! IAM engine race condition tests
//!
//! Evaluations share the installed engine, the compiled-pattern cache and the
//! memoised host keys; none of them may change a decision.

use iam_engine::iam::{
    ambient, ConditionKey, Contract, ContractType, DefaultPolicyEngine, Effect, EngineBuilder,
    EngineSlot, KeyScope, KeySnapshot, PolicyScope, PolicyVersion, Principal, RequestContracts,
    StaticKeyRegistry, Statement,
};
use iam_engine::{AuthContext, EngineConfig, Permissions};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const ACCOUNT: &str = "000000000001";

fn auth(permissions: &Permissions) -> AuthContext {
    let policy = Arc::new(PolicyVersion::new(
        "p",
        ACCOUNT,
        PolicyScope::User,
        vec![
            Statement::new(Effect::Allow, ["ec2:Describe*"], ["*"])
                .with_contract(Contract::new(ContractType::MaxKeys, "100")),
            Statement::new(Effect::Allow, ["ec2:*"], ["ec2:instance/dev-*"]),
            Statement::new(Effect::Deny, ["ec2:Terminate*"], ["ec2:instance/dev-db*"]),
        ],
    ));
    let alice = Arc::new(Principal::user("alice", ACCOUNT).with_policy(policy));
    permissions.create_auth_context(alice, KeySnapshot::new()).unwrap()
}

fn expected(action: &str, name: &str) -> bool {
    action.starts_with("Describe")
        || (name.starts_with("dev-") && !(action.starts_with("Terminate") && name.starts_with("dev-db")))
}

#[test]
fn test_concurrent_decisions_match_sequential() {
    // A tiny cache forces constant eviction while threads race
    let config = EngineConfig {
        pattern_cache_capacity: 2,
        ..EngineConfig::default()
    };
    let engine = EngineBuilder::new().config(config).build().unwrap();
    let permissions = Permissions::new(Arc::new(EngineSlot::with_engine(engine)));
    let auth = auth(&permissions);

    let actions = ["DescribeInstances", "StartInstances", "TerminateInstances"];
    let names = ["dev-web", "dev-db1", "prod-web"];

    crossbeam::scope(|s| {
        for t in 0..8 {
            let permissions = &permissions;
            let auth = &auth;
            s.spawn(move |_| {
                for i in 0..500 {
                    let action = actions[(i + t) % actions.len()];
                    let name = names[(i * 7 + t) % names.len()];
                    let allowed = permissions.is_authorized("ec2", "instance", name, Some(ACCOUNT), action, auth);
                    assert_eq!(allowed, expected(action, name), "{} on {}", action, name);
                }
            });
        }
    })
    .unwrap();
}

#[test]
fn test_reinstall_while_serving() {
    let slot = Arc::new(EngineSlot::with_engine(DefaultPolicyEngine::default()));
    let permissions = Permissions::new(Arc::clone(&slot));
    let auth = auth(&permissions);

    crossbeam::scope(|s| {
        for _ in 0..4 {
            let permissions = &permissions;
            let auth = &auth;
            s.spawn(move |_| {
                for _ in 0..500 {
                    assert!(permissions.is_authorized("ec2", "instance", "dev-1", None, "StartInstances", auth));
                    assert!(!permissions.is_authorized("ec2", "instance", "prod-1", None, "StartInstances", auth));
                }
            });
        }

        let slot = &slot;
        s.spawn(move |_| {
            for _ in 0..50 {
                slot.install(DefaultPolicyEngine::default());
            }
        });
    })
    .unwrap();
}

#[test]
fn test_host_keys_computed_once() {
    struct Hostname(Arc<AtomicUsize>);

    impl ConditionKey for Hostname {
        fn name(&self) -> &str {
            "euca:hostname"
        }

        fn scope(&self) -> KeyScope {
            KeyScope::Host
        }

        fn value(&self) -> anyhow::Result<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok("node-1".to_string())
        }
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let registry = StaticKeyRegistry::new().with_key(Hostname(Arc::clone(&calls)));
    let engine = EngineBuilder::new()
        .key_registry(Arc::new(registry))
        .build()
        .unwrap();
    let permissions = Permissions::new(Arc::new(EngineSlot::with_engine(engine)));

    crossbeam::scope(|s| {
        for _ in 0..8 {
            let permissions = &permissions;
            s.spawn(move |_| {
                for _ in 0..100 {
                    let keys = permissions.evaluate_host_keys().unwrap();
                    assert_eq!(keys.get("euca:hostname"), Some("node-1"));
                }
            });
        }
    })
    .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_request_scopes_do_not_leak_between_threads() {
    let permissions = Permissions::new(Arc::new(EngineSlot::with_engine(DefaultPolicyEngine::default())));
    let auth = auth(&permissions);

    crossbeam::scope(|s| {
        for t in 0..8 {
            let permissions = &permissions;
            let auth = &auth;
            s.spawn(move |_| {
                let sink = Arc::new(RequestContracts::new());
                let name = if t % 2 == 0 { "dev-1" } else { "dev-db1" };
                for _ in 0..100 {
                    let allowed = ambient::enter(sink.clone(), || {
                        permissions.is_authorized("ec2", "instance", name, None, "TerminateInstances", auth)
                    });
                    assert_eq!(allowed, t % 2 == 0);
                    // An allow without contracts delivers an empty map; a deny delivers nothing
                    assert_eq!(sink.take().map(|c| c.is_empty()), allowed.then_some(true));

                    ambient::enter(sink.clone(), || {
                        permissions.is_authorized("ec2", "instance", name, None, "DescribeInstances", auth)
                    });
                    let contracts = sink.take().unwrap();
                    assert_eq!(contracts[&ContractType::MaxKeys].value, "100");
                }
            });
        }
    })
    .unwrap();
}
