//! Condition key resolution
//!
//! Condition keys are named values a statement's condition block is evaluated
//! against. Host-scoped keys describe the receiving host and are computed once
//! per process; request-scoped keys are supplied by the caller on each call.
//! Both end up in a [`KeySnapshot`] bound to one evaluation context.

use crate::error::{AuthError, KeyError};
use once_cell::sync::OnceCell;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Well-known key: the caller's source address
pub const SOURCE_IP: &str = "aws:sourceip";
/// Well-known key: the current time (RFC 3339)
pub const CURRENT_TIME: &str = "aws:currenttime";
/// Well-known key: whether the request arrived over TLS
pub const SECURE_TRANSPORT: &str = "aws:securetransport";

/// Where a key's value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyScope {
    /// Computed on the receiving host, once per process
    Host,
    /// Supplied by the caller for a single request
    Request,
}

/// A resolvable condition key
pub trait ConditionKey: Send + Sync {
    /// Key name, e.g. `aws:sourceip`
    fn name(&self) -> &str;

    fn scope(&self) -> KeyScope;

    /// Compute the current value
    fn value(&self) -> anyhow::Result<String>;
}

/// Source of the condition keys known to this process
pub trait KeyRegistry: Send + Sync {
    fn keys(&self) -> Vec<Arc<dyn ConditionKey>>;

    /// Keys constrained to receiving-host evaluation
    fn host_keys(&self) -> Vec<Arc<dyn ConditionKey>> {
        self.keys()
            .into_iter()
            .filter(|key| key.scope() == KeyScope::Host)
            .collect()
    }
}

/// A key with a fixed value
#[derive(Debug, Clone)]
pub struct StaticKey {
    name: String,
    scope: KeyScope,
    value: String,
}

impl StaticKey {
    pub fn new(name: impl Into<String>, scope: KeyScope, value: impl Into<String>) -> Self {
        StaticKey {
            name: name.into(),
            scope,
            value: value.into(),
        }
    }

    pub fn host(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, KeyScope::Host, value)
    }
}

impl ConditionKey for StaticKey {
    fn name(&self) -> &str {
        &self.name
    }

    fn scope(&self) -> KeyScope {
        self.scope
    }

    fn value(&self) -> anyhow::Result<String> {
        Ok(self.value.clone())
    }
}

/// A registry holding a fixed list of keys
#[derive(Default, Clone)]
pub struct StaticKeyRegistry {
    keys: Vec<Arc<dyn ConditionKey>>,
}

impl StaticKeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, key: impl ConditionKey + 'static) -> Self {
        self.keys.push(Arc::new(key));
        self
    }
}

impl KeyRegistry for StaticKeyRegistry {
    fn keys(&self) -> Vec<Arc<dyn ConditionKey>> {
        self.keys.clone()
    }
}

impl fmt::Debug for StaticKeyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.keys.iter().map(|k| k.name()).collect();
        f.debug_struct("StaticKeyRegistry")
            .field("keys", &names)
            .finish()
    }
}

/// Resolved key values for one evaluation
///
/// Key names are case-insensitive and stored lowercase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySnapshot {
    values: BTreeMap<String, String>,
}

impl KeySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any previous value for the key
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.values
            .insert(key.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge host keys with caller-supplied request keys
    ///
    /// Host values win: a request cannot spoof a host-scoped key.
    pub fn merge(host: &KeySnapshot, request: &KeySnapshot) -> KeySnapshot {
        let mut merged = request.clone();
        for (key, value) in &host.values {
            if let Some(previous) = merged.values.insert(key.clone(), value.clone()) {
                if &previous != value {
                    debug!(key = %key, "Ignoring request value for host-scoped condition key");
                }
            }
        }
        merged
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for KeySnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut snapshot = KeySnapshot::new();
        for (key, value) in iter {
            snapshot.insert(key, value);
        }
        snapshot
    }
}

/// Compute every host-scoped key in the registry
///
/// A failure here signals misconfiguration rather than a deny, so it is
/// surfaced as [`AuthError::KeyResolution`].
pub fn evaluate_host_keys(registry: &dyn KeyRegistry) -> Result<KeySnapshot, AuthError> {
    let mut snapshot = KeySnapshot::new();
    for key in registry.host_keys() {
        let value = key.value().map_err(|source| AuthError::KeyResolution {
            key: key.name().to_string(),
            source: KeyError::Failed {
                key: key.name().to_string(),
                source,
            },
        })?;
        snapshot.insert(key.name(), value);
    }
    Ok(snapshot)
}

/// Host-scoped keys, computed once per process on first successful use
pub struct HostKeys {
    registry: Arc<dyn KeyRegistry>,
    snapshot: OnceCell<KeySnapshot>,
}

impl HostKeys {
    pub fn new(registry: Arc<dyn KeyRegistry>) -> Self {
        HostKeys {
            registry,
            snapshot: OnceCell::new(),
        }
    }

    /// No host keys at all
    pub fn empty() -> Self {
        Self::new(Arc::new(StaticKeyRegistry::new()))
    }

    /// The host snapshot; a failed computation is retried on the next call
    pub fn snapshot(&self) -> Result<&KeySnapshot, AuthError> {
        self.snapshot
            .get_or_try_init(|| evaluate_host_keys(self.registry.as_ref()))
    }
}

impl fmt::Debug for HostKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostKeys")
            .field("resolved", &self.snapshot.get().is_some())
            .finish()
    }
}
