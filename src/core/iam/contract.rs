//! Contracts: deferred obligations attached to Allow statements
//!
//! A statement that grants access can also constrain how the grant is used
//! downstream (e.g. a maximum number of keys returned by a listing). Contracts
//! are collected only from winning Allow statements and delivered to a
//! [`ContractSink`] once the decision is final.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of deferred obligation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ContractType {
    /// Latest time (RFC 3339) at which the grant may be exercised
    Expiration,
    /// Upper bound on items returned by listing operations
    MaxKeys,
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractType::Expiration => write!(f, "Expiration"),
            ContractType::MaxKeys => write!(f, "MaxKeys"),
        }
    }
}

/// A single obligation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Contract {
    #[serde(rename = "Type")]
    pub contract_type: ContractType,
    pub value: String,
}

impl Contract {
    pub fn new(contract_type: ContractType, value: impl Into<String>) -> Self {
        Contract {
            contract_type,
            value: value.into(),
        }
    }
}

/// Contracts of one decision, at most one per type
pub type ContractMap = BTreeMap<ContractType, Contract>;

/// Receiver for the contracts of a successful Allow
pub trait ContractSink: Send + Sync {
    fn set_contracts(&self, contracts: ContractMap);
}

/// Per-request sink that keeps the last delivered contracts
#[derive(Debug, Default)]
pub struct RequestContracts {
    contracts: Mutex<Option<ContractMap>>,
}

impl RequestContracts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contracts delivered so far, if any
    pub fn contracts(&self) -> Option<ContractMap> {
        self.contracts.lock().clone()
    }

    /// Remove and return the delivered contracts
    pub fn take(&self) -> Option<ContractMap> {
        self.contracts.lock().take()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.lock().is_none()
    }
}

impl ContractSink for RequestContracts {
    fn set_contracts(&self, contracts: ContractMap) {
        *self.contracts.lock() = Some(contracts);
    }
}
