//! Installed engine holder
//!
//! The slot is created at startup and shared with every facade. Installing
//! takes the write lock; serving calls only hold the read lock long enough to
//! clone the engine `Arc`.

use super::engine::PolicyEngine;
use crate::error::ConfigurationError;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::info;

#[derive(Default)]
pub struct EngineSlot {
    engine: RwLock<Option<Arc<dyn PolicyEngine>>>,
}

impl EngineSlot {
    /// An empty slot; every lookup fails until [`install`](Self::install)
    pub fn new() -> Self {
        Self::default()
    }

    /// A slot with an engine already installed
    pub fn with_engine<E: PolicyEngine + 'static>(engine: E) -> Self {
        let slot = Self::new();
        slot.install(engine);
        slot
    }

    /// Install the engine, replacing any previous one
    pub fn install<E: PolicyEngine + 'static>(&self, engine: E) {
        let mut slot = self.engine.write();
        info!(
            engine = std::any::type_name::<E>(),
            replacing = slot.is_some(),
            "Setting the policy engine"
        );
        *slot = Some(Arc::new(engine));
    }

    /// The installed engine
    pub fn engine(&self) -> Result<Arc<dyn PolicyEngine>, ConfigurationError> {
        self.engine
            .read()
            .as_ref()
            .cloned()
            .ok_or(ConfigurationError::NotInstalled)
    }

    pub fn is_installed(&self) -> bool {
        self.engine.read().is_some()
    }
}

impl fmt::Debug for EngineSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineSlot")
            .field("installed", &self.is_installed())
            .finish()
    }
}
