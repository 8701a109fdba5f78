//! Ambient request scope for contract delivery
//!
//! Request-handling code that cannot thread a [`ContractSink`] through every
//! call can instead run inside [`enter`]; facade calls on the same thread then
//! deliver contracts to that sink. Outside a scope, delivery is skipped.
//! Scopes nest and are restored on exit, including on panic.

use super::contract::{ContractMap, ContractSink};
use std::cell::RefCell;
use std::sync::Arc;

thread_local! {
    static CURRENT: RefCell<Option<Arc<dyn ContractSink>>> = const { RefCell::new(None) };
}

/// Restores the enclosing scope when dropped
struct ScopeGuard {
    previous: Option<Arc<dyn ContractSink>>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|current| *current.borrow_mut() = previous);
    }
}

/// Run `f` with `sink` as the current request sink
pub fn enter<R>(sink: Arc<dyn ContractSink>, f: impl FnOnce() -> R) -> R {
    let previous = CURRENT.with(|current| current.borrow_mut().replace(sink));
    let _guard = ScopeGuard { previous };
    f()
}

/// The sink of the innermost active scope on this thread
pub fn current() -> Option<Arc<dyn ContractSink>> {
    CURRENT.with(|current| current.borrow().clone())
}

/// Deliver contracts to the current scope; false when no scope is active
pub fn push(contracts: ContractMap) -> bool {
    match current() {
        Some(sink) => {
            sink.set_contracts(contracts);
            true
        }
        None => false,
    }
}
