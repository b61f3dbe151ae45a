use crate::action::Action;
use crate::codes;
use crate::result::ExecutionResult;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// A capability handler for one class of actions.
///
/// `can_handle` is a cheap predicate; adapters matching on payload
/// details (mode, op) in addition to kind must be registered before
/// generic kind-only adapters.
#[async_trait]
pub trait Adapter: Send + Sync {
    fn name(&self) -> &str;
    fn can_handle(&self, action: &Action) -> bool;
    async fn execute(&self, action: &Action) -> ExecutionResult;
}

/// Ordered capability matching over registered adapters.
///
/// Dispatch walks the list in registration order and runs the first
/// adapter that claims the action. Adding a capability is a
/// registration, never a core change.
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn Adapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: Vec::new(),
        }
    }

    pub fn register(&mut self, adapter: Arc<dyn Adapter>) -> &mut Self {
        debug!("Registering adapter: {}", adapter.name());
        self.adapters.push(adapter);
        self
    }

    pub fn list(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.name().to_string()).collect()
    }

    pub fn count(&self) -> usize {
        self.adapters.len()
    }

    pub async fn dispatch(&self, action: &Action) -> ExecutionResult {
        for adapter in &self.adapters {
            if adapter.can_handle(action) {
                debug!(
                    "Dispatching action '{}' ({}) to adapter '{}'",
                    action.name(),
                    action.kind().as_str(),
                    adapter.name()
                );
                return adapter.execute(action).await;
            }
        }
        warn!(
            "No adapter for action '{}' ({})",
            action.name(),
            action.kind().as_str()
        );
        ExecutionResult::failure(codes::NO_ADAPTER)
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
