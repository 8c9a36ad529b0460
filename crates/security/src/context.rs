//! Management operation context.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use keyward_config::Config;

use crate::capabilities::CapabilityRegistry;

type RollbackHandler = Box<dyn FnOnce() + Send>;

/// Context handed to a management operation.
///
/// Gives access to the persisted model and the capability registry, and
/// collects rollback handlers. Handlers run in reverse registration order on
/// [`rollback`](Self::rollback) and are discarded on
/// [`complete`](Self::complete).
pub struct OperationContext {
    model: Arc<Config>,
    capabilities: Arc<CapabilityRegistry>,
    rollback_handlers: Mutex<Vec<RollbackHandler>>,
}

impl OperationContext {
    pub fn new(model: Arc<Config>, capabilities: Arc<CapabilityRegistry>) -> Self {
        Self {
            model,
            capabilities,
            rollback_handlers: Mutex::new(Vec::new()),
        }
    }

    /// Persisted configuration model
    pub fn model(&self) -> &Config {
        &self.model
    }

    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.capabilities
    }

    /// Register work to undo if the operation fails
    pub fn add_rollback_handler(&self, handler: impl FnOnce() + Send + 'static) {
        self.rollback_handlers.lock().push(Box::new(handler));
    }

    /// Finish the operation successfully
    pub fn complete(self) {
        let discarded = self.rollback_handlers.into_inner().len();
        debug!(discarded, "Operation completed");
    }

    /// Undo the operation's side effects
    pub fn rollback(self) {
        let handlers = self.rollback_handlers.into_inner();
        if !handlers.is_empty() {
            warn!(handlers = handlers.len(), "Rolling back operation");
        }
        for handler in handlers.into_iter().rev() {
            handler();
        }
    }

    /// Complete on success, roll back on failure
    pub fn finish<T, E>(self, result: Result<T, E>) -> Result<T, E> {
        match result {
            Ok(value) => {
                self.complete();
                Ok(value)
            }
            Err(err) => {
                self.rollback();
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for OperationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationContext")
            .field("rollback_handlers", &self.rollback_handlers.lock().len())
            .finish_non_exhaustive()
    }
}
