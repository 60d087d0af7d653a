//! Handler contract and chain runner

use async_trait::async_trait;
use std::ops::ControlFlow;
use std::sync::Arc;

use super::HandlerError;

/// One stage of the pipeline.
///
/// Receives the encoded message and decodes it itself. `Break` stops the
/// chain without an error.
#[async_trait]
pub trait Handler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, data: &[u8]) -> Result<ControlFlow<()>, HandlerError>;
}

/// Ordered list of handlers
#[derive(Default, Clone)]
pub struct Chain {
    handlers: Vec<Arc<dyn Handler>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail
    pub fn add_handler(&mut self, handler: Arc<dyn Handler>) {
        self.handlers.push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run handlers head to tail, stopping at the first `Break` or error
    pub async fn process(&self, data: &[u8]) -> Result<(), HandlerError> {
        for handler in &self.handlers {
            if handler.handle(data).await?.is_break() {
                tracing::trace!(handler = handler.name(), "Chain stopped early");
                break;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.handlers.iter().map(|h| h.name()).collect();
        f.debug_struct("Chain").field("handlers", &names).finish()
    }
}
