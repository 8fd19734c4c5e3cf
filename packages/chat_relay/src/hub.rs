//! Chat Hub
//!
//! Shared state handed to every session: the registry, the broadcaster that
//! fans out over it, the inbound message hook, and the metrics.

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::broadcast::Broadcaster;
use crate::connection::ConnectionHandle;
use crate::hooks::{MessageHook, NoopHook};
use crate::metrics::ServerMetrics;
use crate::registry::Registry;

/// Default per-connection outbox size, in frames.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

pub struct ChatHub {
    registry: Arc<Registry>,
    broadcaster: Broadcaster,
    hook: Arc<dyn MessageHook>,
    metrics: Arc<ServerMetrics>,
    outbox_capacity: usize,
}

impl ChatHub {
    pub fn new(outbox_capacity: usize) -> Self {
        let registry = Arc::new(Registry::new());
        let metrics = Arc::new(ServerMetrics::new());
        Self {
            broadcaster: Broadcaster::new(registry.clone(), metrics.clone()),
            registry,
            hook: Arc::new(NoopHook),
            metrics,
            outbox_capacity: outbox_capacity.max(1),
        }
    }

    /// Replace the inbound message hook.
    pub fn with_hook(mut self, hook: Arc<dyn MessageHook>) -> Self {
        self.hook = hook;
        self
    }

    /// Create a handle for a freshly upgraded connection. The caller owns
    /// the returned outbox receiver and must drain it into the transport.
    pub fn open_connection(&self, origin: &str) -> (ConnectionHandle, mpsc::Receiver<String>) {
        ConnectionHandle::new(origin, self.outbox_capacity)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn hook(&self) -> &dyn MessageHook {
        self.hook.as_ref()
    }

    pub fn metrics(&self) -> &Arc<ServerMetrics> {
        &self.metrics
    }
}

impl Default for ChatHub {
    fn default() -> Self {
        Self::new(DEFAULT_OUTBOX_CAPACITY)
    }
}
