//! Message fan-out
//!
//! Every broadcast goes to every live connection, sender included. Delivery
//! only queues the frame in each recipient's outbox, so a slow or broken
//! recipient never holds up the others or the sender.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::connection::ConnectionHandle;
use crate::metrics::ServerMetrics;
use crate::registry::Registry;

/// Outcome of a single broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<Registry>,
    metrics: Arc<ServerMetrics>,
}

impl Broadcaster {
    pub fn new(registry: Arc<Registry>, metrics: Arc<ServerMetrics>) -> Self {
        Self { registry, metrics }
    }

    /// Deliver `message` verbatim to every connection in the registry.
    ///
    /// Recipients whose delivery fails are removed from the registry and
    /// closed. Their failure is never reported to the sender.
    pub async fn broadcast(&self, message: &str, sender: &ConnectionHandle) -> DeliveryReport {
        info!("[>] {} sent: {}", sender.origin(), message);

        let recipients = self.registry.snapshot().await;
        let mut report = DeliveryReport::default();

        for recipient in &recipients {
            match recipient.deliver(message.to_string()) {
                Ok(()) => {
                    report.delivered += 1;
                    debug!("[<] Delivered to {}", recipient.origin());
                }
                Err(e) => {
                    report.failed += 1;
                    let name = self.registry.display_name(recipient.id()).await;
                    warn!(
                        conn_id = %recipient.id(),
                        "Delivery to {} ({}) failed: {}",
                        recipient.origin(),
                        name.as_deref().unwrap_or("unnamed"),
                        e
                    );
                    self.evict(recipient).await;
                }
            }
        }

        self.metrics
            .broadcast_completed(report.delivered, report.failed);
        report
    }

    async fn evict(&self, recipient: &ConnectionHandle) {
        recipient.close();
        if self.registry.disconnect(recipient).await {
            self.metrics.connection_evicted();
        }
    }
}
