//! Relay metrics for observability
//!
//! Counters only; nothing here feeds back into delivery decisions.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Server-wide metrics
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Connection metrics
    /// Currently live chat connections
    pub active_connections: AtomicU64,
    /// Total connections since server start
    pub total_connections: AtomicU64,
    /// Connections that completed name registration
    pub names_registered: AtomicU64,

    // Message metrics
    /// Chat messages received from clients (name frames excluded)
    pub messages_received: AtomicU64,
    /// Broadcasts performed
    pub broadcasts: AtomicU64,
    /// Frames queued for delivery across all recipients
    pub frames_delivered: AtomicU64,

    // Error metrics
    /// Per-recipient delivery failures during broadcast
    pub delivery_failures: AtomicU64,
    /// Connections closed by the relay after a failed delivery or write
    pub evictions: AtomicU64,
    /// Sessions ended by a transport error
    pub transport_errors: AtomicU64,

    start_time: Option<Instant>,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    // Connection tracking
    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn name_registered(&self) {
        self.names_registered.fetch_add(1, Ordering::Relaxed);
    }

    // Message tracking
    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn broadcast_completed(&self, delivered: usize, failed: usize) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        self.frames_delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.delivery_failures
            .fetch_add(failed as u64, Ordering::Relaxed);
    }

    // Error tracking
    pub fn connection_evicted(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    /// Create a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            connections: ConnectionMetrics {
                active: self.active_connections.load(Ordering::Relaxed),
                total: self.total_connections.load(Ordering::Relaxed),
                named: self.names_registered.load(Ordering::Relaxed),
            },
            messages: MessageMetrics {
                received: self.messages_received.load(Ordering::Relaxed),
                broadcasts: self.broadcasts.load(Ordering::Relaxed),
                delivered: self.frames_delivered.load(Ordering::Relaxed),
            },
            errors: ErrorMetrics {
                delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
                evictions: self.evictions.load(Ordering::Relaxed),
                transport: self.transport_errors.load(Ordering::Relaxed),
            },
        }
    }
}

/// Serializable snapshot of metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub connections: ConnectionMetrics,
    pub messages: MessageMetrics,
    pub errors: ErrorMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub active: u64,
    pub total: u64,
    pub named: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMetrics {
    pub received: u64,
    pub broadcasts: u64,
    pub delivered: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub delivery_failures: u64,
    pub evictions: u64,
    pub transport: u64,
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub connections: usize,
    pub metrics: MetricsSnapshot,
}
