//! Connection handles
//!
//! A `ConnectionHandle` is the core's view of one client session. It never
//! touches the transport directly: outbound frames go into a bounded outbox
//! drained by the connection's own writer task, and closing the connection
//! is a matter of cancelling its token.

use chrono::{DateTime, Utc};
use std::fmt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::DeliveryError;

/// Unique identifier for a live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cheap-to-clone handle to a client session.
///
/// Two handles are equal when they refer to the same connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    origin: String,
    connected_at: DateTime<Utc>,
    outbox: mpsc::Sender<String>,
    cancel: CancellationToken,
}

impl ConnectionHandle {
    /// Create a handle plus the receiving half of its outbox.
    pub fn new(
        origin: impl Into<String>,
        outbox_capacity: usize,
    ) -> (Self, mpsc::Receiver<String>) {
        let (outbox, rx) = mpsc::channel(outbox_capacity.max(1));
        let handle = Self {
            id: ConnectionId::new(),
            origin: origin.into(),
            connected_at: Utc::now(),
            outbox,
            cancel: CancellationToken::new(),
        };
        (handle, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Origin address of the client (its IP for websocket clients).
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Queue a frame without waiting.
    pub fn deliver(&self, frame: String) -> Result<(), DeliveryError> {
        if self.cancel.is_cancelled() {
            return Err(DeliveryError::Closed);
        }
        self.outbox.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Backlogged,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Ask the session owning this connection to shut down.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.outbox.is_closed()
    }

    /// Resolves once `close` has been called on any clone of this handle.
    pub async fn closed(&self) {
        self.cancel.cancelled().await
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConnectionHandle {}
