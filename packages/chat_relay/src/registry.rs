//! Connection Registry
//!
//! Single owner of the live connection list and the display-name table.
//! Every operation takes the lock for its own duration only; a broadcast
//! iterates over a snapshot, so connections joining or leaving mid-broadcast
//! may or may not see that message.

use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::connection::{ConnectionHandle, ConnectionId};

struct Member {
    handle: ConnectionHandle,
    display_name: Option<String>,
}

#[derive(Default)]
struct RegistryInner {
    /// Live connections in connect order
    members: Vec<Member>,
    /// Display name -> origin address. Log-only; later registrations overwrite.
    names: HashMap<String, String>,
}

#[derive(Default)]
pub struct Registry {
    inner: RwLock<RegistryInner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to the live set. Connecting the same handle twice
    /// is a no-op.
    pub async fn connect(&self, conn: &ConnectionHandle) {
        let mut inner = self.inner.write().await;
        if inner.members.iter().any(|m| m.handle == *conn) {
            debug!(conn_id = %conn.id(), "Connection already registered");
            return;
        }
        inner.members.push(Member {
            handle: conn.clone(),
            display_name: None,
        });
        info!("[+] {} connected ({} live)", conn.origin(), inner.members.len());
    }

    /// Remove a connection if present. Returns whether it was a member.
    pub async fn disconnect(&self, conn: &ConnectionHandle) -> bool {
        let mut inner = self.inner.write().await;
        let Some(pos) = inner.members.iter().position(|m| m.handle == *conn) else {
            return false;
        };
        let member = inner.members.remove(pos);
        info!(
            "[-] {} disconnected ({} live)",
            member.handle.origin(),
            inner.members.len()
        );
        true
    }

    /// Current members, in connect order.
    pub async fn snapshot(&self) -> Vec<ConnectionHandle> {
        self.inner
            .read()
            .await
            .members
            .iter()
            .map(|m| m.handle.clone())
            .collect()
    }

    /// Record a connection's display name and index it by name.
    ///
    /// The name is set once; later calls for the same connection are ignored.
    /// The name table entry is updated even if the connection has already
    /// left, matching the table's log-only role.
    pub async fn register_name(&self, conn: &ConnectionHandle, name: &str) {
        let mut inner = self.inner.write().await;
        if let Some(member) = inner.members.iter_mut().find(|m| m.handle == *conn) {
            if member.display_name.is_some() {
                debug!(conn_id = %conn.id(), "Display name already set, ignoring");
                return;
            }
            member.display_name = Some(name.to_string());
        }
        inner.names.insert(name.to_string(), conn.origin().to_string());
        info!("[+] Name registered: {} => {}", name, conn.origin());
    }

    pub async fn display_name(&self, id: ConnectionId) -> Option<String> {
        self.inner
            .read()
            .await
            .members
            .iter()
            .find(|m| m.handle.id() == id)
            .and_then(|m| m.display_name.clone())
    }

    /// Origin address last registered under `name`.
    pub async fn lookup_name(&self, name: &str) -> Option<String> {
        self.inner.read().await.names.get(name).cloned()
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.inner
            .read()
            .await
            .members
            .iter()
            .any(|m| m.handle.id() == id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.members.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
