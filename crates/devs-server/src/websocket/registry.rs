//! Connected clients and message fan-out.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use devs_core::protocol::encode_event;

use super::connection::{ClientConnection, ClientId};
use crate::metrics::SIDE_RELAYED_TOTAL;

/// Tracks connected clients.
///
/// Add and remove take the write lock; fan-out iterates under the read
/// lock, so a client is never half-registered while a relay is running.
pub struct ClientRegistry {
    connections: RwLock<HashMap<ClientId, Arc<ClientConnection>>>,
}

impl ClientRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connection.
    pub async fn add(&self, connection: Arc<ClientConnection>) {
        let mut conns = self.connections.write().await;
        let _ = conns.insert(connection.id.clone(), connection);
    }

    /// Remove a connection by ID.
    pub async fn remove(&self, id: &ClientId) -> Option<Arc<ClientConnection>> {
        self.connections.write().await.remove(id)
    }

    /// Number of connected clients.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Relay a raw frame, unmodified, to every side-channel subscriber
    /// except the sender. Returns the number of recipients.
    pub async fn relay_side_channel(&self, sender: &ClientId, raw: &str) -> usize {
        let message = Arc::new(raw.to_owned());
        let conns = self.connections.read().await;
        let mut recipients = 0;
        for conn in conns.values() {
            if conn.id == *sender || !conn.side_channel_enabled() {
                continue;
            }
            recipients += 1;
            if !conn.send(Arc::clone(&message)) {
                warn!(client_id = %conn.id, "failed to relay side-channel message");
            }
        }
        debug!(sender = %sender, recipients, "relayed side-channel message");
        counter!(SIDE_RELAYED_TOTAL).increment(recipients as u64);
        recipients
    }

    /// Send an event to every connected client. Returns the number of recipients.
    pub async fn broadcast_event<T: Serialize>(&self, ev: &str, data: &T) -> usize {
        let json = match encode_event(ev, data) {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(event = ev, error = %e, "failed to serialize event");
                return 0;
            }
        };
        let conns = self.connections.read().await;
        debug!(event = ev, recipients = conns.len(), "broadcast event to all");
        for conn in conns.values() {
            if !conn.send(Arc::clone(&json)) {
                warn!(client_id = %conn.id, "failed to send event to client");
            }
        }
        conns.len()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
