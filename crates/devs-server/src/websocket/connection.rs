//! WebSocket client connection state.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use metrics::counter;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use crate::metrics::WS_SEND_DROPS_TOTAL;

/// Unique client identifier, `client_{uuid}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ClientId(String);

impl ClientId {
    /// Fresh time-ordered identifier.
    pub fn new() -> Self {
        Self(format!("client_{}", Uuid::now_v7()))
    }

    /// Identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A connected client.
///
/// Created on connection and dropped after disconnect. Fan-out to the client
/// goes through [`send`](Self::send), which never waits on the socket.
/// Correlated replies go through [`send_reply`](Self::send_reply), which
/// waits for queue room instead of dropping.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ClientId,
    /// Send channel to the client's WebSocket write task.
    tx: mpsc::Sender<Arc<String>>,
    /// Whether the client receives other clients' uncorrelated frames.
    side_channel: AtomicBool,
    /// Cancelled when the client disconnects.
    cancel: CancellationToken,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Whether the client has responded to the last ping.
    is_alive: AtomicBool,
    /// When the last Pong (or any activity) was received.
    last_pong: Mutex<Instant>,
    /// Count of messages dropped due to full channel.
    dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a new connection.
    pub fn new(id: ClientId, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            side_channel: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Send a text message to the client.
    ///
    /// Returns `false` if the channel is full or closed, and increments
    /// the dropped message counter.
    pub fn send(&self, message: Arc<String>) -> bool {
        if self.tx.try_send(message).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            counter!(WS_SEND_DROPS_TOTAL).increment(1);
            false
        }
    }

    /// Queue a correlated reply, waiting while the outbound queue is full.
    ///
    /// Returns `false` only if the client disconnects or its write task is
    /// gone before the frame is queued.
    pub async fn send_reply(&self, frame: String) -> bool {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            sent = self.tx.send(Arc::new(frame)) => sent.is_ok(),
        }
    }

    /// Send an already-encoded frame.
    pub fn send_text(&self, text: String) -> bool {
        self.send(Arc::new(text))
    }

    /// Serialize a value and send it to the client.
    pub fn send_json<T: Serialize>(&self, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(json) => self.send_text(json),
            Err(e) => {
                warn!(client_id = %self.id, error = %e, "failed to serialize outbound message");
                false
            }
        }
    }

    /// Total messages dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Whether side-channel relay is enabled.
    pub fn side_channel_enabled(&self) -> bool {
        self.side_channel.load(Ordering::Acquire)
    }

    /// Enable or disable side-channel relay.
    pub fn set_side_channel(&self, enabled: bool) {
        self.side_channel.store(enabled, Ordering::Release);
    }

    /// Token cancelled when the client disconnects.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Mark the client as gone, stopping everything bound to its token.
    pub fn disconnect(&self) {
        self.cancel.cancel();
    }

    /// Whether [`disconnect`](Self::disconnect) has been called.
    pub fn is_disconnected(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Mark the connection as alive (pong received).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Duration since the last pong (or connection establishment).
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Check and reset the alive flag for heartbeat.
    ///
    /// Returns `true` if the connection was alive since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("side_channel", &self.side_channel_enabled())
            .field("disconnected", &self.is_disconnected())
            .finish_non_exhaustive()
    }
}
