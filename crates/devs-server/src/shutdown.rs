//! Graceful shutdown: one `CancellationToken` shared by every server task,
//! plus the set of background tasks to drain.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How long [`ShutdownCoordinator::graceful_shutdown`] waits by default.
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Owns the server-wide cancellation token and the tasks that must finish
/// before the process exits.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ShutdownCoordinator {
    /// Create a coordinator with no tracked tasks.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Token cancelled when shutdown starts. WebSocket sessions and the
    /// HTTP listener select on it.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Drain `handle` during [`graceful_shutdown`](Self::graceful_shutdown).
    pub fn track(&self, handle: JoinHandle<()>) {
        self.tasks.lock().push(handle);
    }

    /// Cancel the token without waiting.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has started.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the token and wait up to `timeout` for tracked tasks. Tasks
    /// still running afterwards are aborted.
    pub async fn graceful_shutdown(&self, timeout: Option<Duration>) {
        let timeout = timeout.unwrap_or(DEFAULT_DRAIN_TIMEOUT);
        self.shutdown();

        let tasks: Vec<_> = std::mem::take(&mut *self.tasks.lock());
        info!(tasks = tasks.len(), timeout_ms = timeout.as_millis() as u64, "draining tasks");
        let aborts: Vec<_> = tasks.iter().map(JoinHandle::abort_handle).collect();

        if tokio::time::timeout(timeout, futures::future::join_all(tasks)).await.is_err() {
            warn!("drain timed out after {timeout:?}, aborting remaining tasks");
            for abort in aborts {
                abort.abort();
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
