//! Bridges build pipeline results into the side-channel protocol.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::{counter, gauge};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use devs_core::protocol::{BuildReqArgs, BuildStatus, ConnectReqArgs, Event, events};

use super::errors::{DeviceError, PipelineError};
use super::traits::{BuildPipeline, DeviceBus};
use crate::metrics::{BUILDS_TOTAL, WATCH_SESSIONS_ACTIVE};
use crate::websocket::connection::{ClientConnection, ClientId};

/// Buffered rebuild results per watch session.
const WATCH_UPDATE_BUFFER: usize = 16;

/// Lifecycle of a watch session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchState {
    /// Registered, pipeline not yet called.
    Idle,
    /// Initial build running.
    Building,
    /// Forwarding rebuilds to the client.
    Streaming,
    /// Client gone or pipeline finished.
    Stopped,
}

/// Snapshot of one watch session.
#[derive(Clone, Debug, Serialize)]
pub struct WatchSessionInfo {
    /// Session number, unique per coordinator.
    pub id: u64,
    /// Client receiving the `"watch"` events.
    pub client: ClientId,
    /// Build arguments of the original request.
    pub args: BuildReqArgs,
    /// Current state.
    pub state: WatchState,
    /// Rebuilds delivered so far.
    pub updates: u64,
}

#[derive(Default)]
struct Shared {
    sessions: Mutex<HashMap<u64, WatchSessionInfo>>,
    last_ok_build: Mutex<Option<BuildStatus>>,
}

impl Shared {
    fn set_state(&self, id: u64, state: WatchState) {
        if let Some(session) = self.sessions.lock().get_mut(&id) {
            debug!(session_id = id, from = ?session.state, to = ?state, "watch session transition");
            session.state = state;
        }
    }

    fn count_update(&self, id: u64) {
        if let Some(session) = self.sessions.lock().get_mut(&id) {
            session.updates += 1;
        }
    }

    fn stop(&self, id: u64) {
        self.set_state(id, WatchState::Stopped);
        let _ = self.sessions.lock().remove(&id);
    }

    fn record(&self, status: &BuildStatus) {
        let outcome = if status.success { "success" } else { "failure" };
        counter!(BUILDS_TOTAL, "outcome" => outcome).increment(1);
        if status.success {
            *self.last_ok_build.lock() = Some(status.clone());
        }
    }
}

/// Runs builds, watch sessions and device connects on behalf of clients.
pub struct BuildCoordinator {
    pipeline: Arc<dyn BuildPipeline>,
    device: Arc<dyn DeviceBus>,
    shared: Arc<Shared>,
    next_session: AtomicU64,
}

impl BuildCoordinator {
    /// Create a coordinator over the given collaborators.
    pub fn new(pipeline: Arc<dyn BuildPipeline>, device: Arc<dyn DeviceBus>) -> Self {
        Self {
            pipeline,
            device,
            shared: Arc::new(Shared::default()),
            next_session: AtomicU64::new(1),
        }
    }

    /// Run a single compile pass.
    pub async fn build(&self, args: &BuildReqArgs) -> Result<BuildStatus, PipelineError> {
        match self.pipeline.build(args).await {
            Ok(status) => {
                self.shared.record(&status);
                info!(filename = %args.filename, success = status.success, "build finished");
                Ok(status)
            }
            Err(e) => {
                counter!(BUILDS_TOTAL, "outcome" => "error").increment(1);
                warn!(filename = %args.filename, error = %e, "build failed");
                Err(e)
            }
        }
    }

    /// Start a watch session streaming `"watch"` events to `client`.
    ///
    /// Returns once the initial build has run and change detection is in
    /// place. The session ends when the client disconnects.
    pub async fn watch(
        &self,
        client: Arc<ClientConnection>,
        args: BuildReqArgs,
    ) -> Result<(), PipelineError> {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let _ = self.shared.sessions.lock().insert(
            id,
            WatchSessionInfo {
                id,
                client: client.id.clone(),
                args: args.clone(),
                state: WatchState::Idle,
                updates: 0,
            },
        );

        let cancel = client.cancel_token().child_token();
        let (tx, rx) = mpsc::channel(WATCH_UPDATE_BUFFER);

        self.shared.set_state(id, WatchState::Building);
        let initial = match self.pipeline.watch(&args, tx, cancel.clone()).await {
            Ok(status) => status,
            Err(e) => {
                cancel.cancel();
                self.shared.stop(id);
                warn!(session_id = id, filename = %args.filename, error = %e, "watch failed to start");
                return Err(e);
            }
        };
        self.shared.record(&initial);

        self.shared.set_state(id, WatchState::Streaming);
        gauge!(WATCH_SESSIONS_ACTIVE).increment(1.0);
        info!(session_id = id, client_id = %client.id, filename = %args.filename, "watch session started");

        drop(tokio::spawn(forward_updates(
            id,
            client,
            rx,
            cancel,
            Arc::clone(&self.shared),
        )));
        Ok(())
    }

    /// Establish or reconfigure the device bus session.
    pub async fn connect(&self, args: &ConnectReqArgs) -> Result<(), DeviceError> {
        self.device.connect(args).await
    }

    /// Most recent successful build, from any client.
    pub fn last_ok_build(&self) -> Option<BuildStatus> {
        self.shared.last_ok_build.lock().clone()
    }

    /// Snapshot of all live watch sessions.
    pub fn watch_sessions(&self) -> Vec<WatchSessionInfo> {
        let mut sessions: Vec<_> = self.shared.sessions.lock().values().cloned().collect();
        sessions.sort_by_key(|s| s.id);
        sessions
    }
}

async fn forward_updates(
    id: u64,
    client: Arc<ClientConnection>,
    mut rx: mpsc::Receiver<BuildStatus>,
    cancel: CancellationToken,
    shared: Arc<Shared>,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            update = rx.recv() => {
                let Some(status) = update else { break };
                shared.record(&status);
                shared.count_update(id);
                let event = Event { ev: events::WATCH, data: &status };
                if !client.send_json(&event) {
                    warn!(session_id = id, client_id = %client.id, "failed to deliver watch event");
                }
            }
        }
    }

    cancel.cancel();
    shared.stop(id);
    gauge!(WATCH_SESSIONS_ACTIVE).decrement(1.0);
    info!(session_id = id, client_id = %client.id, "watch session stopped");
}
