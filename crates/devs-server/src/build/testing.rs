//! In-memory pipeline for unit tests.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use devs_core::protocol::{BuildReqArgs, BuildStatus};

use super::errors::PipelineError;
use super::traits::BuildPipeline;

/// Returns scripted results and lets tests push watch updates by hand.
#[derive(Default)]
pub(crate) struct ScriptedPipeline {
    next_status: Mutex<Option<BuildStatus>>,
    failure: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
    watchers: Mutex<Vec<(mpsc::Sender<BuildStatus>, CancellationToken)>>,
}

impl ScriptedPipeline {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_next_status(&self, status: BuildStatus) {
        *self.next_status.lock() = Some(status);
    }

    pub(crate) fn fail_with(&self, message: &str) {
        *self.failure.lock() = Some(message.to_owned());
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Push a rebuild result to every watch started so far.
    pub(crate) async fn emit(&self, status: BuildStatus) {
        let senders: Vec<_> = self.watchers.lock().iter().map(|(tx, _)| tx.clone()).collect();
        for tx in senders {
            let _ = tx.send(status.clone()).await;
        }
    }

    pub(crate) fn watch_cancelled(&self, index: usize) -> bool {
        self.watchers
            .lock()
            .get(index)
            .is_some_and(|(_, token)| token.is_cancelled())
    }

    async fn run(&self) -> Result<BuildStatus, PipelineError> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.failure.lock().clone() {
            return Err(PipelineError::Compile(message));
        }
        Ok(self.next_status.lock().take().unwrap_or(BuildStatus {
            success: true,
            ..BuildStatus::default()
        }))
    }
}

#[async_trait]
impl BuildPipeline for ScriptedPipeline {
    async fn build(&self, _args: &BuildReqArgs) -> Result<BuildStatus, PipelineError> {
        self.run().await
    }

    async fn watch(
        &self,
        _args: &BuildReqArgs,
        updates: mpsc::Sender<BuildStatus>,
        cancel: CancellationToken,
    ) -> Result<BuildStatus, PipelineError> {
        let initial = self.run().await?;
        self.watchers.lock().push((updates, cancel));
        Ok(initial)
    }
}
