//! Collaborator contracts consumed by the build coordinator.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use devs_core::protocol::{BuildReqArgs, BuildStatus, ConnectReqArgs};

use super::errors::{DeviceError, PipelineError};

/// Compiler front end.
#[async_trait]
pub trait BuildPipeline: Send + Sync {
    /// Run a single compile pass.
    async fn build(&self, args: &BuildReqArgs) -> Result<BuildStatus, PipelineError>;

    /// Start watching the sources behind `args`.
    ///
    /// Performs the initial build and returns its status once change
    /// detection is in place. Every later rebuild is pushed to `updates`
    /// until `cancel` fires or `updates` is closed.
    async fn watch(
        &self,
        args: &BuildReqArgs,
        updates: mpsc::Sender<BuildStatus>,
        cancel: CancellationToken,
    ) -> Result<BuildStatus, PipelineError>;
}

/// Device bus session manager.
#[async_trait]
pub trait DeviceBus: Send + Sync {
    /// Establish or reconfigure the bus connection.
    async fn connect(&self, args: &ConnectReqArgs) -> Result<(), DeviceError>;
}
