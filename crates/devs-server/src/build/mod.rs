//! Build coordination: one-shot builds, watch sessions and device bus connect.
//!
//! The compiler and the device bus are external collaborators behind the
//! [`BuildPipeline`] and [`DeviceBus`] traits. [`BuildCoordinator`] bridges
//! their results into the side-channel protocol.

pub mod coordinator;
pub mod device;
pub mod errors;
pub mod output;
pub mod process;
pub mod traits;
pub mod watcher;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::{BuildCoordinator, WatchSessionInfo, WatchState};
pub use device::NullDeviceBus;
pub use errors::{DeviceError, PipelineError};
pub use output::forward_output;
pub use process::{ProcessBuildPipeline, ProcessPipelineConfig};
pub use traits::{BuildPipeline, DeviceBus};
