//! Device bus without any hardware transport.

use async_trait::async_trait;
use tracing::info;

use devs_core::protocol::ConnectReqArgs;

use super::errors::DeviceError;
use super::traits::DeviceBus;

/// Transport name accepted by [`NullDeviceBus`].
pub const NO_TRANSPORT: &str = "none";

/// A device bus that only supports running without a transport.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullDeviceBus;

#[async_trait]
impl DeviceBus for NullDeviceBus {
    async fn connect(&self, args: &ConnectReqArgs) -> Result<(), DeviceError> {
        match args.transport.as_deref() {
            None | Some(NO_TRANSPORT) => {
                info!(background = ?args.background, "device bus running without transport");
                Ok(())
            }
            Some(other) => Err(DeviceError::UnsupportedTransport(other.to_owned())),
        }
    }
}
