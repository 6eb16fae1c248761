//! Handler failure type and its wire form.

use std::error::Error as _;

use devs_core::PayloadError;
use devs_core::protocol::ErrorData;
use thiserror::Error;

use crate::build::{DeviceError, PipelineError};

/// Error returned by a request handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The payload does not match the request kind.
    #[error(transparent)]
    InvalidPayload(#[from] PayloadError),
    /// The build pipeline failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    /// The device bus failed.
    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl HandlerError {
    /// Short label for metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidPayload(_) => "invalid_payload",
            Self::Pipeline(e) => e.error_type(),
            Self::Device(DeviceError::UnsupportedTransport(_)) => "unsupported_transport",
            Self::Device(DeviceError::Connect(_)) => "device",
        }
    }

    /// Convert to the `"error"` response payload.
    ///
    /// `message` is the error's display form. `stack` lists the source chain,
    /// one `caused by:` line per cause, and is omitted when there is none.
    pub fn to_error_data(&self) -> ErrorData {
        let mut causes = Vec::new();
        let mut source = self.source();
        while let Some(cause) = source {
            causes.push(format!("caused by: {cause}"));
            source = cause.source();
        }
        ErrorData {
            message: self.to_string(),
            stack: (!causes.is_empty()).then(|| causes.join("\n")),
        }
    }
}
