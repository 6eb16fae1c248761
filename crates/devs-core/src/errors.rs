//! Payload decoding errors.

use thiserror::Error;

/// A request with a known tag carried a `data` field of the wrong shape.
#[derive(Debug, Error)]
#[error("invalid payload for `{tag}` request: {source}")]
pub struct PayloadError {
    /// Request tag the payload was decoded for.
    pub tag: &'static str,
    /// Underlying decode failure.
    #[source]
    pub source: serde_json::Error,
}

impl PayloadError {
    /// Wrap a decode failure for the given tag.
    pub fn new(tag: &'static str, source: serde_json::Error) -> Self {
        Self { tag, source }
    }
}
