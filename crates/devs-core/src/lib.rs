//! # devs-core
//!
//! Shared types for the devtools side channel.
//!
//! - [`protocol`]: request/response/event envelopes and the closed set of request kinds
//! - [`version`]: image version marker decoding and the version snapshot
//! - [`specs`]: the static service descriptor catalog
//! - [`logging`]: `tracing` subscriber bootstrap

#![deny(unsafe_code)]

pub mod errors;
pub mod logging;
pub mod protocol;
pub mod specs;
pub mod version;

pub use errors::PayloadError;

/// Release version of the devtools, reported to clients in `specs` responses.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");
