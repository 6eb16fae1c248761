//! The closed set of request kinds and their typed responses.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::errors::PayloadError;
use crate::protocol::payloads::{BcastArgs, BuildReqArgs, BuildStatus, ConnectReqArgs, EmptyPayload};
use crate::version::VersionSnapshot;

/// Request tags.
pub mod tags {
    /// Toggle side-channel relay for the sender.
    pub const BCAST: &str = "bcast";
    /// One-shot build.
    pub const BUILD: &str = "build";
    /// Build, then rebuild on every source change.
    pub const WATCH: &str = "watch";
    /// Connect or reconfigure the device bus.
    pub const CONNECT: &str = "connect";
    /// Service descriptors and version information.
    pub const SPECS: &str = "specs";
}

/// Event tags.
pub mod events {
    /// A rebuild finished during a watch session.
    pub const WATCH: &str = "watch";
    /// Forwarded console output.
    pub const OUTPUT: &str = "output";
}

/// A decoded request, one variant per tag.
#[derive(Clone, Debug, PartialEq)]
pub enum SideRequest {
    /// `bcast`
    Bcast(BcastArgs),
    /// `build`
    Build(BuildReqArgs),
    /// `watch`
    Watch(BuildReqArgs),
    /// `connect`
    Connect(ConnectReqArgs),
    /// `specs`
    Specs(EmptyPayload),
}

impl SideRequest {
    /// Decode the payload for `tag`.
    ///
    /// Returns `Ok(None)` when the tag is not a known request kind. An
    /// omitted (`null`) payload is decoded as an empty object.
    pub fn parse(tag: &str, data: Value) -> Result<Option<Self>, PayloadError> {
        let data = if data.is_null() {
            Value::Object(Map::new())
        } else {
            data
        };
        let request = match tag {
            tags::BCAST => Self::Bcast(decode(tags::BCAST, data)?),
            tags::BUILD => Self::Build(decode(tags::BUILD, data)?),
            tags::WATCH => Self::Watch(decode(tags::WATCH, data)?),
            tags::CONNECT => Self::Connect(decode(tags::CONNECT, data)?),
            tags::SPECS => Self::Specs(decode(tags::SPECS, data)?),
            _ => return Ok(None),
        };
        Ok(Some(request))
    }

    /// Wire tag of this request.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Bcast(_) => tags::BCAST,
            Self::Build(_) => tags::BUILD,
            Self::Watch(_) => tags::WATCH,
            Self::Connect(_) => tags::CONNECT,
            Self::Specs(_) => tags::SPECS,
        }
    }
}

fn decode<T: DeserializeOwned>(tag: &'static str, data: Value) -> Result<T, PayloadError> {
    serde_json::from_value(data).map_err(|e| PayloadError::new(tag, e))
}

/// A successful result, one variant per request kind. Encodes as the bare payload.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SideResponse {
    /// `bcast` acknowledgment.
    Bcast(EmptyPayload),
    /// Terminal status of a one-shot build.
    Build(BuildStatus),
    /// Watch session established.
    Watch(EmptyPayload),
    /// Device bus connected.
    Connect(EmptyPayload),
    /// Capability and version snapshot.
    Specs(VersionSnapshot),
}

impl SideResponse {
    /// Wire tag of the request this answers.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Bcast(_) => tags::BCAST,
            Self::Build(_) => tags::BUILD,
            Self::Watch(_) => tags::WATCH,
            Self::Connect(_) => tags::CONNECT,
            Self::Specs(_) => tags::SPECS,
        }
    }
}
