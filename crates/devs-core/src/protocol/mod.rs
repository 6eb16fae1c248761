//! Side-channel wire protocol.
//!
//! One JSON envelope per frame:
//!
//! ```text
//! Request:  { "req": <tag>, "seq"?: <int>, "data": <T> }
//! Response: { "resp": <tag-or-"error">, "seq": <int>, "data": <T> }
//! Event:    { "ev": <tag>, "data": <T> }
//! ```

pub mod envelope;
pub mod payloads;
pub mod request;

pub use envelope::{
    ERROR_TAG, ErrorData, Event, InboundFrame, Response, decode_frame, encode_error,
    encode_event, encode_response,
};
pub use payloads::{
    BcastArgs, BuildReqArgs, BuildStatus, ConnectReqArgs, Diagnostic, EmptyPayload, OutputEvent,
    OutputFrom,
};
pub use request::{SideRequest, SideResponse, events, tags};
