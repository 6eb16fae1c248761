//! Envelope decoding and encoding.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response tag used for every failed request.
pub const ERROR_TAG: &str = "error";

/// A decoded frame as sent by a client.
///
/// Any JSON object decodes. Only frames with a string `req` reach a
/// handler; frames without `seq` are relayed whether or not they carry one.
#[derive(Clone, Debug, PartialEq)]
pub struct InboundFrame {
    /// Request tag, when the frame has a string `req`.
    pub req: Option<String>,
    /// Correlation number. Absent for fire-and-forget traffic.
    pub seq: Option<i64>,
    /// Tag-specific payload, `null` when omitted.
    pub data: Value,
}

impl InboundFrame {
    /// Whether the frame goes to side-channel subscribers.
    pub fn is_relayed(&self) -> bool {
        self.seq.is_none()
    }
}

/// A correlated reply to a request.
#[derive(Debug, Serialize)]
pub struct Response<'a, T> {
    /// Request tag, or [`ERROR_TAG`].
    pub resp: &'a str,
    /// Mirrors the request's `seq`.
    pub seq: i64,
    /// Result payload.
    pub data: T,
}

/// An unsolicited message pushed to a client.
#[derive(Debug, Serialize)]
pub struct Event<'a, T> {
    /// Event tag.
    pub ev: &'a str,
    /// Event payload.
    pub data: T,
}

/// Payload of an `"error"` response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorData {
    /// Human-readable failure message.
    pub message: String,
    /// Cause chain, when the failure has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorData {
    /// Error payload with a message only.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    /// Error payload for a correlated request whose tag has no handler.
    pub fn unknown_tag(tag: &str) -> Self {
        Self::new(format!("unknown msg type: {tag}"))
    }
}

/// Decode a raw frame.
///
/// Returns `None` unless the frame is a JSON object whose `seq`, if
/// present, is an integer or `null`.
pub fn decode_frame(raw: &str) -> Option<InboundFrame> {
    let Value::Object(mut fields) = serde_json::from_str(raw).ok()? else {
        return None;
    };
    let seq = match fields.remove("seq") {
        None | Some(Value::Null) => None,
        Some(seq) => Some(seq.as_i64()?),
    };
    let req = match fields.remove("req") {
        Some(Value::String(req)) => Some(req),
        _ => None,
    };
    let data = fields.remove("data").unwrap_or(Value::Null);
    Some(InboundFrame { req, seq, data })
}

/// Encode a success response.
pub fn encode_response<T: Serialize>(tag: &str, seq: i64, data: &T) -> serde_json::Result<String> {
    serde_json::to_string(&Response {
        resp: tag,
        seq,
        data,
    })
}

/// Encode an `"error"` response.
pub fn encode_error(seq: i64, error: &ErrorData) -> serde_json::Result<String> {
    encode_response(ERROR_TAG, seq, error)
}

/// Encode an event.
pub fn encode_event<T: Serialize>(ev: &str, data: &T) -> serde_json::Result<String> {
    serde_json::to_string(&Event { ev, data })
}
