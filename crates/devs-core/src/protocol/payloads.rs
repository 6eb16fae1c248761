//! Request, response and event payloads.

use serde::de::IgnoredAny;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// A payload with no fields. Always encodes as `{}` and accepts any input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EmptyPayload;

impl Serialize for EmptyPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_map(Some(0))?.end()
    }
}

impl<'de> Deserialize<'de> for EmptyPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let _ = IgnoredAny::deserialize(deserializer)?;
        Ok(Self)
    }
}

/// `bcast` request payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BcastArgs {
    /// Whether the sender wants to receive other clients' raw traffic.
    pub enabled: bool,
}

/// `build` and `watch` request payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReqArgs {
    /// Entry point source file.
    pub filename: String,
    /// Compiler options, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_options: Option<Map<String, Value>>,
    /// Deploy target after a successful build.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_to: Option<String>,
    /// Any other fields the client sent.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `connect` request payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectReqArgs {
    /// Device bus transport name (`"none"`, `"serial"`, `"usb"`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
    /// Connect without user interaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<bool>,
    /// Any other fields the client sent.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One compiler diagnostic.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    /// Diagnostic text.
    pub message: String,
    /// Source file the diagnostic points at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// 1-based line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// 1-based column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    /// `"error"`, `"warning"`, ...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Any other fields the compiler emitted.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Outcome of one compile pass, as produced by the build pipeline.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStatus {
    /// Whether the pass produced a deployable image.
    pub success: bool,
    /// Compiler diagnostics.
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
    /// Deploy outcome, when a deploy target was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_status: Option<String>,
    /// Artifact references and anything else the compiler reported.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BuildStatus {
    /// A failed status carrying a single error diagnostic.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            diagnostics: vec![Diagnostic {
                message: message.into(),
                category: Some("error".into()),
                ..Diagnostic::default()
            }],
            ..Self::default()
        }
    }
}

/// Source of forwarded console output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFrom {
    /// Developer tooling (compiler, watcher).
    Dev,
    /// Virtual machine stdout.
    Vm,
    /// Virtual machine stderr.
    VmErr,
    /// Verbose tooling output.
    Verbose,
}

/// `output` event payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEvent {
    /// Where the lines came from.
    pub from: OutputFrom,
    /// Output lines, without trailing newlines.
    pub lines: Vec<String>,
}
