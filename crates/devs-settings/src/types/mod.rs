//! Settings types. All fields are camelCase in the settings file.

mod build;
mod server;

pub use build::BuildSettings;
pub use server::{LoggingSettings, ServerSettings};

use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DevtoolsSettings {
    /// HTTP / WebSocket server.
    pub server: ServerSettings,
    /// Compiler invocation and watch behavior.
    pub build: BuildSettings,
    /// Log output.
    pub logging: LoggingSettings,
    /// JSON file with service descriptors, replacing the built-in set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specs_path: Option<String>,
}
