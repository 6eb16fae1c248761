use serde::{Deserialize, Serialize};

/// Compiler invocation settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildSettings {
    /// Compiler executable.
    pub compiler: String,
    /// Arguments placed before the entry point file.
    pub compiler_args: Vec<String>,
    /// Quiet period after a file change before rebuilding.
    pub watch_debounce_ms: u64,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            compiler: "devs".to_string(),
            compiler_args: vec!["build".to_string(), "--json".to_string()],
            watch_debounce_ms: 200,
        }
    }
}
