//! Settings loading with deep merge and environment variable overrides.
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::DevtoolsSettings;

/// Resolve the path to the settings file (`~/.devs/devtools.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".devs").join("devtools.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<DevtoolsSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<DevtoolsSettings> {
    let mut settings = load_file(path)?;
    apply_overrides(&mut settings, |name| std::env::var(name).ok());
    Ok(settings)
}

fn load_file(path: &Path) -> Result<DevtoolsSettings> {
    let defaults = serde_json::to_value(DevtoolsSettings::default()).map_err(SettingsError::Defaults)?;
    if !path.exists() {
        debug!(?path, "settings file not found, using defaults");
        return serde_json::from_value(defaults).map_err(SettingsError::Defaults);
    }

    debug!(?path, "loading settings from file");
    let parse_err = |source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    };
    let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let user: Value = serde_json::from_str(&content).map_err(parse_err)?;
    serde_json::from_value(deep_merge(defaults, user)).map_err(parse_err)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `DEVS_*` overrides read through `lookup`.
///
/// Invalid values are logged and ignored (falling back to file/default).
fn apply_overrides(settings: &mut DevtoolsSettings, lookup: impl Fn(&str) -> Option<String>) {
    let env = EnvReader { lookup };

    if let Some(v) = env.string("DEVS_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u16("DEVS_PORT", 1, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = env.u64("DEVS_MAX_CONNECTIONS", 1, 10_000) {
        settings.server.max_connections = v as usize;
    }
    if let Some(v) = env.u64("DEVS_SLOW_REQUEST_SECS", 1, 3600) {
        settings.server.slow_request_secs = v;
    }
    if let Some(v) = env.string("DEVS_COMPILER") {
        settings.build.compiler = v;
    }
    if let Some(v) = env.u64("DEVS_WATCH_DEBOUNCE_MS", 0, 60_000) {
        settings.build.watch_debounce_ms = v;
    }
    if let Some(v) = env.string("DEVS_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.string("DEVS_SPECS_PATH") {
        settings.specs_path = Some(v);
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers ─────────────────────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        let val = (self.lookup)(name)?;
        let result = parse_u16_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid u16 env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.lookup)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 8080, "host": "localhost"}});
        let source = serde_json::json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "localhost");
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4, 5]});
        let merged = deep_merge(target, source);
        assert_eq!(merged["items"], serde_json::json!([4, 5]));
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_new_keys_added() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"b": 2}));
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        assert_eq!(deep_merge(target, source)["a"], 42);
    }

    // ── load_file ───────────────────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_file(Path::new("/nonexistent/devtools.json")).unwrap();
        assert_eq!(settings.server.port, 8081);
        assert_eq!(settings.build.compiler, "devs");
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devtools.json");
        std::fs::write(
            &path,
            r#"{"server": {"port": 9090}, "build": {"compiler": "/opt/devs/bin/devs"}, "specsPath": "specs.json"}"#,
        )
        .unwrap();

        let settings = load_file(&path).unwrap();
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.build.compiler, "/opt/devs/bin/devs");
        assert_eq!(settings.build.compiler_args, ["build", "--json"]);
        assert_eq!(settings.specs_path.as_deref(), Some("specs.json"));
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devtools.json");
        std::fs::write(&path, "not valid json").unwrap();
        assert_matches!(load_file(&path), Err(SettingsError::Parse { .. }));
    }

    #[test]
    fn load_wrong_type_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devtools.json");
        std::fs::write(&path, r#"{"server": {"port": "high"}}"#).unwrap();
        assert_matches!(load_file(&path), Err(SettingsError::Parse { .. }));
    }

    // ── env overrides ───────────────────────────────────────────────

    #[test]
    fn overrides_applied() {
        let mut settings = DevtoolsSettings::default();
        apply_overrides(
            &mut settings,
            vars(&[
                ("DEVS_HOST", "0.0.0.0"),
                ("DEVS_PORT", "9999"),
                ("DEVS_MAX_CONNECTIONS", "5"),
                ("DEVS_SLOW_REQUEST_SECS", "10"),
                ("DEVS_COMPILER", "devsc"),
                ("DEVS_WATCH_DEBOUNCE_MS", "0"),
                ("DEVS_LOG_LEVEL", "debug"),
                ("DEVS_SPECS_PATH", "/tmp/specs.json"),
            ]),
        );
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 9999);
        assert_eq!(settings.server.max_connections, 5);
        assert_eq!(settings.server.slow_request_secs, 10);
        assert_eq!(settings.build.compiler, "devsc");
        assert_eq!(settings.build.watch_debounce_ms, 0);
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.specs_path.as_deref(), Some("/tmp/specs.json"));
    }

    #[test]
    fn invalid_overrides_ignored() {
        let mut settings = DevtoolsSettings::default();
        apply_overrides(
            &mut settings,
            vars(&[
                ("DEVS_PORT", "0"),
                ("DEVS_MAX_CONNECTIONS", "lots"),
                ("DEVS_HOST", ""),
            ]),
        );
        assert_eq!(settings.server.port, 8081);
        assert_eq!(settings.server.max_connections, 50);
        assert_eq!(settings.server.host, "127.0.0.1");
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u16_range("8080", 1, 65535), Some(8080));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u16_range("70000", 1, 65535), None);
        assert_eq!(parse_u64_range("500", 0, 1000), Some(500));
        assert_eq!(parse_u64_range("-1", 0, 1000), None);
        assert_eq!(parse_u64_range("abc", 0, 1000), None);
    }
}
