//! Static catalog of device service descriptors.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// A device service descriptor.
///
/// Only the identifying fields are typed; the rest of the descriptor
/// (packets, enums, tags) is carried through verbatim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    /// Display name.
    pub name: String,
    /// Identifier used in generated code.
    pub short_id: String,
    /// 32-bit service class.
    pub class_identifier: u32,
    /// Remaining descriptor fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServiceSpec {
    fn new(name: &str, short_id: &str, class_identifier: u32) -> Self {
        Self {
            name: name.to_owned(),
            short_id: short_id.to_owned(),
            class_identifier,
            extra: Map::new(),
        }
    }
}

/// Source of service descriptors.
pub trait ServiceCatalog: Send + Sync {
    /// All known descriptors, independent of any connected device.
    fn specs(&self) -> Vec<ServiceSpec>;
}

/// Errors loading a catalog file.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The file could not be read.
    #[error("failed to read service catalog: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not a JSON array of descriptors.
    #[error("failed to parse service catalog: {0}")]
    Json(#[from] serde_json::Error),
}

/// An in-memory catalog.
#[derive(Clone, Debug, Default)]
pub struct StaticCatalog {
    specs: Vec<ServiceSpec>,
}

impl StaticCatalog {
    /// Catalog over the given descriptors.
    pub fn new(specs: Vec<ServiceSpec>) -> Self {
        Self { specs }
    }

    /// Descriptors for the services every runtime implements.
    pub fn builtin() -> Self {
        Self::new(vec![
            ServiceSpec::new("Control", "control", 0x0000_0000),
            ServiceSpec::new("Logger", "logger", 0x12dc_1fca),
            ServiceSpec::new("Role Manager", "roleManager", 0x1e4b_7e66),
            ServiceSpec::new("DeviceScript Manager", "deviceScriptManager", 0x1134_ea2b),
            ServiceSpec::new("DeviceScript Debugger", "devsDbg", 0x155b_5b40),
        ])
    }

    /// Load a catalog from a JSON array of descriptors.
    pub fn from_json_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        let specs: Vec<ServiceSpec> = serde_json::from_str(&content)?;
        debug!(?path, count = specs.len(), "loaded service catalog");
        Ok(Self::new(specs))
    }
}

impl ServiceCatalog for StaticCatalog {
    fn specs(&self) -> Vec<ServiceSpec> {
        self.specs.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn builtin_is_not_empty() {
        let catalog = StaticCatalog::builtin();
        let specs = catalog.specs();
        assert!(!specs.is_empty());
        assert!(specs.iter().any(|s| s.short_id == "control"));
    }

    #[test]
    fn builtin_class_ids_are_unique() {
        let specs = StaticCatalog::builtin().specs();
        let mut ids: Vec<u32> = specs.iter().map(|s| s.class_identifier).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), specs.len());
    }

    #[test]
    fn load_from_file_keeps_extra_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("specs.json");
        std::fs::write(
            &path,
            r#"[{"name":"Button","shortId":"button","classIdentifier":343122531,"packets":[]}]"#,
        )
        .unwrap();

        let specs = StaticCatalog::from_json_file(&path).unwrap().specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].short_id, "button");
        assert_eq!(specs[0].class_identifier, 343_122_531);
        assert!(specs[0].extra["packets"].is_array());
    }

    #[test]
    fn load_missing_file() {
        let result = StaticCatalog::from_json_file(Path::new("/nonexistent/specs.json"));
        assert_matches!(result, Err(CatalogError::Io(_)));
    }

    #[test]
    fn load_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("specs.json");
        std::fs::write(&path, r#"{"name":"not an array"}"#).unwrap();
        assert_matches!(StaticCatalog::from_json_file(&path), Err(CatalogError::Json(_)));
    }
}
