//! Image version marker decoding and the `specs` snapshot.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::specs::{ServiceCatalog, ServiceSpec};

/// Version marker of the bytecode image format this tool emits.
pub const IMG_VERSION: u32 = 0x0210_0002;

/// A decoded image version marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageVersion {
    /// Bits 24..32.
    pub major: u8,
    /// Bits 16..24.
    pub minor: u8,
    /// Bits 0..16.
    pub patch: u16,
}

impl ImageVersion {
    /// Decode a packed `0xMMmmPPPP` marker.
    pub const fn decode(marker: u32) -> Self {
        Self {
            major: (marker >> 24) as u8,
            minor: (marker >> 16) as u8,
            patch: marker as u16,
        }
    }
}

impl fmt::Display for ImageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Capability and version information returned by `specs`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSnapshot {
    /// Service descriptors known to the tool.
    pub specs: Vec<ServiceSpec>,
    /// Release version of the devtools.
    pub tool_version: String,
    /// Image format version, `v{major}.{minor}.{patch}`.
    pub image_version: String,
}

/// Assembles [`VersionSnapshot`]s from a catalog and fixed version data.
#[derive(Clone)]
pub struct VersionReporter {
    catalog: Arc<dyn ServiceCatalog>,
    tool_version: String,
    image_version: ImageVersion,
}

impl VersionReporter {
    /// Create a reporter.
    pub fn new(catalog: Arc<dyn ServiceCatalog>, tool_version: impl Into<String>, marker: u32) -> Self {
        Self {
            catalog,
            tool_version: tool_version.into(),
            image_version: ImageVersion::decode(marker),
        }
    }

    /// Decoded image version.
    pub fn image_version(&self) -> ImageVersion {
        self.image_version
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> VersionSnapshot {
        VersionSnapshot {
            specs: self.catalog.specs(),
            tool_version: self.tool_version.clone(),
            image_version: self.image_version.to_string(),
        }
    }
}

impl fmt::Debug for VersionReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionReporter")
            .field("tool_version", &self.tool_version)
            .field("image_version", &self.image_version)
            .finish_non_exhaustive()
    }
}
