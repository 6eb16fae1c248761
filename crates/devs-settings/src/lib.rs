//! # devs-settings
//!
//! Configuration for the devtools server, loaded from three layers (in
//! priority order):
//! 1. **Compiled defaults**: [`DevtoolsSettings::default()`]
//! 2. **User file**: `~/.devs/devtools.json` (deep-merged over defaults)
//! 3. **Environment variables**: `DEVS_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
