//! Persisted settings for a Tablesmith workspace.
//!
//! Settings live in a single JSON file and carry the saved calculation
//! bindings alongside user preferences.

use crate::core::store::CalculationStore;
use crate::core::table::is_valid_anchor_id;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_ANCHOR_PREFIX: &str = "table";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Prefix for generated anchor ids, as in `table-1a2b3c4d`.
    pub anchor_prefix: String,
    pub calculations: CalculationStore,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            anchor_prefix: DEFAULT_ANCHOR_PREFIX.to_string(),
            calculations: CalculationStore::new(),
        }
    }
}

/// Loads settings from `path`; returns defaults if the file is missing or corrupt.
///
/// An anchor prefix that could not be read back from an anchor line is
/// replaced by [`DEFAULT_ANCHOR_PREFIX`].
pub fn load_settings(path: &Path) -> Settings {
    let mut settings: Settings = match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("Ignoring unreadable settings at {}: {e}", path.display());
            Settings::default()
        }),
        Err(_) => Settings::default(),
    };
    if !is_valid_anchor_id(&settings.anchor_prefix) {
        log::warn!(
            "Ignoring invalid anchor prefix '{}' in {}",
            settings.anchor_prefix,
            path.display()
        );
        settings.anchor_prefix = DEFAULT_ANCHOR_PREFIX.to_string();
    }
    settings
}

/// Saves settings to `path`, creating parent directories as needed.
pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;
    Ok(())
}
