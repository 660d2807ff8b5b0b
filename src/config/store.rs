//! Configuration file read/write
//!
//! Settings live in a single `settings.json` under the platform config
//! directory. A missing file means defaults.

use super::schema::RecorderConfig;
use crate::utils::{RecorderError, RecorderResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings file name
pub const CONFIG_FILE_NAME: &str = "settings.json";

/// Default location of the settings file
pub fn default_config_path() -> RecorderResult<PathBuf> {
    let base = dirs::config_dir().ok_or_else(|| {
        RecorderError::Configuration("Could not determine config directory".to_string())
    })?;
    Ok(base.join("zoomcast").join(CONFIG_FILE_NAME))
}

/// Read the configuration at `path`, falling back to defaults if absent
pub fn load(path: &Path) -> RecorderResult<RecorderConfig> {
    if !path.exists() {
        tracing::debug!("No settings at {:?}, using defaults", path);
        return Ok(RecorderConfig::default());
    }

    let content = fs::read_to_string(path)?;
    let config: RecorderConfig = serde_json::from_str(&content)?;
    config.zoom.validate()?;

    tracing::debug!("Loaded settings from {:?}", path);
    Ok(config)
}

/// Write the configuration to `path`, creating parent directories
pub fn save(config: &RecorderConfig, path: &Path) -> RecorderResult<()> {
    config.zoom.validate()?;

    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content)?;

    tracing::debug!("Saved settings to {:?}", path);
    Ok(())
}
