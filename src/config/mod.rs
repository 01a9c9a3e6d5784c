//! Configuration module for DeepSearch-RS
//!
//! Handles loading settings from YAML files and environment variables.

mod settings;

pub use settings::*;

use anyhow::Result;
use std::path::PathBuf;
use tracing::info;

/// Environment variable pointing at an explicit settings file
pub const SETTINGS_PATH_ENV: &str = "DEEPSEARCH_SETTINGS_PATH";

/// Candidate settings locations, in lookup order
pub fn settings_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("settings.yml"),
        PathBuf::from("config/settings.yml"),
        PathBuf::from("/etc/deepsearch/settings.yml"),
    ];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("deepsearch-rs/settings.yml"));
    }
    paths
}

/// Load settings from the first settings file found, or use defaults.
///
/// Environment overrides are applied in every case.
pub fn load() -> Result<Settings> {
    let explicit = std::env::var(SETTINGS_PATH_ENV)
        .ok()
        .map(PathBuf::from)
        .filter(|path| path.exists());

    let found = explicit.or_else(|| settings_paths().into_iter().find(|path| path.exists()));

    let mut settings = match found {
        Some(path) => {
            info!("Loading settings from: {}", path.display());
            Settings::from_file(&path)?
        }
        None => {
            info!("No settings file found, using defaults");
            Settings::default()
        }
    };

    settings.merge_env();
    Ok(settings)
}
