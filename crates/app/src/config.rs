//! Configuration for texsnip.
//!
//! Loads settings from texsnip.json at startup, falling back to defaults
//! for anything missing.

use overlay::OverlayOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const CONFIG_FILE: &str = "texsnip.json";

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the directory containing the executable.
pub fn exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Wait before the snapshot so the caller's own windows are gone
    pub capture_delay_ms: u64,
    /// Where captures are written; `<exe_dir>/captures` when unset
    pub output_dir: Option<PathBuf>,
    pub overlay: OverlayOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            capture_delay_ms: 200,
            output_dir: None,
            overlay: OverlayOptions::default(),
        }
    }
}

impl AppConfig {
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| exe_dir().join("captures"))
    }
}

pub fn parse_config(contents: &str) -> Result<AppConfig, serde_json::Error> {
    serde_json::from_str(contents)
}

/// Loads `path`, or texsnip.json next to the executable, or returns defaults.
pub fn load_config(path: Option<&Path>) -> AppConfig {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| exe_dir().join(CONFIG_FILE));

    log::debug!("Looking for config at: {}", config_path.display());

    if !config_path.exists() {
        log::info!("{} not found. Using default config.", config_path.display());
        return AppConfig::default();
    }

    match fs::read_to_string(&config_path) {
        Ok(contents) => match parse_config(&contents) {
            Ok(config) => {
                log::info!("Config loaded from {}", config_path.display());
                config
            }
            Err(e) => {
                log::warn!("Failed to parse {}: {}. Using defaults.", config_path.display(), e);
                AppConfig::default()
            }
        },
        Err(e) => {
            log::warn!("Failed to read {}: {}. Using defaults.", config_path.display(), e);
            AppConfig::default()
        }
    }
}
