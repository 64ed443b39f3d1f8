//! User settings schema for Kamaji
//!
//! Settings are stored at `~/.config/kamaji/config.toml`. Every section is
//! optional; a missing file yields the defaults below.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root settings structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Filesystem locations
    pub paths: PathsConfig,

    /// Rule execution settings
    pub runner: RunnerConfig,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// General application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: LogFormat,
}

/// Filesystem locations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Runtime temp root holding `cache/`, `execroot/` and `sandbox/`.
    /// Defaults to `/tmp/_kamaji_<user>` (`/var/tmp` on macOS).
    pub tmp_dir: Option<PathBuf>,
}

/// Rule execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Shell used to run the synthesized command line (`<shell> -c <cmd>`)
    pub shell: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            shell: "bash".to_string(),
        }
    }
}
