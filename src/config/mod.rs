//! Configuration management for Kamaji
//!
//! Three sources feed an invocation:
//! - user settings (`~/.config/kamaji/config.toml`), see [`schema`]
//! - the workspace manifest (`kamaji.workspace.yaml`), see [`workspace`]
//! - the target definitions file (`BUILD.yaml`), see [`target`]

pub mod schema;
pub mod target;
pub mod workspace;

pub use schema::{Config, LogFormat};
pub use target::{
    BuildFile, BuildTarget, ConfigValue, Scalar, DEFAULT_BUILD_FILE, DEPENDENCY_SENTINEL,
};
pub use workspace::{
    is_contained_path, DependencySource, ThirdPartyDescriptor, Workspace, WorkspaceManifest, WorkspaceVar,
    WORKSPACE_FILE,
};

use crate::error::{KamajiError, KamajiResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kamaji")
            .join("config.toml")
    }

    /// Default runtime temp root for the current user.
    ///
    /// `/var/tmp/_kamaji_<user>` on macOS, `/tmp/_kamaji_<user>` on Linux.
    pub fn default_tmp_root() -> KamajiResult<PathBuf> {
        let user = current_user();
        match std::env::consts::OS {
            "macos" => Ok(PathBuf::from(format!("/var/tmp/_kamaji_{}", user))),
            "linux" => Ok(PathBuf::from(format!("/tmp/_kamaji_{}", user))),
            other => Err(KamajiError::UnsupportedPlatform {
                name: "runtime temp root".to_string(),
                platform: other.to_string(),
            }),
        }
    }

    /// Load settings, using defaults if the file does not exist
    pub async fn load(&self) -> KamajiResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load settings from a specific file
    pub async fn load_from_file(&self, path: &Path) -> KamajiResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| KamajiError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| KamajiError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Walk up from `start` looking for the workspace manifest.
    ///
    /// Returns the directory containing `kamaji.workspace.yaml`.
    pub fn find_workspace_root(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .find(|dir| dir.join(WORKSPACE_FILE).is_file())
            .map(Path::to_path_buf)
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Name used in the per-user temp root: `$USER`, else the numeric uid
fn current_user() -> String {
    match std::env::var("USER") {
        Ok(user) if !user.is_empty() => user,
        _ => {
            // SAFETY: getuid has no preconditions and cannot fail
            let uid = unsafe { libc::getuid() };
            uid.to_string()
        }
    }
}
