//! Per-invocation runtime context
//!
//! Built once at startup and passed by reference to every component. Holds
//! the loaded workspace, the detected platform and the runtime directories.

use crate::config::Workspace;
use crate::error::{KamajiError, KamajiResult};
use crate::platform::Platform;
use std::path::{Path, PathBuf};

/// Everything a single target invocation needs to know about its environment
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    /// Loaded workspace manifest and resolved rule paths
    pub workspace: Workspace,

    /// Platform dependencies are selected for
    pub platform: Platform,

    /// Runtime temp root (`cache/`, `execroot/`, `sandbox/` live here)
    pub tmp_root: PathBuf,

    /// Content-addressed download cache
    pub cache_root: PathBuf,

    /// Directory the caller invoked Kamaji from
    pub caller_dir: PathBuf,

    /// Shell used to run the synthesized command line
    pub shell: String,

    /// Mirror the caller's directory into the execution root and run there
    pub isolated: bool,
}

impl RuntimeContext {
    /// Create a context for the current platform
    pub fn new(workspace: Workspace, tmp_root: PathBuf, caller_dir: PathBuf) -> Self {
        let cache_root = tmp_root.join("cache");
        Self {
            workspace,
            platform: Platform::current(),
            tmp_root,
            cache_root,
            caller_dir,
            shell: "bash".to_string(),
            isolated: false,
        }
    }

    /// Select dependencies for another platform
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Set the shell used for rule execution
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Enable or disable isolated mode
    pub fn with_isolated(mut self, isolated: bool) -> Self {
        self.isolated = isolated;
        self
    }

    /// Parent directory of execution roots for the current mode
    pub fn execroot_parent(&self) -> PathBuf {
        let kind = if self.isolated { "sandbox" } else { "execroot" };
        self.tmp_root.join(kind)
    }

    /// Ensure the temp root and cache root exist
    pub fn ensure_dirs(&self) -> KamajiResult<()> {
        for dir in [&self.tmp_root, &self.cache_root] {
            create_dir(dir)?;
        }
        Ok(())
    }
}

fn create_dir(dir: &Path) -> KamajiResult<()> {
    std::fs::create_dir_all(dir)
        .map_err(|e| KamajiError::io(format!("creating directory {}", dir.display()), e))
}
