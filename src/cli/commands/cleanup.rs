//! Cleanup command - remove the download cache and execution roots

use crate::error::{KamajiError, KamajiResult};
use console::style;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Directories under the temp root that cleanup removes
pub const CLEANUP_DIRS: [&str; 3] = ["cache", "execroot", "sandbox"];

/// Execute the cleanup command
pub async fn execute(tmp_root: &Path) -> KamajiResult<()> {
    let removed = remove_runtime_dirs(tmp_root).await?;

    if removed.is_empty() {
        println!("Nothing to clean under {}", tmp_root.display());
        return Ok(());
    }

    for dir in &removed {
        println!("  {} {}", style("•").red(), dir.display());
    }
    println!("{} removed {} director(ies)", style("✓").green(), removed.len());
    Ok(())
}

/// Remove each runtime directory that exists, returning the removed paths
pub async fn remove_runtime_dirs(tmp_root: &Path) -> KamajiResult<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for name in CLEANUP_DIRS {
        let dir = tmp_root.join(name);
        if !dir.exists() {
            debug!("{} does not exist", dir.display());
            continue;
        }
        fs::remove_dir_all(&dir)
            .await
            .map_err(|e| KamajiError::io(format!("removing {}", dir.display()), e))?;
        removed.push(dir);
    }
    Ok(removed)
}
