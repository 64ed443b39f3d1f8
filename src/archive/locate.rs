//! Final-file lookup inside a normalized tree

use crate::error::{KamajiError, KamajiResult};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Deepest level searched below the normalized directory
pub const MAX_SEARCH_DEPTH: usize = 32;

/// Find the file under `dir` whose basename matches `file_name`'s basename.
///
/// The walk visits siblings in byte order, so with several candidates the
/// result is stable across runs; the extras are logged.
pub fn locate(dir: &Path, file_name: &str) -> KamajiResult<PathBuf> {
    let wanted = Path::new(file_name)
        .file_name()
        .unwrap_or_else(|| OsStr::new(file_name));

    let mut matches = WalkDir::new(dir)
        .max_depth(MAX_SEARCH_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Skipping unreadable entry under {}: {}", dir.display(), e);
                None
            }
        })
        .filter(|entry| entry.depth() > 0 && !entry.file_type().is_dir())
        .filter(|entry| entry.file_name() == wanted)
        .map(|entry| entry.into_path());

    let found = matches.next().ok_or_else(|| KamajiError::DependencyFileNotFound {
        file: file_name.to_string(),
        dir: dir.to_path_buf(),
    })?;

    let others: Vec<PathBuf> = matches.collect();
    if !others.is_empty() {
        warn!(
            "Multiple files named {} under {}; using {} and ignoring {:?}",
            wanted.to_string_lossy(),
            dir.display(),
            found.display(),
            others
        );
    }
    Ok(found)
}
