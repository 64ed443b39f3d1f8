//! Shallow symlink mirror of a directory

use crate::error::{KamajiError, KamajiResult};
use std::fs;
use std::os::unix::fs::symlink;
use std::path::Path;
use tracing::debug;

/// Link every immediate child of `source` into `dest`.
///
/// Entries already present in `dest` under the same name are replaced.
/// Returns the number of links created.
pub fn mirror_shallow(source: &Path, dest: &Path) -> KamajiResult<usize> {
    fs::create_dir_all(dest)
        .map_err(|e| KamajiError::io(format!("creating {}", dest.display()), e))?;

    let mut children: Vec<_> = fs::read_dir(source)
        .map_err(|e| KamajiError::io(format!("reading {}", source.display()), e))?
        .collect::<Result<_, _>>()
        .map_err(|e| KamajiError::io(format!("reading {}", source.display()), e))?;
    children.sort_by_key(|entry| entry.file_name());

    for child in &children {
        let link = dest.join(child.file_name());
        remove_existing(&link)?;
        symlink(child.path(), &link).map_err(|e| {
            KamajiError::io(
                format!("linking {} -> {}", link.display(), child.path().display()),
                e,
            )
        })?;
    }

    debug!(
        "Mirrored {} entries from {} into {}",
        children.len(),
        source.display(),
        dest.display()
    );
    Ok(children.len())
}

/// Remove whatever sits at `path` without following symlinks
pub(crate) fn remove_existing(path: &Path) -> KamajiResult<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(KamajiError::io(format!("inspecting {}", path.display()), e)),
    };

    let removed = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    removed.map_err(|e| KamajiError::io(format!("removing {}", path.display()), e))
}
