//! zip extraction

use crate::archive::{safe_relative_path, set_mode};
use crate::error::{KamajiError, KamajiResult};
use std::fs::{self, File};
use std::io;
use std::path::Path;
use tracing::debug;

/// Extract every member of `archive` into `dest`, keeping unix modes
pub fn extract(archive: &Path, dest: &Path) -> KamajiResult<()> {
    let file = File::open(archive)
        .map_err(|e| KamajiError::io(format!("opening {}", archive.display()), e))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| KamajiError::archive(archive, e))?;

    for i in 0..zip.len() {
        let mut member = zip.by_index(i).map_err(|e| KamajiError::archive(archive, e))?;
        let name = member.name().to_string();
        let rel = safe_relative_path(Path::new(&name), dest)?;
        let out_path = dest.join(&rel);

        if member.is_dir() {
            fs::create_dir_all(&out_path)
                .map_err(|e| KamajiError::io(format!("creating {}", out_path.display()), e))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| KamajiError::io(format!("creating {}", parent.display()), e))?;
        }
        let mut out = File::create(&out_path)
            .map_err(|e| KamajiError::io(format!("creating {}", out_path.display()), e))?;
        io::copy(&mut member, &mut out)
            .map_err(|e| KamajiError::io(format!("writing {}", out_path.display()), e))?;

        if let Some(mode) = member.unix_mode() {
            set_mode(&out_path, mode & 0o7777)?;
        }
        debug!("Extracted {}", rel.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::zip_bytes;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    #[test]
    fn traversal_entry_is_rejected() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("a/b/dest");
        fs::create_dir_all(&dest).unwrap();
        let archive = temp.path().join("evil.zip");
        fs::write(&archive, zip_bytes(&[("../../evil", b"pwned", 0o644)])).unwrap();

        let err = extract(&archive, &dest).unwrap_err();
        assert!(matches!(err, KamajiError::UnsafeArchiveEntry { .. }));
        assert!(!temp.path().join("a/evil").exists());
        assert!(!temp.path().join("evil").exists());
    }

    #[test]
    fn nested_members_and_modes_are_kept() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("pkg.zip");
        fs::write(
            &archive,
            zip_bytes(&[("bin/tool", b"run", 0o750), ("share/doc.txt", b"doc", 0o600)]),
        )
        .unwrap();
        let dest = temp.path().join("out");
        fs::create_dir(&dest).unwrap();

        extract(&archive, &dest).unwrap();
        let tool = dest.join("bin/tool");
        assert_eq!(fs::read(&tool).unwrap(), b"run");
        assert_eq!(fs::metadata(&tool).unwrap().permissions().mode() & 0o777, 0o750);
        assert_eq!(
            fs::metadata(dest.join("share/doc.txt")).unwrap().permissions().mode() & 0o777,
            0o600
        );
    }

    #[test]
    fn garbage_is_an_archive_error() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("bad.zip");
        fs::write(&archive, b"PK\x03\x04 not really").unwrap();

        let err = extract(&archive, temp.path()).unwrap_err();
        assert!(matches!(err, KamajiError::Archive { .. }));
    }
}
