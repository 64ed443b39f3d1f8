//! gzip+tar extraction

use crate::archive::safe_relative_path;
use crate::error::{KamajiError, KamajiResult};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::path::Path;
use tar::EntryType;

/// Unpack a gzipped tar stream into `dest`.
///
/// Only regular files and directories are accepted.
pub fn extract(archive: &Path, dest: &Path) -> KamajiResult<()> {
    let file = File::open(archive)
        .map_err(|e| KamajiError::io(format!("opening {}", archive.display()), e))?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));

    let entries = tar.entries().map_err(|e| KamajiError::archive(archive, e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| KamajiError::archive(archive, e))?;
        let name = entry
            .path()
            .map_err(|e| KamajiError::archive(archive, e))?
            .into_owned();
        let kind = entry.header().entry_type();

        match kind {
            EntryType::XHeader | EntryType::XGlobalHeader => continue,
            EntryType::Directory | EntryType::Regular | EntryType::Continuous => {}
            other => {
                return Err(KamajiError::UnsupportedArchiveMember {
                    entry: name.display().to_string(),
                    kind: format!("{:?}", other),
                });
            }
        }

        let rel = safe_relative_path(&name, dest)?;
        let out_path = dest.join(&rel);
        if kind.is_dir() {
            fs::create_dir_all(&out_path)
                .map_err(|e| KamajiError::io(format!("creating {}", out_path.display()), e))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| KamajiError::io(format!("creating {}", parent.display()), e))?;
        }
        entry
            .unpack(&out_path)
            .map_err(|e| KamajiError::io(format!("unpacking {}", out_path.display()), e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::tar_gz_bytes;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;

    #[test]
    fn unpacks_regular_files() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("pkg.tar.gz");
        fs::write(&archive, tar_gz_bytes(&[("a/b/tool", b"bin"), ("c.txt", b"text")])).unwrap();
        let dest = temp.path().join("out");

        extract(&archive, &dest).unwrap();
        assert_eq!(fs::read(dest.join("a/b/tool")).unwrap(), b"bin");
        assert_eq!(fs::read(dest.join("c.txt")).unwrap(), b"text");
    }

    #[test]
    fn symlink_member_is_rejected() {
        let temp = TempDir::new().unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(EntryType::Symlink);
        header.set_size(0);
        header.set_link_name("/etc/passwd").unwrap();
        builder
            .append_data(&mut header, "link", std::io::empty())
            .unwrap();
        let bytes = builder.into_inner().unwrap().finish().unwrap();
        let archive = temp.path().join("link.tar.gz");
        fs::write(&archive, bytes).unwrap();

        let err = extract(&archive, &temp.path().join("out")).unwrap_err();
        match err {
            KamajiError::UnsupportedArchiveMember { entry, kind } => {
                assert_eq!(entry, "link");
                assert_eq!(kind, "Symlink");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(!temp.path().join("out/link").exists());
    }

    #[test]
    fn traversal_member_is_rejected() {
        let temp = TempDir::new().unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(5);
        header.set_mode(0o644);
        // set_path refuses "..", so write the raw name field
        let name = b"../../evil";
        header.as_old_mut().name[..name.len()].copy_from_slice(name);
        header.set_cksum();
        builder.append(&header, &b"pwned"[..]).unwrap();
        let bytes = builder.into_inner().unwrap().finish().unwrap();

        let dest = temp.path().join("a/b");
        fs::create_dir_all(&dest).unwrap();
        let archive = temp.path().join("evil.tar.gz");
        fs::write(&archive, bytes).unwrap();

        let err = extract(&archive, &dest).unwrap_err();
        assert!(matches!(err, KamajiError::UnsafeArchiveEntry { .. }));
        assert!(!temp.path().join("evil").exists());
    }

    #[test]
    fn non_gzip_is_an_archive_error() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("bad.tar.gz");
        fs::write(&archive, b"not gzip at all").unwrap();

        let err = extract(&archive, &temp.path().join("out")).unwrap_err();
        assert!(matches!(err, KamajiError::Archive { .. }));
    }
}
