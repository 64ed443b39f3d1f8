//! Archive normalization
//!
//! Turns a cached blob into a directory tree under `<entry>/__TMP__` and
//! locates the dependency's final file inside it:
//!
//! - zip: copied to `__TMP__/<name>.zip` and extracted beside it
//! - gzip: decompressed and unpacked as a tar stream
//! - Mach-O and ELF executables: copied to `__TMP__/<basename>` with mode 0700
//!
//! `__TMP__` is linked into execution roots, so a rule can write through it.
//! Each invocation rebuilds it from the verified blob before resolving into it.

pub mod locate;
pub mod tarball;
pub mod zipball;

pub use locate::{locate, MAX_SEARCH_DEPTH};

use crate::cache::{CacheEntry, ContentType};
use crate::error::{KamajiError, KamajiResult};
use std::collections::HashSet;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Normalized output directory inside a cache entry
pub const WORK_DIR: &str = "__TMP__";

const EXTRACTED_EXEC_MODE: u32 = 0o755;
const COPIED_EXEC_MODE: u32 = 0o700;

/// Materializes cache entries for one invocation.
///
/// An entry directory is rebuilt the first time it is seen and reused for
/// the rest of the invocation, so dependencies sharing a digest keep their
/// earlier links intact.
#[derive(Debug, Default)]
pub struct Normalizer {
    rebuilt: HashSet<PathBuf>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize `entry` and return the absolute path of its final file
    pub fn materialize(&mut self, entry: &CacheEntry) -> KamajiResult<PathBuf> {
        if !entry.normalized && !self.rebuilt.contains(&entry.dir) {
            normalize(entry)?;
        } else if entry.content_type.is_raw_executable() {
            // Same blob, possibly under another name
            copy_executable(entry)?;
        } else {
            debug!("{} already normalized in this run", entry.name);
        }
        self.rebuilt.insert(entry.dir.clone());

        let found = locate(&entry.work_dir(), entry.final_file_name())?;
        if entry.content_type == ContentType::Gzip {
            set_mode(&found, EXTRACTED_EXEC_MODE)?;
        }
        Ok(found)
    }
}

/// Rebuild `__TMP__` for `entry` from its blob
pub fn normalize(entry: &CacheEntry) -> KamajiResult<()> {
    reset(&entry.dir)?;
    let work = entry.work_dir();
    fs::create_dir_all(&work)
        .map_err(|e| KamajiError::io(format!("creating {}", work.display()), e))?;

    info!("Normalizing {} ({})", entry.name, entry.content_type);
    match &entry.content_type {
        ContentType::Zip => {
            let copy = work.join(format!("{}.zip", entry.name));
            copy_file(&entry.blob_path(), &copy)?;
            zipball::extract(&copy, &work)
        }
        ContentType::Gzip => tarball::extract(&entry.blob_path(), &work),
        ContentType::MachBinary | ContentType::Executable => copy_executable(entry),
        ContentType::Other(mime) => Err(KamajiError::UnsupportedFileType {
            path: entry.blob_path(),
            content_type: mime.clone(),
        }),
    }
}

/// Drop any previous normalization under a cache entry directory
pub fn reset(entry_dir: &Path) -> KamajiResult<()> {
    let work = entry_dir.join(WORK_DIR);
    if work.exists() {
        fs::remove_dir_all(&work)
            .map_err(|e| KamajiError::io(format!("removing {}", work.display()), e))?;
    }
    Ok(())
}

fn copy_executable(entry: &CacheEntry) -> KamajiResult<()> {
    let dest = entry.work_dir().join(entry.final_file_name());
    if fs::symlink_metadata(&dest).is_ok() {
        fs::remove_file(&dest)
            .map_err(|e| KamajiError::io(format!("removing {}", dest.display()), e))?;
    }
    copy_file(&entry.blob_path(), &dest)?;
    set_mode(&dest, COPIED_EXEC_MODE)
}

/// Resolve an archive member name to a path relative to the destination.
///
/// `..` may only cancel a component it follows; anything that would climb
/// above the destination, or an absolute name, is rejected.
pub fn safe_relative_path(name: &Path, dest: &Path) -> KamajiResult<PathBuf> {
    let unsafe_entry = || KamajiError::UnsafeArchiveEntry {
        entry: name.display().to_string(),
        dest: dest.to_path_buf(),
    };

    let mut out = PathBuf::new();
    let mut depth = 0usize;
    for component in name.components() {
        match component {
            Component::Normal(part) => {
                out.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(unsafe_entry());
                }
                out.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return Err(unsafe_entry()),
        }
    }
    Ok(out)
}

fn copy_file(from: &Path, to: &Path) -> KamajiResult<()> {
    fs::copy(from, to)
        .map(|_| ())
        .map_err(|e| KamajiError::io(format!("copying {} to {}", from.display(), to.display()), e))
}

pub(crate) fn set_mode(path: &Path, mode: u32) -> KamajiResult<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| KamajiError::io(format!("setting mode on {}", path.display()), e))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;

    /// Build a zip from `(name, contents, unix mode)` triples
    pub(crate) fn zip_bytes(files: &[(&str, &[u8], u32)]) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut writer = ::zip::ZipWriter::new(&mut buf);
            for (name, contents, mode) in files {
                let options = ::zip::write::SimpleFileOptions::default()
                    .compression_method(::zip::CompressionMethod::Stored)
                    .unix_permissions(*mode);
                writer.start_file(*name, options).unwrap();
                writer.write_all(contents).unwrap();
            }
            writer.finish().unwrap();
        }
        buf.into_inner()
    }

    /// Build a gzipped tar of regular files
    pub(crate) fn tar_gz_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (name, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_entry_type(tar::EntryType::Regular);
            header.set_cksum();
            builder.append_data(&mut header, name, *contents).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn entry(dir: &Path, name: &str, final_path: &str, content_type: ContentType) -> CacheEntry {
        CacheEntry {
            name: name.to_string(),
            digest: "0".repeat(64),
            dir: dir.to_path_buf(),
            final_path: final_path.to_string(),
            content_type,
            normalized: false,
        }
    }

    fn materialize(entry: &CacheEntry) -> KamajiResult<PathBuf> {
        Normalizer::new().materialize(entry)
    }

    fn mode(path: &Path) -> u32 {
        fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[test]
    fn zip_is_extracted_and_located() {
        let temp = TempDir::new().unwrap();
        let bytes = zip_bytes(&[("pkg/bin/tool", b"#!/bin/sh\n", 0o755)]);
        fs::write(temp.path().join("file"), bytes).unwrap();
        let entry = entry(temp.path(), "tool", "bin/tool", ContentType::Zip);

        let path = materialize(&entry).unwrap();
        assert_eq!(path, temp.path().join("__TMP__/pkg/bin/tool"));
        assert!(temp.path().join("__TMP__/tool.zip").is_file());
        assert_eq!(mode(&path), 0o755);
    }

    #[test]
    fn gzip_final_file_is_made_executable() {
        let temp = TempDir::new().unwrap();
        let bytes = tar_gz_bytes(&[("dist/README", b"docs"), ("dist/darwin-arm64/tool", b"bin")]);
        fs::write(temp.path().join("file"), bytes).unwrap();
        let entry = entry(temp.path(), "tool", "tool", ContentType::Gzip);

        let path = materialize(&entry).unwrap();
        assert_eq!(path, temp.path().join("__TMP__/dist/darwin-arm64/tool"));
        assert_eq!(mode(&path), 0o755);
        assert_eq!(mode(&temp.path().join("__TMP__/dist/README")), 0o644);
    }

    #[test]
    fn executable_is_copied_with_owner_only_mode() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("file"), b"\x7fELFbody").unwrap();
        let entry = entry(temp.path(), "tool", "bin/tool", ContentType::Executable);

        let path = materialize(&entry).unwrap();
        assert_eq!(path, temp.path().join("__TMP__/tool"));
        assert_eq!(fs::read(&path).unwrap(), b"\x7fELFbody");
        assert_eq!(mode(&path), 0o700);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("file"), b"plain").unwrap();
        let entry = entry(
            temp.path(),
            "tool",
            "tool",
            ContentType::Other("application/octet-stream".to_string()),
        );

        let err = materialize(&entry).unwrap_err();
        assert!(matches!(err, KamajiError::UnsupportedFileType { .. }));
    }

    #[test]
    fn missing_final_file_is_reported() {
        let temp = TempDir::new().unwrap();
        let bytes = zip_bytes(&[("other", b"x", 0o644)]);
        fs::write(temp.path().join("file"), bytes).unwrap();
        let entry = entry(temp.path(), "tool", "bin/tool", ContentType::Zip);

        let err = materialize(&entry).unwrap_err();
        assert!(matches!(err, KamajiError::DependencyFileNotFound { .. }));
    }

    #[test]
    fn writes_through_resolved_path_do_not_survive_the_run() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("file"), b"\x7fELFbody").unwrap();
        let entry = entry(temp.path(), "tool", "bin/tool", ContentType::Executable);

        let path = materialize(&entry).unwrap();
        fs::write(&path, "#!/bin/sh\necho evil\n").unwrap();
        fs::write(temp.path().join("__TMP__/stray"), b"left over").unwrap();

        let again = materialize(&entry).unwrap();
        assert_eq!(again, path);
        assert_eq!(fs::read(&again).unwrap(), b"\x7fELFbody");
        assert_eq!(mode(&again), 0o700);
        assert!(!temp.path().join("__TMP__/stray").exists());
    }

    #[test]
    fn extracted_tree_is_rebuilt_on_next_run() {
        let temp = TempDir::new().unwrap();
        let bytes = zip_bytes(&[("pkg/bin/tool", b"original", 0o755)]);
        fs::write(temp.path().join("file"), bytes).unwrap();
        let entry = entry(temp.path(), "tool", "bin/tool", ContentType::Zip);

        let path = materialize(&entry).unwrap();
        fs::write(&path, b"tampered").unwrap();

        // Reused within one run
        let mut normalizer = Normalizer::new();
        let mut eager = entry.clone();
        eager.normalized = true;
        assert_eq!(fs::read(normalizer.materialize(&eager).unwrap()).unwrap(), b"tampered");

        assert_eq!(fs::read(materialize(&entry).unwrap()).unwrap(), b"original");
    }

    #[test]
    fn shared_blob_serves_several_names() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("file"), b"\x7fELFbody").unwrap();
        let alpha = entry(temp.path(), "a", "bin/alpha", ContentType::Executable);
        let beta = entry(temp.path(), "b", "bin/beta", ContentType::Executable);

        let mut normalizer = Normalizer::new();
        let alpha_path = normalizer.materialize(&alpha).unwrap();
        let beta_path = normalizer.materialize(&beta).unwrap();
        assert_eq!(alpha_path, temp.path().join("__TMP__/alpha"));
        assert_eq!(beta_path, temp.path().join("__TMP__/beta"));
        assert!(alpha_path.is_file());
        assert_eq!(fs::read(&beta_path).unwrap(), b"\x7fELFbody");

        // A later run asking only for the second name
        assert_eq!(materialize(&beta).unwrap(), beta_path);
    }

    #[test]
    fn shared_tarball_marks_each_name_executable() {
        let temp = TempDir::new().unwrap();
        let bytes = tar_gz_bytes(&[("dist/one", b"1"), ("dist/two", b"2")]);
        fs::write(temp.path().join("file"), bytes).unwrap();
        let one = entry(temp.path(), "one", "one", ContentType::Gzip);
        let two = entry(temp.path(), "two", "two", ContentType::Gzip);

        let mut normalizer = Normalizer::new();
        let one_path = normalizer.materialize(&one).unwrap();
        let two_path = normalizer.materialize(&two).unwrap();
        assert_eq!(mode(&one_path), 0o755);
        assert_eq!(mode(&two_path), 0o755);
    }

    #[test]
    fn relative_paths_are_confined() {
        let dest = Path::new("/dest");
        assert_eq!(
            safe_relative_path(Path::new("a/./b/../c"), dest).unwrap(),
            PathBuf::from("a/c")
        );
        for bad in ["../../evil", "a/../../evil", "/etc/passwd"] {
            let err = safe_relative_path(Path::new(bad), dest).unwrap_err();
            assert!(matches!(err, KamajiError::UnsafeArchiveEntry { .. }), "{}", bad);
        }
    }
}
