//! Cache store: ensure a dependency's blob is present and intact

use crate::archive;
use crate::cache::content_type::ContentType;
use crate::cache::digest::{digests_match, sha256_file};
use crate::cache::fetch::Fetcher;
use crate::cache::metadata::Metadata;
use crate::config::{DependencySource, ThirdPartyDescriptor};
use crate::error::{KamajiError, KamajiResult};
use crate::platform::Platform;
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Raw downloaded blob
pub const BLOB_FILE: &str = "file";
/// Metadata record
pub const METADATA_FILE: &str = "metadata";
/// In-flight download, renamed to [`BLOB_FILE`] once verified
const DOWNLOAD_FILE: &str = "file.download";

/// A verified cache entry for one dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Dependency name from the manifest
    pub name: String,

    /// Expected (and verified) SHA-256 digest
    pub digest: String,

    /// `<cache_root>/<digest>`
    pub dir: PathBuf,

    /// Path the dependency is addressed by inside `external/`
    pub final_path: String,

    /// Detected type of the raw blob
    pub content_type: ContentType,

    /// `__TMP__` was rebuilt from the verified blob by the `ensure` call
    /// that produced this entry
    pub normalized: bool,
}

impl CacheEntry {
    /// Raw downloaded blob
    pub fn blob_path(&self) -> PathBuf {
        self.dir.join(BLOB_FILE)
    }

    /// Metadata record
    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    /// Directory holding normalized output
    pub fn work_dir(&self) -> PathBuf {
        self.dir.join(archive::WORK_DIR)
    }

    /// Base name of the file the dependency resolves to
    pub fn final_file_name(&self) -> &str {
        Path::new(&self.final_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.final_path)
    }
}

/// Content-addressed store rooted at `<tmp_root>/cache`
pub struct CacheStore {
    root: PathBuf,
    fetcher: Box<dyn Fetcher>,
}

impl CacheStore {
    /// Create a store using `fetcher` for downloads
    pub fn new(root: PathBuf, fetcher: impl Fetcher + 'static) -> Self {
        Self {
            root,
            fetcher: Box::new(fetcher),
        }
    }

    /// Directory an entry with `digest` lives in
    pub fn entry_dir(&self, digest: &str) -> PathBuf {
        self.root.join(digest)
    }

    /// Make sure the dependency's blob for `platform` is cached and intact.
    ///
    /// A cached blob is rehashed and never re-downloaded; a mismatch is
    /// [`KamajiError::CorruptCache`]. A missing blob is downloaded, verified,
    /// typed, and (for zip) normalized right away.
    ///
    /// A hit never trusts a previous `__TMP__`; the entry comes back with
    /// `normalized` unset.
    pub fn ensure(
        &self,
        descriptor: &ThirdPartyDescriptor,
        platform: &Platform,
    ) -> KamajiResult<CacheEntry> {
        let source = descriptor.source_for(platform)?;
        let dir = self.entry_dir(&source.digest);
        let blob = dir.join(BLOB_FILE);

        if blob.is_file() {
            debug!("Cache hit for {}: {}", descriptor.name, dir.display());
            return self.load_existing(descriptor, &source, dir);
        }

        debug!("Cache miss for {}: {}", descriptor.name, dir.display());
        self.download(descriptor, &source, &dir)?;

        let content_type = ContentType::sniff_file(&blob)?;
        debug!("Detected {} for {}", content_type, descriptor.name);
        Metadata::new(&descriptor.final_path, content_type.clone())
            .write(&dir.join(METADATA_FILE))?;

        let mut entry = CacheEntry {
            name: descriptor.name.clone(),
            digest: source.digest,
            dir,
            final_path: descriptor.final_path.clone(),
            content_type,
            normalized: false,
        };

        if entry.content_type.is_eager() {
            archive::normalize(&entry)?;
            entry.normalized = true;
        }

        Ok(entry)
    }

    fn load_existing(
        &self,
        descriptor: &ThirdPartyDescriptor,
        source: &DependencySource,
        dir: PathBuf,
    ) -> KamajiResult<CacheEntry> {
        let blob = dir.join(BLOB_FILE);
        verify_blob(&blob, &source.digest)?;

        let metadata_path = dir.join(METADATA_FILE);
        let content_type = match Metadata::read(&metadata_path) {
            Ok(meta) => meta.content_type,
            Err(e) => {
                warn!("Rewriting metadata for {}: {}", descriptor.name, e);
                let content_type = ContentType::sniff_file(&blob)?;
                Metadata::new(&descriptor.final_path, content_type.clone())
                    .write(&metadata_path)?;
                content_type
            }
        };

        Ok(CacheEntry {
            name: descriptor.name.clone(),
            digest: source.digest.clone(),
            dir,
            final_path: descriptor.final_path.clone(),
            content_type,
            normalized: false,
        })
    }

    fn download(
        &self,
        descriptor: &ThirdPartyDescriptor,
        source: &DependencySource,
        dir: &Path,
    ) -> KamajiResult<()> {
        fs::create_dir_all(dir)
            .map_err(|e| KamajiError::io(format!("creating cache dir {}", dir.display()), e))?;
        archive::reset(dir)?;

        info!("Downloading {} from {}", descriptor.name, source.url);
        let tmp = dir.join(DOWNLOAD_FILE);
        let pb = create_spinner(&format!("Downloading {}...", descriptor.name));
        let fetched = self.fetch_into(&source.url, &tmp);
        pb.finish_and_clear();

        let actual = match fetched {
            Ok(actual) => actual,
            Err(e) => {
                let _ = fs::remove_file(&tmp);
                return Err(e);
            }
        };

        if !digests_match(&actual, &source.digest) {
            let _ = fs::remove_file(&tmp);
            return Err(KamajiError::IntegrityMismatch {
                url: source.url.clone(),
                expected: source.digest.clone(),
                actual,
            });
        }

        let blob = dir.join(BLOB_FILE);
        fs::rename(&tmp, &blob).map_err(|e| {
            KamajiError::io(
                format!("moving {} into place at {}", tmp.display(), blob.display()),
                e,
            )
        })
    }

    /// Stream `url` into `dest`, returning the hex digest of what was written
    fn fetch_into(&self, url: &str, dest: &Path) -> KamajiResult<String> {
        let mut reader = self.fetcher.open(url)?;
        let mut out = File::create(dest)
            .map_err(|e| KamajiError::io(format!("creating {}", dest.display()), e))?;

        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buf).map_err(|e| KamajiError::Download {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            out.write_all(&buf[..n])
                .map_err(|e| KamajiError::io(format!("writing {}", dest.display()), e))?;
        }
        out.flush()
            .map_err(|e| KamajiError::io(format!("writing {}", dest.display()), e))?;

        Ok(hex::encode(hasher.finalize()))
    }
}

fn verify_blob(blob: &Path, expected: &str) -> KamajiResult<()> {
    let actual = sha256_file(blob)?;
    if digests_match(&actual, expected) {
        Ok(())
    } else {
        Err(KamajiError::CorruptCache {
            path: blob.to_path_buf(),
            expected: expected.to_string(),
            actual,
        })
    }
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
