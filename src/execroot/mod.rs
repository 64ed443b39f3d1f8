//! Execution root assembly
//!
//! An execution root is a fresh directory per invocation:
//!
//! ```text
//! <tmp_root>/{execroot|sandbox}/<target>-<suffix>/
//!     external/<final_path>  -> materialized dependency file
//!     rules/<rule_subdir>    -> <rules_dir>/<rule_subdir>
//!     common                 -> <rules_dir>/<common>
//!     origin/*               -> caller's directory entries (isolated only)
//! ```
//!
//! The directory is removed by [`ExecRoot::teardown`], or on drop if
//! teardown never ran.

pub mod mirror;

pub use mirror::mirror_shallow;

use crate::config::is_contained_path;
use crate::context::RuntimeContext;
use crate::error::{KamajiError, KamajiResult};
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Length of the random directory-name suffix
pub const SUFFIX_LEN: usize = 6;

const CREATE_ATTEMPTS: usize = 8;

/// A live execution root, deleted when dropped
#[derive(Debug)]
pub struct ExecRoot {
    path: PathBuf,
    torn_down: bool,
}

impl ExecRoot {
    /// Create a fresh, empty root for `target_name`
    pub fn create(ctx: &RuntimeContext, target_name: &str) -> KamajiResult<Self> {
        let parent = ctx.execroot_parent();
        fs::create_dir_all(&parent)
            .map_err(|e| KamajiError::io(format!("creating {}", parent.display()), e))?;

        let mut last_err = None;
        for _ in 0..CREATE_ATTEMPTS {
            let path = parent.join(format!("{}-{}", target_name, random_suffix()));
            match fs::create_dir(&path) {
                Ok(()) => {
                    let root = Self {
                        path,
                        torn_down: false,
                    };
                    let external = root.external_dir();
                    fs::create_dir(&external).map_err(|e| {
                        KamajiError::io(format!("creating {}", external.display()), e)
                    })?;
                    debug!("Created execution root {}", root.path.display());
                    return Ok(root);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => last_err = Some(e),
                Err(e) => {
                    return Err(KamajiError::io(
                        format!("creating execution root {}", path.display()),
                        e,
                    ))
                }
            }
        }

        Err(KamajiError::io(
            format!("creating execution root under {}", parent.display()),
            last_err.unwrap_or_else(|| ErrorKind::AlreadyExists.into()),
        ))
    }

    /// Root directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn external_dir(&self) -> PathBuf {
        self.path.join("external")
    }

    pub fn rules_dir(&self) -> PathBuf {
        self.path.join("rules")
    }

    pub fn common_dir(&self) -> PathBuf {
        self.path.join("common")
    }

    pub fn origin_dir(&self) -> PathBuf {
        self.path.join("origin")
    }

    /// Link `external/<final_path>` to a materialized dependency file
    pub fn link_dependency(&self, final_path: &str, resolved: &Path) -> KamajiResult<PathBuf> {
        if !is_contained_path(final_path) {
            return Err(KamajiError::UnsafeDependencyPath(final_path.to_string()));
        }
        let link = self.external_dir().join(final_path);
        make_link(resolved, &link)?;
        Ok(link)
    }

    /// Link `rules/<subdir>` to the rule's source directory
    pub fn link_rules(&self, source: &Path, subdir: &Path) -> KamajiResult<()> {
        let link = if subdir.as_os_str().is_empty() {
            self.rules_dir()
        } else {
            self.rules_dir().join(subdir)
        };
        make_link(source, &link)
    }

    /// Link `common` to the shared rule-support directory
    pub fn link_common(&self, source: &Path) -> KamajiResult<()> {
        make_link(source, &self.common_dir())
    }

    /// Mirror the caller's directory into `origin/`
    pub fn mirror_origin(&self, source: &Path) -> KamajiResult<()> {
        mirror_shallow(source, &self.origin_dir()).map(|_| ())
    }

    /// Delete the root and everything in it
    pub fn teardown(mut self) -> KamajiResult<()> {
        self.torn_down = true;
        remove_root(&self.path)
    }
}

impl Drop for ExecRoot {
    fn drop(&mut self) {
        if self.torn_down {
            return;
        }
        if let Err(e) = remove_root(&self.path) {
            warn!("{}", e);
        }
    }
}

fn remove_root(path: &Path) -> KamajiResult<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            debug!("Removed execution root {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(KamajiError::io(
            format!("removing execution root {}", path.display()),
            e,
        )),
    }
}

/// Create `link -> target`, creating parents of `link`
fn make_link(target: &Path, link: &Path) -> KamajiResult<()> {
    if let Some(parent) = link.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| KamajiError::io(format!("creating {}", parent.display()), e))?;
    }
    symlink(target, link).map_err(|e| {
        KamajiError::io(
            format!("linking {} -> {}", link.display(), target.display()),
            e,
        )
    })
}

fn random_suffix() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..SUFFIX_LEN].to_string()
}
