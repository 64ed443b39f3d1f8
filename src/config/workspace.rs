//! Workspace manifest parsing
//!
//! The workspace root is marked by `kamaji.workspace.yaml`, which declares
//! where rule scripts live and which third-party binaries targets may use.

use crate::error::{KamajiError, KamajiResult};
use crate::platform::Platform;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path, PathBuf};

/// File name marking a workspace root
pub const WORKSPACE_FILE: &str = "kamaji.workspace.yaml";

/// Prefix marking a path as relative to the workspace root
const ROOT_SENTINEL: &str = "//";

fn default_common_dir() -> String {
    "common".to_string()
}

fn default_interpreter() -> String {
    "python3".to_string()
}

/// Parsed `kamaji.workspace.yaml`
#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceManifest {
    /// Informational workspace root as written in the manifest
    #[serde(default)]
    pub workspace_root: String,

    /// Directory holding rule scripts (`//` = workspace-root relative)
    #[serde(default)]
    pub rules_directory: String,

    /// Shared rule-support directory, relative to the rules directory
    #[serde(default = "default_common_dir")]
    pub rules_common_directory: String,

    /// Named workspace variables; the first record is exported to rules
    #[serde(default)]
    pub workspace_vars: Vec<WorkspaceVar>,

    /// Third-party binaries targets may reference with `@@name`
    #[serde(default)]
    pub third_party: Vec<ThirdPartyDescriptor>,

    /// Interpreter rule scripts are run with
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
}

/// A `workspace_vars` record
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkspaceVar {
    #[serde(default)]
    pub org_domain: String,

    #[serde(default)]
    pub base_dir: String,
}

/// A downloadable dependency, one URL and digest per platform
#[derive(Debug, Clone, Deserialize)]
pub struct ThirdPartyDescriptor {
    /// Unique key targets reference
    pub name: String,

    /// Relative path the dependency is addressed by inside `external/`
    #[serde(rename = "file_path")]
    pub final_path: String,

    /// Platform key -> download URL
    #[serde(rename = "url", default)]
    pub urls: BTreeMap<String, String>,

    /// Platform key -> expected SHA-256 hex digest
    #[serde(rename = "sha256", default)]
    pub digests: BTreeMap<String, String>,
}

/// URL and digest of a descriptor for one platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySource {
    pub url: String,
    pub digest: String,
}

impl ThirdPartyDescriptor {
    /// Select the URL and digest for `platform`.
    ///
    /// Both must be present, otherwise the dependency is unusable here.
    pub fn source_for(&self, platform: &Platform) -> KamajiResult<DependencySource> {
        let key = platform.key();
        let url = self.urls.get(&key).filter(|u| !u.trim().is_empty());
        let digest = self.digests.get(&key).filter(|d| !d.trim().is_empty());

        match (url, digest) {
            (Some(url), Some(digest)) => Ok(DependencySource {
                url: url.trim().to_string(),
                digest: digest.trim().to_ascii_lowercase(),
            }),
            _ => Err(KamajiError::UnsupportedPlatform {
                name: self.name.clone(),
                platform: key,
            }),
        }
    }
}

/// Whether `path` is relative and names something below the directory it is joined to
pub fn is_contained_path(path: &str) -> bool {
    let mut normal = false;
    for component in Path::new(path).components() {
        match component {
            Component::Normal(_) => normal = true,
            Component::CurDir => {}
            _ => return false,
        }
    }
    normal
}

impl WorkspaceManifest {
    /// Parse a manifest from a YAML string
    pub fn parse(content: &str, path: &Path) -> KamajiResult<Self> {
        let manifest: Self =
            serde_yaml::from_str(content).map_err(|e| KamajiError::ConfigInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        manifest.validate(path)?;
        Ok(manifest)
    }

    fn validate(&self, path: &Path) -> KamajiResult<()> {
        let invalid = |reason: String| KamajiError::ConfigInvalid {
            path: path.to_path_buf(),
            reason,
        };

        let mut names = HashSet::new();
        for tp in &self.third_party {
            if tp.name.is_empty() {
                return Err(invalid("third_party entry without a name".to_string()));
            }
            if !names.insert(tp.name.as_str()) {
                return Err(invalid(format!("duplicate third_party name '{}'", tp.name)));
            }
            if tp.final_path.is_empty() {
                return Err(invalid(format!("third_party '{}' has no file_path", tp.name)));
            }
            if !is_contained_path(&tp.final_path) {
                return Err(invalid(format!(
                    "third_party '{}' file_path '{}' must be relative without '..'",
                    tp.name, tp.final_path
                )));
            }
            // The digest names a cache directory, so it must not carry path syntax
            for (platform, digest) in &tp.digests {
                let digest = digest.trim();
                if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(invalid(format!(
                        "third_party '{}' has an invalid sha256 for {}: '{}'",
                        tp.name, platform, digest
                    )));
                }
            }
        }
        Ok(())
    }

    /// Look up a third-party descriptor by name
    pub fn third_party(&self, name: &str) -> Option<&ThirdPartyDescriptor> {
        self.third_party.iter().find(|tp| tp.name == name)
    }
}

/// A loaded workspace: its root directory, manifest, and resolved rule paths
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Directory containing `kamaji.workspace.yaml`
    pub root: PathBuf,

    /// Parsed manifest
    pub manifest: WorkspaceManifest,

    /// Absolute rules directory
    pub rules_dir: PathBuf,

    /// Absolute shared rule-support directory
    pub common_dir: PathBuf,
}

impl Workspace {
    /// Load the manifest from a workspace root directory
    pub async fn load(root: &Path) -> KamajiResult<Self> {
        let path = root.join(WORKSPACE_FILE);
        if !path.is_file() {
            return Err(KamajiError::ConfigNotFound(path));
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| KamajiError::io(format!("reading {}", path.display()), e))?;
        let manifest = WorkspaceManifest::parse(&content, &path)?;

        Ok(Self::from_manifest(root.to_path_buf(), manifest))
    }

    /// Build a workspace from an already parsed manifest
    pub fn from_manifest(root: PathBuf, manifest: WorkspaceManifest) -> Self {
        let rules_dir = resolve_in_workspace(&root, &manifest.rules_directory);
        let common = if manifest.rules_common_directory.is_empty() {
            default_common_dir()
        } else {
            manifest.rules_common_directory.clone()
        };
        let common_dir = rules_dir.join(common);

        Self {
            root,
            manifest,
            rules_dir,
            common_dir,
        }
    }

    /// Absolute path of a rule script.
    ///
    /// `//path` is relative to the workspace root, anything else to the
    /// rules directory.
    pub fn rule_path(&self, rule: &str) -> PathBuf {
        match rule.strip_prefix(ROOT_SENTINEL) {
            Some(rest) => self.root.join(rest),
            None => self.rules_dir.join(rule),
        }
    }

    /// Relative directory a rule lives in, as mirrored under `rules/`
    pub fn rule_subdir(&self, rule: &str) -> PathBuf {
        let rel = rule.strip_prefix(ROOT_SENTINEL).unwrap_or(rule);
        Path::new(rel)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// Organization domain exported to rules, from the first variable record
    pub fn org_domain(&self) -> Option<&str> {
        self.manifest
            .workspace_vars
            .first()
            .map(|v| v.org_domain.as_str())
            .filter(|d| !d.is_empty())
    }

    /// Base directory exported to rules, from the first variable record
    pub fn base_dir(&self) -> Option<&str> {
        self.manifest
            .workspace_vars
            .first()
            .map(|v| v.base_dir.as_str())
            .filter(|d| !d.is_empty())
    }
}

fn resolve_in_workspace(root: &Path, value: &str) -> PathBuf {
    if let Some(rest) = value.strip_prefix(ROOT_SENTINEL) {
        return root.join(rest);
    }
    let path = Path::new(value);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
