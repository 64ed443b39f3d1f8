//! Dependency resolution for a single target
//!
//! [`ensure_dependencies`] makes sure every `@@name` the target references is
//! cached and intact; it runs before any execution root exists.
//! [`materialize_dependencies`] then normalizes each entry and records the
//! resolved file path, and [`link_dependencies`] links those paths into the
//! root's `external/` directory.
//!
//! Every pass attempts every dependency and reports all failures together.

use crate::archive::Normalizer;
use crate::cache::{CacheEntry, CacheStore};
use crate::config::BuildTarget;
use crate::context::RuntimeContext;
use crate::error::{KamajiError, KamajiResult};
use crate::execroot::ExecRoot;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Dependencies of one target, keyed by name
#[derive(Debug, Clone, Default)]
pub struct ResolvedDependencyIndex {
    entries: BTreeMap<String, CacheEntry>,
    paths: BTreeMap<String, PathBuf>,
}

impl ResolvedDependencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cached entry
    pub fn insert_entry(&mut self, entry: CacheEntry) {
        self.entries.insert(entry.name.clone(), entry);
    }

    /// Record where a dependency's final file was materialized
    pub fn insert_path(&mut self, name: impl Into<String>, path: PathBuf) {
        self.paths.insert(name.into(), path);
    }

    /// Absolute path a `@@name` reference resolves to
    pub fn path(&self, name: &str) -> Option<&Path> {
        self.paths.get(name).map(PathBuf::as_path)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ensure every dependency `target` references is present in the cache
pub fn ensure_dependencies(
    ctx: &RuntimeContext,
    store: &CacheStore,
    target: &BuildTarget,
) -> KamajiResult<ResolvedDependencyIndex> {
    let mut index = ResolvedDependencyIndex::new();
    let mut failures = Vec::new();

    for name in target.dependency_refs() {
        debug!("Resolving dependency {}", name);
        let result = ctx
            .workspace
            .manifest
            .third_party(name)
            .ok_or_else(|| KamajiError::UnresolvedDependency(name.to_string()))
            .and_then(|descriptor| store.ensure(descriptor, &ctx.platform));

        match result {
            Ok(entry) => index.insert_entry(entry),
            Err(e) => {
                error!("Dependency {} failed: {}", name, e);
                failures.push(e);
            }
        }
    }

    collect_failures(failures).map(|()| index)
}

/// Normalize every cached entry and record its resolved file path
pub fn materialize_dependencies(index: &mut ResolvedDependencyIndex) -> KamajiResult<()> {
    let mut normalizer = Normalizer::new();
    let mut resolved = Vec::new();
    let mut failures = Vec::new();

    for entry in index.entries() {
        match normalizer.materialize(entry) {
            Ok(path) => {
                debug!("{} resolved to {}", entry.name, path.display());
                resolved.push((entry.name.clone(), path));
            }
            Err(e) => {
                error!("Dependency {} failed: {}", entry.name, e);
                failures.push(e);
            }
        }
    }

    for (name, path) in resolved {
        index.insert_path(name, path);
    }
    collect_failures(failures)
}

/// Link each resolved dependency at `external/<final_path>` in `root`
pub fn link_dependencies(index: &ResolvedDependencyIndex, root: &ExecRoot) -> KamajiResult<()> {
    let mut failures = Vec::new();

    for entry in index.entries() {
        let Some(path) = index.path(&entry.name) else {
            continue;
        };
        if let Err(e) = root.link_dependency(&entry.final_path, path) {
            error!("Dependency {} failed: {}", entry.name, e);
            failures.push(e);
        }
    }

    collect_failures(failures)
}

fn collect_failures(mut failures: Vec<KamajiError>) -> KamajiResult<()> {
    match failures.len() {
        0 => Ok(()),
        1 => Err(failures.remove(0)),
        _ => Err(KamajiError::DependencyResolution(failures)),
    }
}
