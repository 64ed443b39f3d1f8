//! Run command - execute a build target

use crate::cache::{CacheStore, HttpFetcher};
use crate::cli::args::Cli;
use crate::config::{BuildFile, Config, ConfigManager, Workspace, WORKSPACE_FILE};
use crate::context::RuntimeContext;
use crate::error::{KamajiError, KamajiResult};
use crate::runner::Runner;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Execute the run command
pub async fn execute(cli: &Cli, config: &Config) -> KamajiResult<()> {
    let target_name = cli
        .target
        .as_deref()
        .ok_or_else(|| KamajiError::User("no target given".to_string()))?;

    let caller_dir =
        env::current_dir().map_err(|e| KamajiError::io("getting current directory", e))?;

    let workspace_root = resolve_workspace_root(cli.workspace.as_deref(), &caller_dir)?;
    debug!("Workspace root: {}", workspace_root.display());
    let workspace = Workspace::load(&workspace_root).await?;

    let build_path = absolutize(&cli.build, &caller_dir);
    let target = BuildFile::find_target(&build_path, target_name).await?;
    debug!("Target {} uses rule {}", target.name, target.rule);

    let tmp_root = resolve_tmp_root(cli.tmp_dir.as_deref(), config, &caller_dir)?;
    debug!("Runtime temp root: {}", tmp_root.display());

    let ctx = RuntimeContext::new(workspace, tmp_root, caller_dir)
        .with_shell(config.runner.shell.clone())
        .with_isolated(cli.isolated);
    info!("Running {} on {}", target.name, ctx.platform);

    let store = CacheStore::new(ctx.cache_root.clone(), HttpFetcher);
    Runner::new(Arc::new(ctx), Arc::new(store))
        .run(&target, &cli.args)
        .await
}

/// Workspace root from the flag, else the nearest ancestor holding the manifest
pub fn resolve_workspace_root(flag: Option<&Path>, caller_dir: &Path) -> KamajiResult<PathBuf> {
    if let Some(path) = flag {
        return Ok(absolutize(path, caller_dir));
    }
    ConfigManager::find_workspace_root(caller_dir)
        .ok_or_else(|| KamajiError::ConfigNotFound(caller_dir.join(WORKSPACE_FILE)))
}

/// Temp root from the flag, else user settings, else the per-user default.
///
/// Relative values are taken against `caller_dir`; resolved dependency paths
/// and `external/` links are built from this root and must be absolute.
pub fn resolve_tmp_root(
    flag: Option<&Path>,
    config: &Config,
    caller_dir: &Path,
) -> KamajiResult<PathBuf> {
    match flag.or(config.paths.tmp_dir.as_deref()) {
        Some(path) => Ok(absolutize(path, caller_dir)),
        None => ConfigManager::default_tmp_root(),
    }
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn workspace_found_in_ancestor() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(WORKSPACE_FILE), "rules_directory: rules\n").unwrap();
        let nested = temp.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(resolve_workspace_root(None, &nested).unwrap(), temp.path());
    }

    #[test]
    fn missing_workspace_is_config_not_found() {
        let temp = TempDir::new().unwrap();
        let err = resolve_workspace_root(None, temp.path()).unwrap_err();
        assert!(matches!(err, KamajiError::ConfigNotFound(_)));
    }

    #[test]
    fn workspace_flag_is_relative_to_caller() {
        let root = resolve_workspace_root(Some(Path::new("ws")), Path::new("/home/me")).unwrap();
        assert_eq!(root, PathBuf::from("/home/me/ws"));
    }

    #[test]
    fn tmp_root_precedence() {
        let mut config = Config::default();
        config.paths.tmp_dir = Some(PathBuf::from("/from/config"));

        let caller = Path::new("/home/me");
        let flag = resolve_tmp_root(Some(Path::new("/from/flag")), &config, caller).unwrap();
        assert_eq!(flag, PathBuf::from("/from/flag"));
        assert_eq!(
            resolve_tmp_root(None, &config, caller).unwrap(),
            PathBuf::from("/from/config")
        );
    }

    #[test]
    fn relative_tmp_root_is_taken_from_caller() {
        let mut config = Config::default();
        let caller = Path::new("/home/me/app");

        let flag = resolve_tmp_root(Some(Path::new("target/rt")), &config, caller).unwrap();
        assert_eq!(flag, PathBuf::from("/home/me/app/target/rt"));

        config.paths.tmp_dir = Some(PathBuf::from("../rt"));
        let from_config = resolve_tmp_root(None, &config, caller).unwrap();
        assert!(from_config.is_absolute());
        assert_eq!(from_config, PathBuf::from("/home/me/app/../rt"));
    }
}
