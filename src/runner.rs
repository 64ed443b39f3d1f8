//! Target runner
//!
//! Drives one invocation through its states:
//!
//! ```text
//! Init -> RootBuilt -> DependenciesResolved -> CommandSynthesized -> Executing -> Cleaned
//! ```
//!
//! Any failure aborts the pipeline. Once the execution root exists it is
//! removed on every path, and an error from the pipeline takes precedence
//! over an error from teardown.

use crate::cache::CacheStore;
use crate::command;
use crate::config::BuildTarget;
use crate::context::RuntimeContext;
use crate::error::{KamajiError, KamajiResult};
use crate::execroot::ExecRoot;
use crate::resolve::{self, ResolvedDependencyIndex};
use crate::validate;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Exported to rules: organization domain from the manifest
pub const ENV_ORG_DOMAIN: &str = "KAMAJI_ORGANIZATION_DOMAIN";
/// Exported to rules: base directory from the manifest
pub const ENV_BASE_DIR: &str = "KAMAJI_BASE_DIR";
/// Exported to rules: the execution root
pub const ENV_EXECROOT: &str = "KAMAJI_EXECROOT";
/// Search path for the shared rule-support modules
pub const ENV_PYTHONPATH: &str = "PYTHONPATH";

/// Pipeline state of a [`Runner`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    RootBuilt,
    DependenciesResolved,
    CommandSynthesized,
    Executing,
    Cleaned,
}

/// Runs a single target
pub struct Runner {
    ctx: Arc<RuntimeContext>,
    store: Arc<CacheStore>,
    state: RunState,
}

impl Runner {
    pub fn new(ctx: Arc<RuntimeContext>, store: Arc<CacheStore>) -> Self {
        Self {
            ctx,
            store,
            state: RunState::Init,
        }
    }

    /// Current pipeline state
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run `target`, appending `passthrough` to the rule's arguments
    pub async fn run(&mut self, target: &BuildTarget, passthrough: &[String]) -> KamajiResult<()> {
        self.state = RunState::Init;
        self.ctx.ensure_dirs()?;
        validate::validate_target(&self.ctx.workspace, target).await?;

        // Downloads happen before a root exists so a fetch failure leaves nothing behind
        let ctx = Arc::clone(&self.ctx);
        let store = Arc::clone(&self.store);
        let owned = target.clone();
        let index = blocking(move || resolve::ensure_dependencies(&ctx, &store, &owned)).await?;

        let root = ExecRoot::create(&self.ctx, &target.name)?;
        self.transition(RunState::RootBuilt);

        let result = self.run_in(&root, target, index, passthrough).await;
        let cleanup = root.teardown();
        self.transition(RunState::Cleaned);

        match (result, cleanup) {
            (Err(e), Err(cleanup_err)) => {
                warn!("Execution root cleanup failed: {}", cleanup_err);
                Err(e)
            }
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Ok(()), Ok(())) => Ok(()),
        }
    }

    async fn run_in(
        &mut self,
        root: &ExecRoot,
        target: &BuildTarget,
        mut index: ResolvedDependencyIndex,
        passthrough: &[String],
    ) -> KamajiResult<()> {
        let ctx = Arc::clone(&self.ctx);
        let workspace = &ctx.workspace;

        let index = blocking(move || {
            resolve::materialize_dependencies(&mut index)?;
            Ok(index)
        })
        .await?;
        resolve::link_dependencies(&index, root)?;

        let rule_path = workspace.rule_path(&target.rule);
        if let Some(rule_dir) = rule_path.parent() {
            root.link_rules(rule_dir, &workspace.rule_subdir(&target.rule))?;
        }
        root.link_common(&workspace.common_dir)?;
        if ctx.isolated {
            root.mirror_origin(&ctx.caller_dir)?;
        }
        self.transition(RunState::DependenciesResolved);

        let cmdline = command::synthesize(&ctx, target, &index, passthrough)?;
        self.transition(RunState::CommandSynthesized);

        info!("Running: {}", cmdline);
        self.transition(RunState::Executing);
        let status = self
            .command(root, &cmdline)
            .status()
            .await
            .map_err(|e| KamajiError::command_failed(cmdline.clone(), e))?;

        if status.success() {
            Ok(())
        } else {
            Err(KamajiError::SubprocessFailed {
                command: cmdline,
                code: status.code(),
            })
        }
    }

    /// Build the subprocess for `cmdline` inside `root`
    fn command(&self, root: &ExecRoot, cmdline: &str) -> Command {
        let cwd = if self.ctx.isolated {
            root.origin_dir()
        } else {
            self.ctx.caller_dir.clone()
        };

        let mut cmd = Command::new(&self.ctx.shell);
        cmd.arg("-c")
            .arg(cmdline)
            .current_dir(&cwd)
            .envs(self.environment(root))
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        cmd
    }

    /// Variables added to the inherited environment
    pub fn environment(&self, root: &ExecRoot) -> Vec<(String, String)> {
        let workspace = &self.ctx.workspace;
        let mut env = Vec::new();

        if let Some(domain) = workspace.org_domain() {
            env.push((ENV_ORG_DOMAIN.to_string(), domain.to_string()));
        }
        if let Some(base) = workspace.base_dir() {
            env.push((ENV_BASE_DIR.to_string(), base.to_string()));
        }

        let python_path = if self.ctx.isolated {
            root.common_dir()
        } else {
            workspace.common_dir.clone()
        };
        env.push((ENV_PYTHONPATH.to_string(), python_path.display().to_string()));
        env.push((ENV_EXECROOT.to_string(), root.path().display().to_string()));
        env
    }

    fn transition(&mut self, next: RunState) {
        debug!("{:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// Run blocking cache and archive work off the async runtime
async fn blocking<T, F>(task: F) -> KamajiResult<T>
where
    F: FnOnce() -> KamajiResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| KamajiError::User(format!("Background task failed: {}", e)))?
}
