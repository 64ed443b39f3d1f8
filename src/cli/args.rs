//! CLI argument definitions using clap derive

use crate::config::DEFAULT_BUILD_FILE;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Kamaji - build target executor
///
/// Resolves a target's third-party binaries into a disposable execution
/// root and runs its rule script.
#[derive(Parser, Debug)]
#[command(name = "kamaji")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Target to run, as named in the target definitions file
    #[arg(required_unless_present = "cleanup")]
    pub target: Option<String>,

    /// Extra arguments passed to the rule script (after `--`)
    #[arg(last = true)]
    pub args: Vec<String>,

    /// Target definitions file
    #[arg(short, long, default_value = DEFAULT_BUILD_FILE)]
    pub build: PathBuf,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Debug output (same as -vv)
    #[arg(short, long)]
    pub debug: bool,

    /// Remove the cache and all execution roots, then exit
    #[arg(long)]
    pub cleanup: bool,

    /// Run inside a mirror of the current directory
    #[arg(short, long)]
    pub isolated: bool,

    /// Workspace root (skips upward search for kamaji.workspace.yaml)
    #[arg(short, long, env = "KAMAJI_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Runtime temp root
    #[arg(long, env = "KAMAJI_TMP_DIR")]
    pub tmp_dir: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, env = "KAMAJI_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Effective verbosity: 0 = warn, 1 = info, 2+ = debug
    pub fn verbosity(&self) -> u8 {
        if self.debug {
            self.verbose.max(2)
        } else {
            self.verbose
        }
    }
}
