//! Kamaji - build target executor
//!
//! Resolves a target's third-party binaries through a content-addressed
//! cache, assembles a disposable symlink execution root, and runs the
//! target's rule script with a synthesized command line.

pub mod archive;
pub mod cache;
pub mod cli;
pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod execroot;
pub mod platform;
pub mod resolve;
pub mod runner;
pub mod validate;

pub use error::{KamajiError, KamajiResult};
