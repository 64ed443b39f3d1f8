//! Error types for Kamaji
//!
//! All modules use `KamajiResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Kamaji operations
pub type KamajiResult<T> = Result<T, KamajiError>;

/// All errors that can occur in Kamaji
#[derive(Error, Debug)]
pub enum KamajiError {
    // Configuration errors
    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Target {name} not found in {path}")]
    TargetNotFound { name: String, path: PathBuf },

    #[error("Variable '{name}' of target {target} has type {actual}, rule expects {expected}")]
    VariableTypeMismatch {
        target: String,
        name: String,
        expected: String,
        actual: String,
    },

    // Platform errors
    #[error("Unsupported platform {platform} for {name}: no url/sha256 declared")]
    UnsupportedPlatform { name: String, platform: String },

    // Cache errors
    #[error("Download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    #[error("Integrity mismatch for {url}: expected sha256 {expected}, got {actual}")]
    IntegrityMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("Corrupt cache entry {path}: expected sha256 {expected}, got {actual}")]
    CorruptCache {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    // Archive errors
    #[error("Unsupported file type {content_type} in {path}")]
    UnsupportedFileType { path: PathBuf, content_type: String },

    #[error("Archive entry {entry} escapes destination {dest}")]
    UnsafeArchiveEntry { entry: String, dest: PathBuf },

    #[error("Unsupported archive member {entry} ({kind})")]
    UnsupportedArchiveMember { entry: String, kind: String },

    #[error("Archive error in {path}: {reason}")]
    Archive { path: PathBuf, reason: String },

    #[error("Dependency file {file} not found under {dir}")]
    DependencyFileNotFound { file: String, dir: PathBuf },

    #[error("Dependency path {0} must stay inside external/")]
    UnsafeDependencyPath(String),

    // Resolution errors
    #[error("Unresolved dependency: {0}")]
    UnresolvedDependency(String),

    #[error("{} dependencies failed to resolve: {}", .0.len(), join_errors(.0))]
    DependencyResolution(Vec<KamajiError>),

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Rule exited with {}: {command}", exit_status(.code))]
    SubprocessFailed { command: String, code: Option<i32> },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    User(String),
}

fn join_errors(errors: &[KamajiError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "signal".to_string(),
    }
}

impl KamajiError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create an archive error
    pub fn archive(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Archive {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ConfigNotFound(_) => {
                Some("Run from inside a workspace containing kamaji.workspace.yaml, or pass --workspace")
            }
            Self::CorruptCache { .. } => Some("Run: kamaji --cleanup"),
            Self::UnsupportedPlatform { .. } => {
                Some("Add url and sha256 entries for this platform to kamaji.workspace.yaml")
            }
            Self::UnresolvedDependency(_) => {
                Some("Declare the dependency under third_party in kamaji.workspace.yaml")
            }
            _ => None,
        }
    }
}
