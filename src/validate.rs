//! Target config type checking against a rule's `variables.yaml`
//!
//! A rule directory may declare the variables its script expects:
//!
//! ```yaml
//! variables:
//!   workspace: string
//!   parallelism:
//!     type: int
//! ```
//!
//! Rules without the file are not checked.

use crate::config::{BuildTarget, ConfigValue, Scalar, Workspace};
use crate::error::{KamajiError, KamajiResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Declarations file looked up next to the rule script
pub const VARIABLES_FILE: &str = "variables.yaml";

#[derive(Debug, Deserialize)]
struct VariablesFile {
    variables: BTreeMap<String, VariableSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VariableSpec {
    Short(String),
    Detailed {
        #[serde(rename = "type")]
        kind: Option<String>,
    },
    Other(serde_yaml::Value),
}

impl VariableSpec {
    fn expected_type(&self) -> Option<&str> {
        match self {
            Self::Short(kind) => Some(kind),
            Self::Detailed { kind } => kind.as_deref(),
            Self::Other(_) => None,
        }
    }
}

/// Path of the declarations file for `rule`
pub fn variables_path(workspace: &Workspace, rule: &str) -> PathBuf {
    let rule_path = workspace.rule_path(rule);
    rule_path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(VARIABLES_FILE)
}

/// Check `target`'s config against its rule's declared variable types
pub async fn validate_target(workspace: &Workspace, target: &BuildTarget) -> KamajiResult<()> {
    let path = variables_path(workspace, &target.rule);
    if !path.is_file() {
        debug!("No {} for rule {}", VARIABLES_FILE, target.rule);
        return Ok(());
    }

    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| KamajiError::io(format!("reading {}", path.display()), e))?;
    check(&content, &path, target)
}

fn check(content: &str, path: &Path, target: &BuildTarget) -> KamajiResult<()> {
    let file: VariablesFile =
        serde_yaml::from_str(content).map_err(|e| KamajiError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    for (name, spec) in &file.variables {
        let Some(expected) = spec.expected_type() else {
            warn!("Variable '{}' in {} has no usable type", name, path.display());
            continue;
        };
        let Some(value) = target.config.get(name) else {
            warn!("Variable '{}' is missing from target {}", name, target.name);
            continue;
        };

        let actual = type_name(value);
        if actual != expected {
            return Err(KamajiError::VariableTypeMismatch {
                target: target.name.clone(),
                name: name.clone(),
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
    }
    Ok(())
}

/// Type name a config value is checked as
fn type_name(value: &ConfigValue) -> &'static str {
    match value {
        ConfigValue::DependencyRef(_) => "string",
        ConfigValue::Literal(Scalar::String(_)) => "string",
        ConfigValue::Literal(Scalar::Bool(_)) => "bool",
        ConfigValue::Literal(Scalar::Number(n)) if n.is_f64() => "float",
        ConfigValue::Literal(Scalar::Number(_)) => "int",
        ConfigValue::Literal(Scalar::Null) => "null",
        ConfigValue::Structured(json) if json.is_array() => "list",
        ConfigValue::Structured(_) => "map",
    }
}
