//! Target definitions
//!
//! A target file (`BUILD.yaml` by default) lists targets, each naming a rule
//! script and an arbitrary config mapping. Config values are classified when
//! the file is parsed: a string starting with `@@` becomes a
//! [`ConfigValue::DependencyRef`], nested structures are carried as JSON.

use crate::error::{KamajiError, KamajiResult};
use serde::Deserialize;
use serde_yaml::Value as YamlValue;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Prefix marking a config string as a third-party dependency reference
pub const DEPENDENCY_SENTINEL: &str = "@@";

/// Default target definitions file name
pub const DEFAULT_BUILD_FILE: &str = "BUILD.yaml";

#[derive(Debug, Deserialize)]
struct RawBuildFile {
    #[serde(default)]
    targets: Vec<RawTarget>,
}

#[derive(Debug, Deserialize)]
struct RawTarget {
    name: String,
    rule: String,
    #[serde(default)]
    config: serde_yaml::Mapping,
}

/// A scalar config value
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Bool(bool),
    Number(serde_yaml::Number),
    Null,
}

/// A classified config value
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    /// Plain scalar passed through as-is
    Literal(Scalar),

    /// Mapping or sequence, keys normalized to strings
    Structured(serde_json::Value),

    /// `@@name` reference to a third-party dependency
    DependencyRef(String),
}

impl ConfigValue {
    /// Classify a YAML value
    pub fn from_yaml(value: &YamlValue) -> Self {
        match value {
            YamlValue::String(s) => match s.strip_prefix(DEPENDENCY_SENTINEL) {
                Some(name) => Self::DependencyRef(name.to_string()),
                None => Self::Literal(Scalar::String(s.clone())),
            },
            YamlValue::Bool(b) => Self::Literal(Scalar::Bool(*b)),
            YamlValue::Number(n) => Self::Literal(Scalar::Number(n.clone())),
            YamlValue::Null => Self::Literal(Scalar::Null),
            YamlValue::Mapping(_) | YamlValue::Sequence(_) => Self::Structured(yaml_to_json(value)),
            YamlValue::Tagged(tagged) => Self::from_yaml(&tagged.value),
        }
    }

    /// Name of the referenced dependency, if this is a reference
    pub fn dependency(&self) -> Option<&str> {
        match self {
            Self::DependencyRef(name) => Some(name),
            _ => None,
        }
    }
}

/// Convert YAML to JSON, normalizing every mapping key to a string
pub fn yaml_to_json(value: &YamlValue) -> serde_json::Value {
    match value {
        YamlValue::Null => serde_json::Value::Null,
        YamlValue::Bool(b) => serde_json::Value::Bool(*b),
        YamlValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                serde_json::Value::from(i)
            } else if let Some(u) = n.as_u64() {
                serde_json::Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            }
        }
        YamlValue::String(s) => serde_json::Value::String(s.clone()),
        YamlValue::Sequence(items) => {
            serde_json::Value::Array(items.iter().map(yaml_to_json).collect())
        }
        YamlValue::Mapping(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (key_to_string(k), yaml_to_json(v)))
                .collect(),
        ),
        YamlValue::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

fn key_to_string(key: &YamlValue) -> String {
    match key {
        YamlValue::String(s) => s.clone(),
        YamlValue::Bool(b) => b.to_string(),
        YamlValue::Number(n) => n.to_string(),
        YamlValue::Null => "null".to_string(),
        YamlValue::Tagged(tagged) => key_to_string(&tagged.value),
        other => yaml_to_json(other).to_string(),
    }
}

/// A target ready to run
#[derive(Debug, Clone)]
pub struct BuildTarget {
    /// Target name
    pub name: String,

    /// Rule script path (rules-directory relative, or `//` workspace relative)
    pub rule: String,

    /// Classified config, sorted by key
    pub config: BTreeMap<String, ConfigValue>,
}

impl BuildTarget {
    /// Names of every dependency referenced from config, deduplicated
    pub fn dependency_refs(&self) -> BTreeSet<&str> {
        self.config
            .values()
            .filter_map(ConfigValue::dependency)
            .collect()
    }

    fn from_raw(raw: RawTarget) -> Self {
        let config = raw
            .config
            .iter()
            .map(|(k, v)| (key_to_string(k), ConfigValue::from_yaml(v)))
            .collect();
        Self {
            name: raw.name,
            rule: raw.rule,
            config,
        }
    }
}

/// Parsed target definitions file
#[derive(Debug, Clone)]
pub struct BuildFile {
    pub targets: Vec<BuildTarget>,
}

impl BuildFile {
    /// Parse target definitions from a YAML string
    pub fn parse(content: &str, path: &Path) -> KamajiResult<Self> {
        let raw: RawBuildFile =
            serde_yaml::from_str(content).map_err(|e| KamajiError::ConfigInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            targets: raw.targets.into_iter().map(BuildTarget::from_raw).collect(),
        })
    }

    /// Read and parse a target definitions file
    pub async fn load(path: &Path) -> KamajiResult<Self> {
        if !path.is_file() {
            return Err(KamajiError::ConfigNotFound(path.to_path_buf()));
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| KamajiError::io(format!("reading {}", path.display()), e))?;
        Self::parse(&content, path)
    }

    /// Load `path` and return the target called `name`
    pub async fn find_target(path: &Path, name: &str) -> KamajiResult<BuildTarget> {
        Self::load(path)
            .await?
            .targets
            .into_iter()
            .find(|t| t.name == name)
            .ok_or_else(|| KamajiError::TargetNotFound {
                name: name.to_string(),
                path: path.to_path_buf(),
            })
    }
}
