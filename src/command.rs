//! Command line synthesis
//!
//! A target becomes a single shell command:
//!
//! ```text
//! <interpreter> <rules_dir>/<rule> --key=value ... [passthrough args]
//! ```
//!
//! Config keys are emitted in sorted order. Structured values are JSON inside
//! single quotes; dependency references become the absolute path of the
//! materialized file.

use crate::config::{BuildTarget, ConfigValue, Scalar};
use crate::context::RuntimeContext;
use crate::error::{KamajiError, KamajiResult};
use crate::resolve::ResolvedDependencyIndex;

/// Build the command line for `target`
pub fn synthesize(
    ctx: &RuntimeContext,
    target: &BuildTarget,
    index: &ResolvedDependencyIndex,
    passthrough: &[String],
) -> KamajiResult<String> {
    let rule = ctx.workspace.rule_path(&target.rule);
    let mut cmdline = format!("{} {}", ctx.workspace.manifest.interpreter, rule.display());

    for (key, value) in &target.config {
        let rendered = render_value(value, index)?;
        cmdline.push_str(&format!(" --{}={}", key, rendered));
    }

    if !passthrough.is_empty() {
        cmdline.push(' ');
        cmdline.push_str(&passthrough.join(" "));
    }

    Ok(cmdline)
}

/// Render one config value as it appears after `--key=`
pub fn render_value(value: &ConfigValue, index: &ResolvedDependencyIndex) -> KamajiResult<String> {
    match value {
        ConfigValue::Literal(scalar) => Ok(render_scalar(scalar)),
        ConfigValue::Structured(json) => Ok(single_quote(&serde_json::to_string(json)?)),
        ConfigValue::DependencyRef(name) => index
            .path(name)
            .map(|p| p.display().to_string())
            .ok_or_else(|| KamajiError::UnresolvedDependency(name.clone())),
    }
}

fn render_scalar(scalar: &Scalar) -> String {
    match scalar {
        Scalar::String(s) => s.clone(),
        Scalar::Bool(b) => b.to_string(),
        Scalar::Number(n) => n.to_string(),
        Scalar::Null => String::new(),
    }
}

/// Wrap in single quotes; embedded quotes are closed, escaped and reopened
fn single_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
