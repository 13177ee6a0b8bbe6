//! Environment variable resolver
//!
//! Paths and host names may reference the environment as `${VAR}` or
//! `${VAR:-default}`. Library dependency fields are never resolved: build
//! placeholders there must reach provisioning untouched.

use crate::{Config, ConfigError, Result};
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;
use tracing::warn;

static ENV_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env reference pattern is valid"));

/// Context for resolving variables
#[derive(Debug, Clone)]
pub struct ResolutionContext {
    /// Environment variables (can be overridden)
    pub env_vars: HashMap<String, String>,
}

impl ResolutionContext {
    /// Create a context seeded from the process environment
    pub fn new() -> Self {
        Self {
            env_vars: std::env::vars().collect(),
        }
    }

    /// Create a context that sees only explicitly set variables
    pub fn empty() -> Self {
        Self {
            env_vars: HashMap::new(),
        }
    }

    /// Add or update an environment variable
    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env_vars.insert(key.into(), value.into());
    }
}

impl Default for ResolutionContext {
    fn default() -> Self {
        Self::new()
    }
}

fn split_default(expr: &str) -> (&str, Option<&str>) {
    match expr.split_once(":-") {
        Some((name, default)) => (name, Some(default)),
        None => (expr, None),
    }
}

/// Resolve all environment references in a string
pub fn resolve_string(input: &str, context: &ResolutionContext) -> Result<String> {
    let mut result = input.to_string();
    let mut errors = Vec::new();

    for cap in ENV_REF.captures_iter(input) {
        let full_match = &cap[0];
        let (name, default) = split_default(&cap[1]);

        match context.env_vars.get(name).map(String::as_str).or(default) {
            Some(value) => result = result.replace(full_match, value),
            None => errors.push(name.to_string()),
        }
    }

    if !errors.is_empty() {
        return Err(ConfigError::EnvVarNotFound(errors.join(", ")));
    }
    Ok(result)
}

/// Resolve an optional string
pub fn resolve_opt(input: Option<&str>, context: &ResolutionContext) -> Result<Option<String>> {
    input.map(|value| resolve_string(value, context)).transpose()
}

/// Every resolvable field of the configuration
fn resolvable_fields(config: &Config) -> Vec<&str> {
    let mut fields = Vec::new();
    fields.extend(config.settings.state_dir.as_deref());

    for server in config.servers.values() {
        let crate::ServerKind::Autodeploy { deploy_dir } = &server.kind;
        fields.push(deploy_dir.as_str());
        fields.push(server.host.as_str());
        fields.extend(server.script_template.as_deref());
    }

    for module in config.modules.values() {
        fields.extend(module.archive.as_deref());
        fields.extend(module.resource_dir.as_deref());
        fields.extend(
            module
                .jdbc_drivers
                .iter()
                .filter_map(|driver| driver.jar.as_deref())
                .filter_map(|jar| jar.to_str()),
        );
    }
    fields
}

/// Names of the environment variables the configuration references
pub fn find_env_references(config: &Config) -> BTreeSet<String> {
    resolvable_fields(config)
        .into_iter()
        .flat_map(|field| ENV_REF.captures_iter(field))
        .map(|cap| split_default(&cap[1]).0.to_string())
        .collect()
}

/// Warn about referenced variables that are unset and have no default.
///
/// Variables may still be set by the time the configuration is used, so this
/// never fails.
pub fn validate_references(config: &Config, context: &ResolutionContext) {
    let missing: Vec<String> = resolvable_fields(config)
        .into_iter()
        .flat_map(|field| ENV_REF.captures_iter(field))
        .filter_map(|cap| {
            let (name, default) = split_default(&cap[1]);
            (default.is_none() && !context.env_vars.contains_key(name)).then(|| name.to_string())
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    if !missing.is_empty() {
        warn!(
            "The following environment variables are not set: {}",
            missing.join(", ")
        );
    }
}
