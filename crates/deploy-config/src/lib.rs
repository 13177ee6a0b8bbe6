//! # Deploy Configuration
//!
//! YAML configuration parser for deploy-orchestration.
//!
//! This crate parses `deploy.yaml` files describing server instances and
//! modules, and converts them into the orchestrator's types.

#![warn(missing_docs)]

use deploy_orchestration::{
    Datasource, JdbcDriver, LibraryDependency, MessageDestination, ModuleType,
    OrchestratorSettings,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub mod parser;
pub mod resolver;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// Environment variable not found
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    /// Server reference not found
    #[error("Server '{0}' not found")]
    ServerNotFound(String),

    /// Module reference not found
    #[error("Module '{0}' not found")]
    ModuleNotFound(String),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Optional project name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Global settings
    #[serde(default)]
    pub settings: Settings,

    /// Server instances by id
    #[serde(default)]
    pub servers: BTreeMap<String, ServerEntry>,

    /// Modules by name
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleEntry>,
}

/// Global settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    /// Orchestrator switches
    #[serde(flatten)]
    pub orchestrator: OrchestratorSettings,

    /// Default log level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Directory for persisted deploy state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<String>,
}

/// Server instance definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerEntry {
    /// Server plugin kind
    #[serde(flatten)]
    pub kind: ServerKind,

    /// Name shown to users, defaults to the id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Host name clients use
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP port clients use
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Whether the server runs on this machine
    #[serde(default = "default_local")]
    pub local: bool,

    /// Template for the generated deploy script
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_template: Option<String>,
}

/// Server plugin variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ServerKind {
    /// Server picking up archives from a directory
    #[serde(rename = "autodeploy")]
    Autodeploy {
        /// Watched directory
        deploy_dir: String,
    },
}

/// Module definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleEntry {
    /// Module kind
    #[serde(rename = "type")]
    pub module_type: ModuleType,

    /// Built archive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<String>,

    /// Directory holding server resource descriptors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_dir: Option<String>,

    /// Web context root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_root: Option<String>,

    /// Server instance id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// JDBC drivers to copy to the server
    #[serde(default)]
    pub jdbc_drivers: Vec<JdbcDriver>,

    /// Server libraries, kept verbatim so build placeholders survive
    #[serde(default)]
    pub libraries: Vec<LibraryDependency>,

    /// Datasources
    #[serde(default)]
    pub datasources: Vec<Datasource>,

    /// Message destinations
    #[serde(default)]
    pub message_destinations: Vec<MessageDestination>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_local() -> bool {
    true
}
