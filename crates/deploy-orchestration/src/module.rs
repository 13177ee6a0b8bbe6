//! Deployable module model.
//!
//! This module defines what the orchestrator borrows from the calling project
//! model: the module handle, its archive view, the resources it declares and
//! the identifiers exchanged with server plugins.

use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Identity of a deployable module, used to key per-module state
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    /// Create a module id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one configured server instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerInstanceRef(String);

impl ServerInstanceRef {
    /// Create a server instance reference
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerInstanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque id a server plugin assigns to a deployed module instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetModuleId(String);

impl TargetModuleId {
    /// Create a target module id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of packaged module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleType {
    /// Web archive
    War,
    /// EJB jar
    Ejb,
    /// Enterprise archive
    Ear,
    /// Application client
    Car,
    /// Resource adapter
    Rar,
}

impl ModuleType {
    /// Conventional archive extension
    pub fn extension(&self) -> &'static str {
        match self {
            ModuleType::War => "war",
            ModuleType::Ejb => "jar",
            ModuleType::Ear => "ear",
            ModuleType::Car => "jar",
            ModuleType::Rar => "rar",
        }
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModuleType::War => "war",
            ModuleType::Ejb => "ejb",
            ModuleType::Ear => "ear",
            ModuleType::Car => "car",
            ModuleType::Rar => "rar",
        };
        f.write_str(name)
    }
}

impl FromStr for ModuleType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "war" => Ok(ModuleType::War),
            "ejb" => Ok(ModuleType::Ejb),
            "ear" => Ok(ModuleType::Ear),
            "car" => Ok(ModuleType::Car),
            "rar" => Ok(ModuleType::Rar),
            other => Err(crate::Error::Config(format!("Unknown module type: {}", other))),
        }
    }
}

/// How the module is going to be run once deployed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    /// Plain run
    #[default]
    Run,
    /// Server started for debugging
    Debug,
    /// Server started for profiling
    Profile,
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentMode::Run => "run",
            DeploymentMode::Debug => "debug",
            DeploymentMode::Profile => "profile",
        };
        f.write_str(name)
    }
}

impl FromStr for DeploymentMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "run" => Ok(DeploymentMode::Run),
            "debug" => Ok(DeploymentMode::Debug),
            "profile" => Ok(DeploymentMode::Profile),
            other => Err(crate::Error::Config(format!("Unknown deployment mode: {}", other))),
        }
    }
}

/// The underlying archive view of a module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleView {
    /// Module name, used for file names and target ids
    pub name: String,
    /// Module kind
    pub module_type: ModuleType,
    /// Built archive, which may not exist yet
    pub archive: Option<PathBuf>,
    /// Directory holding server resource descriptors
    pub resource_dir: Option<PathBuf>,
    /// Web context root, for modules that have one
    pub context_root: Option<String>,
}

impl ModuleView {
    /// Create a view without archive, resources or context root
    pub fn new(name: impl Into<String>, module_type: ModuleType) -> Self {
        Self {
            name: name.into(),
            module_type,
            archive: None,
            resource_dir: None,
            context_root: None,
        }
    }

    /// Set the archive location
    pub fn with_archive(mut self, archive: impl Into<PathBuf>) -> Self {
        self.archive = Some(archive.into());
        self
    }

    /// Set the resource directory
    pub fn with_resource_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resource_dir = Some(dir.into());
        self
    }

    /// Set the context root
    pub fn with_context_root(mut self, context_root: impl Into<String>) -> Self {
        self.context_root = Some(context_root.into());
        self
    }
}

/// A server library the module expects to find on the server
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LibraryDependency {
    /// Library name
    pub name: String,
    /// Declared specification version
    pub specification_version: String,
    /// Declared implementation version
    pub implementation_version: String,
}

impl LibraryDependency {
    /// Create a library dependency
    pub fn new(
        name: impl Into<String>,
        specification_version: impl Into<String>,
        implementation_version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            specification_version: specification_version.into(),
            implementation_version: implementation_version.into(),
        }
    }
}

impl fmt::Display for LibraryDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (spec {}, impl {})",
            self.name, self.specification_version, self.implementation_version
        )
    }
}

/// JDBC driver the module's datasources need on the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JdbcDriver {
    /// Driver class name
    pub class_name: String,
    /// Driver jar to copy to the server, if known
    #[serde(default)]
    pub jar: Option<PathBuf>,
}

/// Datasource declared by the module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datasource {
    /// JNDI name
    pub jndi_name: String,
    /// Connection URL
    pub url: String,
    /// Database user
    #[serde(default)]
    pub username: Option<String>,
    /// Driver class name
    #[serde(default)]
    pub driver_class: Option<String>,
}

/// Message destination declared by the module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDestination {
    /// Destination name
    pub name: String,
    /// Queue or topic
    pub kind: DestinationKind,
}

/// Kind of message destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationKind {
    /// Point-to-point
    Queue,
    /// Publish/subscribe
    Topic,
}

/// Resources that must exist on the server before the module is deployed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvisioningRequest {
    /// JDBC drivers
    #[serde(default)]
    pub jdbc_drivers: Vec<JdbcDriver>,
    /// Server libraries
    #[serde(default)]
    pub libraries: Vec<LibraryDependency>,
    /// Datasources
    #[serde(default)]
    pub datasources: Vec<Datasource>,
    /// Message destinations
    #[serde(default)]
    pub message_destinations: Vec<MessageDestination>,
}

impl ProvisioningRequest {
    /// True when nothing needs to be provisioned
    pub fn is_empty(&self) -> bool {
        self.jdbc_drivers.is_empty()
            && self.libraries.is_empty()
            && self.datasources.is_empty()
            && self.message_destinations.is_empty()
    }
}

/// Handle onto a deployable unit owned by the calling project model.
///
/// The orchestrator borrows a handle for the duration of a single deploy or
/// undeploy call and never retains it.
pub trait ModuleHandle: Send + Sync {
    /// Identity used for per-module state
    fn id(&self) -> ModuleId;

    /// The underlying archive view, or `None` when the project cannot
    /// produce one
    fn module_view(&self) -> Option<ModuleView>;

    /// Server instance the module is configured to deploy to
    fn server_instance(&self) -> Option<ServerInstanceRef>;

    /// Resources the module declares
    fn provisioning_request(&self) -> ProvisioningRequest {
        ProvisioningRequest::default()
    }

    /// Whether server-side resource descriptors changed since `since`
    fn is_server_resource_changed(&self, since: DateTime<Utc>) -> bool {
        let _ = since;
        true
    }

    /// Durably record the currently deployed target modules
    fn persist_deployed_targets(&self, targets: &[TargetModuleId]) -> Result<()>;
}
