//! # Deploy Orchestration
//!
//! Drives packaged application modules (WAR, EJB, EAR, CAR, RAR) onto
//! configured application server instances.
//!
//! This crate provides the core deployment logic: resolving the capabilities
//! a server plugin offers, making sure the server is started, provisioning the
//! resources a module needs, performing the deploy itself and computing the
//! URL a client can reach the module on. The symmetric undeploy sequence,
//! deploy-on-save listening state and a content-diffing file synchronizer
//! round it out.
//!
//! ## Example
//!
//! ```rust,no_run
//! use deploy_orchestration::{
//!     DeployRequest, DeploymentOrchestrator, LoggingProgress, ModuleHandle,
//!     OrchestratorSettings, ServerRegistry,
//! };
//! use std::sync::Arc;
//!
//! # async fn example(module: &dyn ModuleHandle) -> deploy_orchestration::Result<()> {
//! let registry = Arc::new(ServerRegistry::new());
//! let orchestrator = DeploymentOrchestrator::new(registry, OrchestratorSettings::default());
//!
//! let progress = LoggingProgress::new();
//! let outcome = orchestrator
//!     .deploy(DeployRequest::new(module).with_force_redeploy(true), &progress)
//!     .await?;
//! println!("deployed at {}", outcome.client_url);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]

mod autodeploy;
mod capabilities;
mod client_url;
mod deploy_on_save;
mod lifecycle;
mod module;
mod orchestrator;
mod progress;
mod provision;
mod registry;
mod script;
mod settings;
mod state;
mod store;
mod sync;

pub use autodeploy::AutodeployServer;
pub use capabilities::{
    IncrementalDeployment, LibraryManager, Lifecycle, ResourceDeployers, ServerCapabilities,
    ServerDescriptor,
};
pub use client_url::client_url;
pub use deploy_on_save::{DeployOnSaveCoordinator, ListeningState};
pub use lifecycle::ServerLifecycleController;
pub use module::{
    Datasource, DeploymentMode, DestinationKind, JdbcDriver, LibraryDependency, MessageDestination,
    ModuleHandle, ModuleId, ModuleType, ModuleView, ProvisioningRequest, ServerInstanceRef,
    TargetModuleId,
};
pub use orchestrator::{
    BeforeDeployHook, DeployOutcome, DeployRequest, DeploymentOrchestrator, DeploymentTarget,
};
pub use progress::{LoggingProgress, ProgressSink};
pub use provision::{ResourceProvisioner, is_placeholder};
pub use registry::{CapabilityResolver, ServerInstance, ServerRegistry};
pub use script::{
    DEFAULT_DEPLOY_SCRIPT, DeploymentScriptProvider, TemplateScriptProvider,
    regenerate_deploy_script,
};
pub use settings::OrchestratorSettings;
pub use state::{DeployPhase, DeploymentRecord, Operation, RunStatus, StateManager};
pub use store::JsonTargetStore;
pub use sync::{ContentSynchronizer, WriteResult};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Boxed error carried as the cause of a wrapped failure
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error types for deployment operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The module's configured server does not resolve to a live instance
    #[error("No target server for module {module}: {}", .server.as_deref().unwrap_or("<none configured>"))]
    NoTargetServer {
        /// Module being deployed
        module: String,
        /// Configured server id, if any
        server: Option<String>,
    },

    /// The module handle cannot yield an underlying module view
    #[error("Module not available: {0}")]
    NoModule(String),

    /// The server could not be brought to a running state
    #[error("Server {server} is unavailable: {reason}")]
    ServerUnavailable {
        /// Server instance id
        server: String,
        /// Why the server could not be started
        reason: String,
    },

    /// A capability required by the workflow is not offered by the server
    #[error("Server {server} does not support {capability}")]
    MissingCapability {
        /// Server instance id
        server: String,
        /// Name of the missing capability
        capability: &'static str,
    },

    /// Raised by a library manager when dependencies cannot be satisfied
    #[error("Missing server libraries: {}", format_libraries(.missing))]
    MissingLibraries {
        /// Dependencies the server could not provide
        missing: Vec<LibraryDependency>,
    },

    /// Library provisioning failed with at least one resolved dependency
    #[error("Required server libraries are missing: {}", format_libraries(.missing))]
    MissingLibrariesFatal {
        /// Dependencies the server could not provide
        missing: Vec<LibraryDependency>,
    },

    /// The deploy completed without error but produced no target modules
    #[error("Module {0} was not deployed")]
    ModuleNotDeployed(String),

    /// Deploy failed with a message
    #[error("Deployment failed: {message}")]
    DeployFailed {
        /// Human-readable message of the underlying failure
        message: String,
        /// Original cause
        #[source]
        source: Option<BoxError>,
    },

    /// Deploy failed without a message
    #[error("Deployment failed")]
    DeployFailedNoMessage {
        /// Original cause
        #[source]
        source: Option<BoxError>,
    },

    /// Undeploy failed with a message
    #[error("Undeployment failed: {message}")]
    UndeployFailed {
        /// Human-readable message of the underlying failure
        message: String,
        /// Original cause
        #[source]
        source: Option<BoxError>,
    },

    /// Undeploy failed without a message
    #[error("Undeployment failed")]
    UndeployFailedNoMessage {
        /// Original cause
        #[source]
        source: Option<BoxError>,
    },

    /// File creation, lock, read or write failure
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The server instance was removed after it was resolved
    #[error("Server instance {0} was removed")]
    InstanceRemoved(String),

    /// The caller cancelled the operation between phases
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid deploy phase transition
    #[error("Invalid phase transition: {from:?} -> {to:?}")]
    InvalidPhaseTransition {
        /// Current phase
        from: DeployPhase,
        /// Attempted phase
        to: DeployPhase,
    },

    /// Configuration or serialization error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unclassified failure raised by a server plugin capability
    #[error("{}", .message.as_deref().unwrap_or("server plugin failure"))]
    Plugin {
        /// Human-readable message, if the plugin supplied one
        message: Option<String>,
        /// Underlying cause
        #[source]
        source: Option<BoxError>,
    },
}

/// Stable failure kind, independent of message text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`Error::NoTargetServer`]
    NoTargetServer,
    /// See [`Error::NoModule`]
    NoModule,
    /// See [`Error::ServerUnavailable`]
    ServerUnavailable,
    /// See [`Error::MissingCapability`]
    MissingCapability,
    /// See [`Error::MissingLibraries`]
    MissingLibraries,
    /// See [`Error::MissingLibrariesFatal`]
    MissingLibrariesFatal,
    /// See [`Error::ModuleNotDeployed`]
    ModuleNotDeployed,
    /// See [`Error::DeployFailed`]
    DeployFailed,
    /// See [`Error::DeployFailedNoMessage`]
    DeployFailedNoMessage,
    /// See [`Error::UndeployFailed`]
    UndeployFailed,
    /// See [`Error::UndeployFailedNoMessage`]
    UndeployFailedNoMessage,
    /// See [`Error::Io`]
    IoFailure,
    /// See [`Error::InstanceRemoved`]
    InstanceRemoved,
    /// See [`Error::Cancelled`]
    Cancelled,
    /// See [`Error::InvalidPhaseTransition`]
    InvalidPhaseTransition,
    /// See [`Error::Config`]
    Config,
    /// See [`Error::Plugin`]
    Plugin,
}

impl Error {
    /// Unclassified plugin failure with a message
    pub fn plugin(message: impl Into<String>) -> Self {
        Error::Plugin {
            message: Some(message.into()),
            source: None,
        }
    }

    /// Unclassified plugin failure wrapping a cause
    pub fn plugin_with_source(message: Option<String>, source: impl Into<BoxError>) -> Self {
        Error::Plugin {
            message,
            source: Some(source.into()),
        }
    }

    /// Build an IO failure for `path`
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable kind of this failure
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NoTargetServer { .. } => ErrorKind::NoTargetServer,
            Error::NoModule(_) => ErrorKind::NoModule,
            Error::ServerUnavailable { .. } => ErrorKind::ServerUnavailable,
            Error::MissingCapability { .. } => ErrorKind::MissingCapability,
            Error::MissingLibraries { .. } => ErrorKind::MissingLibraries,
            Error::MissingLibrariesFatal { .. } => ErrorKind::MissingLibrariesFatal,
            Error::ModuleNotDeployed(_) => ErrorKind::ModuleNotDeployed,
            Error::DeployFailed { .. } => ErrorKind::DeployFailed,
            Error::DeployFailedNoMessage { .. } => ErrorKind::DeployFailedNoMessage,
            Error::UndeployFailed { .. } => ErrorKind::UndeployFailed,
            Error::UndeployFailedNoMessage { .. } => ErrorKind::UndeployFailedNoMessage,
            Error::Io { .. } => ErrorKind::IoFailure,
            Error::InstanceRemoved(_) => ErrorKind::InstanceRemoved,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::InvalidPhaseTransition { .. } => ErrorKind::InvalidPhaseTransition,
            Error::Config(_) => ErrorKind::Config,
            Error::Plugin { .. } => ErrorKind::Plugin,
        }
    }

    /// Wrap an unclassified failure raised while deploying.
    ///
    /// IO failures raised inside a plugin are not the synchronizer's and are
    /// wrapped as well.
    pub(crate) fn into_deploy_failure(self) -> Self {
        match self.io_as_plugin() {
            Error::Plugin {
                message: Some(message),
                source,
            } => Error::DeployFailed { message, source },
            Error::Plugin {
                message: None,
                source,
            } => Error::DeployFailedNoMessage { source },
            classified => classified,
        }
    }

    /// Wrap an unclassified failure raised while undeploying
    pub(crate) fn into_undeploy_failure(self) -> Self {
        match self.io_as_plugin() {
            Error::Plugin {
                message: Some(message),
                source,
            } => Error::UndeployFailed { message, source },
            Error::Plugin {
                message: None,
                source,
            } => Error::UndeployFailedNoMessage { source },
            classified => classified,
        }
    }
}

impl Error {
    fn io_as_plugin(self) -> Self {
        match self {
            Error::Io { path, source } => Error::Plugin {
                message: Some(format!("IO error on {}: {}", path.display(), source)),
                source: Some(Box::new(source)),
            },
            other => other,
        }
    }
}

fn format_libraries(missing: &[LibraryDependency]) -> String {
    missing
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
