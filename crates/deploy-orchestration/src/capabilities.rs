//! Capability traits implemented by server plugins.
//!
//! A server plugin exposes what it can do as a set of independent
//! capabilities. Any of them may be absent; the orchestrator treats absence
//! as "not supported by this server" and only fails when the workflow
//! actually requires the capability.

use crate::{
    DeploymentTarget, Result,
    module::{
        Datasource, DeploymentMode, JdbcDriver, LibraryDependency, MessageDestination, ModuleView,
        TargetModuleId,
    },
    progress::ProgressSink,
    script::DeploymentScriptProvider,
};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Starting and stopping the server process and its deployment targets
#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// Start the bare server process
    async fn start(&self, mode: DeploymentMode, progress: &dyn ProgressSink) -> Result<()>;

    /// Start the server's deployment targets.
    ///
    /// This is a superset of [`Lifecycle::start`]; servers without a separate
    /// notion of targets keep the default.
    async fn start_targets(&self, mode: DeploymentMode, progress: &dyn ProgressSink) -> Result<()> {
        self.start(mode, progress).await
    }

    /// Stop the server
    async fn stop(&self, progress: &dyn ProgressSink) -> Result<()>;

    /// Whether the server is currently running
    async fn is_running(&self) -> bool;

    /// Whether the server can be started in `mode`
    fn supports_mode(&self, mode: DeploymentMode) -> bool {
        let _ = mode;
        true
    }
}

/// Deploying, updating and undeploying modules without a server restart
#[async_trait]
pub trait IncrementalDeployment: Send + Sync {
    /// Deploy or redeploy the target's module, returning the deployed ids
    async fn deploy(
        &self,
        target: &DeploymentTarget,
        progress: &dyn ProgressSink,
        force_redeploy: bool,
    ) -> Result<Vec<TargetModuleId>>;

    /// Called after every deploy attempt, even one that produced nothing
    fn notify_incremental_deployment(&self, targets: &[TargetModuleId]) {
        let _ = targets;
    }

    /// Whether deploy-on-save can update the given target modules
    fn supports_deploy_on_save(&self, targets: &[TargetModuleId]) -> bool {
        let _ = targets;
        false
    }

    /// Undeploy the target's module
    async fn undeploy(
        &self,
        target: &DeploymentTarget,
        progress: &dyn ProgressSink,
        start_server_if_needed: bool,
    ) -> Result<()>;

    /// Whether the module can be deployed from an exploded directory
    fn can_file_deploy(&self, module: &ModuleView) -> bool {
        let _ = module;
        false
    }
}

/// Provisioning of shared server libraries
#[async_trait]
pub trait LibraryManager: Send + Sync {
    /// Make the requested libraries available on the server.
    ///
    /// Fails with [`crate::Error::MissingLibraries`] when some of them cannot
    /// be provided.
    async fn deploy_libraries(&self, requested: &[LibraryDependency]) -> Result<()>;
}

/// Provisioning of JDBC drivers, datasources and message destinations
#[async_trait]
pub trait ResourceDeployers: Send + Sync {
    /// Copy JDBC drivers to the server
    async fn deploy_jdbc_drivers(
        &self,
        drivers: &[JdbcDriver],
        progress: &dyn ProgressSink,
    ) -> Result<()>;

    /// Create datasources
    async fn deploy_datasources(&self, datasources: &[Datasource]) -> Result<()>;

    /// Create message destinations
    async fn deploy_message_destinations(&self, destinations: &[MessageDestination])
    -> Result<()>;
}

/// Host, port and locality of a server instance
pub trait ServerDescriptor: Send + Sync {
    /// Whether the server runs on this machine
    fn is_local(&self) -> bool;

    /// Host name clients use
    fn hostname(&self) -> String;

    /// HTTP port clients use
    fn http_port(&self) -> u16;
}

/// Bundle of the optional capabilities a server instance offers
#[derive(Clone, Default)]
pub struct ServerCapabilities {
    /// Start/stop control
    pub lifecycle: Option<Arc<dyn Lifecycle>>,
    /// Deploy/undeploy
    pub incremental: Option<Arc<dyn IncrementalDeployment>>,
    /// Server library provisioning
    pub libraries: Option<Arc<dyn LibraryManager>>,
    /// Driver, datasource and message destination provisioning
    pub resources: Option<Arc<dyn ResourceDeployers>>,
    /// Host/port/locality
    pub descriptor: Option<Arc<dyn ServerDescriptor>>,
    /// Server specific deploy script generation
    pub deployment_script: Option<Arc<dyn DeploymentScriptProvider>>,
}

impl ServerCapabilities {
    /// A bundle with every capability absent
    pub fn none() -> Self {
        Self::default()
    }

    /// True when no capability is present
    pub fn is_empty(&self) -> bool {
        self.lifecycle.is_none()
            && self.incremental.is_none()
            && self.libraries.is_none()
            && self.resources.is_none()
            && self.descriptor.is_none()
            && self.deployment_script.is_none()
    }

    /// Set the lifecycle capability
    pub fn with_lifecycle(mut self, lifecycle: Arc<dyn Lifecycle>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    /// Set the incremental deployment capability
    pub fn with_incremental(mut self, incremental: Arc<dyn IncrementalDeployment>) -> Self {
        self.incremental = Some(incremental);
        self
    }

    /// Set the library manager capability
    pub fn with_libraries(mut self, libraries: Arc<dyn LibraryManager>) -> Self {
        self.libraries = Some(libraries);
        self
    }

    /// Set the resource deployers capability
    pub fn with_resources(mut self, resources: Arc<dyn ResourceDeployers>) -> Self {
        self.resources = Some(resources);
        self
    }

    /// Set the descriptor capability
    pub fn with_descriptor(mut self, descriptor: Arc<dyn ServerDescriptor>) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    /// Set the deploy script provider
    pub fn with_deployment_script(mut self, provider: Arc<dyn DeploymentScriptProvider>) -> Self {
        self.deployment_script = Some(provider);
        self
    }
}

impl fmt::Debug for ServerCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerCapabilities")
            .field("lifecycle", &self.lifecycle.is_some())
            .field("incremental", &self.incremental.is_some())
            .field("libraries", &self.libraries.is_some())
            .field("resources", &self.resources.is_some())
            .field("descriptor", &self.descriptor.is_some())
            .field("deployment_script", &self.deployment_script.is_some())
            .finish()
    }
}
