//! Deploy and undeploy orchestration
//!
//! A deploy walks the phases `ResolvingTarget → StartingServer →
//! Provisioning → PreDeployHook → Deploying → Notifying → Persisting`.
//! Every phase can fail; an unclassified plugin failure is wrapped into
//! [`Error::DeployFailed`] or [`Error::DeployFailedNoMessage`]. Whatever the
//! outcome, the progress sink is finished exactly once and deploy-on-save
//! listening for the module is resumed.
//!
//! Callers that run a build pipeline concurrently with deploys must suspend
//! deploy-on-save listening for the module before calling in. Calls block
//! on real server I/O, so they must not be awaited on a UI thread. Concurrent
//! calls for the same module are not serialized here.

use crate::{
    DeployOnSaveCoordinator, DeploymentMode, Error, IncrementalDeployment, ModuleHandle, ModuleId,
    ModuleType, ModuleView, OrchestratorSettings, Result, ServerCapabilities, ServerInstanceRef,
    TargetModuleId,
    client_url::client_url,
    lifecycle::ServerLifecycleController,
    progress::ProgressSink,
    provision::ResourceProvisioner,
    registry::CapabilityResolver,
    state::{DeployPhase, Operation, StateManager},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Hook run after provisioning and right before the plugin deploy call
#[async_trait]
pub trait BeforeDeployHook: Send + Sync {
    /// A failure aborts the deploy and is returned to the caller unchanged
    async fn before_deploy(&self, target: &DeploymentTarget) -> Result<()>;
}

/// Resolved view of a module and the server it deploys to
#[derive(Debug, Clone)]
pub struct DeploymentTarget {
    module_id: ModuleId,
    module: ModuleView,
    server: ServerInstanceRef,
    capabilities: ServerCapabilities,
    last_deployed_at: Option<DateTime<Utc>>,
    server_resources_changed: bool,
}

impl DeploymentTarget {
    /// Module identity
    pub fn module_id(&self) -> &ModuleId {
        &self.module_id
    }

    /// Module archive view
    pub fn module(&self) -> &ModuleView {
        &self.module
    }

    /// Target server instance
    pub fn server(&self) -> &ServerInstanceRef {
        &self.server
    }

    /// Capabilities of the target server
    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    /// When the module was last deployed successfully by this orchestrator
    pub fn last_deployed_at(&self) -> Option<DateTime<Utc>> {
        self.last_deployed_at
    }

    /// Whether server-side resources changed since the last deploy.
    ///
    /// True when there is no previous deploy on record.
    pub fn server_resources_changed(&self) -> bool {
        self.server_resources_changed
    }

    /// Base URL of the server, falling back to `default_base_url` when the
    /// server has no descriptor
    pub fn base_url(&self, default_base_url: &str) -> String {
        match self.capabilities.descriptor.as_ref() {
            Some(descriptor) => format!("http://{}:{}", descriptor.hostname(), descriptor.http_port()),
            None => default_base_url.to_string(),
        }
    }

    /// URL clients reach the deployed module on
    pub fn client_url(
        &self,
        default_base_url: &str,
        client_module_url: Option<&str>,
        client_url_part: Option<&str>,
    ) -> Result<String> {
        let module_path = client_module_url.or(self.module.context_root.as_deref()).or(
            match self.module.module_type {
                ModuleType::War => Some(self.module.name.as_str()),
                _ => None,
            },
        );
        client_url(&self.base_url(default_base_url), module_path, client_url_part)
    }

    fn incremental(&self) -> Result<&Arc<dyn IncrementalDeployment>> {
        self.capabilities
            .incremental
            .as_ref()
            .ok_or_else(|| Error::MissingCapability {
                server: self.server.to_string(),
                capability: "incremental deployment",
            })
    }
}

/// Parameters of one deploy call
#[derive(Clone, Copy)]
pub struct DeployRequest<'a> {
    /// Module to deploy
    pub module: &'a dyn ModuleHandle,
    /// Run mode
    pub mode: DeploymentMode,
    /// URL (absolute) or path of the client module, overriding the context root
    pub client_module_url: Option<&'a str>,
    /// Extra path appended to the client URL
    pub client_url_part: Option<&'a str>,
    /// Redeploy even if the plugin considers the module up to date
    pub force_redeploy: bool,
    /// Optional hook run right before deploying
    pub before_deploy: Option<&'a dyn BeforeDeployHook>,
}

impl<'a> DeployRequest<'a> {
    /// Run-mode deploy of `module` with no extras
    pub fn new(module: &'a dyn ModuleHandle) -> Self {
        Self {
            module,
            mode: DeploymentMode::Run,
            client_module_url: None,
            client_url_part: None,
            force_redeploy: false,
            before_deploy: None,
        }
    }

    /// Set the run mode
    pub fn with_mode(mut self, mode: DeploymentMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the client module URL
    pub fn with_client_module_url(mut self, url: &'a str) -> Self {
        self.client_module_url = Some(url);
        self
    }

    /// Set the client URL part
    pub fn with_client_url_part(mut self, part: &'a str) -> Self {
        self.client_url_part = Some(part);
        self
    }

    /// Set forced redeploy
    pub fn with_force_redeploy(mut self, force: bool) -> Self {
        self.force_redeploy = force;
        self
    }

    /// Set the pre-deploy hook
    pub fn with_before_deploy(mut self, hook: &'a dyn BeforeDeployHook) -> Self {
        self.before_deploy = Some(hook);
        self
    }
}

/// Result of a successful deploy
#[derive(Debug, Clone, PartialEq)]
pub struct DeployOutcome {
    /// Id of the recorded run
    pub run_id: Uuid,
    /// Deployed target modules, never empty
    pub targets: Vec<TargetModuleId>,
    /// URL clients reach the module on
    pub client_url: String,
}

/// Finishes progress and resumes deploy-on-save on every exit path
struct CallScope<'a> {
    progress: &'a dyn ProgressSink,
    deploy_on_save: &'a DeployOnSaveCoordinator,
    module: ModuleId,
}

impl Drop for CallScope<'_> {
    fn drop(&mut self) {
        self.deploy_on_save.resume_listening(&self.module);
        self.progress.finish();
    }
}

fn check_cancelled(progress: &dyn ProgressSink) -> Result<()> {
    if progress.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(())
}

/// Drives modules through deploy and undeploy
pub struct DeploymentOrchestrator {
    resolver: Arc<dyn CapabilityResolver>,
    settings: OrchestratorSettings,
    lifecycle: ServerLifecycleController,
    provisioner: ResourceProvisioner,
    deploy_on_save: Arc<DeployOnSaveCoordinator>,
    state: Arc<StateManager>,
}

impl DeploymentOrchestrator {
    /// Create an orchestrator resolving servers through `resolver`
    pub fn new(resolver: Arc<dyn CapabilityResolver>, settings: OrchestratorSettings) -> Self {
        Self {
            resolver,
            lifecycle: ServerLifecycleController::new(settings.also_start_targets),
            provisioner: ResourceProvisioner::new(),
            deploy_on_save: Arc::new(DeployOnSaveCoordinator::new()),
            state: Arc::new(StateManager::with_history_limit(settings.history_limit)),
            settings,
        }
    }

    /// Share an existing deploy-on-save coordinator
    pub fn with_deploy_on_save(mut self, coordinator: Arc<DeployOnSaveCoordinator>) -> Self {
        self.deploy_on_save = coordinator;
        self
    }

    /// Settings in effect
    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Deploy-on-save state table
    pub fn deploy_on_save(&self) -> &Arc<DeployOnSaveCoordinator> {
        &self.deploy_on_save
    }

    /// Run state tracking
    pub fn state(&self) -> &Arc<StateManager> {
        &self.state
    }

    /// Server lifecycle controller
    pub fn lifecycle(&self) -> &ServerLifecycleController {
        &self.lifecycle
    }

    /// Deploy a module and return where clients can reach it
    pub async fn deploy(
        &self,
        request: DeployRequest<'_>,
        progress: &dyn ProgressSink,
    ) -> Result<DeployOutcome> {
        let module_id = request.module.id();
        let _scope = CallScope {
            progress,
            deploy_on_save: &self.deploy_on_save,
            module: module_id.clone(),
        };

        let run = self.state.begin(Operation::Deploy, module_id.clone());
        info!("Deploying module {} ({})", module_id, request.mode);

        let result = self.run_deploy(run, &request, progress).await;
        match &result {
            Ok(outcome) => {
                self.state.complete(run);
                info!(
                    "Deployed module {} as {:?}, available at {}",
                    module_id, outcome.targets, outcome.client_url
                );
            }
            Err(e) => {
                self.state.fail(run, e);
                warn!("Deployment of module {} failed: {}", module_id, e);
            }
        }
        result
    }

    async fn run_deploy(
        &self,
        run: Uuid,
        request: &DeployRequest<'_>,
        progress: &dyn ProgressSink,
    ) -> Result<DeployOutcome> {
        self.state.advance(run, DeployPhase::ResolvingTarget)?;
        let target = self.resolve_target(request.module)?;
        self.state.set_server(run, target.server());
        check_cancelled(progress)?;

        self.state.advance(run, DeployPhase::StartingServer)?;
        self.lifecycle
            .ensure_started(target.server(), target.capabilities(), request.mode, progress)
            .await?;
        check_cancelled(progress)?;

        // The server is reachable from here on
        self.deploy_on_save.resume_listening(target.module_id());

        self.state.advance(run, DeployPhase::Provisioning)?;
        let provisioning = request.module.provisioning_request();
        self.provisioner
            .provision(target.server(), target.capabilities(), &provisioning, progress)
            .await
            .map_err(Error::into_deploy_failure)?;
        check_cancelled(progress)?;

        self.state.advance(run, DeployPhase::PreDeployHook)?;
        if let Some(hook) = request.before_deploy {
            debug!("Running pre-deploy hook for {}", target.module_id());
            hook.before_deploy(&target).await?;
        }
        check_cancelled(progress)?;

        self.state.advance(run, DeployPhase::Deploying)?;
        let incremental = target.incremental()?;
        if target.module().archive.is_none() && !incremental.can_file_deploy(target.module()) {
            return Err(Error::NoModule(format!(
                "{} has no archive and {} cannot deploy it from a directory",
                target.module_id(),
                target.server()
            )));
        }
        self.ensure_live(target.server())?;
        progress.progress(&format!(
            "Deploying {} to {}",
            target.module().name,
            target.server()
        ));
        let targets = incremental
            .deploy(&target, progress, request.force_redeploy)
            .await
            .map_err(Error::into_deploy_failure)?;

        self.state.advance(run, DeployPhase::Notifying)?;
        incremental.notify_incremental_deployment(&targets);
        if !targets.is_empty() && incremental.supports_deploy_on_save(&targets) {
            self.deploy_on_save
                .notify_initial_deployment(target.module_id());
        }

        self.state.advance(run, DeployPhase::Persisting)?;
        if targets.is_empty() {
            return Err(Error::ModuleNotDeployed(target.module_id().to_string()));
        }
        request
            .module
            .persist_deployed_targets(&targets)
            .map_err(|e| match e {
                // Target files are written through the synchronizer
                Error::Io { .. } => e,
                other => other.into_deploy_failure(),
            })?;
        let client_url = target.client_url(
            &self.settings.default_base_url,
            request.client_module_url,
            request.client_url_part,
        )?;

        Ok(DeployOutcome {
            run_id: run,
            targets,
            client_url,
        })
    }

    /// Undeploy a module from its configured server.
    ///
    /// Servers whose descriptor reports them as remote manage their own
    /// teardown; the undeploy call is skipped for them without error.
    pub async fn undeploy(
        &self,
        module: &dyn ModuleHandle,
        start_server_if_needed: bool,
        progress: &dyn ProgressSink,
    ) -> Result<()> {
        let module_id = module.id();
        let _scope = CallScope {
            progress,
            deploy_on_save: &self.deploy_on_save,
            module: module_id.clone(),
        };

        let run = self.state.begin(Operation::Undeploy, module_id.clone());
        info!("Undeploying module {}", module_id);

        let result = self
            .run_undeploy(run, module, start_server_if_needed, progress)
            .await;
        match &result {
            Ok(()) => {
                self.state.complete(run);
                info!("Undeployed module {}", module_id);
            }
            Err(e) => {
                self.state.fail(run, e);
                warn!("Undeployment of module {} failed: {}", module_id, e);
            }
        }
        result
    }

    async fn run_undeploy(
        &self,
        run: Uuid,
        module: &dyn ModuleHandle,
        start_server_if_needed: bool,
        progress: &dyn ProgressSink,
    ) -> Result<()> {
        self.state.advance(run, DeployPhase::ResolvingTarget)?;
        let target = self.resolve_target(module)?;
        self.state.set_server(run, target.server());
        check_cancelled(progress)?;

        self.state.advance(run, DeployPhase::Undeploying)?;
        if let Some(descriptor) = target.capabilities().descriptor.as_ref() {
            if !descriptor.is_local() {
                info!(
                    "Server {} is remote, leaving teardown of {} to the server",
                    target.server(),
                    target.module_id()
                );
                return Ok(());
            }
        }

        let incremental = target.incremental()?;
        self.ensure_live(target.server())?;
        progress.progress(&format!(
            "Undeploying {} from {}",
            target.module().name,
            target.server()
        ));
        incremental
            .undeploy(&target, progress, start_server_if_needed)
            .await
            .map_err(Error::into_undeploy_failure)
    }

    /// Stop `server` if this orchestrator started it
    pub async fn stop_server_if_started_here(
        &self,
        server: &ServerInstanceRef,
        progress: &dyn ProgressSink,
    ) -> Result<bool> {
        let capabilities = self.resolver.resolve(server);
        self.lifecycle
            .stop_if_started_here(server, &capabilities, progress)
            .await
    }

    /// Suspend deploy-on-save listening for `module`
    pub fn suspend_deploy_on_save(&self, module: &dyn ModuleHandle) {
        self.deploy_on_save.suspend_listening(&module.id());
    }

    /// Resume deploy-on-save listening for `module`
    pub fn resume_deploy_on_save(&self, module: &dyn ModuleHandle) {
        self.deploy_on_save.resume_listening(&module.id());
    }

    /// Start deploy-on-save listening for `module`
    pub fn enable_compile_on_save_support(&self, module: &dyn ModuleHandle) {
        self.deploy_on_save.start_listening(&module.id());
    }

    /// Stop deploy-on-save listening for `module`
    pub fn disable_compile_on_save_support(&self, module: &dyn ModuleHandle) {
        self.deploy_on_save.stop_listening(&module.id());
    }

    fn resolve_target(&self, module: &dyn ModuleHandle) -> Result<DeploymentTarget> {
        let module_id = module.id();

        let configured = module.server_instance();
        let server = match configured {
            Some(server) if self.resolver.is_registered(&server) => server,
            other => {
                return Err(Error::NoTargetServer {
                    module: module_id.to_string(),
                    server: other.map(|server| server.to_string()),
                });
            }
        };

        let view = module
            .module_view()
            .ok_or_else(|| Error::NoModule(module_id.to_string()))?;

        let capabilities = self.resolver.resolve(&server);
        let last_deployed_at = self.state.last_successful_deploy(&module_id);
        let server_resources_changed =
            last_deployed_at.is_none_or(|since| module.is_server_resource_changed(since));

        debug!(
            "Resolved {} ({}) on {}: {:?}",
            module_id, view.module_type, server, capabilities
        );
        Ok(DeploymentTarget {
            module_id,
            module: view,
            server,
            capabilities,
            last_deployed_at,
            server_resources_changed,
        })
    }

    fn ensure_live(&self, server: &ServerInstanceRef) -> Result<()> {
        if self.resolver.is_registered(server) {
            Ok(())
        } else {
            Err(Error::InstanceRemoved(server.to_string()))
        }
    }
}
