//! Shared fakes for orchestration tests

#![allow(dead_code)]

use async_trait::async_trait;
use deploy_orchestration::{
    Datasource, DeploymentMode, DeploymentTarget, Error, IncrementalDeployment, JdbcDriver,
    LibraryDependency, LibraryManager, Lifecycle, MessageDestination, ModuleHandle, ModuleId,
    ModuleType, ModuleView, ProgressSink, ProvisioningRequest, ResourceDeployers, Result,
    ServerCapabilities, ServerDescriptor, ServerInstance, ServerInstanceRef, ServerRegistry,
    TargetModuleId,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What the fake deploy call does
#[derive(Debug, Clone)]
pub enum DeployBehavior {
    /// Succeed with these target ids
    Targets(Vec<String>),
    /// Raise an unclassified plugin failure
    Fail(Option<String>),
    /// Raise an IO failure on the deployed archive
    IoFail(String),
}

/// Server plugin fake recording every capability call
pub struct FakeServer {
    calls: Mutex<Vec<String>>,
    running: AtomicBool,
    start_fails: AtomicBool,
    local: bool,
    deploy: Mutex<DeployBehavior>,
    missing_libraries: Mutex<Option<Vec<LibraryDependency>>>,
    deploy_on_save: bool,
    undeploy_io_error: Mutex<Option<String>>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
            start_fails: AtomicBool::new(false),
            local: true,
            deploy: Mutex::new(DeployBehavior::Targets(vec!["M#1".to_string()])),
            missing_libraries: Mutex::new(None),
            deploy_on_save: false,
            undeploy_io_error: Mutex::new(None),
        }
    }

    pub fn remote() -> Self {
        Self {
            local: false,
            ..Self::new()
        }
    }

    pub fn with_deploy_on_save(mut self) -> Self {
        self.deploy_on_save = true;
        self
    }

    pub fn running(self) -> Self {
        self.running.store(true, Ordering::SeqCst);
        self
    }

    pub fn fail_start(&self) {
        self.start_fails.store(true, Ordering::SeqCst);
    }

    pub fn set_deploy(&self, behavior: DeployBehavior) {
        *self.deploy.lock().unwrap() = behavior;
    }

    pub fn fail_undeploy_with_io(&self, message: &str) {
        *self.undeploy_io_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn set_missing_libraries(&self, missing: Vec<LibraryDependency>) {
        *self.missing_libraries.lock().unwrap() = Some(missing);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|call| call.starts_with(prefix))
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    /// Every capability backed by this fake
    pub fn capabilities(self: &Arc<Self>) -> ServerCapabilities {
        ServerCapabilities::none()
            .with_lifecycle(self.clone())
            .with_incremental(self.clone())
            .with_libraries(self.clone())
            .with_resources(self.clone())
            .with_descriptor(self.clone())
    }
}

#[async_trait]
impl Lifecycle for FakeServer {
    async fn start(&self, mode: DeploymentMode, _progress: &dyn ProgressSink) -> Result<()> {
        self.record(format!("start:{}", mode));
        if self.start_fails.load(Ordering::SeqCst) {
            return Err(Error::plugin("port 8080 already in use"));
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn start_targets(&self, mode: DeploymentMode, _progress: &dyn ProgressSink) -> Result<()> {
        self.record(format!("start_targets:{}", mode));
        if self.start_fails.load(Ordering::SeqCst) {
            return Err(Error::plugin("port 8080 already in use"));
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self, _progress: &dyn ProgressSink) -> Result<()> {
        self.record("stop");
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IncrementalDeployment for FakeServer {
    async fn deploy(
        &self,
        target: &DeploymentTarget,
        _progress: &dyn ProgressSink,
        force_redeploy: bool,
    ) -> Result<Vec<TargetModuleId>> {
        self.record(format!("deploy:{}:{}", target.module().name, force_redeploy));
        let behavior = self.deploy.lock().unwrap().clone();
        match behavior {
            DeployBehavior::Targets(ids) => Ok(ids.into_iter().map(TargetModuleId::new).collect()),
            DeployBehavior::Fail(message) => Err(Error::Plugin {
                message,
                source: Some(Box::new(std::io::Error::other("connection reset"))),
            }),
            DeployBehavior::IoFail(message) => Err(Error::io(
                format!("/srv/autodeploy/{}.war", target.module().name),
                std::io::Error::other(message),
            )),
        }
    }

    fn notify_incremental_deployment(&self, targets: &[TargetModuleId]) {
        self.record(format!("notify:{}", targets.len()));
    }

    fn supports_deploy_on_save(&self, _targets: &[TargetModuleId]) -> bool {
        self.deploy_on_save
    }

    async fn undeploy(
        &self,
        target: &DeploymentTarget,
        _progress: &dyn ProgressSink,
        start_server_if_needed: bool,
    ) -> Result<()> {
        self.record(format!("undeploy:{}:{}", target.module().name, start_server_if_needed));
        match self.undeploy_io_error.lock().unwrap().clone() {
            Some(message) => Err(Error::io(
                format!("/srv/autodeploy/{}.war", target.module().name),
                std::io::Error::other(message),
            )),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LibraryManager for FakeServer {
    async fn deploy_libraries(&self, requested: &[LibraryDependency]) -> Result<()> {
        self.record(format!("libraries:{}", requested.len()));
        match self.missing_libraries.lock().unwrap().clone() {
            Some(missing) => Err(Error::MissingLibraries { missing }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ResourceDeployers for FakeServer {
    async fn deploy_jdbc_drivers(
        &self,
        drivers: &[JdbcDriver],
        _progress: &dyn ProgressSink,
    ) -> Result<()> {
        self.record(format!("jdbc:{}", drivers.len()));
        Ok(())
    }

    async fn deploy_datasources(&self, datasources: &[Datasource]) -> Result<()> {
        self.record(format!("datasources:{}", datasources.len()));
        Ok(())
    }

    async fn deploy_message_destinations(&self, destinations: &[MessageDestination]) -> Result<()> {
        self.record(format!("destinations:{}", destinations.len()));
        Ok(())
    }
}

impl ServerDescriptor for FakeServer {
    fn is_local(&self) -> bool {
        self.local
    }

    fn hostname(&self) -> String {
        "localhost".to_string()
    }

    fn http_port(&self) -> u16 {
        8080
    }
}

/// Progress sink recording messages and finish calls
#[derive(Default)]
pub struct RecordingProgress {
    messages: Mutex<Vec<String>>,
    finished: AtomicUsize,
    cancelled: AtomicBool,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn finish_count(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingProgress {
    fn progress(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn finish(&self) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

/// Module handle held in memory
pub struct TestModule {
    id: ModuleId,
    view: Option<ModuleView>,
    server: Option<ServerInstanceRef>,
    provisioning: ProvisioningRequest,
    persisted: Mutex<Option<Vec<TargetModuleId>>>,
}

impl TestModule {
    /// WAR module with an archive, deploying to `server`
    pub fn war(name: &str, server: &str) -> Self {
        Self {
            id: ModuleId::new(name),
            view: Some(ModuleView::new(name, ModuleType::War).with_archive(format!("/build/{}.war", name))),
            server: Some(ServerInstanceRef::new(server)),
            provisioning: ProvisioningRequest::default(),
            persisted: Mutex::new(None),
        }
    }

    pub fn with_view(mut self, view: Option<ModuleView>) -> Self {
        self.view = view;
        self
    }

    pub fn with_provisioning(mut self, provisioning: ProvisioningRequest) -> Self {
        self.provisioning = provisioning;
        self
    }

    pub fn persisted(&self) -> Option<Vec<TargetModuleId>> {
        self.persisted.lock().unwrap().clone()
    }
}

impl ModuleHandle for TestModule {
    fn id(&self) -> ModuleId {
        self.id.clone()
    }

    fn module_view(&self) -> Option<ModuleView> {
        self.view.clone()
    }

    fn server_instance(&self) -> Option<ServerInstanceRef> {
        self.server.clone()
    }

    fn provisioning_request(&self) -> ProvisioningRequest {
        self.provisioning.clone()
    }

    fn persist_deployed_targets(&self, targets: &[TargetModuleId]) -> Result<()> {
        *self.persisted.lock().unwrap() = Some(targets.to_vec());
        Ok(())
    }
}

/// Registry holding one fake server under `id`
pub fn registry_with(id: &str, server: &Arc<FakeServer>) -> Arc<ServerRegistry> {
    let registry = Arc::new(ServerRegistry::new());
    registry.register(ServerInstance::new(
        ServerInstanceRef::new(id),
        id.to_uppercase(),
        server.capabilities(),
    ));
    registry
}
