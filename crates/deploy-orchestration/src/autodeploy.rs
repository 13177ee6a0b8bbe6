//! Autodeploy directory server.
//!
//! Models servers that pick up archives dropped into a watched directory.
//! The server counts as running while a `.running` marker exists in that
//! directory.

use crate::{
    DeploymentMode, DeploymentTarget, Error, IncrementalDeployment, Lifecycle, ModuleType, Result,
    ServerCapabilities, ServerDescriptor, ServerInstanceRef, TargetModuleId,
    progress::ProgressSink,
    script::TemplateScriptProvider,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const RUNNING_MARKER: &str = ".running";

/// Server plugin backed by an autodeploy directory
#[derive(Debug, Clone)]
pub struct AutodeployServer {
    id: ServerInstanceRef,
    deploy_dir: PathBuf,
    host: String,
    http_port: u16,
    local: bool,
    script_template: Option<PathBuf>,
}

impl AutodeployServer {
    /// Create a server deploying into `deploy_dir`
    pub fn new(
        id: ServerInstanceRef,
        deploy_dir: impl Into<PathBuf>,
        host: impl Into<String>,
        http_port: u16,
        local: bool,
    ) -> Self {
        Self {
            id,
            deploy_dir: deploy_dir.into(),
            host: host.into(),
            http_port,
            local,
            script_template: None,
        }
    }

    /// Render deploy scripts from `template` instead of the default one
    pub fn with_script_template(mut self, template: impl Into<PathBuf>) -> Self {
        self.script_template = Some(template.into());
        self
    }

    /// Directory archives are copied into
    pub fn deploy_dir(&self) -> &Path {
        &self.deploy_dir
    }

    /// Capability bundle backed by this server
    pub fn capabilities(self: Arc<Self>) -> ServerCapabilities {
        let mut capabilities = ServerCapabilities::none()
            .with_lifecycle(self.clone())
            .with_incremental(self.clone())
            .with_descriptor(self.clone());
        if let Some(template) = &self.script_template {
            capabilities = capabilities.with_deployment_script(Arc::new(TemplateScriptProvider::new(
                template,
                self.id.clone(),
                self.host.clone(),
                self.http_port,
            )));
        }
        capabilities
    }

    fn marker(&self) -> PathBuf {
        self.deploy_dir.join(RUNNING_MARKER)
    }

    fn deployed_path(&self, name: &str, module_type: ModuleType) -> PathBuf {
        self.deploy_dir
            .join(format!("{}.{}", name, module_type.extension()))
    }

    fn target_id(&self, name: &str) -> TargetModuleId {
        TargetModuleId::new(format!("{}#{}", self.id, name))
    }

    async fn up_to_date(archive: &Path, deployed: &Path) -> bool {
        match (async_fs::read(archive).await, async_fs::read(deployed).await) {
            (Ok(source), Ok(current)) => source == current,
            _ => false,
        }
    }
}

#[async_trait]
impl Lifecycle for AutodeployServer {
    async fn start(&self, mode: DeploymentMode, progress: &dyn ProgressSink) -> Result<()> {
        async_fs::create_dir_all(&self.deploy_dir)
            .await
            .map_err(|e| Error::io(&self.deploy_dir, e))?;
        let marker = self.marker();
        async_fs::write(&marker, mode.to_string())
            .await
            .map_err(|e| Error::io(&marker, e))?;
        progress.progress(&format!("Server {} is watching {}", self.id, self.deploy_dir.display()));
        info!("Autodeploy server {} started in {} mode", self.id, mode);
        Ok(())
    }

    async fn stop(&self, progress: &dyn ProgressSink) -> Result<()> {
        let marker = self.marker();
        match async_fs::remove_file(&marker).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Autodeploy server {} was not running", self.id);
            }
            Err(e) => return Err(Error::io(marker, e)),
        }
        progress.progress(&format!("Server {} stopped", self.id));
        Ok(())
    }

    async fn is_running(&self) -> bool {
        async_fs::metadata(self.marker())
            .await
            .is_ok_and(|metadata| metadata.is_file())
    }

    fn supports_mode(&self, mode: DeploymentMode) -> bool {
        // No profiler agent can be attached to a directory watcher
        mode != DeploymentMode::Profile
    }
}

#[async_trait]
impl IncrementalDeployment for AutodeployServer {
    async fn deploy(
        &self,
        target: &DeploymentTarget,
        progress: &dyn ProgressSink,
        force_redeploy: bool,
    ) -> Result<Vec<TargetModuleId>> {
        let module = target.module();
        let archive = module
            .archive
            .as_ref()
            .ok_or_else(|| Error::plugin(format!("{} has no archive to copy", module.name)))?;
        let is_file = async_fs::metadata(archive)
            .await
            .is_ok_and(|metadata| metadata.is_file());
        if !is_file {
            return Err(Error::plugin(format!(
                "Archive {} does not exist",
                archive.display()
            )));
        }

        let deployed = self.deployed_path(&module.name, module.module_type);
        if !force_redeploy && Self::up_to_date(archive, &deployed).await {
            debug!("{} is up to date on {}", module.name, self.id);
            return Ok(vec![self.target_id(&module.name)]);
        }

        async_fs::create_dir_all(&self.deploy_dir)
            .await
            .map_err(|e| Error::io(&self.deploy_dir, e))?;
        progress.progress(&format!(
            "Copying {} to {}",
            archive.display(),
            deployed.display()
        ));
        async_fs::copy(archive, &deployed)
            .await
            .map_err(|e| Error::io(&deployed, e))?;
        info!("Deployed {} to {}", module.name, deployed.display());

        Ok(vec![self.target_id(&module.name)])
    }

    fn notify_incremental_deployment(&self, targets: &[TargetModuleId]) {
        debug!("Autodeploy server {} now serves {:?}", self.id, targets);
    }

    fn supports_deploy_on_save(&self, targets: &[TargetModuleId]) -> bool {
        let prefix = format!("{}#", self.id);
        targets
            .iter()
            .all(|target| target.as_str().starts_with(&prefix))
    }

    async fn undeploy(
        &self,
        target: &DeploymentTarget,
        progress: &dyn ProgressSink,
        start_server_if_needed: bool,
    ) -> Result<()> {
        if !self.is_running().await {
            if !start_server_if_needed {
                return Err(Error::plugin(format!("Server {} is not running", self.id)));
            }
            self.start(DeploymentMode::Run, progress).await?;
        }

        let module = target.module();
        let deployed = self.deployed_path(&module.name, module.module_type);
        match async_fs::remove_file(&deployed).await {
            Ok(()) => {
                progress.progress(&format!("Removed {}", deployed.display()));
                info!("Undeployed {} from {}", module.name, self.id);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("{} was not deployed on {}", module.name, self.id);
                Ok(())
            }
            Err(e) => Err(Error::io(deployed, e)),
        }
    }
}

impl ServerDescriptor for AutodeployServer {
    fn is_local(&self) -> bool {
        self.local
    }

    fn hostname(&self) -> String {
        self.host.clone()
    }

    fn http_port(&self) -> u16 {
        self.http_port
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LoggingProgress;

    fn server(dir: &Path) -> AutodeployServer {
        AutodeployServer::new(ServerInstanceRef::new("auto"), dir.join("deploy"), "localhost", 8080, true)
    }

    #[smol_potat::test]
    async fn test_marker_tracks_running_state() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(dir.path());
        let progress = LoggingProgress::new();

        assert!(!server.is_running().await);
        server.start(DeploymentMode::Debug, &progress).await.unwrap();
        assert!(server.is_running().await);
        assert_eq!(
            std::fs::read_to_string(server.deploy_dir().join(RUNNING_MARKER)).unwrap(),
            "debug"
        );

        server.stop(&progress).await.unwrap();
        assert!(!server.is_running().await);
        // Stopping twice is fine
        server.stop(&progress).await.unwrap();
    }

    #[test]
    fn test_profile_mode_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(dir.path());
        assert!(server.supports_mode(DeploymentMode::Run));
        assert!(!server.supports_mode(DeploymentMode::Profile));
    }

    #[test]
    fn test_capabilities_include_script_provider_only_with_template() {
        let dir = tempfile::tempdir().unwrap();

        let plain = Arc::new(server(dir.path())).capabilities();
        assert!(plain.lifecycle.is_some());
        assert!(plain.incremental.is_some());
        assert!(plain.descriptor.is_some());
        assert!(plain.deployment_script.is_none());
        assert!(plain.libraries.is_none());

        let templated = Arc::new(server(dir.path()).with_script_template(dir.path().join("t.xml")))
            .capabilities();
        assert!(templated.deployment_script.is_some());
    }

    #[test]
    fn test_deploy_on_save_only_for_own_targets() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(dir.path());
        assert!(server.supports_deploy_on_save(&[TargetModuleId::new("auto#shop")]));
        assert!(!server.supports_deploy_on_save(&[TargetModuleId::new("other#shop")]));
    }
}
