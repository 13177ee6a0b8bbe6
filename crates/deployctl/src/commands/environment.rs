//! Orchestrator wiring shared by the deploy commands

use anyhow::{Context, Result};
use deploy_config::{Config, parser, resolver::ResolutionContext};
use deploy_orchestration::{
    DeploymentOrchestrator, JsonTargetStore, ModuleHandle, ModuleId, ModuleView,
    ProvisioningRequest, ServerInstanceRef, ServerRegistry, TargetModuleId,
};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Module backed by a `deploy.yaml` entry
pub struct ConfigModule {
    view: ModuleView,
    server: Option<ServerInstanceRef>,
    provisioning: ProvisioningRequest,
    store: JsonTargetStore,
}

impl ConfigModule {
    /// Last persisted deployed targets
    pub fn stored_targets(&self) -> deploy_orchestration::Result<Vec<TargetModuleId>> {
        self.store.load(&self.id())
    }

    /// Forget the persisted deployed targets
    pub fn clear_targets(&self) -> deploy_orchestration::Result<()> {
        self.store.save(&self.id(), &[]).map(|_| ())
    }
}

impl ModuleHandle for ConfigModule {
    fn id(&self) -> ModuleId {
        ModuleId::new(&self.view.name)
    }

    fn module_view(&self) -> Option<ModuleView> {
        Some(self.view.clone())
    }

    fn server_instance(&self) -> Option<ServerInstanceRef> {
        self.server.clone()
    }

    fn provisioning_request(&self) -> ProvisioningRequest {
        self.provisioning.clone()
    }

    fn persist_deployed_targets(&self, targets: &[TargetModuleId]) -> deploy_orchestration::Result<()> {
        let result = self.store.save(&self.id(), targets)?;
        debug!(
            "Deployed targets of {} {}",
            self.view.name,
            if result.written { "updated" } else { "unchanged" }
        );
        Ok(())
    }
}

/// Everything a deploy command needs
pub struct Environment {
    pub config: Config,
    pub context: ResolutionContext,
    pub registry: Arc<ServerRegistry>,
    pub store: JsonTargetStore,
    pub orchestrator: DeploymentOrchestrator,
}

impl Environment {
    /// Load the configuration at `config_path` and build the orchestrator
    pub fn load(config_path: &Path) -> Result<Self> {
        let config = parser::parse_file(config_path).context("Failed to parse configuration")?;
        Self::from_config(config, ResolutionContext::new())
    }

    /// Build the orchestrator for an already parsed configuration
    pub fn from_config(config: Config, context: ResolutionContext) -> Result<Self> {
        let registry = Arc::new(
            parser::build_registry(&config, &context).context("Failed to set up servers")?,
        );
        let store = match parser::state_dir(&config, &context)? {
            Some(dir) => JsonTargetStore::with_dir(dir),
            None => JsonTargetStore::new(),
        };
        let orchestrator = DeploymentOrchestrator::new(
            registry.clone(),
            config.settings.orchestrator.clone(),
        );

        Ok(Self {
            config,
            context,
            registry,
            store,
            orchestrator,
        })
    }

    /// Module configured under `name`
    pub fn module(&self, name: &str) -> Result<ConfigModule> {
        let entry = parser::module_entry(&self.config, name)?;
        Ok(ConfigModule {
            view: parser::module_view(&self.config, name, &self.context)?,
            server: entry.server.as_deref().map(ServerInstanceRef::new),
            provisioning: parser::provisioning_request(entry, &self.context)?,
            store: self.store.clone(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Environment with one autodeploy server and one WAR module, rooted at `root`
    pub(crate) fn environment(root: &Path) -> Environment {
        let yaml = format!(
            r#"
version: "1.0"
settings:
  state_dir: "{root}/state"
servers:
  local:
    kind: autodeploy
    deploy_dir: "{root}/autodeploy"
    http_port: 8181
modules:
  shop:
    type: war
    archive: "{root}/shop.war"
    context_root: /store
    server: local
"#,
            root = root.display()
        );
        std::fs::write(root.join("shop.war"), b"war").unwrap();
        let config = parser::parse_str(&yaml).unwrap();
        Environment::from_config(config, ResolutionContext::empty()).unwrap()
    }

    #[test]
    fn test_module_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let env = environment(dir.path());

        let module = env.module("shop").unwrap();
        assert_eq!(module.server_instance(), Some(ServerInstanceRef::new("local")));
        assert_eq!(
            module.module_view().unwrap().archive,
            Some(dir.path().join("shop.war"))
        );
        assert!(module.stored_targets().unwrap().is_empty());
        assert!(env.module("missing").is_err());
        assert_eq!(env.store.dir(), dir.path().join("state"));
    }
}
