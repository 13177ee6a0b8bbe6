//! Configuration parser and conversion into orchestrator types

use crate::{
    Config, ConfigError, ModuleEntry, Result, ServerKind,
    resolver::{ResolutionContext, resolve_opt, resolve_string, validate_references},
};
use deploy_orchestration::{
    AutodeployServer, JdbcDriver, ModuleView, ProvisioningRequest, ServerInstance,
    ServerInstanceRef, ServerRegistry,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Parse a YAML configuration file
pub fn parse_file(path: impl AsRef<Path>) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    parse_str(&content)
}

/// Parse YAML configuration from a string
pub fn parse_str(content: &str) -> Result<Config> {
    let config: Config = serde_yaml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    if config.version != "1.0" {
        return Err(ConfigError::ValidationError(format!(
            "Unsupported version: {}, expected 1.0",
            config.version
        )));
    }

    for (id, server) in &config.servers {
        if server.http_port == 0 {
            return Err(ConfigError::ValidationError(format!(
                "Server '{}' has an invalid http_port 0",
                id
            )));
        }
        let ServerKind::Autodeploy { deploy_dir } = &server.kind;
        if deploy_dir.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "Server '{}' has an empty deploy_dir",
                id
            )));
        }
    }

    for (name, module) in &config.modules {
        if let Some(server) = &module.server {
            if !config.servers.contains_key(server) {
                return Err(ConfigError::ValidationError(format!(
                    "Module '{}' references unknown server '{}'",
                    name, server
                )));
            }
        }
    }

    validate_references(config, &ResolutionContext::new());

    Ok(())
}

/// Look up a module entry
pub fn module_entry<'a>(config: &'a Config, name: &str) -> Result<&'a ModuleEntry> {
    config
        .modules
        .get(name)
        .ok_or_else(|| ConfigError::ModuleNotFound(name.to_string()))
}

/// Build the server instance configured under `id`
pub fn server_instance(
    config: &Config,
    id: &str,
    context: &ResolutionContext,
) -> Result<ServerInstance> {
    let entry = config
        .servers
        .get(id)
        .ok_or_else(|| ConfigError::ServerNotFound(id.to_string()))?;
    let server_ref = ServerInstanceRef::new(id);

    let capabilities = match &entry.kind {
        ServerKind::Autodeploy { deploy_dir } => {
            let mut server = AutodeployServer::new(
                server_ref.clone(),
                resolve_string(deploy_dir, context)?,
                resolve_string(&entry.host, context)?,
                entry.http_port,
                entry.local,
            );
            if let Some(template) = resolve_opt(entry.script_template.as_deref(), context)? {
                server = server.with_script_template(template);
            }
            Arc::new(server).capabilities()
        }
    };

    Ok(ServerInstance::new(
        server_ref,
        entry.display_name.clone().unwrap_or_else(|| id.to_string()),
        capabilities,
    ))
}

/// Build a registry holding every configured server
pub fn build_registry(config: &Config, context: &ResolutionContext) -> Result<ServerRegistry> {
    let registry = ServerRegistry::new();
    for id in config.servers.keys() {
        registry.register(server_instance(config, id, context)?);
    }
    Ok(registry)
}

/// Archive view of the module configured under `name`
pub fn module_view(config: &Config, name: &str, context: &ResolutionContext) -> Result<ModuleView> {
    let entry = module_entry(config, name)?;

    let mut view = ModuleView::new(name, entry.module_type);
    if let Some(archive) = resolve_opt(entry.archive.as_deref(), context)? {
        view = view.with_archive(archive);
    }
    if let Some(dir) = resolve_opt(entry.resource_dir.as_deref(), context)? {
        view = view.with_resource_dir(dir);
    }
    if let Some(context_root) = &entry.context_root {
        view = view.with_context_root(context_root.clone());
    }
    Ok(view)
}

/// Resources the module declares, with driver jar paths resolved
pub fn provisioning_request(
    entry: &ModuleEntry,
    context: &ResolutionContext,
) -> Result<ProvisioningRequest> {
    let jdbc_drivers = entry
        .jdbc_drivers
        .iter()
        .map(|driver| -> Result<JdbcDriver> {
            let jar = driver
                .jar
                .as_deref()
                .map(|jar| resolve_string(&jar.to_string_lossy(), context).map(PathBuf::from))
                .transpose()?;
            Ok(JdbcDriver {
                class_name: driver.class_name.clone(),
                jar,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ProvisioningRequest {
        jdbc_drivers,
        libraries: entry.libraries.clone(),
        datasources: entry.datasources.clone(),
        message_destinations: entry.message_destinations.clone(),
    })
}

/// Configured state directory, if any
pub fn state_dir(config: &Config, context: &ResolutionContext) -> Result<Option<PathBuf>> {
    Ok(resolve_opt(config.settings.state_dir.as_deref(), context)?.map(PathBuf::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use deploy_orchestration::{CapabilityResolver, ModuleType, ServerDescriptor};

    const YAML: &str = r#"
version: "1.0"
name: shop
settings:
  also_start_targets: true
  log_level: debug
servers:
  local:
    kind: autodeploy
    display_name: Local server
    deploy_dir: "${SERVER_HOME:-/srv/app}/autodeploy"
    http_port: 8181
  remote:
    kind: autodeploy
    deploy_dir: /mnt/remote/autodeploy
    host: app.example.com
    local: false
modules:
  shop:
    type: war
    archive: "${BUILD_DIR:-build}/shop.war"
    context_root: /store
    server: local
    libraries:
      - name: "${lib.name}"
        specification_version: "${lib.spec}"
        implementation_version: "${lib.impl}"
"#;

    #[test]
    fn test_parse_config() {
        let config = parse_str(YAML).unwrap();
        assert_eq!(config.name.as_deref(), Some("shop"));
        assert!(config.settings.orchestrator.also_start_targets);
        assert_eq!(config.settings.orchestrator.history_limit, 10);
        assert_eq!(config.settings.log_level.as_deref(), Some("debug"));

        let remote = &config.servers["remote"];
        assert!(!remote.local);
        assert_eq!(remote.http_port, 8080);
        assert_eq!(config.servers["local"].host, "localhost");
        assert_eq!(config.modules["shop"].module_type, ModuleType::War);
    }

    #[test]
    fn test_unsupported_version() {
        let err = parse_str("version: \"2.0\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_unknown_server_reference() {
        let yaml = r#"
version: "1.0"
modules:
  shop:
    type: war
    server: ghost
"#;
        let err = parse_str(yaml).unwrap_err();
        assert!(err.to_string().contains("unknown server 'ghost'"));
    }

    #[test]
    fn test_zero_port_rejected() {
        let yaml = r#"
version: "1.0"
servers:
  local:
    kind: autodeploy
    deploy_dir: /srv
    http_port: 0
"#;
        assert!(parse_str(yaml).is_err());
    }

    #[test]
    fn test_module_view_resolves_paths() {
        let config = parse_str(YAML).unwrap();
        let mut context = ResolutionContext::empty();
        context.set_env("BUILD_DIR", "/work/target");

        let view = module_view(&config, "shop", &context).unwrap();
        assert_eq!(view.archive, Some(PathBuf::from("/work/target/shop.war")));
        assert_eq!(view.context_root.as_deref(), Some("/store"));

        assert!(matches!(
            module_view(&config, "missing", &context),
            Err(ConfigError::ModuleNotFound(_))
        ));
    }

    #[test]
    fn test_library_placeholders_kept_verbatim() {
        let config = parse_str(YAML).unwrap();
        let request =
            provisioning_request(&config.modules["shop"], &ResolutionContext::empty()).unwrap();
        assert_eq!(request.libraries[0].name, "${lib.name}");
        assert_eq!(request.libraries[0].implementation_version, "${lib.impl}");
    }

    #[test]
    fn test_build_registry() {
        let config = parse_str(YAML).unwrap();
        let registry = build_registry(&config, &ResolutionContext::empty()).unwrap();

        let local = ServerInstanceRef::new("local");
        assert_eq!(registry.display_name(&local).as_deref(), Some("Local server"));
        assert_eq!(
            registry.display_name(&ServerInstanceRef::new("remote")).as_deref(),
            Some("remote")
        );

        let capabilities = registry.resolve(&local);
        let descriptor = capabilities.descriptor.unwrap();
        assert_eq!(descriptor.http_port(), 8181);
        assert!(descriptor.is_local());
    }
}
