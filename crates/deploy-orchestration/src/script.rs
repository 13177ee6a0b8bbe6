//! Deploy script regeneration
//!
//! Server plugins may generate their own deploy script; servers that don't
//! get the packaged default template. Either way the script goes through the
//! content synchronizer so an unchanged script is never rewritten.

use crate::{
    Error, ModuleType, Result, ServerCapabilities, ServerInstanceRef,
    sync::{ContentSynchronizer, WriteResult},
};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default deploy script, used when a server has no script provider
pub const DEFAULT_DEPLOY_SCRIPT: &str = include_str!("../resources/deploy-script.xml");

/// Generates a server specific deploy script
pub trait DeploymentScriptProvider: Send + Sync {
    /// Script content for modules of `module_type`
    fn generate(&self, module_type: ModuleType) -> Result<Vec<u8>>;
}

/// Script provider rendering a template file
#[derive(Debug, Clone)]
pub struct TemplateScriptProvider {
    template: PathBuf,
    server: ServerInstanceRef,
    host: String,
    http_port: u16,
}

impl TemplateScriptProvider {
    /// Create a provider for `server` rendering `template`
    pub fn new(
        template: impl Into<PathBuf>,
        server: ServerInstanceRef,
        host: impl Into<String>,
        http_port: u16,
    ) -> Self {
        Self {
            template: template.into(),
            server,
            host: host.into(),
            http_port,
        }
    }
}

impl DeploymentScriptProvider for TemplateScriptProvider {
    fn generate(&self, module_type: ModuleType) -> Result<Vec<u8>> {
        let template = std::fs::read_to_string(&self.template)
            .map_err(|e| Error::io(&self.template, e))?;
        Ok(render(&template, &self.server, &self.host, self.http_port, module_type).into_bytes())
    }
}

/// Regenerate the deploy script for `server` at `target`.
///
/// Returns whether the file was written.
pub fn regenerate_deploy_script(
    synchronizer: &ContentSynchronizer,
    target: &Path,
    server: &ServerInstanceRef,
    capabilities: &ServerCapabilities,
    module_type: ModuleType,
) -> Result<WriteResult> {
    let content = match capabilities.deployment_script.as_ref() {
        Some(provider) => provider.generate(module_type)?,
        None => {
            debug!("Server {} has no script provider, using the default template", server);
            let (host, port) = capabilities
                .descriptor
                .as_ref()
                .map(|descriptor| (descriptor.hostname(), descriptor.http_port()))
                .unwrap_or_else(|| ("localhost".to_string(), 8080));
            render(DEFAULT_DEPLOY_SCRIPT, server, &host, port, module_type).into_bytes()
        }
    };

    synchronizer.sync(target, &content)
}

fn render(
    template: &str,
    server: &ServerInstanceRef,
    host: &str,
    http_port: u16,
    module_type: ModuleType,
) -> String {
    template
        .replace("@SERVER_ID@", server.as_str())
        .replace("@HOST@", host)
        .replace("@HTTP_PORT@", &http_port.to_string())
        .replace("@MODULE_TYPE@", &module_type.to_string())
}
