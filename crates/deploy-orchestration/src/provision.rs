//! Resource provisioning ahead of deployment
//!
//! Drivers, server libraries, datasources and message destinations are
//! provisioned in that fixed order. Only one failure is tolerated: missing
//! libraries whose every identifying field is an unresolved `${...}` build
//! placeholder.

use crate::{
    Error, LibraryDependency, ProvisioningRequest, Result, ServerCapabilities, ServerInstanceRef,
    progress::ProgressSink,
};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$\{[^}]+\}$").expect("placeholder pattern is valid")
});

/// Whether `value` is nothing but a single `${...}` substitution token
pub fn is_placeholder(value: &str) -> bool {
    PLACEHOLDER.is_match(value)
}

fn is_unresolved(dependency: &LibraryDependency) -> bool {
    is_placeholder(&dependency.name)
        && is_placeholder(&dependency.specification_version)
        && is_placeholder(&dependency.implementation_version)
}

/// Provisions the resources a module declares on the target server
#[derive(Debug, Default, Clone, Copy)]
pub struct ResourceProvisioner;

impl ResourceProvisioner {
    /// Create a provisioner
    pub fn new() -> Self {
        Self
    }

    /// Provision `request` on `server`.
    ///
    /// A step whose capability is absent is skipped when the module declares
    /// nothing of that kind and fails with [`Error::MissingCapability`]
    /// otherwise.
    pub async fn provision(
        &self,
        server: &ServerInstanceRef,
        capabilities: &ServerCapabilities,
        request: &ProvisioningRequest,
        progress: &dyn ProgressSink,
    ) -> Result<()> {
        if request.is_empty() {
            debug!("Nothing to provision on {}", server);
            return Ok(());
        }

        if !request.jdbc_drivers.is_empty() {
            let resources = require(server, capabilities.resources.as_ref(), "JDBC driver deployment")?;
            progress.progress(&format!("Deploying {} JDBC driver(s)", request.jdbc_drivers.len()));
            resources
                .deploy_jdbc_drivers(&request.jdbc_drivers, progress)
                .await?;
        }

        if !request.libraries.is_empty() {
            let libraries = require(server, capabilities.libraries.as_ref(), "server library management")?;
            progress.progress(&format!("Deploying {} server librar(ies)", request.libraries.len()));
            match libraries.deploy_libraries(&request.libraries).await {
                Ok(()) => {}
                Err(Error::MissingLibraries { missing }) => {
                    if missing.iter().all(is_unresolved) {
                        warn!(
                            "Ignoring {} missing librar(ies) declared with unresolved build placeholders on {}",
                            missing.len(),
                            server
                        );
                    } else {
                        return Err(Error::MissingLibrariesFatal { missing });
                    }
                }
                Err(e) => return Err(e),
            }
        }

        if !request.datasources.is_empty() {
            let resources = require(server, capabilities.resources.as_ref(), "datasource deployment")?;
            progress.progress(&format!("Deploying {} datasource(s)", request.datasources.len()));
            resources.deploy_datasources(&request.datasources).await?;
        }

        if !request.message_destinations.is_empty() {
            let resources = require(
                server,
                capabilities.resources.as_ref(),
                "message destination deployment",
            )?;
            progress.progress(&format!(
                "Deploying {} message destination(s)",
                request.message_destinations.len()
            ));
            resources
                .deploy_message_destinations(&request.message_destinations)
                .await?;
        }

        info!("Provisioned resources on {}", server);
        Ok(())
    }
}

fn require<'a, T: ?Sized>(
    server: &ServerInstanceRef,
    capability: Option<&'a std::sync::Arc<T>>,
    name: &'static str,
) -> Result<&'a std::sync::Arc<T>> {
    capability.ok_or_else(|| Error::MissingCapability {
        server: server.to_string(),
        capability: name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_pattern() {
        assert!(is_placeholder("${lib.name}"));
        assert!(is_placeholder("${project.version}"));

        assert!(!is_placeholder("commons-io"));
        assert!(!is_placeholder("2.1"));
        assert!(!is_placeholder("${}"));
        assert!(!is_placeholder("prefix-${lib.name}"));
        assert!(!is_placeholder("${a}${b}"));
        assert!(!is_placeholder(""));
    }

    #[test]
    fn test_dependency_is_unresolved_only_when_every_field_is_a_placeholder() {
        assert!(is_unresolved(&LibraryDependency::new(
            "${lib.name}",
            "${lib.spec}",
            "${lib.impl}"
        )));
        assert!(!is_unresolved(&LibraryDependency::new(
            "${lib.name}",
            "2.1",
            "${lib.impl}"
        )));
        assert!(!is_unresolved(&LibraryDependency::new(
            "commons-io",
            "2.1",
            "2.1"
        )));
    }
}
