//! Server start-up before deployment.

use crate::{
    DeploymentMode, Error, Result, ServerCapabilities, ServerInstanceRef, progress::ProgressSink,
};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Makes sure a server instance is running before modules are deployed to it
#[derive(Debug, Default)]
pub struct ServerLifecycleController {
    also_start_targets: bool,
    /// Servers this controller started
    started: Mutex<HashSet<ServerInstanceRef>>,
}

impl ServerLifecycleController {
    /// Create a controller.
    ///
    /// With `also_start_targets` set, deployment targets are started even in
    /// run mode.
    pub fn new(also_start_targets: bool) -> Self {
        Self {
            also_start_targets,
            started: Mutex::new(HashSet::new()),
        }
    }

    /// Bring `server` to a running state for `mode`.
    ///
    /// Outside run mode, or with `also_start_targets`, the server's deployment
    /// targets are started; otherwise only the bare server process. A server
    /// without a lifecycle capability is managed externally and left alone.
    pub async fn ensure_started(
        &self,
        server: &ServerInstanceRef,
        capabilities: &ServerCapabilities,
        mode: DeploymentMode,
        progress: &dyn ProgressSink,
    ) -> Result<()> {
        let Some(lifecycle) = capabilities.lifecycle.as_ref() else {
            debug!("Server {} has no lifecycle control, assuming it is managed externally", server);
            return Ok(());
        };

        if !lifecycle.supports_mode(mode) {
            return Err(Error::ServerUnavailable {
                server: server.to_string(),
                reason: format!("{} mode is not supported", mode),
            });
        }

        let was_running = lifecycle.is_running().await;
        let start_result = if mode != DeploymentMode::Run || self.also_start_targets {
            progress.progress(&format!("Starting deployment targets of {} ({})", server, mode));
            lifecycle.start_targets(mode, progress).await
        } else if was_running {
            debug!("Server {} is already running", server);
            Ok(())
        } else {
            progress.progress(&format!("Starting server {}", server));
            lifecycle.start(mode, progress).await
        };

        if let Err(e) = start_result {
            warn!("Failed to start server {}: {}", server, e);
            return Err(Error::ServerUnavailable {
                server: server.to_string(),
                reason: e.to_string(),
            });
        }

        if !lifecycle.is_running().await {
            return Err(Error::ServerUnavailable {
                server: server.to_string(),
                reason: "server did not reach a running state".to_string(),
            });
        }

        if !was_running {
            info!("Started server {}", server);
            self.lock().insert(server.clone());
        }
        Ok(())
    }

    /// Whether this controller started `server`
    pub fn started_here(&self, server: &ServerInstanceRef) -> bool {
        self.lock().contains(server)
    }

    /// Stop `server` if this controller started it.
    ///
    /// Returns whether a stop was performed.
    pub async fn stop_if_started_here(
        &self,
        server: &ServerInstanceRef,
        capabilities: &ServerCapabilities,
        progress: &dyn ProgressSink,
    ) -> Result<bool> {
        if !self.lock().remove(server) {
            return Ok(false);
        }
        let Some(lifecycle) = capabilities.lifecycle.as_ref() else {
            return Ok(false);
        };

        progress.progress(&format!("Stopping server {}", server));
        lifecycle.stop(progress).await?;
        info!("Stopped server {}", server);
        Ok(true)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<ServerInstanceRef>> {
        self.started.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
