//! Deploy-on-save listening state
//!
//! Tracks, per module, whether continuous redeployment on file save is
//! listening, suspended or stopped, and whether an initial deployment has
//! unlocked it. Callers that own a build pipeline racing with deploys suspend
//! listening before invoking the orchestrator; the orchestrator resumes it.

use crate::ModuleId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Listening state of one module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListeningState {
    /// Not listening
    #[default]
    Stopped,
    /// Listening for saves
    Listening,
    /// Temporarily not listening, to be resumed
    Suspended,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Registration {
    state: ListeningState,
    initial_deployment: bool,
}

/// Per-module deploy-on-save state table.
///
/// All operations on the table are serialized, so concurrent calls for the
/// same module observe a single total order. A module back in the stopped
/// state with no initial deployment recorded is dropped from the table.
#[derive(Debug, Default)]
pub struct DeployOnSaveCoordinator {
    modules: Mutex<HashMap<ModuleId, Registration>>,
}

impl DeployOnSaveCoordinator {
    /// Create an empty coordinator
    pub fn new() -> Self {
        Self::default()
    }

    /// stopped → listening
    pub fn start_listening(&self, module: &ModuleId) {
        self.update(module, |registration| {
            if registration.state == ListeningState::Stopped {
                registration.state = ListeningState::Listening;
            }
        });
    }

    /// any → stopped
    pub fn stop_listening(&self, module: &ModuleId) {
        self.update(module, |registration| {
            registration.state = ListeningState::Stopped;
        });
    }

    /// listening → suspended; no-op otherwise
    pub fn suspend_listening(&self, module: &ModuleId) {
        self.update(module, |registration| {
            if registration.state == ListeningState::Listening {
                registration.state = ListeningState::Suspended;
            }
        });
    }

    /// suspended → listening; no-op otherwise
    pub fn resume_listening(&self, module: &ModuleId) {
        self.update(module, |registration| {
            if registration.state == ListeningState::Suspended {
                registration.state = ListeningState::Listening;
            }
        });
    }

    /// Record that an initial deployment completed for `module`
    pub fn notify_initial_deployment(&self, module: &ModuleId) {
        self.update(module, |registration| {
            registration.initial_deployment = true;
        });
    }

    /// Current listening state
    pub fn state(&self, module: &ModuleId) -> ListeningState {
        self.lock()
            .get(module)
            .map(|registration| registration.state)
            .unwrap_or_default()
    }

    /// Whether an initial deployment has unlocked deploy-on-save
    pub fn is_initially_deployed(&self, module: &ModuleId) -> bool {
        self.lock()
            .get(module)
            .is_some_and(|registration| registration.initial_deployment)
    }

    /// Whether saves should currently trigger redeployment
    pub fn is_active(&self, module: &ModuleId) -> bool {
        self.lock().get(module).is_some_and(|registration| {
            registration.initial_deployment && registration.state == ListeningState::Listening
        })
    }

    fn update(&self, module: &ModuleId, change: impl FnOnce(&mut Registration)) {
        let mut modules = self.lock();
        let registration = modules.entry(module.clone()).or_default();
        let before = registration.state;
        change(registration);
        if before != registration.state {
            debug!(
                "Deploy-on-save for {}: {:?} -> {:?}",
                module, before, registration.state
            );
        }
        if *registration == Registration::default() {
            modules.remove(module);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ModuleId, Registration>> {
        self.modules.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
