//! Runtime state tracking for deploy and undeploy runs
//!
//! Every orchestrator call is recorded as a run that walks the deploy phase
//! state machine. Finished runs move into a bounded history that can be
//! queried, e.g. for the last successful deploy of a module.

use crate::{Error, ErrorKind, ModuleId, ServerInstanceRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock};
use tracing::debug;
use uuid::Uuid;

/// Phase of a deploy or undeploy run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployPhase {
    /// Run created
    Init,
    /// Resolving module view and server
    ResolvingTarget,
    /// Making sure the server runs
    StartingServer,
    /// Provisioning drivers, libraries, datasources, destinations
    Provisioning,
    /// Running the caller's pre-deploy hook
    PreDeployHook,
    /// Plugin deploy call in flight
    Deploying,
    /// Notifying the plugin and deploy-on-save
    Notifying,
    /// Persisting target modules and computing the client URL
    Persisting,
    /// Plugin undeploy call in flight
    Undeploying,
    /// Finished successfully
    Done,
    /// Finished with a failure
    Failed,
}

impl DeployPhase {
    /// Whether the run is over
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeployPhase::Done | DeployPhase::Failed)
    }

    /// Check if a phase transition is valid
    pub fn can_transition_to(self, next: DeployPhase) -> bool {
        use DeployPhase::*;

        match (self, next) {
            // Every unfinished run can fail
            (Done | Failed, _) => false,
            (_, Failed) => true,

            (Init, ResolvingTarget) => true,

            // Deploy path
            (ResolvingTarget, StartingServer) => true,
            (StartingServer, Provisioning) => true,
            (Provisioning, PreDeployHook) => true,
            (PreDeployHook, Deploying) => true,
            (Deploying, Notifying) => true,
            (Notifying, Persisting) => true,
            (Persisting, Done) => true,

            // Undeploy path
            (ResolvingTarget, Undeploying) => true,
            (Undeploying, Done) => true,

            _ => false,
        }
    }
}

/// Which orchestrator operation a run belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Deploy
    Deploy,
    /// Undeploy
    Undeploy,
}

/// Overall status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Still executing
    InProgress,
    /// Completed successfully
    Completed,
    /// Completed with a failure
    Failed,
}

/// Record of one deploy or undeploy run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// Unique run id
    pub id: Uuid,
    /// Deploy or undeploy
    pub operation: Operation,
    /// Module the run operates on
    pub module: ModuleId,
    /// Target server, once known
    pub server: Option<ServerInstanceRef>,
    /// Current phase
    pub phase: DeployPhase,
    /// Phase the run failed in, if it failed
    pub failed_in: Option<DeployPhase>,
    /// Overall status
    pub status: RunStatus,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub completed_at: Option<DateTime<Utc>>,
    /// Kind of the failure, if any
    pub error_kind: Option<ErrorKind>,
    /// Failure message, if any
    pub error: Option<String>,
}

/// State manager for deploy runs
pub struct StateManager {
    /// Runs currently executing
    active: RwLock<HashMap<Uuid, DeploymentRecord>>,
    /// Finished runs, oldest first
    history: RwLock<VecDeque<DeploymentRecord>>,
    /// Maximum history size
    max_history_size: usize,
}

impl StateManager {
    /// Create a state manager keeping the last 10 runs
    pub fn new() -> Self {
        Self::with_history_limit(10)
    }

    /// Create a state manager keeping the last `limit` runs
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            active: RwLock::new(HashMap::new()),
            history: RwLock::new(VecDeque::new()),
            max_history_size: limit,
        }
    }

    /// Start recording a run
    pub fn begin(&self, operation: Operation, module: ModuleId) -> Uuid {
        let record = DeploymentRecord {
            id: Uuid::new_v4(),
            operation,
            module,
            server: None,
            phase: DeployPhase::Init,
            failed_in: None,
            status: RunStatus::InProgress,
            started_at: Utc::now(),
            completed_at: None,
            error_kind: None,
            error: None,
        };
        let id = record.id;
        self.active
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, record);
        id
    }

    /// Attach the resolved server to a run
    pub fn set_server(&self, run: Uuid, server: &ServerInstanceRef) {
        if let Some(record) = self
            .active
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&run)
        {
            record.server = Some(server.clone());
        }
    }

    /// Move a run to its next phase
    pub fn advance(&self, run: Uuid, next: DeployPhase) -> Result<(), Error> {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        let record = active
            .get_mut(&run)
            .ok_or_else(|| Error::Config(format!("Unknown deploy run: {}", run)))?;

        if !record.phase.can_transition_to(next) {
            return Err(Error::InvalidPhaseTransition {
                from: record.phase,
                to: next,
            });
        }

        debug!(
            "Run {} ({}): {:?} -> {:?}",
            run, record.module, record.phase, next
        );
        record.phase = next;
        Ok(())
    }

    /// Finish a run successfully
    pub fn complete(&self, run: Uuid) {
        self.finish(run, |record| {
            record.phase = DeployPhase::Done;
            record.status = RunStatus::Completed;
        });
    }

    /// Finish a run with a failure
    pub fn fail(&self, run: Uuid, error: &Error) {
        self.finish(run, |record| {
            record.failed_in = Some(record.phase);
            record.phase = DeployPhase::Failed;
            record.status = RunStatus::Failed;
            record.error_kind = Some(error.kind());
            record.error = Some(error.to_string());
        });
    }

    fn finish(&self, run: Uuid, update: impl FnOnce(&mut DeploymentRecord)) {
        let record = self
            .active
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&run);
        let Some(mut record) = record else {
            return;
        };

        update(&mut record);
        record.completed_at = Some(Utc::now());

        let mut history = self.history.write().unwrap_or_else(PoisonError::into_inner);
        history.push_back(record);
        while history.len() > self.max_history_size {
            history.pop_front();
        }
    }

    /// Snapshot of a run, active or finished
    pub fn get(&self, run: Uuid) -> Option<DeploymentRecord> {
        if let Some(record) = self
            .active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&run)
        {
            return Some(record.clone());
        }
        self.history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|record| record.id == run)
            .cloned()
    }

    /// Runs currently executing
    pub fn active_runs(&self) -> Vec<DeploymentRecord> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Finished runs, oldest first
    pub fn history(&self) -> Vec<DeploymentRecord> {
        self.history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// When `module` was last deployed successfully, if still in history
    pub fn last_successful_deploy(&self, module: &ModuleId) -> Option<DateTime<Utc>> {
        self.history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find(|record| {
                &record.module == module
                    && record.operation == Operation::Deploy
                    && record.status == RunStatus::Completed
            })
            .and_then(|record| record.completed_at)
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}
