//! File-backed store for deployed target module ids.

use crate::{
    Error, ModuleId, Result, TargetModuleId,
    sync::{ContentSynchronizer, WriteResult},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::form_urlencoded;

#[derive(Debug, Serialize, Deserialize)]
struct StoredTargets {
    module: ModuleId,
    targets: Vec<TargetModuleId>,
}

/// Keeps each module's deployed target ids in `<dir>/<module>.targets.json`.
///
/// The module id is form-urlencoded into the file name, so distinct ids
/// never share a file.
#[derive(Debug, Clone)]
pub struct JsonTargetStore {
    dir: PathBuf,
    synchronizer: ContentSynchronizer,
}

impl JsonTargetStore {
    /// Store rooted at the per-user data directory
    pub fn new() -> Self {
        let dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("deployctl");
        Self::with_dir(dir)
    }

    /// Store rooted at `dir`
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            synchronizer: ContentSynchronizer::new(),
        }
    }

    /// Directory holding the stored files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, module: &ModuleId) -> PathBuf {
        let file_name: String = form_urlencoded::byte_serialize(module.as_str().as_bytes()).collect();
        self.dir.join(format!("{}.targets.json", file_name))
    }

    /// Record the deployed targets of `module`
    pub fn save(&self, module: &ModuleId, targets: &[TargetModuleId]) -> Result<WriteResult> {
        let stored = StoredTargets {
            module: module.clone(),
            targets: targets.to_vec(),
        };
        let mut content = serde_json::to_vec_pretty(&stored)
            .map_err(|e| Error::Config(format!("Failed to serialize targets: {}", e)))?;
        content.push(b'\n');
        self.synchronizer.sync(&self.path_for(module), &content)
    }

    /// Deployed targets of `module`; empty when nothing was recorded
    pub fn load(&self, module: &ModuleId) -> Result<Vec<TargetModuleId>> {
        let path = self.path_for(module);
        let content = match std::fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(path, e)),
        };
        let stored: StoredTargets = serde_json::from_slice(&content).map_err(|e| {
            Error::Config(format!("Corrupt target file {}: {}", path.display(), e))
        })?;
        if stored.module != *module {
            return Err(Error::Config(format!(
                "{} holds targets of {}, not {}",
                path.display(),
                stored.module,
                module
            )));
        }
        Ok(stored.targets)
    }
}

impl Default for JsonTargetStore {
    fn default() -> Self {
        Self::new()
    }
}
