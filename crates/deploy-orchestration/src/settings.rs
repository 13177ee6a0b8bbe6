//! Orchestrator settings injected at construction time.

use serde::{Deserialize, Serialize};

/// Process-wide orchestration switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    /// Start the server's deployment targets even in run mode
    #[serde(default)]
    pub also_start_targets: bool,

    /// Base URL used when a server has no descriptor
    #[serde(default = "default_base_url")]
    pub default_base_url: String,

    /// Number of finished deploy runs kept in history
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_history_limit() -> usize {
    10
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            also_start_targets: false,
            default_base_url: default_base_url(),
            history_limit: default_history_limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_to_missing_fields() {
        let settings: OrchestratorSettings =
            serde_json::from_str(r#"{"also_start_targets": true}"#).unwrap();
        assert!(settings.also_start_targets);
        assert_eq!(settings.default_base_url, "http://localhost:8080");
        assert_eq!(settings.history_limit, 10);
    }
}
