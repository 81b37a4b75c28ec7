//! # Engine Configuration
//!
//! Tunables shared by the coordinator and the event log. Every field has a
//! default, so an empty YAML document is a valid configuration.

use serde::{Deserialize, Serialize};

/// Default bound on delegation chain length.
pub const DEFAULT_MAX_DELEGATION_DEPTH: usize = 16;

/// Default number of event records retained in memory.
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 10_000;

/// Engine-wide configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Most parent links a check may follow before failing with
    /// `DelegationTooDeep`.
    pub max_delegation_depth: usize,
    /// Records retained by the event log before trimming.
    pub event_log_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_delegation_depth: DEFAULT_MAX_DELEGATION_DEPTH,
            event_log_capacity: DEFAULT_EVENT_LOG_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn partial_document_overrides_one_field() {
        let cfg: EngineConfig = serde_json::from_str(r#"{"max_delegation_depth": 4}"#).unwrap();
        assert_eq!(cfg.max_delegation_depth, 4);
        assert_eq!(cfg.event_log_capacity, DEFAULT_EVENT_LOG_CAPACITY);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<EngineConfig, _> = serde_json::from_str(r#"{"max_depth": 4}"#);
        assert!(result.is_err());
    }
}
