//! Engine configuration loading.

use std::path::Path;

use anyhow::{Context, Result};
use tcs_core::EngineConfig;

/// Load an [`EngineConfig`] from a YAML file, or the defaults when no path
/// is given. Unknown keys are rejected.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        tracing::debug!("no engine config given, using defaults");
        return Ok(EngineConfig::default());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read engine config {}", path.display()))?;
    let config: EngineConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse engine config {}", path.display()))?;
    tracing::debug!(
        path = %path.display(),
        max_delegation_depth = config.max_delegation_depth,
        event_log_capacity = config.event_log_capacity,
        "loaded engine config"
    );
    Ok(config)
}
