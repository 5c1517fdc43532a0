//! YAML startup configuration
//!
//! `AgentConfig` is loaded once at process start. Missing or empty required
//! fields are a fatal `CorrelatorError::Config` — there is no sensible
//! default for "which collector do I send spans to."

use crate::error::{CorrelatorError, CorrelatorResult};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub collector_ip: String,
    pub collector_port: u16,
    pub exporter: String,
}

impl AgentConfig {
    pub fn from_path(path: impl AsRef<Path>) -> CorrelatorResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CorrelatorError::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_str(&raw)
    }

    pub fn from_str(raw: &str) -> CorrelatorResult<Self> {
        let config: AgentConfig = serde_yaml::from_str(raw)
            .map_err(|e| CorrelatorError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CorrelatorResult<()> {
        if self.collector_ip.trim().is_empty() {
            return Err(CorrelatorError::Config(
                "collector_ip must not be empty".to_string(),
            ));
        }
        if self.exporter.trim().is_empty() {
            return Err(CorrelatorError::Config(
                "exporter must not be empty".to_string(),
            ));
        }
        if self.collector_port == 0 {
            return Err(CorrelatorError::Config(
                "collector_port must not be 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}:{}", self.collector_ip, self.collector_port)
    }
}
