//! TOML configuration surface.
//!
//! Strategy, level, and mode fields are kept as strings in the file format
//! and resolved through documented fallbacks: an unrecognized strategy
//! becomes `short_circuit`, an unrecognized response mode becomes `log`.
//! Malformed files are an error; missing sections take their defaults.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::correlation::CorrelationConfig;
use crate::enforcement::EnforcementConfig;
use crate::pipeline::PipelineStrategy;
use crate::threat::ThreatLevel;

/// Top-level configuration, loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VigilConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub correlation: CorrelationConfig,
    #[serde(default)]
    pub enforcement: EnforcementConfig,
}

impl VigilConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: VigilConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }
}

/// Inspection pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Level at which the short-circuit strategy stops the run.
    #[serde(default = "default_short_circuit_at")]
    pub short_circuit_at: String,
    /// Accumulated-weight limit for the threshold strategy.
    #[serde(default = "default_threshold_score")]
    pub threshold_score: u32,
}

fn default_strategy() -> String {
    "short_circuit".to_string()
}

fn default_short_circuit_at() -> String {
    "high".to_string()
}

fn default_threshold_score() -> u32 {
    6
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            short_circuit_at: default_short_circuit_at(),
            threshold_score: default_threshold_score(),
        }
    }
}

impl PipelineConfig {
    pub fn strategy(&self) -> PipelineStrategy {
        PipelineStrategy::from_str_or_default(&self.strategy)
    }

    pub fn short_circuit_at(&self) -> ThreatLevel {
        ThreatLevel::from_str_or(&self.short_circuit_at, ThreatLevel::High)
    }
}
