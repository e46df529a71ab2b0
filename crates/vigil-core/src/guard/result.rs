//! Per-guard verdict type.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::threat::ThreatLevel;

/// The verdict a single guard produced for one input.
///
/// Metadata preserves insertion order so reports read in the order guards
/// attached their evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardResult {
    pub guard_name: String,
    pub passed: bool,
    pub threat_level: ThreatLevel,
    pub message: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
}

impl GuardResult {
    /// A passing verdict with no threat attached.
    pub fn pass(guard_name: impl Into<String>) -> Self {
        Self {
            guard_name: guard_name.into(),
            passed: true,
            threat_level: ThreatLevel::None,
            message: String::new(),
            metadata: serde_json::Map::new(),
        }
    }

    /// A failing verdict at the given level.
    pub fn fail(
        guard_name: impl Into<String>,
        threat_level: ThreatLevel,
        message: impl Into<String>,
    ) -> Self {
        Self {
            guard_name: guard_name.into(),
            passed: false,
            threat_level,
            message: message.into(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn failed(&self) -> bool {
        !self.passed
    }
}
