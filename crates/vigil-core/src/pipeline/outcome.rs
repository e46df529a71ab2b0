//! Aggregate view over one pipeline run.

use serde::{Deserialize, Serialize};

use crate::guard::GuardResult;
use crate::threat::ThreatLevel;

/// The ordered verdicts and counters from a single inspection call.
///
/// Produced once per call and immutable afterwards; all derived views are
/// pure reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Verdicts in execution order.
    pub results: Vec<GuardResult>,
    pub duration_ms: f64,
    pub guards_executed: usize,
    pub guards_skipped: usize,
}

impl PipelineResult {
    pub fn all_passed(&self) -> bool {
        !self.results.iter().any(|r| r.failed())
    }

    /// Highest-weight level present; `None` for an empty run.
    pub fn highest_threat_level(&self) -> ThreatLevel {
        self.results
            .iter()
            .map(|r| r.threat_level)
            .max()
            .unwrap_or(ThreatLevel::None)
    }

    pub fn failed_results(&self) -> Vec<&GuardResult> {
        self.results.iter().filter(|r| r.failed()).collect()
    }

    pub fn results_at_or_above(&self, level: ThreatLevel) -> Vec<&GuardResult> {
        self.results
            .iter()
            .filter(|r| r.threat_level >= level)
            .collect()
    }

    pub fn summary(&self) -> ThreatSummary {
        ThreatSummary::from_results(&self.results)
    }
}

/// Per-level verdict counts for report emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatSummary {
    pub total: usize,
    pub failed: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl ThreatSummary {
    pub fn from_results(results: &[GuardResult]) -> Self {
        let count = |level| {
            results
                .iter()
                .filter(|r| r.failed() && r.threat_level == level)
                .count()
        };
        Self {
            total: results.len(),
            failed: results.iter().filter(|r| r.failed()).count(),
            critical: count(ThreatLevel::Critical),
            high: count(ThreatLevel::High),
            medium: count(ThreatLevel::Medium),
            low: count(ThreatLevel::Low),
        }
    }
}
