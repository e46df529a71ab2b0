//! Strategy-driven guard execution.
//!
//! [`InspectionPipeline::execute`] runs a priority-ordered guard list against
//! one input/context pair. Guards run sequentially on the calling thread; the
//! configured [`PipelineStrategy`] decides when a run stops early. Disabled
//! guards never reach the pipeline; filtering happens in
//! [`GuardRegistry::enabled`](crate::guard::GuardRegistry::enabled).

mod outcome;

pub use outcome::{PipelineResult, ThreatSummary};

use std::sync::Arc;
use std::time::Instant;

use serde_json::json;

use crate::config::PipelineConfig;
use crate::context::InspectionContext;
use crate::guard::{Guard, GuardResult};
use crate::threat::ThreatLevel;

/// Policy controlling when guard execution within one call stops early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStrategy {
    /// Run every guard regardless of verdicts.
    Full,
    /// Stop once a failing verdict reaches the configured level.
    ShortCircuit,
    /// Stop once the accumulated failing weight reaches the configured score.
    Threshold,
}

impl PipelineStrategy {
    /// Parse a strategy name, falling back to `ShortCircuit` for unrecognized
    /// strings.
    pub fn from_str_or_default(s: &str) -> PipelineStrategy {
        match s {
            "full" => PipelineStrategy::Full,
            "short_circuit" => PipelineStrategy::ShortCircuit,
            "threshold" => PipelineStrategy::Threshold,
            _ => {
                tracing::debug!(value = s, "unrecognized strategy, using short_circuit");
                PipelineStrategy::ShortCircuit
            }
        }
    }
}

/// Executes guards in order under a stop strategy.
///
/// Holds configuration only; per-call counters are locals, so a shared
/// pipeline can serve concurrent inspection calls.
pub struct InspectionPipeline {
    strategy: PipelineStrategy,
    short_circuit_at: ThreatLevel,
    threshold_score: u32,
}

impl InspectionPipeline {
    pub fn new(
        strategy: PipelineStrategy,
        short_circuit_at: ThreatLevel,
        threshold_score: u32,
    ) -> Self {
        Self {
            strategy,
            short_circuit_at,
            threshold_score,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.strategy(),
            config.short_circuit_at(),
            config.threshold_score,
        )
    }

    /// Run `guards` in the given order against one input/context pair.
    pub fn execute(
        &self,
        guards: &[Arc<dyn Guard>],
        input: &str,
        ctx: &dyn InspectionContext,
    ) -> PipelineResult {
        let start = Instant::now();
        let mut results: Vec<GuardResult> = Vec::with_capacity(guards.len());
        let mut executed = 0usize;
        let mut skipped = 0usize;
        let mut running_score: u32 = 0;

        for guard in guards {
            if let Some(aware) = guard.as_context_aware() {
                if !aware.applies_to(ctx) {
                    tracing::debug!(guard = guard.name(), "guard not applicable, skipped");
                    skipped += 1;
                    continue;
                }
            }

            let guard_start = Instant::now();
            let mut result = self.run_guard(guard.as_ref(), input, ctx);
            let elapsed_ms = guard_start.elapsed().as_secs_f64() * 1000.0;
            result
                .metadata
                .insert("duration_ms".to_string(), json!(elapsed_ms));

            let level = result.threat_level;
            let failed = result.failed();
            results.push(result);
            executed += 1;

            // Stop check runs before this verdict's weight is folded into the
            // running score.
            let stop = match self.strategy {
                PipelineStrategy::Full => false,
                PipelineStrategy::ShortCircuit => {
                    failed && level.weight() >= self.short_circuit_at.weight()
                }
                PipelineStrategy::Threshold => {
                    failed && running_score + level.weight() >= self.threshold_score
                }
            };
            if stop {
                tracing::debug!(
                    guard = guard.name(),
                    level = %level,
                    strategy = ?self.strategy,
                    "pipeline stopped early"
                );
                break;
            }
            if self.strategy == PipelineStrategy::Threshold {
                running_score += level.weight();
            }
        }

        PipelineResult {
            results,
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
            guards_executed: executed,
            guards_skipped: skipped,
        }
    }

    /// Execute one guard through its tiered path when present, isolating
    /// faults.
    ///
    /// Fault policy is fail-open: an `Err` from any scan path becomes a
    /// passing `None`-level verdict with the message "inspection failed" and
    /// the error recorded in metadata, and the pipeline continues.
    fn run_guard(
        &self,
        guard: &dyn Guard,
        input: &str,
        ctx: &dyn InspectionContext,
    ) -> GuardResult {
        let verdict = match guard.as_tiered() {
            Some(tiered) => match tiered.quick_scan(input, ctx) {
                Ok(false) => Ok(GuardResult::pass(guard.name()).with_message("quick scan passed")),
                Ok(true) => tiered.deep_inspection(input, ctx),
                Err(e) => Err(e),
            },
            None => guard.inspect(input, ctx),
        };

        match verdict {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(guard = guard.name(), error = %e, "guard fault isolated");
                GuardResult::pass(guard.name())
                    .with_message("inspection failed")
                    .with_metadata("error", json!(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::anyhow;

    use super::*;
    use crate::context::RequestContext;
    use crate::guard::{ContextAware, Tiered};

    struct FixedGuard {
        name: String,
        priority: i32,
        level: ThreatLevel,
    }

    impl FixedGuard {
        fn passing(name: &str, priority: i32) -> Arc<dyn Guard> {
            Arc::new(Self {
                name: name.to_string(),
                priority,
                level: ThreatLevel::None,
            })
        }

        fn failing(name: &str, priority: i32, level: ThreatLevel) -> Arc<dyn Guard> {
            Arc::new(Self {
                name: name.to_string(),
                priority,
                level,
            })
        }
    }

    impl Guard for FixedGuard {
        fn name(&self) -> &str {
            &self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn inspect(&self, _: &str, _: &dyn InspectionContext) -> anyhow::Result<GuardResult> {
            if self.level == ThreatLevel::None {
                Ok(GuardResult::pass(&self.name))
            } else {
                Ok(GuardResult::fail(&self.name, self.level, "detected"))
            }
        }
    }

    struct InapplicableGuard;

    impl Guard for InapplicableGuard {
        fn name(&self) -> &str {
            "inapplicable"
        }

        fn priority(&self) -> i32 {
            100
        }

        fn inspect(&self, _: &str, _: &dyn InspectionContext) -> anyhow::Result<GuardResult> {
            panic!("inspect must not run for skipped guards");
        }

        fn as_context_aware(&self) -> Option<&dyn ContextAware> {
            Some(self)
        }
    }

    impl ContextAware for InapplicableGuard {
        fn applies_to(&self, _: &dyn InspectionContext) -> bool {
            false
        }
    }

    struct TieredGuard {
        suspicious: bool,
        deep_calls: AtomicUsize,
    }

    impl Guard for TieredGuard {
        fn name(&self) -> &str {
            "tiered"
        }

        fn priority(&self) -> i32 {
            1
        }

        fn inspect(&self, _: &str, _: &dyn InspectionContext) -> anyhow::Result<GuardResult> {
            panic!("tiered guards dispatch through quick_scan/deep_inspection");
        }

        fn as_tiered(&self) -> Option<&dyn Tiered> {
            Some(self)
        }
    }

    impl Tiered for TieredGuard {
        fn quick_scan(&self, _: &str, _: &dyn InspectionContext) -> anyhow::Result<bool> {
            Ok(self.suspicious)
        }

        fn deep_inspection(&self, _: &str, _: &dyn InspectionContext) -> anyhow::Result<GuardResult> {
            self.deep_calls.fetch_add(1, Ordering::SeqCst);
            Ok(GuardResult::fail(
                "tiered",
                ThreatLevel::High,
                "deep analysis hit",
            ))
        }
    }

    struct FaultyGuard;

    impl Guard for FaultyGuard {
        fn name(&self) -> &str {
            "faulty"
        }

        fn priority(&self) -> i32 {
            50
        }

        fn inspect(&self, _: &str, _: &dyn InspectionContext) -> anyhow::Result<GuardResult> {
            Err(anyhow!("backend unavailable"))
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::new("10.0.0.1")
    }

    fn full_pipeline() -> InspectionPipeline {
        InspectionPipeline::new(PipelineStrategy::Full, ThreatLevel::High, 0)
    }

    #[test]
    fn short_circuit_stops_at_configured_level() {
        let guards = vec![
            FixedGuard::failing("a", 10, ThreatLevel::Low),
            FixedGuard::failing("b", 5, ThreatLevel::High),
            FixedGuard::failing("c", 1, ThreatLevel::Critical),
        ];
        let pipeline =
            InspectionPipeline::new(PipelineStrategy::ShortCircuit, ThreatLevel::High, 0);

        let out = pipeline.execute(&guards, "payload", &ctx());

        assert_eq!(out.guards_executed, 2);
        let names: Vec<&str> = out.results.iter().map(|r| r.guard_name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn threshold_stops_when_score_reached() {
        // Failing weights [2, 2, 2] against a threshold of 4: guard 1 leaves
        // the running score at 2, guard 2 trips 2 + 2 >= 4.
        let guards = vec![
            FixedGuard::failing("a", 10, ThreatLevel::Medium),
            FixedGuard::failing("b", 5, ThreatLevel::Medium),
            FixedGuard::failing("c", 1, ThreatLevel::Medium),
        ];
        let pipeline = InspectionPipeline::new(PipelineStrategy::Threshold, ThreatLevel::High, 4);

        let out = pipeline.execute(&guards, "payload", &ctx());

        assert_eq!(out.guards_executed, 2);
        assert_eq!(out.results.len(), 2);
    }

    #[test]
    fn threshold_ignores_passing_results() {
        let guards = vec![
            FixedGuard::passing("a", 10),
            FixedGuard::passing("b", 5),
            FixedGuard::failing("c", 1, ThreatLevel::Medium),
        ];
        let pipeline = InspectionPipeline::new(PipelineStrategy::Threshold, ThreatLevel::High, 2);

        let out = pipeline.execute(&guards, "payload", &ctx());

        // Passing guards contribute zero weight; only the final failing guard
        // trips the threshold, after everything already ran.
        assert_eq!(out.guards_executed, 3);
    }

    #[test]
    fn full_strategy_never_stops() {
        let guards = vec![
            FixedGuard::failing("a", 10, ThreatLevel::Critical),
            FixedGuard::failing("b", 5, ThreatLevel::Critical),
            FixedGuard::passing("c", 1),
        ];
        let out = full_pipeline().execute(&guards, "payload", &ctx());

        assert_eq!(out.guards_executed, 3);
        assert_eq!(out.highest_threat_level(), ThreatLevel::Critical);
    }

    #[test]
    fn inapplicable_guard_skipped_not_executed() {
        let guards: Vec<Arc<dyn Guard>> = vec![
            Arc::new(InapplicableGuard),
            FixedGuard::passing("runs", 1),
        ];
        let out = full_pipeline().execute(&guards, "payload", &ctx());

        assert_eq!(out.guards_skipped, 1);
        assert_eq!(out.guards_executed, 1);
        assert_eq!(out.results.len(), 1);
        assert_eq!(out.results[0].guard_name, "runs");
    }

    #[test]
    fn quick_scan_negative_skips_deep_inspection() {
        let guard = Arc::new(TieredGuard {
            suspicious: false,
            deep_calls: AtomicUsize::new(0),
        });
        let guards: Vec<Arc<dyn Guard>> = vec![guard.clone()];
        let out = full_pipeline().execute(&guards, "payload", &ctx());

        assert_eq!(guard.deep_calls.load(Ordering::SeqCst), 0);
        assert!(out.results[0].passed);
        assert_eq!(out.results[0].message, "quick scan passed");
    }

    #[test]
    fn quick_scan_positive_runs_deep_inspection() {
        let guard = Arc::new(TieredGuard {
            suspicious: true,
            deep_calls: AtomicUsize::new(0),
        });
        let guards: Vec<Arc<dyn Guard>> = vec![guard.clone()];
        let out = full_pipeline().execute(&guards, "payload", &ctx());

        assert_eq!(guard.deep_calls.load(Ordering::SeqCst), 1);
        assert!(out.results[0].failed());
        assert_eq!(out.results[0].threat_level, ThreatLevel::High);
    }

    #[test]
    fn guard_fault_is_isolated_and_recorded() {
        let guards: Vec<Arc<dyn Guard>> =
            vec![Arc::new(FaultyGuard), FixedGuard::passing("after", 1)];
        let out = full_pipeline().execute(&guards, "payload", &ctx());

        // The guard after the fault still runs.
        assert_eq!(out.guards_executed, 2);

        let fault = &out.results[0];
        assert!(fault.passed);
        assert_eq!(fault.threat_level, ThreatLevel::None);
        assert_eq!(fault.message, "inspection failed");
        assert_eq!(
            fault.metadata["error"].as_str().unwrap(),
            "backend unavailable"
        );
    }

    #[test]
    fn duration_metadata_attached_to_every_result() {
        let guards = vec![FixedGuard::passing("a", 1), FixedGuard::failing("b", 0, ThreatLevel::Low)];
        let out = full_pipeline().execute(&guards, "payload", &ctx());

        for result in &out.results {
            assert!(result.metadata["duration_ms"].as_f64().unwrap() >= 0.0);
        }
    }

    #[test]
    fn strategy_parse_with_fallback() {
        assert_eq!(
            PipelineStrategy::from_str_or_default("full"),
            PipelineStrategy::Full
        );
        assert_eq!(
            PipelineStrategy::from_str_or_default("threshold"),
            PipelineStrategy::Threshold
        );
        assert_eq!(
            PipelineStrategy::from_str_or_default("parallel"),
            PipelineStrategy::ShortCircuit
        );
    }
}
