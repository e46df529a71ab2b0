//! Sliding-window threat correlation.
//!
//! The engine keeps a bounded, time-windowed event history per correlation
//! key (for example per source IP) and escalates a threat level when enough
//! same-or-higher-severity events accumulate inside the window. Pruning is
//! lazy: stale events are discarded whenever a key is read, there is no
//! background sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::context::InspectionContext;
use crate::guard::GuardResult;
use crate::store::{MemoryStore, StateStore};
use crate::threat::ThreatLevel;

const KEY_PREFIX: &str = "correlation:";
const SHARD_COUNT: usize = 16;

/// Correlation engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Trailing interval over which events are considered related.
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    #[serde(default)]
    pub rules: Vec<CorrelationRule>,
    /// Context groups whose keys are concatenated into the bucket key.
    #[serde(default = "default_group_by")]
    pub group_by: Vec<String>,
    /// Oldest events are evicted first once a key exceeds this bound.
    #[serde(default = "default_max_events_per_key")]
    pub max_events_per_key: usize,
}

fn default_true() -> bool {
    true
}

fn default_window_seconds() -> u64 {
    300
}

fn default_group_by() -> Vec<String> {
    vec!["ip".to_string()]
}

fn default_max_events_per_key() -> usize {
    100
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_seconds: default_window_seconds(),
            rules: Vec::new(),
            group_by: default_group_by(),
            max_events_per_key: default_max_events_per_key(),
        }
    }
}

/// "If at least `count` events at or above `source_level` sit in the window,
/// escalate to `target_level`."
///
/// Rules are evaluated in configuration order; a later matching rule wins
/// only when its target is strictly higher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationRule {
    pub source_level: ThreatLevel,
    pub count: usize,
    pub target_level: ThreatLevel,
}

/// One failing verdict recorded against a correlation key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationEvent {
    pub level: ThreatLevel,
    pub timestamp: DateTime<Utc>,
    pub guard_name: String,
}

/// Severity-aware escalation over recurring failures from the same actor.
pub struct CorrelationEngine {
    config: CorrelationConfig,
    store: Arc<dyn StateStore>,
    /// Per-key append-and-prune must be atomic across concurrent inspection
    /// calls; keys hash onto these shard locks.
    shards: Vec<Mutex<()>>,
}

impl CorrelationEngine {
    pub fn new(config: CorrelationConfig) -> Self {
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }

    pub fn with_store(config: CorrelationConfig, store: Arc<dyn StateStore>) -> Self {
        Self {
            config,
            store,
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Record a failing verdict and evaluate escalation for its key.
    ///
    /// Returns the escalated level when a rule fires with a target strictly
    /// above the verdict's own level; `None` when disabled, when the verdict
    /// passed, or when no rule escalates.
    pub fn record_and_evaluate(
        &self,
        result: &GuardResult,
        ctx: &dyn InspectionContext,
    ) -> Option<ThreatLevel> {
        self.record_and_evaluate_at(result, ctx, Utc::now())
    }

    pub fn record_and_evaluate_at(
        &self,
        result: &GuardResult,
        ctx: &dyn InspectionContext,
        now: DateTime<Utc>,
    ) -> Option<ThreatLevel> {
        if !self.config.enabled || result.passed {
            return None;
        }

        let key = self.key_for(ctx);
        let _guard = self.shard_for(&key).lock();

        let mut events = self.load(&key);
        events.push(CorrelationEvent {
            level: result.threat_level,
            timestamp: now,
            guard_name: result.guard_name.clone(),
        });
        while events.len() > self.config.max_events_per_key {
            events.remove(0);
        }
        self.prune(&mut events, now);
        self.save(&key, &events);

        let escalated = self.evaluate_rules(&events, result.threat_level);
        if let Some(level) = escalated {
            tracing::debug!(
                key = %key,
                from = %result.threat_level,
                to = %level,
                "correlation escalated threat level"
            );
        }
        escalated
    }

    /// Evaluate escalation for the context's key without recording anything.
    pub fn evaluate(&self, ctx: &dyn InspectionContext) -> Option<ThreatLevel> {
        self.evaluate_at(ctx, Utc::now())
    }

    pub fn evaluate_at(
        &self,
        ctx: &dyn InspectionContext,
        now: DateTime<Utc>,
    ) -> Option<ThreatLevel> {
        let key = self.key_for(ctx);
        let _guard = self.shard_for(&key).lock();

        let mut events = self.load(&key);
        self.prune(&mut events, now);
        self.save(&key, &events);

        self.evaluate_rules(&events, ThreatLevel::None)
    }

    /// Events currently in the window for the context's key.
    pub fn events(&self, ctx: &dyn InspectionContext) -> Vec<CorrelationEvent> {
        self.events_at(ctx, Utc::now())
    }

    pub fn events_at(&self, ctx: &dyn InspectionContext, now: DateTime<Utc>) -> Vec<CorrelationEvent> {
        let key = self.key_for(ctx);
        let _guard = self.shard_for(&key).lock();

        let mut events = self.load(&key);
        self.prune(&mut events, now);
        self.save(&key, &events);
        events
    }

    pub fn event_count(&self, ctx: &dyn InspectionContext) -> usize {
        self.events(ctx).len()
    }

    /// Drop all events for the context's key.
    pub fn clear_for(&self, ctx: &dyn InspectionContext) {
        let key = self.key_for(ctx);
        let _guard = self.shard_for(&key).lock();
        self.store.delete(&key);
    }

    /// Drop all correlation state.
    pub fn flush(&self) {
        for key in self.store.keys() {
            if key.starts_with(KEY_PREFIX) {
                self.store.delete(&key);
            }
        }
    }

    fn key_for(&self, ctx: &dyn InspectionContext) -> String {
        let parts: Vec<String> = self
            .config
            .group_by
            .iter()
            .map(|group| ctx.correlation_key(group))
            .collect();
        format!("{KEY_PREFIX}{}", parts.join(":"))
    }

    fn shard_for(&self, key: &str) -> &Mutex<()> {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[hasher.finish() as usize % SHARD_COUNT]
    }

    fn load(&self, key: &str) -> Vec<CorrelationEvent> {
        match self.store.get(key) {
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                tracing::warn!(key = %key, error = %e, "discarding corrupt correlation bucket");
                Vec::new()
            }),
            None => Vec::new(),
        }
    }

    /// Write back a bucket; fully pruned keys are removed outright.
    fn save(&self, key: &str, events: &[CorrelationEvent]) {
        if events.is_empty() {
            self.store.delete(key);
        } else {
            let ttl = Duration::from_secs(self.config.window_seconds);
            match serde_json::to_value(events) {
                Ok(value) => self.store.put_with_ttl(key, value, ttl),
                Err(e) => tracing::warn!(key = %key, error = %e, "failed to persist bucket"),
            }
        }
    }

    fn prune(&self, events: &mut Vec<CorrelationEvent>, now: DateTime<Utc>) {
        let cutoff = now - chrono::Duration::seconds(self.config.window_seconds as i64);
        events.retain(|e| e.timestamp >= cutoff);
    }

    fn evaluate_rules(
        &self,
        events: &[CorrelationEvent],
        baseline: ThreatLevel,
    ) -> Option<ThreatLevel> {
        let mut escalated: Option<ThreatLevel> = None;
        for rule in &self.config.rules {
            let matching = events
                .iter()
                .filter(|e| e.level.weight() >= rule.source_level.weight())
                .count();
            if matching >= rule.count
                && rule.target_level > baseline
                && escalated.map_or(true, |current| rule.target_level > current)
            {
                escalated = Some(rule.target_level);
            }
        }
        escalated
    }
}
