//! Progressive enforcement staging.
//!
//! Counts raw occurrences per `(guard, actor)` key over a sliding window and
//! maps the count onto staged response modes, e.g. `{1: log, 3: alert,
//! 5: block}`. Deliberately severity-blind: repeated low-level probing
//! escalates just like repeated high-level hits. Severity-aware escalation is
//! the [`CorrelationEngine`](crate::correlation::CorrelationEngine)'s job;
//! the two are complementary.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::context::InspectionContext;
use crate::store::{MemoryStore, StateStore};
use crate::threat::{ResponseMode, ThreatLevel};

const KEY_PREFIX: &str = "enforcement:";
const SHARD_COUNT: usize = 16;

/// Progressive enforcement configuration.
///
/// Stage values are mode names resolved through
/// [`ResponseMode::from_str_or`]; unrecognized names fall back to `log`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnforcementConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Occurrence threshold → response mode name.
    #[serde(default = "default_stages")]
    pub stages: BTreeMap<String, String>,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    /// Context group appended to the guard name when building keys.
    #[serde(default = "default_group_by")]
    pub group_by: String,
}

fn default_true() -> bool {
    true
}

fn default_stages() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("1".to_string(), "log".to_string()),
        ("3".to_string(), "alert".to_string()),
        ("5".to_string(), "block".to_string()),
    ])
}

fn default_window_seconds() -> u64 {
    300
}

fn default_group_by() -> String {
    "ip".to_string()
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stages: default_stages(),
            window_seconds: default_window_seconds(),
            group_by: default_group_by(),
        }
    }
}

/// Maps per-key occurrence counts onto staged response modes.
pub struct ProgressiveEnforcement {
    config: EnforcementConfig,
    /// Thresholds resolved once at construction, ascending.
    stages: BTreeMap<u64, ResponseMode>,
    store: Arc<dyn StateStore>,
    shards: Vec<Mutex<()>>,
}

impl ProgressiveEnforcement {
    pub fn new(config: EnforcementConfig) -> Self {
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }

    pub fn with_store(config: EnforcementConfig, store: Arc<dyn StateStore>) -> Self {
        let mut stages = BTreeMap::new();
        for (threshold, mode) in &config.stages {
            match threshold.parse::<u64>() {
                Ok(t) => {
                    stages.insert(t, ResponseMode::from_str_or(mode, ResponseMode::Log));
                }
                Err(_) => {
                    tracing::warn!(threshold = %threshold, "ignoring non-numeric stage threshold");
                }
            }
        }
        Self {
            config,
            stages,
            store,
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Record one occurrence for `(guard_name, actor)` and return the staged
    /// response for the updated count. Always `Log` when disabled.
    pub fn record_and_determine_response(
        &self,
        ctx: &dyn InspectionContext,
        level: ThreatLevel,
        guard_name: &str,
    ) -> ResponseMode {
        self.record_and_determine_response_at(ctx, level, guard_name, Utc::now())
    }

    pub fn record_and_determine_response_at(
        &self,
        ctx: &dyn InspectionContext,
        level: ThreatLevel,
        guard_name: &str,
        now: DateTime<Utc>,
    ) -> ResponseMode {
        if !self.config.enabled {
            return ResponseMode::Log;
        }

        let key = self.key_for(ctx, guard_name);
        let _guard = self.shard_for(&key).lock();

        let mut timestamps = self.load(&key);
        timestamps.push(now);
        self.prune(&mut timestamps, now);
        self.save(&key, &timestamps);

        let count = timestamps.len() as u64;
        let mode = self.determine_response_mode(count);
        tracing::debug!(
            key = %key,
            level = %level,
            count,
            mode = %mode,
            "progressive enforcement staged response"
        );
        mode
    }

    /// Pure count → mode mapping: the highest configured threshold at or
    /// below `count` wins; below every threshold the default is `Log`.
    pub fn determine_response_mode(&self, count: u64) -> ResponseMode {
        let mut mode = ResponseMode::Log;
        for (&threshold, &stage_mode) in &self.stages {
            if threshold <= count {
                mode = stage_mode;
            } else {
                break;
            }
        }
        mode
    }

    /// Occurrences currently inside the window for `(guard_name, actor)`.
    pub fn count(&self, ctx: &dyn InspectionContext, guard_name: &str) -> u64 {
        self.count_at(ctx, guard_name, Utc::now())
    }

    pub fn count_at(
        &self,
        ctx: &dyn InspectionContext,
        guard_name: &str,
        now: DateTime<Utc>,
    ) -> u64 {
        let key = self.key_for(ctx, guard_name);
        let _guard = self.shard_for(&key).lock();

        let mut timestamps = self.load(&key);
        self.prune(&mut timestamps, now);
        self.save(&key, &timestamps);
        timestamps.len() as u64
    }

    pub fn should_block(&self, ctx: &dyn InspectionContext, guard_name: &str) -> bool {
        self.determine_response_mode(self.count(ctx, guard_name)) == ResponseMode::Block
    }

    pub fn clear_for(&self, ctx: &dyn InspectionContext, guard_name: &str) {
        let key = self.key_for(ctx, guard_name);
        let _guard = self.shard_for(&key).lock();
        self.store.delete(&key);
    }

    pub fn flush(&self) {
        for key in self.store.keys() {
            if key.starts_with(KEY_PREFIX) {
                self.store.delete(&key);
            }
        }
    }

    fn key_for(&self, ctx: &dyn InspectionContext, guard_name: &str) -> String {
        format!(
            "{KEY_PREFIX}{guard_name}:{}",
            ctx.correlation_key(&self.config.group_by)
        )
    }

    fn shard_for(&self, key: &str) -> &Mutex<()> {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[hasher.finish() as usize % SHARD_COUNT]
    }

    fn load(&self, key: &str) -> Vec<DateTime<Utc>> {
        match self.store.get(key) {
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                tracing::warn!(key = %key, error = %e, "discarding corrupt enforcement bucket");
                Vec::new()
            }),
            None => Vec::new(),
        }
    }

    fn save(&self, key: &str, timestamps: &[DateTime<Utc>]) {
        if timestamps.is_empty() {
            self.store.delete(key);
        } else {
            let ttl = Duration::from_secs(self.config.window_seconds);
            match serde_json::to_value(timestamps) {
                Ok(value) => self.store.put_with_ttl(key, value, ttl),
                Err(e) => tracing::warn!(key = %key, error = %e, "failed to persist bucket"),
            }
        }
    }

    fn prune(&self, timestamps: &mut Vec<DateTime<Utc>>, now: DateTime<Utc>) {
        let cutoff = now - chrono::Duration::seconds(self.config.window_seconds as i64);
        timestamps.retain(|t| *t >= cutoff);
    }
}
