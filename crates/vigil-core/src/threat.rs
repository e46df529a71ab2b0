//! Threat severity levels and response modes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity classification for a guard verdict.
///
/// Levels are totally ordered by weight: `None < Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl ThreatLevel {
    /// Numeric weight used for ordering and threshold arithmetic.
    pub fn weight(&self) -> u32 {
        match self {
            ThreatLevel::None => 0,
            ThreatLevel::Low => 1,
            ThreatLevel::Medium => 2,
            ThreatLevel::High => 3,
            ThreatLevel::Critical => 4,
        }
    }

    /// Parse a level from its lowercase name, falling back to `default` for
    /// unrecognized strings.
    pub fn from_str_or(s: &str, default: ThreatLevel) -> ThreatLevel {
        match s {
            "none" => ThreatLevel::None,
            "low" => ThreatLevel::Low,
            "medium" => ThreatLevel::Medium,
            "high" => ThreatLevel::High,
            "critical" => ThreatLevel::Critical,
            _ => {
                tracing::debug!(value = s, "unrecognized threat level, using default");
                default
            }
        }
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreatLevel::None => write!(f, "NONE"),
            ThreatLevel::Low => write!(f, "LOW"),
            ThreatLevel::Medium => write!(f, "MEDIUM"),
            ThreatLevel::High => write!(f, "HIGH"),
            ThreatLevel::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl Ord for ThreatLevel {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.weight().cmp(&other.weight())
    }
}

impl PartialOrd for ThreatLevel {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Action class chosen for a detected condition.
///
/// The core only classifies; acting on the mode (denying a request, emitting
/// an alert) is the caller's responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    Block,
    Alert,
    Log,
    Silent,
    DryRun,
}

impl ResponseMode {
    /// Parse a mode from its lowercase name, falling back to `default` for
    /// unrecognized strings.
    pub fn from_str_or(s: &str, default: ResponseMode) -> ResponseMode {
        match s {
            "block" => ResponseMode::Block,
            "alert" => ResponseMode::Alert,
            "log" => ResponseMode::Log,
            "silent" => ResponseMode::Silent,
            "dry_run" => ResponseMode::DryRun,
            _ => {
                tracing::debug!(value = s, "unrecognized response mode, using default");
                default
            }
        }
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseMode::Block => write!(f, "block"),
            ResponseMode::Alert => write!(f, "alert"),
            ResponseMode::Log => write!(f, "log"),
            ResponseMode::Silent => write!(f, "silent"),
            ResponseMode::DryRun => write!(f, "dry_run"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_ordering_follows_weight() {
        assert!(ThreatLevel::None < ThreatLevel::Low);
        assert!(ThreatLevel::Low < ThreatLevel::Medium);
        assert!(ThreatLevel::Medium < ThreatLevel::High);
        assert!(ThreatLevel::High < ThreatLevel::Critical);
        assert_eq!(ThreatLevel::Critical.weight(), 4);
        assert_eq!(ThreatLevel::None.weight(), 0);
    }

    #[test]
    fn level_parse_with_fallback() {
        assert_eq!(
            ThreatLevel::from_str_or("high", ThreatLevel::None),
            ThreatLevel::High
        );
        assert_eq!(
            ThreatLevel::from_str_or("bogus", ThreatLevel::Medium),
            ThreatLevel::Medium
        );
    }

    #[test]
    fn mode_parse_with_fallback() {
        assert_eq!(
            ResponseMode::from_str_or("block", ResponseMode::Log),
            ResponseMode::Block
        );
        assert_eq!(
            ResponseMode::from_str_or("dry_run", ResponseMode::Log),
            ResponseMode::DryRun
        );
        // Unknown strings resolve to the supplied default rather than failing.
        assert_eq!(
            ResponseMode::from_str_or("quarantine", ResponseMode::Log),
            ResponseMode::Log
        );
    }

    #[test]
    fn level_serde_roundtrip() {
        let json = serde_json::to_string(&ThreatLevel::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        let level: ThreatLevel = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(level, ThreatLevel::Medium);
    }
}
