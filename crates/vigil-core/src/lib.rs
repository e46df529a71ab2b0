//! # vigil-core
//!
//! Request inspection core: an ordered, strategy-driven pipeline of pluggable
//! detectors ("guards") plus the correlation and progressive-enforcement
//! machinery that escalates responses when related threat signals recur from
//! the same actor.
//!
//! The crate classifies, it never acts: the outer layer (HTTP middleware, a
//! proxy, a job runner) consumes the returned [`PipelineResult`],
//! [`ThreatLevel`] escalations, and [`ResponseMode`] decisions and chooses
//! what to do with them.

pub mod config;
pub mod context;
pub mod correlation;
pub mod enforcement;
pub mod error;
pub mod guard;
pub mod pipeline;
pub mod store;
pub mod threat;

pub use config::{PipelineConfig, VigilConfig};
pub use context::{InspectionContext, RequestContext};
pub use correlation::{CorrelationConfig, CorrelationEngine, CorrelationEvent, CorrelationRule};
pub use enforcement::{EnforcementConfig, ProgressiveEnforcement};
pub use error::VigilError;
pub use guard::{ContextAware, Guard, GuardRegistry, GuardResult, Tiered};
pub use pipeline::{InspectionPipeline, PipelineResult, PipelineStrategy, ThreatSummary};
pub use store::{MemoryStore, StateStore};
pub use threat::{ResponseMode, ThreatLevel};
