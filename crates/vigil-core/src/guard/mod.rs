//! Guard contract and optional capabilities.
//!
//! A guard is a pluggable detector: it inspects one input/context pair and
//! reports a [`GuardResult`]. Optional behaviors are modeled as capability
//! accessors rather than an inheritance hierarchy: the pipeline probes
//! [`Guard::as_context_aware`] and [`Guard::as_tiered`] at dispatch time and
//! falls back to plain [`Guard::inspect`] when a capability is absent.

mod registry;
mod result;

pub use registry::GuardRegistry;
pub use result::GuardResult;

use anyhow::Result;

use crate::context::InspectionContext;

/// A pluggable input detector.
pub trait Guard: Send + Sync {
    fn name(&self) -> &str;

    /// Higher priority runs first.
    fn priority(&self) -> i32;

    fn enabled(&self) -> bool {
        true
    }

    /// Inspect the input and produce a verdict.
    ///
    /// Errors are isolated by the pipeline: a failing guard never aborts the
    /// guards queued after it.
    fn inspect(&self, input: &str, ctx: &dyn InspectionContext) -> Result<GuardResult>;

    /// Capability probe: guards that can declare themselves inapplicable to a
    /// request return `Some(self)` here.
    fn as_context_aware(&self) -> Option<&dyn ContextAware> {
        None
    }

    /// Capability probe: guards with a cheap pre-filter in front of an
    /// expensive analysis return `Some(self)` here.
    fn as_tiered(&self) -> Option<&dyn Tiered> {
        None
    }
}

/// A guard that can opt out of inspecting a given request entirely.
pub trait ContextAware {
    /// When false, the guard is skipped: not executed and not counted.
    fn applies_to(&self, ctx: &dyn InspectionContext) -> bool;
}

/// A guard with a two-tier scan path.
pub trait Tiered {
    /// Cheap pre-filter. Returns true when the input looks suspicious and the
    /// deep path should run.
    fn quick_scan(&self, input: &str, ctx: &dyn InspectionContext) -> Result<bool>;

    /// Full analysis, only invoked after a positive quick scan.
    fn deep_inspection(&self, input: &str, ctx: &dyn InspectionContext) -> Result<GuardResult>;
}
