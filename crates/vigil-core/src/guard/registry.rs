//! Thread-safe registry of guards with lazy instantiation.

use std::sync::Arc;

use parking_lot::RwLock;

use super::Guard;
use crate::error::VigilError;

type GuardFactory = Box<dyn Fn() -> Arc<dyn Guard> + Send + Sync>;

enum GuardSlot {
    Ready(Arc<dyn Guard>),
    /// Deferred construction; the factory runs at most once, on first access.
    Pending(GuardFactory),
}

struct RegistryEntry {
    name: String,
    slot: GuardSlot,
}

/// Holds guard descriptors and hands the pipeline its execution list.
///
/// Entries keep registration order, which makes the priority sort stable on
/// ties: two guards with equal priority run in the order they were registered.
#[derive(Default)]
pub struct GuardRegistry {
    entries: RwLock<Vec<RegistryEntry>>,
}

impl GuardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructed guard. Re-registering a name replaces the
    /// previous entry in place.
    pub fn register(&self, guard: Arc<dyn Guard>) {
        let name = guard.name().to_string();
        tracing::debug!(guard = %name, priority = guard.priority(), "registering guard");
        self.insert(name, GuardSlot::Ready(guard));
    }

    /// Register a guard factory. Construction is deferred until the guard is
    /// first requested or the execution list is built.
    pub fn register_lazy<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Guard> + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!(guard = %name, "registering lazy guard");
        self.insert(name, GuardSlot::Pending(Box::new(factory)));
    }

    fn insert(&self, name: String, slot: GuardSlot) {
        let mut entries = self.entries.write();
        if let Some(existing) = entries.iter_mut().find(|e| e.name == name) {
            existing.slot = slot;
        } else {
            entries.push(RegistryEntry { name, slot });
        }
    }

    /// Look up a guard by name, forcing lazy construction if needed.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Guard>, VigilError> {
        let mut entries = self.entries.write();
        let entry = entries
            .iter_mut()
            .find(|e| e.name == name)
            .ok_or_else(|| VigilError::GuardNotFound(name.to_string()))?;
        Ok(Self::force(entry))
    }

    /// All registered guards in registration order, enabled or not.
    pub fn all(&self) -> Vec<(String, Arc<dyn Guard>)> {
        let mut entries = self.entries.write();
        entries
            .iter_mut()
            .map(|e| (e.name.clone(), Self::force(e)))
            .collect()
    }

    /// Enabled guards sorted by descending priority, stable on ties.
    ///
    /// This is the bulk path the pipeline consumes; it never fails, even when
    /// individual lookups by name would.
    pub fn enabled(&self) -> Vec<Arc<dyn Guard>> {
        let mut entries = self.entries.write();
        let mut guards: Vec<Arc<dyn Guard>> = entries
            .iter_mut()
            .map(Self::force)
            .filter(|g| g.enabled())
            .collect();
        // sort_by_key is stable, so registration order survives equal priorities.
        guards.sort_by_key(|g| std::cmp::Reverse(g.priority()));
        guards
    }

    fn force(entry: &mut RegistryEntry) -> Arc<dyn Guard> {
        if let GuardSlot::Pending(factory) = &entry.slot {
            let guard = factory();
            tracing::debug!(guard = %entry.name, "instantiated lazy guard");
            entry.slot = GuardSlot::Ready(guard);
        }
        match &entry.slot {
            GuardSlot::Ready(guard) => Arc::clone(guard),
            GuardSlot::Pending(_) => unreachable!("slot forced above"),
        }
    }
}
