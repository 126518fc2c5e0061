//! Per-entity monotonic row-index allocation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Process-wide source of row indices, one counter per entity type.
///
/// Every call to [`SequenceSource::next`] for an entity returns a distinct
/// value; N calls issued from any number of tasks cover exactly
/// `[base, base + N)`. Workers resolve a [`Sequence`] handle once per work
/// item and then draw from it with a single atomic increment.
#[derive(Debug, Default)]
pub struct SequenceSource {
    counters: Mutex<HashMap<String, Arc<AtomicU64>>>,
}

/// Handle to one entity's counter.
#[derive(Debug, Clone)]
pub struct Sequence(Arc<AtomicU64>);

impl Sequence {
    /// Draw the next index.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }

    /// The value the next draw will return.
    pub fn peek(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl SequenceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `entity` at `base` instead of zero, e.g. to continue after a watermark.
    ///
    /// Has no effect on values already issued.
    pub fn with_base(self, entity: &str, base: u64) -> Self {
        self.sequence(entity).0.store(base, Ordering::Relaxed);
        self
    }

    /// Counter handle for `entity`, created at zero on first use.
    pub fn sequence(&self, entity: &str) -> Sequence {
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        let counter = counters
            .entry(entity.to_string())
            .or_insert_with(|| Arc::new(AtomicU64::new(0)));
        Sequence(Arc::clone(counter))
    }

    /// Draw the next index for `entity`.
    pub fn next(&self, entity: &str) -> u64 {
        self.sequence(entity).next()
    }

    /// Number of indices issued for `entity` so far, counting from its base.
    pub fn current(&self, entity: &str) -> u64 {
        self.sequence(entity).peek()
    }
}
