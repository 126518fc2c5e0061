//! Row accounting for load phases.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Live counters for one entity type, shared by every worker loading it.
#[derive(Debug)]
pub struct EntityTally {
    entity: &'static str,
    requested: AtomicU64,
    committed: AtomicU64,
    errored: AtomicU64,
    rows_written: AtomicU64,
    post_load_errors: AtomicU64,
    outstanding_items: AtomicU64,
    started: Mutex<Option<Instant>>,
    finished: Mutex<Option<Instant>>,
}

impl EntityTally {
    pub fn new(entity: &'static str) -> Self {
        Self {
            entity,
            requested: AtomicU64::new(0),
            committed: AtomicU64::new(0),
            errored: AtomicU64::new(0),
            rows_written: AtomicU64::new(0),
            post_load_errors: AtomicU64::new(0),
            outstanding_items: AtomicU64::new(0),
            started: Mutex::new(None),
            finished: Mutex::new(None),
        }
    }

    pub fn entity(&self) -> &'static str {
        self.entity
    }

    pub(crate) fn add_requested(&self, count: u64) {
        self.requested.fetch_add(count, Ordering::Relaxed);
        if let Ok(mut started) = self.started.lock() {
            started.get_or_insert_with(Instant::now);
        }
    }

    pub(crate) fn item_submitted(&self) {
        self.outstanding_items.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn item_finished(&self) {
        if self.outstanding_items.fetch_sub(1, Ordering::AcqRel) == 1 {
            if let Ok(mut finished) = self.finished.lock() {
                *finished = Some(Instant::now());
            }
        }
    }

    pub(crate) fn record_committed(&self, units: u64, rows: u64) {
        self.committed.fetch_add(units, Ordering::Relaxed);
        self.rows_written.fetch_add(rows, Ordering::Relaxed);
    }

    pub(crate) fn record_errored(&self, units: u64) {
        self.errored.fetch_add(units, Ordering::Relaxed);
    }

    pub(crate) fn record_post_load_error(&self) {
        self.post_load_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Whether any work item for this entity is still queued or running.
    pub fn in_flight(&self) -> bool {
        self.outstanding_items.load(Ordering::Acquire) > 0
    }

    pub fn snapshot(&self) -> EntityMetrics {
        let started = self.started.lock().ok().and_then(|s| *s);
        let finished = self.finished.lock().ok().and_then(|f| *f);
        let duration = match (started, finished) {
            (Some(s), Some(f)) if f >= s => f - s,
            (Some(s), None) => s.elapsed(),
            _ => Duration::ZERO,
        };

        EntityMetrics {
            entity: self.entity.to_string(),
            requested: self.requested.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            errored: self.errored.load(Ordering::Relaxed),
            rows_written: self.rows_written.load(Ordering::Relaxed),
            post_load_errors: self.post_load_errors.load(Ordering::Relaxed),
            duration,
        }
    }
}

/// Point-in-time counters for one entity type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityMetrics {
    pub entity: String,
    /// Units (prepared entities) requested.
    pub requested: u64,
    /// Units durably committed.
    pub committed: u64,
    /// Units that failed to commit.
    pub errored: u64,
    /// Table rows written by committed units.
    pub rows_written: u64,
    /// Failed post-load steps.
    pub post_load_errors: u64,
    /// Time from first submission to last completed work item.
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl EntityMetrics {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ..Default::default()
        }
    }

    /// Units neither committed nor errored.
    pub fn unaccounted(&self) -> u64 {
        self.requested
            .saturating_sub(self.committed)
            .saturating_sub(self.errored)
    }

    /// Calculate committed units per second.
    pub fn units_per_second(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.committed as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }
}

pub(crate) mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}
