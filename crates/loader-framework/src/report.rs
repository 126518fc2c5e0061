//! Load run report types.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::metrics::{duration_millis, EntityMetrics};

/// Error ratio below which a run still counts as seeded.
pub const DEFAULT_SEEDED_THRESHOLD: f64 = 0.001;

/// Terminal status of a load run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    /// Every requested unit committed and every post-load step succeeded.
    Completed,
    /// The run finished, but `errored` units or post-load steps failed.
    CompletedWithErrors { errored: u64 },
    /// The run stopped before loading finished.
    Aborted { reason: String },
}

/// A watermark that does not match the number of committed units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatermarkMismatch {
    pub key: String,
    pub expected: u64,
    pub found: Option<u64>,
}

/// Result of a load run.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    /// Per-entity counters in load order.
    pub entities: Vec<EntityMetrics>,
    /// Watermarks read back after post-load.
    pub watermarks: BTreeMap<String, u64>,
    /// Watermarks that disagree with the committed counts.
    pub watermark_mismatches: Vec<WatermarkMismatch>,
    #[serde(rename = "duration_ms", with = "duration_millis")]
    pub duration: Duration,
    pub status: RunStatus,
}

impl LoadReport {
    /// Build a report for a run that went through every phase.
    pub fn completed(entities: Vec<EntityMetrics>, watermarks: BTreeMap<String, u64>, duration: Duration) -> Self {
        let mut report = Self {
            entities,
            watermarks,
            watermark_mismatches: Vec::new(),
            duration,
            status: RunStatus::Completed,
        };
        let errored = report.total_errored() + report.total_post_load_errors();
        if errored > 0 {
            report.status = RunStatus::CompletedWithErrors { errored };
        }
        report
    }

    /// Build a report for a run that stopped early.
    pub fn aborted(reason: impl Into<String>, entities: Vec<EntityMetrics>, duration: Duration) -> Self {
        Self {
            entities,
            watermarks: BTreeMap::new(),
            watermark_mismatches: Vec::new(),
            duration,
            status: RunStatus::Aborted {
                reason: reason.into(),
            },
        }
    }

    pub fn with_watermark_mismatches(mut self, mismatches: Vec<WatermarkMismatch>) -> Self {
        self.watermark_mismatches = mismatches;
        self
    }

    pub fn entity(&self, name: &str) -> Option<&EntityMetrics> {
        self.entities.iter().find(|m| m.entity == name)
    }

    /// Total units attempted.
    pub fn total_requested(&self) -> u64 {
        self.entities.iter().map(|m| m.requested).sum()
    }

    /// Total units committed.
    pub fn total_committed(&self) -> u64 {
        self.entities.iter().map(|m| m.committed).sum()
    }

    /// Total units errored.
    pub fn total_errored(&self) -> u64 {
        self.entities.iter().map(|m| m.errored).sum()
    }

    /// Total rows written to the database.
    pub fn total_rows_written(&self) -> u64 {
        self.entities.iter().map(|m| m.rows_written).sum()
    }

    pub fn total_post_load_errors(&self) -> u64 {
        self.entities.iter().map(|m| m.post_load_errors).sum()
    }

    /// Errored units as a fraction of attempted units.
    pub fn error_ratio(&self) -> f64 {
        let requested = self.total_requested();
        if requested == 0 {
            return 0.0;
        }
        self.total_errored() as f64 / requested as f64
    }

    /// Whether the database can be used as seeded.
    ///
    /// False for aborted runs, runs with unaccounted units or failed
    /// post-load steps, and runs whose error ratio exceeds `threshold`. A run
    /// that is not seeded should be re-run after a full clear.
    pub fn is_seeded(&self, threshold: f64) -> bool {
        if matches!(self.status, RunStatus::Aborted { .. }) {
            return false;
        }
        let unaccounted: u64 = self.entities.iter().map(EntityMetrics::unaccounted).sum();
        unaccounted == 0 && self.total_post_load_errors() == 0 && self.error_ratio() <= threshold
    }

    /// Generate a summary string.
    pub fn summary(&self, threshold: f64) -> String {
        let status_str = match &self.status {
            RunStatus::Completed => "COMPLETED".to_string(),
            RunStatus::CompletedWithErrors { errored } => format!("COMPLETED WITH {errored} ERRORS"),
            RunStatus::Aborted { reason } => format!("ABORTED ({reason})"),
        };

        let mut summary = format!(
            "Load Report: {}\n\
             ===========\n\
             Attempted: {}\n\
             Committed: {}\n\
             Errored: {}\n\
             Rows Written: {}\n\
             Duration: {:?}\n\n",
            status_str,
            self.total_requested(),
            self.total_committed(),
            self.total_errored(),
            self.total_rows_written(),
            self.duration
        );

        summary.push_str("Entities:\n");
        for m in &self.entities {
            summary.push_str(&format!(
                "- {}: {}/{} committed, {} errored, {} rows, {:.0} units/s",
                m.entity,
                m.committed,
                m.requested,
                m.errored,
                m.rows_written,
                m.units_per_second()
            ));
            if m.post_load_errors > 0 {
                summary.push_str(&format!(", {} post-load errors", m.post_load_errors));
            }
            summary.push('\n');
        }

        if !self.watermark_mismatches.is_empty() {
            summary.push_str("\nWatermark mismatches:\n");
            for mismatch in &self.watermark_mismatches {
                let found = mismatch
                    .found
                    .map_or_else(|| "missing".to_string(), |v| v.to_string());
                summary.push_str(&format!(
                    "- {}: expected {}, found {}\n",
                    mismatch.key, mismatch.expected, found
                ));
            }
        }

        if self.is_seeded(threshold) {
            summary.push_str("\nDatabase is seeded.\n");
        } else {
            summary.push_str("\nDatabase is NOT seeded; clear and re-run the load.\n");
        }

        summary
    }

    /// Render the report as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
