//! Links between events and tags.

use std::sync::Arc;

use loader_framework::{BatchWriter, InsertRow, Loadable, WorkerContext};
use rand::Rng;

use super::key;
use crate::random::{distinct_by, random_tag_id};
use crate::scale::ScaleFactors;

pub const ENTITY: &str = "EventTag";
pub const TABLE: &str = "SOCIALEVENTTAG_SOCIALEVENT";
pub const TAG_COLUMN: &str = "socialeventtagid";
pub const EVENT_COLUMN: &str = "socialeventid";

pub const MIN_TAGS_PER_EVENT: usize = 1;
pub const MAX_TAGS_PER_EVENT: usize = 7;

/// Fraction of the tag vocabulary that attracts half of all tag picks.
pub const POPULAR_TAG_FRACTION: f64 = 0.1;

const COLUMNS: &[&str] = &[TAG_COLUMN, EVENT_COLUMN];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTagRow {
    pub event_id: u64,
    pub tag_ids: Vec<u64>,
}

/// Tags event `index + 1` with 1..=7 distinct tags, favouring popular ones.
pub struct EventTag {
    scale: Arc<ScaleFactors>,
}

impl EventTag {
    pub fn new(scale: Arc<ScaleFactors>) -> Self {
        Self { scale }
    }
}

impl Loadable for EventTag {
    type Row = EventTagRow;

    fn entity(&self) -> &'static str {
        ENTITY
    }

    fn clear_target(&self) -> Option<&'static str> {
        Some(TABLE)
    }

    fn prepare(&self, index: u64, ctx: &mut WorkerContext) -> EventTagRow {
        let rng = ctx.rng();
        let count = rng.random_range(MIN_TAGS_PER_EVENT..=MAX_TAGS_PER_EVENT);
        let tag_ids = distinct_by(rng, count, 1..=self.scale.tags, None, |rng, range| {
            random_tag_id(rng, *range.end(), POPULAR_TAG_FRACTION)
        });
        EventTagRow {
            event_id: index + 1,
            tag_ids,
        }
    }

    fn load(&self, row: EventTagRow, batch: &mut BatchWriter<'_>) {
        for tag in row.tag_ids {
            batch.add(InsertRow::new(TABLE, COLUMNS, vec![key(tag), key(row.event_id)]));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_within_vocabulary() {
        let scale = ScaleFactors::from_active_users(25, 4).with_tags(20);
        let generator = EventTag::new(Arc::new(scale));
        let mut ctx = WorkerContext::new(0, 42);

        for index in 0..200 {
            let row = generator.prepare(index, &mut ctx);
            assert_eq!(row.event_id, index + 1);
            assert!((MIN_TAGS_PER_EVENT..=MAX_TAGS_PER_EVENT).contains(&row.tag_ids.len()));
            assert!(row.tag_ids.iter().all(|t| (1..=20).contains(t)));

            let mut sorted = row.tag_ids.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), row.tag_ids.len());
        }
    }

    #[test]
    fn test_small_vocabulary_caps_tag_count() {
        let scale = ScaleFactors::from_active_users(25, 4).with_tags(2);
        let generator = EventTag::new(Arc::new(scale));
        let mut ctx = WorkerContext::new(0, 7);
        for index in 0..50 {
            assert!(generator.prepare(index, &mut ctx).tag_ids.len() <= 2);
        }
    }
}
