//! Users attending each event.

use std::sync::Arc;

use loader_framework::{BatchWriter, InsertRow, Loadable, SqlValue, WorkerContext};
use rand::Rng;

use super::key;
use crate::random::distinct_ids;
use crate::scale::ScaleFactors;
use crate::username::user_name;

pub const ENTITY: &str = "Attendees";
pub const TABLE: &str = "PERSON_SOCIALEVENT";

pub const MIN_ATTENDEES: usize = 10;
pub const MAX_ATTENDEES: usize = 100;

const COLUMNS: &[&str] = &["username", "socialeventid"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendeesRow {
    pub event_id: u64,
    pub user_names: Vec<String>,
}

/// Signs 10..=100 distinct users up for event `index + 1`.
///
/// Fewer when there are not that many loaded users.
pub struct Attendees {
    scale: Arc<ScaleFactors>,
}

impl Attendees {
    pub fn new(scale: Arc<ScaleFactors>) -> Self {
        Self { scale }
    }
}

impl Loadable for Attendees {
    type Row = AttendeesRow;

    fn entity(&self) -> &'static str {
        ENTITY
    }

    fn clear_target(&self) -> Option<&'static str> {
        Some(TABLE)
    }

    fn prepare(&self, index: u64, ctx: &mut WorkerContext) -> AttendeesRow {
        let rng = ctx.rng();
        let count = rng.random_range(MIN_ATTENDEES..=MAX_ATTENDEES);
        AttendeesRow {
            event_id: index + 1,
            user_names: distinct_ids(rng, count, 1..=self.scale.loaded_users, None)
                .into_iter()
                .map(user_name)
                .collect(),
        }
    }

    fn load(&self, row: AttendeesRow, batch: &mut BatchWriter<'_>) {
        for name in row.user_names {
            batch.add(InsertRow::new(
                TABLE,
                COLUMNS,
                vec![SqlValue::Text(name), key(row.event_id)],
            ));
        }
    }
}
