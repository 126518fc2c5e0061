//! Comments and ratings left on events.

use std::sync::Arc;

use chrono::NaiveDateTime;
use loader_framework::{BatchWriter, InsertRow, Loadable, PostLoadStep, SqlValue, WorkerContext};
use rand::Rng;

use super::key;
use crate::random::{random_date_time, random_text};
use crate::scale::ScaleFactors;
use crate::username::user_name;

pub const ENTITY: &str = "Comments";
pub const TABLE: &str = "COMMENTS_RATING";
pub const WATERMARK_KEY: &str = "COMMENTS_RATING_ID";
pub const EVENT_COLUMN: &str = "socialeventid";
pub const RATING_COLUMN: &str = "ratings";

pub const MAX_COMMENTS_PER_EVENT: usize = 20;
pub const MAX_RATING: i32 = 5;

const COLUMNS: &[&str] = &["username", EVENT_COLUMN, "comments", RATING_COLUMN, "created_at"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub user_name: String,
    pub text: String,
    pub rating: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentsRow {
    pub event_id: u64,
    pub comments: Vec<Comment>,
}

/// Leaves 0..=20 comments, each rated 0..=5, on event `index + 1`.
pub struct Comments {
    scale: Arc<ScaleFactors>,
    base_time: NaiveDateTime,
}

impl Comments {
    /// Comments are dated within the event schedule starting at `base_time`.
    pub fn new(scale: Arc<ScaleFactors>, base_time: NaiveDateTime) -> Self {
        Self { scale, base_time }
    }
}

impl Loadable for Comments {
    type Row = CommentsRow;

    fn entity(&self) -> &'static str {
        ENTITY
    }

    fn clear_target(&self) -> Option<&'static str> {
        Some(TABLE)
    }

    fn prepare(&self, index: u64, ctx: &mut WorkerContext) -> CommentsRow {
        let rng = ctx.rng();
        let users = self.scale.loaded_users.max(1);
        let count = rng.random_range(0..=MAX_COMMENTS_PER_EVENT);
        let comments = (0..count)
            .map(|_| Comment {
                user_name: user_name(rng.random_range(1..=users)),
                text: random_text(rng, 10, 200),
                rating: rng.random_range(0..=MAX_RATING),
                created_at: random_date_time(rng, self.base_time, super::social_event::SCHEDULE_DAYS),
            })
            .collect();
        CommentsRow {
            event_id: index + 1,
            comments,
        }
    }

    fn load(&self, row: CommentsRow, batch: &mut BatchWriter<'_>) {
        for comment in row.comments {
            batch.add(InsertRow::new(
                TABLE,
                COLUMNS,
                vec![
                    SqlValue::Text(comment.user_name),
                    key(row.event_id),
                    SqlValue::Text(comment.text),
                    SqlValue::Int(comment.rating),
                    SqlValue::Timestamp(comment.created_at),
                ],
            ));
        }
    }

    fn post_load(&self) -> Vec<PostLoadStep> {
        vec![PostLoadStep::RegisterWatermark {
            key: WATERMARK_KEY,
            table: TABLE,
        }]
    }
}
