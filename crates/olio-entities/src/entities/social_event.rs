//! Social events.

use std::sync::Arc;

use chrono::{NaiveDateTime, Timelike, Utc};
use loader_framework::{BatchWriter, InsertRow, Loadable, PostLoadStep, SqlValue, WorkerContext};
use rand::Rng;

use super::{comments, key};
use crate::random::{random_date_time, random_phone, random_text, random_time_zone};
use crate::scale::ScaleFactors;
use crate::username::user_name;

pub const ENTITY: &str = "SocialEvent";
pub const TABLE: &str = "SOCIALEVENT";
pub const WATERMARK_KEY: &str = "SOCIAL_EVENT_ID";
pub const KEY_COLUMN: &str = "socialeventid";

/// Events are scheduled up to this many days after the base time.
pub const SCHEDULE_DAYS: i64 = 540;

const COLUMNS: &[&str] = &[
    KEY_COLUMN,
    "title",
    "summary",
    "description",
    "submitterusername",
    "telephone",
    "timezone",
    "imageurl",
    "imagethumburl",
    "literatureurl",
    "eventtimestamp",
    "eventdate",
    "createdtimestamp",
    "ADDRESS_addressid",
    "totalscore",
    "numberofvotes",
    "disabled",
];

#[derive(Debug, Clone, PartialEq)]
pub struct SocialEventRow {
    pub id: u64,
    pub title: String,
    pub summary: String,
    pub description: String,
    pub submitter: String,
    pub telephone: String,
    pub timezone: &'static str,
    pub event_time: NaiveDateTime,
    pub address_id: u64,
}

/// Generates event `index + 1`, submitted by a random loaded user.
///
/// Score and vote columns start at zero; post-load derives them from the
/// loaded comments.
pub struct SocialEvent {
    scale: Arc<ScaleFactors>,
    base_time: NaiveDateTime,
}

impl SocialEvent {
    pub fn new(scale: Arc<ScaleFactors>) -> Self {
        let now = Utc::now().naive_utc();
        Self {
            scale,
            base_time: now.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(now),
        }
    }

    /// Schedule events relative to `base_time` instead of now.
    pub fn with_base_time(mut self, base_time: NaiveDateTime) -> Self {
        self.base_time = base_time;
        self
    }

    pub fn base_time(&self) -> NaiveDateTime {
        self.base_time
    }
}

impl Loadable for SocialEvent {
    type Row = SocialEventRow;

    fn entity(&self) -> &'static str {
        ENTITY
    }

    fn clear_target(&self) -> Option<&'static str> {
        Some(TABLE)
    }

    fn prepare(&self, index: u64, ctx: &mut WorkerContext) -> SocialEventRow {
        let rng = ctx.rng();
        let users = self.scale.loaded_users.max(1);
        SocialEventRow {
            id: index + 1,
            title: random_text(rng, 15, 20),
            summary: random_text(rng, 50, 100),
            description: random_text(rng, 100, 495),
            submitter: user_name(rng.random_range(1..=users)),
            telephone: random_phone(rng),
            timezone: random_time_zone(rng),
            event_time: random_date_time(rng, self.base_time, SCHEDULE_DAYS),
            address_id: rng.random_range(1..=users),
        }
    }

    fn load(&self, row: SocialEventRow, batch: &mut BatchWriter<'_>) {
        let id = row.id;
        batch.add(InsertRow::new(
            TABLE,
            COLUMNS,
            vec![
                key(id),
                SqlValue::Text(row.title),
                SqlValue::Text(row.summary),
                SqlValue::Text(row.description),
                SqlValue::Text(row.submitter),
                SqlValue::Text(row.telephone),
                SqlValue::from(row.timezone),
                SqlValue::Text(format!("e{id}.jpg")),
                SqlValue::Text(format!("e{id}t.jpg")),
                SqlValue::Text(format!("e{id}.pdf")),
                SqlValue::Timestamp(row.event_time),
                SqlValue::Date(row.event_time.date()),
                SqlValue::Timestamp(self.base_time),
                key(row.address_id),
                SqlValue::Int(0),
                SqlValue::Int(0),
                SqlValue::Int(0),
            ],
        ));
    }

    fn post_load(&self) -> Vec<PostLoadStep> {
        vec![
            PostLoadStep::RecountReferences {
                table: TABLE,
                key_column: KEY_COLUMN,
                count_column: "numberofvotes",
                link_table: comments::TABLE,
                link_column: comments::EVENT_COLUMN,
            },
            PostLoadStep::Sql(format!(
                "UPDATE {TABLE} SET totalscore = \
                 (SELECT COALESCE(SUM({rating}), 0) FROM {comments} \
                 WHERE {comments}.{event} = {TABLE}.{KEY_COLUMN})",
                rating = comments::RATING_COLUMN,
                comments = comments::TABLE,
                event = comments::EVENT_COLUMN,
            )),
            PostLoadStep::RegisterWatermark {
                key: WATERMARK_KEY,
                table: TABLE,
            },
        ]
    }
}
