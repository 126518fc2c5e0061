//! Registered users.

use std::sync::Arc;

use loader_framework::{BatchWriter, InsertRow, Loadable, PostLoadStep, SqlValue, WorkerContext};
use rand::Rng;

use super::key;
use crate::random::{make_c_string, random_name, random_phone, random_text};
use crate::scale::ScaleFactors;
use crate::username::user_name;

pub const ENTITY: &str = "Person";
pub const TABLE: &str = "PERSON";
pub const WATERMARK_KEY: &str = "PERSON_ID";

const COLUMNS: &[&str] = &[
    "userid",
    "username",
    "password",
    "firstname",
    "lastname",
    "email",
    "telephone",
    "imageurl",
    "imagethumburl",
    "summary",
    "timezone",
    "ADDRESS_addressid",
];

#[derive(Debug, Clone, PartialEq)]
pub struct PersonRow {
    pub id: u64,
    pub user_name: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub telephone: String,
    pub image_url: String,
    pub image_thumb_url: String,
    pub summary: String,
    pub timezone: &'static str,
    pub address_id: u64,
}

/// Generates one `PERSON` row per unit, user `index + 1`.
pub struct Person {
    scale: Arc<ScaleFactors>,
}

impl Person {
    pub fn new(scale: Arc<ScaleFactors>) -> Self {
        Self { scale }
    }
}

impl Loadable for Person {
    type Row = PersonRow;

    fn entity(&self) -> &'static str {
        ENTITY
    }

    fn clear_target(&self) -> Option<&'static str> {
        Some(TABLE)
    }

    fn prepare(&self, index: u64, ctx: &mut WorkerContext) -> PersonRow {
        let id = index + 1;
        let rng = ctx.rng();
        let first_name = random_name(rng, 2, 12);
        let last_name = random_name(rng, 5, 15);
        let domain = make_c_string(rng, 3, 10);

        PersonRow {
            id,
            user_name: user_name(id),
            password: id.to_string(),
            email: format!("{first_name}_{last_name}@{domain}.com"),
            first_name,
            last_name,
            telephone: random_phone(rng),
            image_url: format!("p{id}.jpg"),
            image_thumb_url: format!("p{id}t.jpg"),
            summary: random_text(rng, 250, 2500),
            timezone: "PST",
            address_id: rng.random_range(1..=self.scale.loaded_users.max(1)),
        }
    }

    fn load(&self, row: PersonRow, batch: &mut BatchWriter<'_>) {
        batch.add(InsertRow::new(
            TABLE,
            COLUMNS,
            vec![
                key(row.id),
                SqlValue::Text(row.user_name),
                SqlValue::Text(row.password),
                SqlValue::Text(row.first_name),
                SqlValue::Text(row.last_name),
                SqlValue::Text(row.email),
                SqlValue::Text(row.telephone),
                SqlValue::Text(row.image_url),
                SqlValue::Text(row.image_thumb_url),
                SqlValue::Text(row.summary),
                SqlValue::from(row.timezone),
                key(row.address_id),
            ],
        ));
    }

    fn post_load(&self) -> Vec<PostLoadStep> {
        vec![PostLoadStep::RegisterWatermark {
            key: WATERMARK_KEY,
            table: TABLE,
        }]
    }
}
