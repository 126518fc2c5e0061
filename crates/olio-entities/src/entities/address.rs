//! Street addresses for users and events.

use loader_framework::{BatchWriter, InsertRow, Loadable, PostLoadStep, SqlValue, WorkerContext};
use rand::Rng;
use rust_decimal::Decimal;

use super::key;
use crate::random::{append_name, make_c_string, make_n_string, random_decimal, random_name};

pub const ENTITY: &str = "Address";
pub const TABLE: &str = "ADDRESS";
pub const WATERMARK_KEY: &str = "ADDRESS_ID";

pub const STREET_EXTENSIONS: &[&str] = &["Blvd", "Ave", "St", "Ln", ""];

/// Latitude bound in micro-degrees; addresses stay outside the polar circles.
pub const MAX_LATITUDE_MICROS: i64 = 66_560_556;

const COLUMNS: &[&str] = &[
    "addressid",
    "street1",
    "street2",
    "city",
    "state",
    "zip",
    "country",
    "latitude",
    "longitude",
];

#[derive(Debug, Clone, PartialEq)]
pub struct AddressRow {
    pub id: u64,
    pub street1: String,
    pub street2: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
    pub latitude: Decimal,
    pub longitude: Decimal,
}

/// Generates one `ADDRESS` row per unit.
#[derive(Debug, Default)]
pub struct Address;

impl Loadable for Address {
    type Row = AddressRow;

    fn entity(&self) -> &'static str {
        ENTITY
    }

    fn clear_target(&self) -> Option<&'static str> {
        Some(TABLE)
    }

    fn prepare(&self, index: u64, ctx: &mut WorkerContext) -> AddressRow {
        let (rng, street) = ctx.split();

        street.push_str(&make_n_string(rng, 1, 5));
        street.push(' ');
        append_name(rng, street, 1, 11);
        let ext = STREET_EXTENSIONS[rng.random_range(0..STREET_EXTENSIONS.len())];
        if !ext.is_empty() {
            street.push(' ');
            street.push_str(ext);
        }

        let street2 = rng.random_bool(0.5).then(|| make_c_string(rng, 5, 20));
        let city = make_c_string(rng, 4, 14);
        let state = make_c_string(rng, 2, 2).to_uppercase();
        let zip = make_n_string(rng, 5, 5);
        let country = if rng.random_bool(0.5) {
            "USA".to_string()
        } else {
            random_name(rng, 6, 16)
        };

        AddressRow {
            id: index + 1,
            street1: street.clone(),
            street2,
            city,
            state,
            zip,
            country,
            latitude: random_decimal(rng, -MAX_LATITUDE_MICROS, MAX_LATITUDE_MICROS, 6),
            longitude: random_decimal(rng, -179_999_999, 180_000_000, 6),
        }
    }

    fn load(&self, row: AddressRow, batch: &mut BatchWriter<'_>) {
        batch.add(InsertRow::new(
            TABLE,
            COLUMNS,
            vec![
                key(row.id),
                SqlValue::Text(row.street1),
                SqlValue::from(row.street2),
                SqlValue::Text(row.city),
                SqlValue::Text(row.state),
                SqlValue::Text(row.zip),
                SqlValue::Text(row.country),
                SqlValue::Decimal(row.latitude),
                SqlValue::Decimal(row.longitude),
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
