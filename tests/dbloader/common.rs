//! Shared fixtures for the loader integration tests.

use std::collections::BTreeSet;

use loader_framework::testing::MemoryConnector;
use loader_framework::{InsertRow, LoaderConfig, SqlValue};
use olio_dbloader::LoadController;
use olio_entities::{Registry, ScaleFactors};

pub const SEED: u64 = 42;

/// 5 active users: 20 loaded users and 60 events.
pub fn scale() -> ScaleFactors {
    ScaleFactors::from_active_users(5, 4)
}

pub fn controller(connector: MemoryConnector, parallelism: usize) -> LoadController<MemoryConnector> {
    init_tracing();
    let config = LoaderConfig::default()
        .with_parallelism(parallelism)
        .with_batch_size(16)
        .with_seed(SEED);
    LoadController::new(connector, config, Registry::olio(scale()))
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("olio_dbloader=debug,loader_framework=debug")
        .with_test_writer()
        .try_init()
        .ok();
}

/// Integer value of `column`, panicking if the row has none.
pub fn int(row: &InsertRow, column: &str) -> i64 {
    row.get(column)
        .and_then(SqlValue::as_i64)
        .unwrap_or_else(|| panic!("{} row has no integer {}", row.table, column))
}

pub fn text(row: &InsertRow, column: &str) -> String {
    row.get(column)
        .and_then(SqlValue::as_text)
        .unwrap_or_else(|| panic!("{} row has no text {}", row.table, column))
}

/// Distinct values of an integer column.
pub fn int_set(rows: &[InsertRow], column: &str) -> BTreeSet<i64> {
    rows.iter().map(|r| int(r, column)).collect()
}
