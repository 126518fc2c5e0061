//! Batched INSERT logic for MySQL.

use crate::error::MySQLLoaderError;
use chrono::{Datelike, Timelike};
use loader_framework::{group_rows, InsertRow, RowGroup, SqlValue, MAX_BIND_PARAMS};
use mysql_async::{prelude::*, Params, Transaction, Value};

/// Render a multi-row INSERT for `group` using `?` placeholders.
pub fn insert_sql(group: &RowGroup<'_>) -> String {
    group.to_insert_sql(|_| "?".to_string())
}

pub fn truncate_sql(table: &str) -> String {
    format!("TRUNCATE TABLE {table}")
}

/// Insert `rows` inside `tx`, one statement per run of same-shaped rows.
pub async fn insert_rows(
    tx: &mut Transaction<'_>,
    rows: &[InsertRow],
) -> Result<u64, MySQLLoaderError> {
    let mut written = 0;

    for group in group_rows(rows, MAX_BIND_PARAMS) {
        let sql = insert_sql(&group);
        let params: Vec<Value> = group
            .rows
            .iter()
            .flat_map(|row| row.values.iter().map(sql_value_to_mysql))
            .collect();

        tx.exec_drop(&sql, Params::Positional(params)).await?;
        written += group.rows.len() as u64;
    }

    Ok(written)
}

/// Convert a SqlValue to a MySQL protocol value.
///
/// Decimals travel as strings for precision; booleans as 0/1.
pub fn sql_value_to_mysql(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::NULL,
        SqlValue::Int(i) => Value::Int(i64::from(*i)),
        SqlValue::BigInt(i) => Value::Int(*i),
        SqlValue::Bool(b) => Value::Int(i64::from(*b)),
        SqlValue::Text(s) => Value::Bytes(s.clone().into_bytes()),
        SqlValue::Decimal(d) => Value::Bytes(d.to_string().into_bytes()),
        SqlValue::Timestamp(ts) => Value::Date(
            ts.year() as u16,
            ts.month() as u8,
            ts.day() as u8,
            ts.hour() as u8,
            ts.minute() as u8,
            ts.second() as u8,
            ts.nanosecond() / 1000,
        ),
        SqlValue::Date(d) => Value::Date(d.year() as u16, d.month() as u8, d.day() as u8, 0, 0, 0, 0),
    }
}

/// Text form of a result value, matching what the server sends over the text protocol.
pub fn mysql_value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::NULL => None,
        Value::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Value::Int(i) => Some(i.to_string()),
        Value::UInt(u) => Some(u.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Double(d) => Some(d.to_string()),
        other => Some(other.as_sql(true).trim_matches('\'').to_string()),
    }
}
