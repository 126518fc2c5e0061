//! Dialect-neutral statements produced by generators.
//!
//! Generators describe rows and finalization steps; connectors decide how to
//! bind and send them. The helpers here cover the SQL that is identical on
//! every supported database.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::watermark::{WATERMARK_KEY_COLUMN, WATERMARK_TABLE, WATERMARK_VALUE_COLUMN};

/// Upper bound on bind parameters in one statement (PostgreSQL and MySQL both use u16).
pub const MAX_BIND_PARAMS: usize = 65_535;

/// A single column value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SqlValue {
    /// NULL in a text column.
    Null,
    Int(i32),
    BigInt(i64),
    Bool(bool),
    Text(String),
    Decimal(Decimal),
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
}

impl SqlValue {
    /// Text form, used by test doubles and log output.
    pub fn as_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Int(i) => Some(i.to_string()),
            SqlValue::BigInt(i) => Some(i.to_string()),
            SqlValue::Bool(b) => Some(b.to_string()),
            SqlValue::Text(s) => Some(s.clone()),
            SqlValue::Decimal(d) => Some(d.to_string()),
            SqlValue::Timestamp(ts) => Some(ts.format("%Y-%m-%d %H:%M:%S").to_string()),
            SqlValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        }
    }

    /// Integer view of the value, if it has one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(i) => Some(i64::from(*i)),
            SqlValue::BigInt(i) => Some(*i),
            SqlValue::Text(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::BigInt(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<Option<String>> for SqlValue {
    fn from(value: Option<String>) -> Self {
        value.map(SqlValue::Text).unwrap_or(SqlValue::Null)
    }
}

impl From<Decimal> for SqlValue {
    fn from(value: Decimal) -> Self {
        SqlValue::Decimal(value)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(value: NaiveDateTime) -> Self {
        SqlValue::Timestamp(value)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(value: NaiveDate) -> Self {
        SqlValue::Date(value)
    }
}

/// One row destined for one table.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertRow {
    pub table: &'static str,
    pub columns: &'static [&'static str],
    pub values: Vec<SqlValue>,
}

impl InsertRow {
    pub fn new(table: &'static str, columns: &'static [&'static str], values: Vec<SqlValue>) -> Self {
        debug_assert_eq!(columns.len(), values.len(), "column/value count mismatch for {table}");
        Self {
            table,
            columns,
            values,
        }
    }

    /// Value of the named column.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .and_then(|i| self.values.get(i))
    }
}

/// Finalization work run once per entity type after every row is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostLoadStep {
    /// Set `count_column` of every `table` row to the number of `link_table`
    /// rows whose `link_column` equals that row's `key_column`.
    RecountReferences {
        table: &'static str,
        key_column: &'static str,
        count_column: &'static str,
        link_table: &'static str,
        link_column: &'static str,
    },
    /// Record the row count of `table` under `key` in the watermark table.
    RegisterWatermark {
        key: &'static str,
        table: &'static str,
    },
    /// Opaque statement.
    Sql(String),
}

impl PostLoadStep {
    /// Render the step as SQL understood by both PostgreSQL and MySQL.
    pub fn to_sql(&self) -> String {
        match self {
            PostLoadStep::RecountReferences {
                table,
                key_column,
                count_column,
                link_table,
                link_column,
            } => format!(
                "UPDATE {table} SET {count_column} = \
                 (SELECT COUNT(*) FROM {link_table} WHERE {link_table}.{link_column} = {table}.{key_column})"
            ),
            PostLoadStep::RegisterWatermark { key, table } => format!(
                "INSERT INTO {WATERMARK_TABLE} ({WATERMARK_KEY_COLUMN}, {WATERMARK_VALUE_COLUMN}) \
                 SELECT '{key}', COUNT(*) FROM {table}"
            ),
            PostLoadStep::Sql(sql) => sql.clone(),
        }
    }
}

/// Consecutive rows sharing a table and column list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowGroup<'a> {
    pub table: &'static str,
    pub columns: &'static [&'static str],
    pub rows: &'a [InsertRow],
}

impl RowGroup<'_> {
    /// Number of bind parameters the group needs.
    pub fn param_count(&self) -> usize {
        self.columns.len() * self.rows.len()
    }

    /// Render a multi-row INSERT, calling `placeholder` with the 1-based parameter index.
    pub fn to_insert_sql(&self, mut placeholder: impl FnMut(usize) -> String) -> String {
        let mut param_idx = 1;
        let tuples: Vec<String> = self
            .rows
            .iter()
            .map(|_| {
                let row: Vec<String> = (0..self.columns.len())
                    .map(|_| {
                        let p = placeholder(param_idx);
                        param_idx += 1;
                        p
                    })
                    .collect();
                format!("({})", row.join(", "))
            })
            .collect();

        format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.table,
            self.columns.join(", "),
            tuples.join(", ")
        )
    }
}

/// Split `rows` into groups of identical shape, each within `max_params` bind parameters.
pub fn group_rows(rows: &[InsertRow], max_params: usize) -> Vec<RowGroup<'_>> {
    let mut groups = Vec::new();
    let mut start = 0;

    while start < rows.len() {
        let head = &rows[start];
        let per_row = head.columns.len().max(1);
        let max_rows = (max_params / per_row).max(1);

        let mut end = start + 1;
        while end < rows.len()
            && end - start < max_rows
            && rows[end].table == head.table
            && rows[end].columns == head.columns
        {
            end += 1;
        }

        groups.push(RowGroup {
            table: head.table,
            columns: head.columns,
            rows: &rows[start..end],
        });
        start = end;
    }

    groups
}
