//! Batched INSERT and maintenance statements for PostgreSQL.

use crate::error::PostgreSQLLoaderError;
use loader_framework::{group_rows, InsertRow, RowGroup, SqlValue, MAX_BIND_PARAMS};
use tokio_postgres::types::ToSql;
use tokio_postgres::Transaction;

/// Render a multi-row INSERT for `group` using `$n` placeholders.
pub fn insert_sql(group: &RowGroup<'_>) -> String {
    group.to_insert_sql(|i| format!("${i}"))
}

/// Statement that empties `table` and resets its sequences.
pub fn truncate_sql(table: &str) -> String {
    format!("TRUNCATE TABLE {table} RESTART IDENTITY CASCADE")
}

/// Insert `rows` inside `tx`, one statement per run of same-shaped rows.
///
/// Returns the number of rows the server reports as inserted.
pub async fn insert_rows(
    tx: &Transaction<'_>,
    rows: &[InsertRow],
) -> Result<u64, PostgreSQLLoaderError> {
    let mut written = 0;

    for group in group_rows(rows, MAX_BIND_PARAMS) {
        let sql = insert_sql(&group);

        let params: Vec<Box<dyn ToSql + Sync + Send>> = group
            .rows
            .iter()
            .flat_map(|row| row.values.iter().map(sql_value_to_boxed))
            .collect();

        let param_refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();

        written += tx.execute(&sql, &param_refs).await?;
    }

    Ok(written)
}

/// Convert a SqlValue to a boxed ToSql trait object.
pub fn sql_value_to_boxed(value: &SqlValue) -> Box<dyn ToSql + Sync + Send> {
    match value {
        SqlValue::Null => Box::new(None::<String>),
        SqlValue::Int(i) => Box::new(*i),
        SqlValue::BigInt(i) => Box::new(*i),
        SqlValue::Bool(b) => Box::new(*b),
        SqlValue::Text(s) => Box::new(s.clone()),
        SqlValue::Decimal(d) => Box::new(*d),
        SqlValue::Timestamp(ts) => Box::new(*ts),
        SqlValue::Date(d) => Box::new(*d),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLUMNS: &[&str] = &["username", "socialeventid"];

    fn attendee(name: &str, event: i32) -> InsertRow {
        InsertRow::new("PERSON_SOCIALEVENT", COLUMNS, vec![name.into(), event.into()])
    }

    #[test]
    fn test_insert_sql_numbers_placeholders_across_rows() {
        let rows = vec![attendee("a", 1), attendee("b", 1), attendee("c", 2)];
        let groups = group_rows(&rows, MAX_BIND_PARAMS);
        assert_eq!(groups.len(), 1);
        assert_eq!(
            insert_sql(&groups[0]),
            "INSERT INTO PERSON_SOCIALEVENT (username, socialeventid) VALUES ($1, $2), ($3, $4), ($5, $6)"
        );
    }

    #[test]
    fn test_truncate_sql() {
        assert_eq!(
            truncate_sql("SOCIALEVENT"),
            "TRUNCATE TABLE SOCIALEVENT RESTART IDENTITY CASCADE"
        );
    }
}
