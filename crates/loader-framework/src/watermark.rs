//! ID-generator watermarks.
//!
//! The watermark table maps an entity key (e.g. `PERSON_ID`) to the number of
//! rows loaded for that entity. It is only written during post-load, so later
//! runs and the application itself can continue numbering without collision.

use std::collections::BTreeMap;

use tracing::warn;

/// Table holding one row per registered watermark.
pub const WATERMARK_TABLE: &str = "ID_GEN";
pub const WATERMARK_KEY_COLUMN: &str = "GEN_KEY";
pub const WATERMARK_VALUE_COLUMN: &str = "GEN_VALUE";

/// Query returning `(key, value)` pairs.
pub fn select_watermarks_sql() -> String {
    format!("SELECT {WATERMARK_KEY_COLUMN}, {WATERMARK_VALUE_COLUMN} FROM {WATERMARK_TABLE}")
}

/// Parse the rows returned by [`select_watermarks_sql`].
///
/// Malformed rows are skipped with a warning.
pub fn parse_watermarks(rows: Vec<Vec<Option<String>>>) -> BTreeMap<String, u64> {
    let mut watermarks = BTreeMap::new();
    for row in rows {
        let mut cols = row.into_iter();
        match (cols.next().flatten(), cols.next().flatten()) {
            (Some(key), Some(value)) => match value.trim().parse::<u64>() {
                Ok(v) => {
                    watermarks.insert(key, v);
                }
                Err(e) => warn!("Ignoring watermark '{}' with value '{}': {}", key, value, e),
            },
            (key, _) => warn!("Ignoring incomplete watermark row (key: {:?})", key),
        }
    }
    watermarks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_watermarks() {
        let rows = vec![
            vec![Some("PERSON_ID".to_string()), Some("400".to_string())],
            vec![Some("ADDRESS_ID".to_string()), Some(" 400 ".to_string())],
            vec![Some("BROKEN".to_string()), Some("abc".to_string())],
            vec![None, Some("1".to_string())],
        ];
        let parsed = parse_watermarks(rows);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["PERSON_ID"], 400);
        assert_eq!(parsed["ADDRESS_ID"], 400);
    }

    #[test]
    fn test_select_sql() {
        assert_eq!(select_watermarks_sql(), "SELECT GEN_KEY, GEN_VALUE FROM ID_GEN");
    }
}
