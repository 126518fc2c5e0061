//! Event tags.

use loader_framework::{BatchWriter, InsertRow, Loadable, PostLoadStep, SqlValue, WorkerContext};

use super::{event_tag, key};
use crate::username::user_name;

pub const ENTITY: &str = "Tag";
pub const TABLE: &str = "SOCIALEVENTTAG";
pub const WATERMARK_KEY: &str = "SOCIAL_EVENT_TAG_ID";
pub const KEY_COLUMN: &str = "socialeventtagid";
pub const REFCOUNT_COLUMN: &str = "refcount";

const COLUMNS: &[&str] = &[KEY_COLUMN, "tag", REFCOUNT_COLUMN];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRow {
    pub id: u64,
    pub name: String,
}

/// Generates tag `index + 1` with a zero reference count.
///
/// The real count is only known once every event is tagged, so post-load
/// recounts it from the event-tag links.
#[derive(Debug, Default)]
pub struct Tag;

impl Loadable for Tag {
    type Row = TagRow;

    fn entity(&self) -> &'static str {
        ENTITY
    }

    fn clear_target(&self) -> Option<&'static str> {
        Some(TABLE)
    }

    fn prepare(&self, index: u64, _ctx: &mut WorkerContext) -> TagRow {
        let id = index + 1;
        TagRow {
            id,
            name: user_name(id),
        }
    }

    fn load(&self, row: TagRow, batch: &mut BatchWriter<'_>) {
        batch.add(InsertRow::new(
            TABLE,
            COLUMNS,
            vec![key(row.id), SqlValue::Text(row.name), SqlValue::Int(0)],
        ));
    }

    fn post_load(&self) -> Vec<PostLoadStep> {
        vec![
            PostLoadStep::RecountReferences {
                table: TABLE,
                key_column: KEY_COLUMN,
                count_column: REFCOUNT_COLUMN,
                link_table: event_tag::TABLE,
                link_column: event_tag::TAG_COLUMN,
            },
            PostLoadStep::RegisterWatermark {
                key: WATERMARK_KEY,
                table: TABLE,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::test_support::{generate, write_all};
    use loader_framework::testing::MemoryConnector;
    use loader_framework::{Connection, Connector};

    fn link(tag: u64, event: u64) -> InsertRow {
        InsertRow::new(
            event_tag::TABLE,
            &[event_tag::TAG_COLUMN, event_tag::EVENT_COLUMN],
            vec![key(tag), key(event)],
        )
    }

    #[tokio::test]
    async fn test_post_load_recounts_references() {
        let connector = MemoryConnector::new();
        let mut ctx = WorkerContext::new(0, 0);

        let tags: Vec<InsertRow> = (0..3).flat_map(|i| generate(&Tag, i, &mut ctx)).collect();
        write_all(&connector, &tags).await;
        write_all(&connector, &[link(1, 1), link(1, 2), link(3, 2)]).await;

        let mut conn = connector.connect().await.unwrap();
        for step in Tag.post_load() {
            conn.post_load(&step).await.unwrap();
        }
        conn.close().await.unwrap();

        let store = connector.store();
        let counts: Vec<(String, i64)> = store
            .rows(TABLE)
            .iter()
            .map(|r| {
                (
                    r.get("tag").and_then(SqlValue::as_text).unwrap(),
                    r.get(REFCOUNT_COLUMN).and_then(SqlValue::as_i64).unwrap(),
                )
            })
            .collect();
        assert_eq!(
            counts,
            vec![("a".to_string(), 2), ("b".to_string(), 0), ("c".to_string(), 1)]
        );
        assert_eq!(store.watermarks()["SOCIAL_EVENT_TAG_ID"], 3);
    }
}
