//! Runs against a connector that rejects some statements.

use loader_framework::testing::MemoryConnector;
use loader_framework::{LoadError, RunStatus, SqlValue, DEFAULT_SEEDED_THRESHOLD};
use olio_entities::entities::{person, social_event};

use crate::common::{controller, scale};

/// Rejects every tenth user.
fn every_tenth_person() -> MemoryConnector {
    MemoryConnector::new().fail_rows_where(|row| {
        row.table == person::TABLE
            && row.get("userid").and_then(SqlValue::as_i64).is_some_and(|id| id % 10 == 0)
    })
}

#[tokio::test]
async fn test_row_errors_are_counted_not_fatal() {
    let connector = every_tenth_person();
    let store = connector.store();
    let mut controller = controller(connector, 4);

    let report = controller.run().await.unwrap();
    let scale = scale();
    let rejected = scale.loaded_users / 10;

    assert_eq!(report.status, RunStatus::CompletedWithErrors { errored: rejected });
    let people = report.entity("Person").unwrap();
    assert_eq!(people.requested, scale.loaded_users);
    assert_eq!(people.committed, scale.loaded_users - rejected);
    assert_eq!(people.errored, rejected);
    assert_eq!(people.unaccounted(), 0);

    // 90% of users made it; siblings in the same batches were not lost.
    assert_eq!(store.row_count(person::TABLE) as u64, scale.loaded_users - rejected);
    assert!(store
        .rows(person::TABLE)
        .iter()
        .all(|r| r.get("userid").and_then(SqlValue::as_i64).is_some_and(|id| id % 10 != 0)));

    // Dependents still load in full.
    assert_eq!(store.row_count(social_event::TABLE) as u64, scale.events);
    assert_eq!(report.entity("SocialEvent").map(|m| m.errored), Some(0));
}

#[tokio::test]
async fn test_row_errors_leave_database_unseeded() {
    let mut controller = controller(every_tenth_person(), 2);
    let report = controller.run().await.unwrap();

    assert!(!report.is_seeded(DEFAULT_SEEDED_THRESHOLD));
    assert!(report.is_seeded(0.5));
    assert!(report.summary(DEFAULT_SEEDED_THRESHOLD).contains("NOT seeded"));
}

#[tokio::test]
async fn test_watermark_counts_committed_rows_only() {
    let mut controller = controller(every_tenth_person(), 3);
    let report = controller.run().await.unwrap();
    let scale = scale();

    assert_eq!(
        report.watermarks.get(person::WATERMARK_KEY).copied(),
        Some(scale.loaded_users - scale.loaded_users / 10)
    );
    assert!(report.watermark_mismatches.is_empty());
}

#[tokio::test]
async fn test_clear_failure_aborts_before_loading() {
    let connector = MemoryConnector::new().fail_truncate(social_event::TABLE);
    let store = connector.store();
    let mut controller = controller(connector, 4);

    let err = controller.run().await.unwrap_err();
    match &err {
        LoadError::Clear { table, .. } => assert_eq!(table, social_event::TABLE),
        other => panic!("expected a clear error, got {other:?}"),
    }
    assert_eq!(store.row_count(person::TABLE), 0);
    assert!(controller.metrics().is_empty());

    let report = controller.aborted_report(err.to_string());
    assert!(matches!(report.status, RunStatus::Aborted { .. }));
    assert!(!report.is_seeded(DEFAULT_SEEDED_THRESHOLD));
}

#[tokio::test]
async fn test_unreachable_database_aborts() {
    let mut controller = controller(MemoryConnector::new().refuse_connections(), 2);
    let err = controller.run().await.unwrap_err();
    assert!(matches!(err, LoadError::Clear { .. }));
    assert!(err.to_string().contains("connection refused"));
}
