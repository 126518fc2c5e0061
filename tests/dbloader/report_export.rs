//! JSON export of load reports.

use loader_framework::testing::MemoryConnector;
use olio_entities::entities::person;
use serde_json::Value;
use tempfile::TempDir;

use crate::common::{controller, scale};

#[tokio::test]
async fn test_completed_report_json() -> Result<(), Box<dyn std::error::Error>> {
    let mut controller = controller(MemoryConnector::new(), 3);
    let report = controller.run().await?;

    let dir = TempDir::new()?;
    let path = dir.path().join("report.json");
    std::fs::write(&path, report.to_json()?)?;

    let json: Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(json["status"]["state"], "completed");
    assert_eq!(json["entities"].as_array().map(Vec::len), Some(9));
    assert_eq!(json["entities"][0]["entity"], "Person");
    assert_eq!(json["entities"][0]["committed"], scale().loaded_users);
    assert_eq!(json["watermarks"][person::WATERMARK_KEY], scale().loaded_users);
    assert!(json["duration_ms"].is_u64());
    assert_eq!(json["watermark_mismatches"].as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn test_aborted_report_json() -> Result<(), Box<dyn std::error::Error>> {
    let connector = MemoryConnector::new().fail_truncate(person::TABLE);
    let mut controller = controller(connector, 2);
    let err = controller.run().await.unwrap_err();

    let json: Value = serde_json::from_str(&controller.aborted_report(err.to_string()).to_json()?)?;
    assert_eq!(json["status"]["state"], "aborted");
    assert!(json["status"]["reason"]
        .as_str()
        .is_some_and(|reason| reason.contains(person::TABLE)));
    Ok(())
}
