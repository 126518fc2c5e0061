//! Connection ownership and stage ordering.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use loader_framework::testing::MemoryConnector;
use loader_framework::{LoadError, Loader, LoaderConfig, Phase};
use olio_entities::entities::{friends, Friends, Person};
use olio_entities::{olio_graph, ScaleFactors};

use crate::common::{controller, int, SEED};

#[tokio::test]
async fn test_workers_never_share_connections() {
    let connector = MemoryConnector::new().with_write_delay(Duration::from_millis(1));
    let store = connector.store();
    let mut controller = controller(connector, 6);

    let report = controller.run().await.unwrap();
    assert_eq!(report.total_errored(), 0);

    // Every connection is written through by exactly one pool worker.
    let writers = store.writers_per_connection();
    assert!(!writers.is_empty());
    let mut connections_of: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (connection, workers) in &writers {
        assert_eq!(workers.len(), 1, "connection {connection} used by {workers:?}");
        let worker = workers.iter().next().copied().flatten();
        let worker = worker.unwrap_or_else(|| panic!("connection {connection} written outside the pool"));
        assert!(worker < 6);
        connections_of.entry(worker).or_default().push(*connection);
    }

    // No worker ever holds two live connections.
    let lifetimes = store.lifetimes();
    for (worker, connections) in &connections_of {
        for (i, a) in connections.iter().enumerate() {
            for b in &connections[i + 1..] {
                assert!(
                    !lifetimes[a].overlaps(&lifetimes[b]),
                    "worker {worker} had connections {a} and {b} open together"
                );
            }
        }
    }
    assert_eq!(store.connections_opened(), store.connections_closed());
}

#[tokio::test]
async fn test_post_load_uses_fresh_connections() {
    let connector = MemoryConnector::new();
    let store = connector.store();
    let mut controller = controller(connector, 2);
    controller.run().await.unwrap();

    // Clearing uses one connection per table, post-load one per entity with
    // steps, plus one to read watermarks back; the two workers add theirs.
    let clears = 10;
    let post_loads = 6;
    let opened = store.connections_opened();
    assert!(opened >= clears + post_loads + 1);
    assert!(opened <= clears + post_loads + 1 + 2);
}

#[tokio::test]
async fn test_dependents_wait_for_prerequisites() {
    let scale = Arc::new(ScaleFactors::from_active_users(25, 4));
    let connector = MemoryConnector::new();
    let store = connector.store();
    let config = LoaderConfig::default().with_parallelism(4).with_seed(SEED);
    let mut loader = Loader::new(connector, config).with_dependency_graph(olio_graph());

    loader
        .load(Arc::new(Person::new(Arc::clone(&scale))), scale.loaded_users)
        .await
        .unwrap();
    assert_eq!(loader.phase(), Phase::Loading);

    let err = loader
        .load(Arc::new(Friends::new(Arc::clone(&scale))), scale.loaded_users)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LoadError::DependencyNotDrained { ref entity, ref prerequisite }
            if entity == "Friends" && prerequisite == "Person"
    ));

    loader.wait_processing().await;
    loader
        .load(Arc::new(Friends::new(Arc::clone(&scale))), scale.loaded_users)
        .await
        .unwrap();
    loader.wait_processing().await;
    loader.shutdown().await;

    let metrics = loader.metrics().into_iter().find(|m| m.entity == "Friends").unwrap();
    assert_eq!(metrics.committed, 100);

    let rows = store.rows(friends::TABLE);
    assert!(rows.len() >= 2 * 100);
    for row in rows {
        let owner = int(&row, "Person_userid");
        let friend = int(&row, "friends_userid");
        assert!((1..=100).contains(&friend));
        assert_ne!(owner, friend);
    }
}

#[tokio::test]
async fn test_clear_is_idempotent() {
    let connector = MemoryConnector::new();
    let store = connector.store();
    let mut controller = controller(connector, 2);
    controller.run().await.unwrap();

    controller.clear_all().await.unwrap();
    let after_one = store.truncations().len();
    controller.clear_all().await.unwrap();

    assert_eq!(store.truncations().len(), after_one + 10);
    assert_eq!(store.row_count("PERSON"), 0);
    assert_eq!(store.row_count("ID_GEN"), 0);
}
