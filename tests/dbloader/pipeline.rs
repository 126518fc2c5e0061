//! End-to-end runs without injected failures.

use std::collections::{BTreeMap, HashMap};

use loader_framework::testing::MemoryConnector;
use loader_framework::{RunStatus, DEFAULT_SEEDED_THRESHOLD, WATERMARK_TABLE};
use olio_entities::entities::{
    address, attendees, comments, event_tag, friends, invitation, person, social_event, tag,
};
use olio_entities::user_id;

use crate::common::{controller, int, int_set, scale, text};

#[tokio::test]
async fn test_full_load_commits_every_unit() {
    let connector = MemoryConnector::new();
    let store = connector.store();
    let mut controller = controller(connector, 4);

    let report = controller.run().await.unwrap();
    let scale = scale();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.total_errored(), 0);
    assert_eq!(report.total_requested(), report.total_committed());
    assert!(report.is_seeded(DEFAULT_SEEDED_THRESHOLD));
    assert_eq!(report.entities.len(), 9);

    assert_eq!(store.row_count(person::TABLE) as u64, scale.loaded_users);
    assert_eq!(store.row_count(address::TABLE) as u64, scale.loaded_users);
    assert_eq!(store.row_count(tag::TABLE) as u64, scale.tags);
    assert_eq!(store.row_count(social_event::TABLE) as u64, scale.events);

    let rows_written: u64 = report.entities.iter().map(|m| m.rows_written).sum();
    let stored: usize = [
        person::TABLE,
        friends::TABLE,
        address::TABLE,
        invitation::TABLE,
        tag::TABLE,
        social_event::TABLE,
        event_tag::TABLE,
        attendees::TABLE,
        comments::TABLE,
    ]
    .iter()
    .map(|t| store.row_count(t))
    .sum();
    assert_eq!(rows_written, stored as u64);
}

#[tokio::test]
async fn test_clear_truncates_every_table() {
    let connector = MemoryConnector::new();
    let store = connector.store();
    let mut controller = controller(connector, 2);
    controller.run().await.unwrap();

    let truncations = store.truncations();
    assert_eq!(truncations.len(), 10);
    assert_eq!(truncations.last().map(String::as_str), Some(WATERMARK_TABLE));
    for table in [person::TABLE, tag::TABLE, comments::TABLE, event_tag::TABLE] {
        assert!(truncations.iter().any(|t| t == table), "{table} not cleared");
    }
}

#[tokio::test]
async fn test_keys_are_contiguous() {
    let connector = MemoryConnector::new();
    let store = connector.store();
    let mut controller = controller(connector, 8);
    controller.run().await.unwrap();
    let scale = scale();

    let users: Vec<i64> = (1..=scale.loaded_users as i64).collect();
    let person_ids: Vec<i64> = int_set(&store.rows(person::TABLE), "userid").into_iter().collect();
    assert_eq!(person_ids, users);

    let address_ids: Vec<i64> = int_set(&store.rows(address::TABLE), "addressid").into_iter().collect();
    assert_eq!(address_ids, users);

    let event_ids = int_set(&store.rows(social_event::TABLE), social_event::KEY_COLUMN);
    assert_eq!(event_ids.len() as u64, scale.events);
    assert_eq!(event_ids.last().copied(), Some(scale.events as i64));

    let tag_ids = int_set(&store.rows(tag::TABLE), tag::KEY_COLUMN);
    assert_eq!(tag_ids.len() as u64, scale.tags);
}

#[tokio::test]
async fn test_references_stay_in_range() {
    let connector = MemoryConnector::new();
    let store = connector.store();
    let mut controller = controller(connector, 4);
    controller.run().await.unwrap();
    let scale = scale();
    let users = 1..=scale.loaded_users as i64;

    for row in store.rows(friends::TABLE) {
        let person = int(&row, "Person_userid");
        let friend = int(&row, "friends_userid");
        assert!(users.contains(&person) && users.contains(&friend));
        assert_ne!(person, friend, "user {person} befriended themselves");
    }

    for row in store.rows(invitation::TABLE) {
        assert_ne!(text(&row, "requestor_username"), text(&row, "candidate_username"));
    }

    for row in store.rows(event_tag::TABLE) {
        assert!((1..=scale.tags as i64).contains(&int(&row, event_tag::TAG_COLUMN)));
        assert!((1..=scale.events as i64).contains(&int(&row, event_tag::EVENT_COLUMN)));
    }

    for row in store.rows(attendees::TABLE) {
        let id = user_id(&text(&row, "username")).unwrap();
        assert!((1..=scale.loaded_users).contains(&id));
    }

    for row in store.rows(comments::TABLE) {
        assert!((0..=comments::MAX_RATING as i64).contains(&int(&row, comments::RATING_COLUMN)));
    }
}

#[tokio::test]
async fn test_tag_refcounts_match_links() {
    let connector = MemoryConnector::new();
    let store = connector.store();
    let mut controller = controller(connector, 4);
    controller.run().await.unwrap();

    let mut links: HashMap<i64, i64> = HashMap::new();
    for row in store.rows(event_tag::TABLE) {
        *links.entry(int(&row, event_tag::TAG_COLUMN)).or_default() += 1;
    }
    assert!(!links.is_empty());

    for row in store.rows(tag::TABLE) {
        let id = int(&row, tag::KEY_COLUMN);
        let expected = links.get(&id).copied().unwrap_or(0);
        assert_eq!(int(&row, tag::REFCOUNT_COLUMN), expected, "refcount of tag {id}");
    }
}

#[tokio::test]
async fn test_event_votes_follow_comments() {
    let connector = MemoryConnector::new();
    let store = connector.store();
    let mut controller = controller(connector, 4);
    controller.run().await.unwrap();

    let mut votes: HashMap<i64, i64> = HashMap::new();
    for row in store.rows(comments::TABLE) {
        *votes.entry(int(&row, comments::EVENT_COLUMN)).or_default() += 1;
    }
    assert!(!votes.is_empty());

    let events = store.rows(social_event::TABLE);
    assert_eq!(events.len() as u64, scale().events);
    for row in &events {
        let id = int(row, social_event::KEY_COLUMN);
        let expected = votes.get(&id).copied().unwrap_or(0);
        assert_eq!(int(row, "numberofvotes"), expected, "votes of event {id}");
    }

    // The score sum runs once, after the last comment was committed.
    let last_comment = store.last_write(comments::TABLE).unwrap();
    let score_updates: Vec<u64> = store
        .executed_sql()
        .into_iter()
        .filter(|(_, sql)| sql.contains("SET totalscore") && sql.contains(comments::TABLE))
        .map(|(tick, _)| tick)
        .collect();
    assert_eq!(score_updates.len(), 1);
    assert!(score_updates[0] > last_comment);
}

#[tokio::test]
async fn test_watermarks_match_loaded_rows() {
    let connector = MemoryConnector::new();
    let store = connector.store();
    let mut controller = controller(connector, 4);
    let report = controller.run().await.unwrap();
    let scale = scale();

    let expected: BTreeMap<String, u64> = [
        (person::WATERMARK_KEY, scale.loaded_users),
        (address::WATERMARK_KEY, scale.loaded_users),
        (invitation::WATERMARK_KEY, store.row_count(invitation::TABLE) as u64),
        (tag::WATERMARK_KEY, scale.tags),
        (social_event::WATERMARK_KEY, scale.events),
        (comments::WATERMARK_KEY, store.row_count(comments::TABLE) as u64),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    assert_eq!(report.watermarks, expected);
    assert!(report.watermark_mismatches.is_empty());
    assert_eq!(store.watermarks(), expected);
}

#[tokio::test]
async fn test_rerun_replaces_previous_data() {
    let connector = MemoryConnector::new();
    let store = connector.store();

    controller(connector.clone(), 4).run().await.unwrap();
    let first_people = store.row_count(person::TABLE);

    let report = controller(connector, 3).run().await.unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(store.row_count(person::TABLE), first_people);
    assert_eq!(store.row_count(WATERMARK_TABLE), 6);
}

#[tokio::test]
async fn test_single_worker_runs_are_reproducible() {
    let first = MemoryConnector::new();
    let second = MemoryConnector::new();

    controller(first.clone(), 1).run().await.unwrap();
    controller(second.clone(), 1).run().await.unwrap();

    assert_eq!(first.store().rows(person::TABLE), second.store().rows(person::TABLE));
    assert_eq!(first.store().rows(friends::TABLE), second.store().rows(friends::TABLE));
}
