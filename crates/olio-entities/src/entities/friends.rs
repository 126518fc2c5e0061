//! Friendship links between users.

use std::sync::Arc;

use loader_framework::{BatchWriter, InsertRow, Loadable, WorkerContext};
use rand::Rng;

use super::key;
use crate::random::distinct_ids;
use crate::scale::ScaleFactors;

pub const ENTITY: &str = "Friends";
pub const TABLE: &str = "PERSON_PERSON";

pub const MIN_FRIENDS: usize = 2;
pub const MAX_FRIENDS: usize = 28;

const COLUMNS: &[&str] = &["Person_userid", "friends_userid"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FriendsRow {
    pub user_id: u64,
    pub friend_ids: Vec<u64>,
}

/// Links user `index + 1` to 2..=28 distinct other loaded users.
pub struct Friends {
    scale: Arc<ScaleFactors>,
}

impl Friends {
    pub fn new(scale: Arc<ScaleFactors>) -> Self {
        Self { scale }
    }
}

impl Loadable for Friends {
    type Row = FriendsRow;

    fn entity(&self) -> &'static str {
        ENTITY
    }

    fn clear_target(&self) -> Option<&'static str> {
        Some(TABLE)
    }

    fn prepare(&self, index: u64, ctx: &mut WorkerContext) -> FriendsRow {
        let user_id = index + 1;
        let rng = ctx.rng();
        let count = rng.random_range(MIN_FRIENDS..=MAX_FRIENDS);
        FriendsRow {
            user_id,
            friend_ids: distinct_ids(rng, count, 1..=self.scale.loaded_users, Some(user_id)),
        }
    }

    fn load(&self, row: FriendsRow, batch: &mut BatchWriter<'_>) {
        for friend in row.friend_ids {
            batch.add(InsertRow::new(TABLE, COLUMNS, vec![key(row.user_id), key(friend)]));
        }
    }
}
