//! Friendship invitations sent by each user.

use std::sync::Arc;

use loader_framework::{BatchWriter, InsertRow, Loadable, PostLoadStep, SqlValue, WorkerContext};
use rand::Rng;

use crate::random::distinct_ids;
use crate::scale::ScaleFactors;
use crate::username::user_name;

pub const ENTITY: &str = "Invitation";
pub const TABLE: &str = "INVITATION";
pub const WATERMARK_KEY: &str = "INVITATION_ID";

pub const MIN_INVITEES: usize = 2;
pub const MAX_INVITEES: usize = 10;

const COLUMNS: &[&str] = &["isaccepted", "requestor_username", "candidate_username"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvitationRow {
    pub requestor: String,
    pub candidates: Vec<String>,
}

/// User `index + 1` invites 2..=10 distinct other users.
///
/// Every second invitation of a user is accepted.
pub struct Invitation {
    scale: Arc<ScaleFactors>,
}

impl Invitation {
    pub fn new(scale: Arc<ScaleFactors>) -> Self {
        Self { scale }
    }
}

impl Loadable for Invitation {
    type Row = InvitationRow;

    fn entity(&self) -> &'static str {
        ENTITY
    }

    fn clear_target(&self) -> Option<&'static str> {
        Some(TABLE)
    }

    fn prepare(&self, index: u64, ctx: &mut WorkerContext) -> InvitationRow {
        let id = index + 1;
        let rng = ctx.rng();
        let count = rng.random_range(MIN_INVITEES..=MAX_INVITEES);
        InvitationRow {
            requestor: user_name(id),
            candidates: distinct_ids(rng, count, 1..=self.scale.loaded_users, Some(id))
                .into_iter()
                .map(user_name)
                .collect(),
        }
    }

    fn load(&self, row: InvitationRow, batch: &mut BatchWriter<'_>) {
        for (i, candidate) in row.candidates.into_iter().enumerate() {
            batch.add(InsertRow::new(
                TABLE,
                COLUMNS,
                vec![
                    SqlValue::Bool(i % 2 == 1),
                    SqlValue::Text(row.requestor.clone()),
                    SqlValue::Text(candidate),
                ],
            ));
        }
    }

    fn post_load(&self) -> Vec<PostLoadStep> {
        vec![PostLoadStep::RegisterWatermark {
            key: WATERMARK_KEY,
            table: TABLE,
        }]
    }
}
