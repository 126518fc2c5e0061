//! One generator per Olio entity type.
//!
//! Entities whose rows are referenced by others (users, addresses, tags,
//! events) insert their key explicitly as `index + 1`, so references drawn
//! from `[1, count]` resolve no matter which worker wrote the row.

pub mod address;
pub mod attendees;
pub mod comments;
pub mod event_tag;
pub mod friends;
pub mod invitation;
pub mod person;
pub mod social_event;
pub mod tag;

pub use address::Address;
pub use attendees::Attendees;
pub use comments::Comments;
pub use event_tag::EventTag;
pub use friends::Friends;
pub use invitation::Invitation;
pub use person::Person;
pub use social_event::SocialEvent;
pub use tag::Tag;

use loader_framework::SqlValue;

/// Integer key column value.
///
/// Keys above [`crate::MAX_KEY`] bind as BIGINT, which an INTEGER column
/// rejects, so they surface as row errors instead of colliding.
pub(crate) fn key(id: u64) -> SqlValue {
    match i32::try_from(id) {
        Ok(id) => SqlValue::Int(id),
        Err(_) => SqlValue::BigInt(i64::try_from(id).unwrap_or(i64::MAX)),
    }
}
