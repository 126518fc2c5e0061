//! The Olio social-events dataset.
//!
//! Nine entity generators (users, friendships, addresses, invitations, tags,
//! events, event tags, attendees, comments), the scale factors that size
//! them, and the dependency graph and post-load order the controller runs
//! them in.

pub mod entities;
pub mod graph;
pub mod random;
pub mod registry;
pub mod scale;
pub mod username;

pub use graph::{olio_graph, POST_LOAD_ORDER};
pub use registry::{PlannedLoad, Registry};
pub use scale::{ScaleError, ScaleFactors, DEFAULT_LOAD_MULTIPLIER, MAX_KEY};
pub use username::{user_id, user_name};
