//! Dataset scale parameters.

use serde::Serialize;
use thiserror::Error;

/// Default ratio of loaded users to active users.
pub const DEFAULT_LOAD_MULTIPLIER: u64 = 4;

/// Events generated per loaded user.
pub const EVENTS_PER_USER: u64 = 3;

/// Smallest tag vocabulary ever generated.
pub const MIN_TAGS: u64 = 10;

/// Largest key an INTEGER key column can hold.
pub const MAX_KEY: u64 = i32::MAX as u64;

/// Scale factors the schema cannot hold.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScaleError {
    #[error("{count} {what} exceed the largest key ({})", MAX_KEY)]
    KeyOverflow { what: &'static str, count: u64 },
}

/// Counts that size every load phase.
///
/// Built once before loading starts and shared read-only with every
/// generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScaleFactors {
    pub active_users: u64,
    pub loaded_users: u64,
    pub tags: u64,
    pub events: u64,
}

impl ScaleFactors {
    /// Derive every count from the number of concurrently active users.
    pub fn from_active_users(active_users: u64, load_multiplier: u64) -> Self {
        let loaded_users = active_users.saturating_mul(load_multiplier);
        Self {
            active_users,
            loaded_users,
            tags: tag_count(loaded_users),
            events: loaded_users.saturating_mul(EVENTS_PER_USER),
        }
    }

    pub fn with_tags(mut self, tags: u64) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_events(mut self, events: u64) -> Self {
        self.events = events;
        self
    }

    /// Reject counts whose keys would not fit an INTEGER column.
    pub fn validate(&self) -> Result<(), ScaleError> {
        for (what, count) in [
            ("users", self.loaded_users),
            ("tags", self.tags),
            ("events", self.events),
        ] {
            if count > MAX_KEY {
                return Err(ScaleError::KeyOverflow { what, count });
            }
        }
        Ok(())
    }
}

/// Tag vocabulary size: grows with the square root of the user count.
///
/// `log10(tags) = 0.5 * log10(users) + 1`, never below [`MIN_TAGS`].
pub fn tag_count(loaded_users: u64) -> u64 {
    if loaded_users == 0 {
        return MIN_TAGS;
    }
    let log_tags = 0.5 * (loaded_users as f64).log10() + 1.0;
    (10f64.powf(log_tags).round() as u64).max(MIN_TAGS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_active_users() {
        let scale = ScaleFactors::from_active_users(25, DEFAULT_LOAD_MULTIPLIER);
        assert_eq!(scale.loaded_users, 100);
        assert_eq!(scale.events, 300);
        assert_eq!(scale.tags, 100);
    }

    #[test]
    fn test_tag_count_floor() {
        assert_eq!(tag_count(0), MIN_TAGS);
        assert_eq!(tag_count(1), MIN_TAGS);
        assert_eq!(tag_count(10_000), 1000);
    }

    #[test]
    fn test_validate_rejects_keys_beyond_integer_range() {
        assert_eq!(ScaleFactors::from_active_users(25, 4).validate(), Ok(()));
        assert_eq!(
            ScaleFactors::from_active_users(1, MAX_KEY).validate(),
            Err(ScaleError::KeyOverflow {
                what: "events",
                count: MAX_KEY * EVENTS_PER_USER,
            })
        );
        let err = ScaleFactors::from_active_users(MAX_KEY, 2).validate().unwrap_err();
        assert!(matches!(err, ScaleError::KeyOverflow { what: "users", .. }));
        assert!(ScaleFactors::from_active_users(1, 1)
            .with_tags(MAX_KEY + 1)
            .validate()
            .is_err());
    }

    #[test]
    fn test_overrides() {
        let scale = ScaleFactors::from_active_users(10, 2).with_tags(7).with_events(5);
        assert_eq!(scale.loaded_users, 20);
        assert_eq!(scale.tags, 7);
        assert_eq!(scale.events, 5);
    }
}
