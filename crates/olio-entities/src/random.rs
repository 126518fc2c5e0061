//! Random field helpers shared by the entity generators.

use std::collections::HashSet;
use std::ops::RangeInclusive;

use chrono::{Duration, NaiveDateTime};
use rand::Rng;
use rust_decimal::Decimal;

const LETTERS: &[u8; 26] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8; 10] = b"0123456789";

pub const TIME_ZONES: &[&str] = &[
    "America/Los_Angeles",
    "America/Denver",
    "America/Chicago",
    "America/New_York",
    "America/Sao_Paulo",
    "Europe/London",
    "Europe/Paris",
    "Europe/Moscow",
    "Asia/Kolkata",
    "Asia/Shanghai",
    "Asia/Tokyo",
    "Australia/Sydney",
];

fn push_chars<R: Rng>(rng: &mut R, buf: &mut String, charset: &[u8], len: usize) {
    for _ in 0..len {
        buf.push(charset[rng.random_range(0..charset.len())] as char);
    }
}

/// Lowercase letters, length in `[min, max]`.
pub fn make_c_string<R: Rng>(rng: &mut R, min: usize, max: usize) -> String {
    let mut s = String::with_capacity(max);
    let len = rng.random_range(min..=max);
    push_chars(rng, &mut s, LETTERS, len);
    s
}

/// Decimal digits, length in `[min, max]`.
pub fn make_n_string<R: Rng>(rng: &mut R, min: usize, max: usize) -> String {
    let mut s = String::with_capacity(max);
    let len = rng.random_range(min..=max);
    push_chars(rng, &mut s, DIGITS, len);
    s
}

/// Append a capitalized name with length in `[min, max]` to `buf`.
pub fn append_name<R: Rng>(rng: &mut R, buf: &mut String, min: usize, max: usize) {
    let len = rng.random_range(min.max(1)..=max.max(1));
    let first = LETTERS[rng.random_range(0..LETTERS.len())].to_ascii_uppercase();
    buf.push(first as char);
    push_chars(rng, buf, LETTERS, len - 1);
}

/// A capitalized name with length in `[min, max]`.
pub fn random_name<R: Rng>(rng: &mut R, min: usize, max: usize) -> String {
    let mut s = String::with_capacity(max);
    append_name(rng, &mut s, min, max);
    s
}

/// Append a `NNN-NNN-NNNN` phone number to `buf`.
pub fn append_phone<R: Rng>(rng: &mut R, buf: &mut String) {
    push_chars(rng, buf, DIGITS, 3);
    buf.push('-');
    push_chars(rng, buf, DIGITS, 3);
    buf.push('-');
    push_chars(rng, buf, DIGITS, 4);
}

pub fn random_phone<R: Rng>(rng: &mut R) -> String {
    let mut s = String::with_capacity(12);
    append_phone(rng, &mut s);
    s
}

/// Space separated words totalling between `min` and `max` characters.
pub fn random_text<R: Rng>(rng: &mut R, min: usize, max: usize) -> String {
    let target = rng.random_range(min..=max);
    let mut s = String::with_capacity(target);
    while s.len() < target {
        if !s.is_empty() {
            s.push(' ');
        }
        let word = rng.random_range(1..=12).min(target.saturating_sub(s.len()).max(1));
        push_chars(rng, &mut s, LETTERS, word);
    }
    s.truncate(target);
    // A cut right after a separator would leave a trailing space.
    if s.ends_with(' ') {
        s.pop();
        s.push('x');
    }
    s
}

pub fn random_time_zone<R: Rng>(rng: &mut R) -> &'static str {
    TIME_ZONES[rng.random_range(0..TIME_ZONES.len())]
}

/// A tag id in `[1, tags]`, skewed toward low ids.
///
/// Half the draws come from the most popular `skew` fraction of the tags,
/// the rest are uniform, so a few tags end up far more referenced than
/// others.
pub fn random_tag_id<R: Rng>(rng: &mut R, tags: u64, skew: f64) -> u64 {
    let tags = tags.max(1);
    let popular = ((tags as f64 * skew).ceil() as u64).clamp(1, tags);
    if rng.random_bool(0.5) {
        rng.random_range(1..=popular)
    } else {
        rng.random_range(1..=tags)
    }
}

/// Up to `count` distinct values from `range`, never `exclude`, in draw order.
///
/// The count is capped at the number of values available.
pub fn distinct_ids<R: Rng>(
    rng: &mut R,
    count: usize,
    range: RangeInclusive<u64>,
    exclude: Option<u64>,
) -> Vec<u64> {
    distinct_by(rng, count, range, exclude, |rng, range| rng.random_range(range))
}

/// Like [`distinct_ids`], drawing each candidate with `draw`.
pub fn distinct_by<R: Rng>(
    rng: &mut R,
    count: usize,
    range: RangeInclusive<u64>,
    exclude: Option<u64>,
    mut draw: impl FnMut(&mut R, RangeInclusive<u64>) -> u64,
) -> Vec<u64> {
    if range.is_empty() {
        return Vec::new();
    }
    let size = range.end() - range.start() + 1;
    let excluded = u64::from(exclude.is_some_and(|e| range.contains(&e)));
    let count = count.min((size - excluded) as usize);

    let mut seen = HashSet::with_capacity(count);
    let mut ids = Vec::with_capacity(count);
    while ids.len() < count {
        let id = draw(rng, range.clone());
        if Some(id) != exclude && seen.insert(id) {
            ids.push(id);
        }
    }
    ids
}

/// A decimal with `scale` fractional digits in `[min, max]` (given in the same units).
pub fn random_decimal<R: Rng>(rng: &mut R, min_units: i64, max_units: i64, scale: u32) -> Decimal {
    Decimal::new(rng.random_range(min_units..=max_units), scale)
}

/// A timestamp up to `max_days` after `base`, at whole-minute precision.
pub fn random_date_time<R: Rng>(rng: &mut R, base: NaiveDateTime, max_days: i64) -> NaiveDateTime {
    let minutes = rng.random_range(0..=max_days * 24 * 60);
    base + Duration::minutes(minutes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_strings_respect_lengths() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let c = make_c_string(&mut rng, 3, 10);
            assert!((3..=10).contains(&c.len()));
            assert!(c.bytes().all(|b| b.is_ascii_lowercase()));

            let n = make_n_string(&mut rng, 5, 5);
            assert_eq!(n.len(), 5);
            assert!(n.bytes().all(|b| b.is_ascii_digit()));

            let name = random_name(&mut rng, 2, 12);
            assert!((2..=12).contains(&name.len()));
            assert!(name.starts_with(|c: char| c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn test_random_text_length() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let text = random_text(&mut rng, 15, 20);
            assert!((15..=20).contains(&text.len()), "{text:?}");
            assert!(!text.starts_with(' ') && !text.ends_with(' '));
        }
    }

    #[test]
    fn test_phone_format() {
        let mut rng = StdRng::seed_from_u64(1);
        let phone = random_phone(&mut rng);
        assert_eq!(phone.len(), 12);
        assert_eq!(&phone[3..4], "-");
        assert_eq!(&phone[7..8], "-");
    }

    #[test]
    fn test_distinct_ids() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let ids = distinct_ids(&mut rng, 28, 1..=100, Some(50));
            assert_eq!(ids.len(), 28);
            assert!(!ids.contains(&50));
            assert!(ids.iter().all(|id| (1..=100).contains(id)));
            assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 28);
        }
    }

    #[test]
    fn test_distinct_ids_capped_by_range() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(distinct_ids(&mut rng, 10, 1..=3, Some(2)).len(), 2);
        assert!(distinct_ids(&mut rng, 10, 1..=1, Some(1)).is_empty());
        assert!(distinct_ids(&mut rng, 5, 1..=0, None).is_empty());
    }

    #[test]
    fn test_tag_ids_are_skewed() {
        let mut rng = StdRng::seed_from_u64(11);
        let draws: Vec<u64> = (0..10_000).map(|_| random_tag_id(&mut rng, 100, 0.1)).collect();
        assert!(draws.iter().all(|id| (1..=100).contains(id)));
        let popular = draws.iter().filter(|&&id| id <= 10).count();
        // Uniform draws would put about 10% here.
        assert!(popular > 4000, "only {popular} popular draws");
    }

    #[test]
    fn test_random_decimal_and_dates() {
        let mut rng = StdRng::seed_from_u64(5);
        let lat = random_decimal(&mut rng, -66_560_556, 66_560_556, 6);
        assert_eq!(lat.scale(), 6);
        assert!(lat.abs() <= Decimal::new(66_560_556, 6));

        let base = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let when = random_date_time(&mut rng, base, 540);
        assert!(when >= base && when <= base + Duration::days(540));
    }
}
