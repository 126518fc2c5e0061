//! Reversible mapping between numeric ids and user names.
//!
//! Ids are written in bijective base 26 over `a..=z`, so every id `>= 1`
//! has exactly one name and every lowercase name maps back to one id:
//! `1 -> "a"`, `26 -> "z"`, `27 -> "aa"`. Tags use the same encoding.

const ALPHABET: &[u8; 26] = b"abcdefghijklmnopqrstuvwxyz";

/// Name for `id`. Id 0 has no name and maps to the empty string.
pub fn user_name(id: u64) -> String {
    let mut digits = Vec::new();
    let mut n = id;
    while n > 0 {
        n -= 1;
        digits.push(ALPHABET[(n % 26) as usize]);
        n /= 26;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

/// Id encoded by `name`, or `None` if it is not a valid user name.
pub fn user_id(name: &str) -> Option<u64> {
    if name.is_empty() {
        return None;
    }
    name.bytes().try_fold(0u64, |acc, b| {
        if !b.is_ascii_lowercase() {
            return None;
        }
        acc.checked_mul(26)?.checked_add(u64::from(b - b'a') + 1)
    })
}
