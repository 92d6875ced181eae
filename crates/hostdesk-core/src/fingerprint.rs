//! Snapshot identity fingerprinting.
//!
//! A fingerprint is a SHA-256 digest over the sorted, de-duplicated,
//! length-delimited identifier set of a snapshot. Two snapshots carrying the
//! same identifiers (in any order) always hash identically, so a detector can
//! skip an entire cycle when nothing changed. Skipping is purely an
//! optimization: correctness of eventual detection never depends on it.

use sha2::{Digest, Sha256};

/// Compute the fingerprint of a snapshot's identifier set.
///
/// Identifiers are sorted and de-duplicated first, and each is fed to the
/// hasher with a length prefix so that `["ab", "c"]` and `["a", "bc"]`
/// cannot collide. Returns the hex-encoded digest (64 characters).
#[must_use]
pub fn snapshot_fingerprint<'a, I>(ids: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut sorted: Vec<&str> = ids.into_iter().collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut hasher = Sha256::new();
    for id in &sorted {
        hasher.update((id.len() as u64).to_le_bytes());
        hasher.update(id.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_does_not_matter() {
        let a = snapshot_fingerprint(["r-1", "r-2", "r-3"]);
        let b = snapshot_fingerprint(["r-3", "r-1", "r-2"]);
        assert_eq!(a, b);
    }

    #[test]
    fn duplicates_do_not_matter() {
        let a = snapshot_fingerprint(["r-1", "r-2"]);
        let b = snapshot_fingerprint(["r-1", "r-2", "r-2", "r-1"]);
        assert_eq!(a, b);
    }

    #[test]
    fn different_sets_differ() {
        let a = snapshot_fingerprint(["r-1", "r-2"]);
        let b = snapshot_fingerprint(["r-1", "r-3"]);
        assert_ne!(a, b);
    }

    #[test]
    fn length_delimiting_prevents_concatenation_collisions() {
        let a = snapshot_fingerprint(["ab", "c"]);
        let b = snapshot_fingerprint(["a", "bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn empty_set_has_a_fingerprint() {
        let fp = snapshot_fingerprint([]);
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
