//! Store Entry Module
//!
//! Defines the structure for individual ephemeral entries with TTL support.

use chrono::Utc;

use crate::cache::{CacheKey, Operation};

// == Store Entry ==
/// One stored payload and its metadata. Replaced, never mutated.
#[derive(Debug, Clone)]
pub struct StoreEntry {
    /// Full storage key
    pub key: String,
    /// Storage key without the detail level
    pub family: String,
    /// Detail level the payload was produced at
    pub detail_level: u32,
    /// Encoded result
    pub payload: Vec<u8>,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
    /// TTL in seconds, 0 = no expiration
    pub ttl_seconds: u64,
    /// Operation that produced the payload
    pub source_operation: Operation,
}

impl StoreEntry {
    // == Constructor ==
    /// Creates a new entry for `key` stamped with the current time.
    pub fn new(key: &CacheKey, payload: Vec<u8>, ttl_seconds: u64) -> Self {
        Self {
            key: key.storage_key(),
            family: key.family(),
            detail_level: key.detail_level,
            payload,
            created_at: current_timestamp_ms(),
            ttl_seconds,
            source_operation: key.operation,
        }
    }

    // == Expires At ==
    /// Expiration timestamp (Unix milliseconds), None = no expiration.
    pub fn expires_at(&self) -> Option<i64> {
        (self.ttl_seconds > 0).then(|| self.created_at + (self.ttl_seconds as i64) * 1000)
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time is greater than or equal
    /// to `created_at + ttl`.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        match self.expires_at() {
            Some(expires) => now_ms >= expires,
            None => false,
        }
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::KeyDeriver;
    use std::thread::sleep;
    use std::time::Duration;

    fn key() -> CacheKey {
        KeyDeriver::derive(Operation::Scrape, "vinted", "https://vinted.example/items/1", 2, &[] as &[&str])
    }

    #[test]
    fn test_entry_creation_no_ttl() {
        let entry = StoreEntry::new(&key(), b"{}".to_vec(), 0);

        assert!(entry.expires_at().is_none());
        assert!(!entry.is_expired());
        assert_eq!(entry.detail_level, 2);
        assert_eq!(entry.source_operation, Operation::Scrape);
    }

    #[test]
    fn test_entry_creation_with_ttl() {
        let entry = StoreEntry::new(&key(), b"{}".to_vec(), 60);

        assert_eq!(entry.expires_at(), Some(entry.created_at + 60_000));
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_entry_expiration() {
        let entry = StoreEntry::new(&key(), b"{}".to_vec(), 1);

        assert!(!entry.is_expired());

        sleep(Duration::from_millis(1100));

        assert!(entry.is_expired());
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let entry = StoreEntry::new(&key(), b"{}".to_vec(), 1);
        let expires = entry.expires_at().unwrap();

        assert!(!entry.is_expired_at(expires - 1));
        assert!(entry.is_expired_at(expires), "Entry should be expired at boundary");
    }
}
