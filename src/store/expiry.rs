//! Expiry index
//!
//! Tracks the absolute deadline (milliseconds since the Unix epoch) of every
//! key that has one. Keys are kept in a dense vector next to the lookup map,
//! so the active sweep can draw uniform random samples in O(1) per key
//! instead of walking the whole keyspace.

use bytes::Bytes;
use rand::Rng;
use siphasher::sip::SipHasher13;
use std::collections::HashMap;
use std::hash::BuildHasherDefault;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall clock time in milliseconds since the Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Expiry state of a single key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryState {
    /// No deadline is set
    NoExpiry,
    /// A deadline is set and has not passed yet
    Armed(u64),
    /// The deadline has passed; the key must be treated as absent
    Expired,
}

/// Remaining lifetime of a key as reported by TTL and PTTL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// The key does not exist
    Missing,
    /// The key exists without a deadline
    Persistent,
    /// Milliseconds left before the key expires
    Remaining(u64),
}

impl Ttl {
    /// Reply value in seconds (-2 missing, -1 persistent), rounded like Redis
    pub fn as_secs(&self) -> i64 {
        match self {
            Ttl::Missing => -2,
            Ttl::Persistent => -1,
            Ttl::Remaining(ms) => ((ms + 500) / 1000) as i64,
        }
    }

    /// Reply value in milliseconds
    pub fn as_millis(&self) -> i64 {
        match self {
            Ttl::Missing => -2,
            Ttl::Persistent => -1,
            Ttl::Remaining(ms) => *ms as i64,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    pos: usize,
    deadline: u64,
}

/// Deadlines of all keys with a TTL in one database
#[derive(Debug, Default)]
pub struct ExpiryIndex {
    keys: Vec<Bytes>,
    slots: HashMap<Bytes, Slot, BuildHasherDefault<SipHasher13>>,
}

impl ExpiryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a deadline
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Set or move the deadline of a key
    pub fn arm(&mut self, key: Bytes, deadline: u64) {
        if let Some(slot) = self.slots.get_mut(&key) {
            slot.deadline = deadline;
            return;
        }
        let pos = self.keys.len();
        self.keys.push(key.clone());
        self.slots.insert(key, Slot { pos, deadline });
    }

    /// Clear the deadline of a key, returning it if there was one
    pub fn disarm(&mut self, key: &[u8]) -> Option<u64> {
        let slot = self.slots.remove(key)?;
        self.keys.swap_remove(slot.pos);
        if let Some(moved) = self.keys.get(slot.pos) {
            if let Some(moved_slot) = self.slots.get_mut(moved) {
                moved_slot.pos = slot.pos;
            }
        }
        Some(slot.deadline)
    }

    /// The deadline of a key, if armed
    pub fn deadline(&self, key: &[u8]) -> Option<u64> {
        self.slots.get(key).map(|slot| slot.deadline)
    }

    /// Where the key stands relative to `now`
    pub fn state(&self, key: &[u8], now: u64) -> ExpiryState {
        match self.deadline(key) {
            None => ExpiryState::NoExpiry,
            Some(deadline) if now >= deadline => ExpiryState::Expired,
            Some(deadline) => ExpiryState::Armed(deadline),
        }
    }

    /// Draw up to `count` distinct keys uniformly at random
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, count: usize) -> Vec<(Bytes, u64)> {
        let amount = count.min(self.keys.len());
        rand::seq::index::sample(rng, self.keys.len(), amount)
            .into_iter()
            .filter_map(|pos| {
                let key = &self.keys[pos];
                self.deadline(key).map(|deadline| (key.clone(), deadline))
            })
            .collect()
    }

    /// Iterate `(key, deadline)` pairs in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, u64)> {
        self.slots.iter().map(|(key, slot)| (key, slot.deadline))
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arm_disarm_keeps_positions_consistent() {
        let mut index = ExpiryIndex::new();
        index.arm(Bytes::from("a"), 10);
        index.arm(Bytes::from("b"), 20);
        index.arm(Bytes::from("c"), 30);

        assert_eq!(index.disarm(b"a"), Some(10));
        assert_eq!(index.len(), 2);
        // "c" was swapped into slot 0 and must still be removable
        assert_eq!(index.disarm(b"c"), Some(30));
        assert_eq!(index.disarm(b"c"), None);
        assert_eq!(index.deadline(b"b"), Some(20));
    }

    #[test]
    fn test_rearm_updates_deadline() {
        let mut index = ExpiryIndex::new();
        index.arm(Bytes::from("a"), 10);
        index.arm(Bytes::from("a"), 50);
        assert_eq!(index.len(), 1);
        assert_eq!(index.deadline(b"a"), Some(50));
    }

    #[test]
    fn test_state_transitions() {
        let mut index = ExpiryIndex::new();
        assert_eq!(index.state(b"k", 100), ExpiryState::NoExpiry);
        index.arm(Bytes::from("k"), 200);
        assert_eq!(index.state(b"k", 100), ExpiryState::Armed(200));
        assert_eq!(index.state(b"k", 200), ExpiryState::Expired);
        index.disarm(b"k");
        assert_eq!(index.state(b"k", 300), ExpiryState::NoExpiry);
    }

    #[test]
    fn test_sample_is_bounded_and_distinct() {
        let mut index = ExpiryIndex::new();
        for i in 0..100 {
            index.arm(Bytes::from(format!("key:{}", i)), i);
        }
        let mut rng = rand::thread_rng();
        let sample = index.sample(&mut rng, 20);
        assert_eq!(sample.len(), 20);

        let mut keys: Vec<_> = sample.iter().map(|(k, _)| k.clone()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), 20);

        assert_eq!(index.sample(&mut rng, 500).len(), 100);
    }
}
