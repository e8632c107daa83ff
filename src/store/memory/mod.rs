//! In-memory storage implementation
//!
//! A `MemoryStore` is one logical database: the key map, the expiry index of
//! its armed keys, and incremental memory accounting. Type-specific
//! operations live in the submodules and all go through `read` / `modify`,
//! which apply lazy expiry and keep the accounting consistent.
//!
//! Keys also sit in a dense slot order, which gives uniform sampling and a
//! stable cursor for copy-on-write captures: while a capture runs, every
//! entry is copied out exactly once, either when the cursor reaches it or
//! right before a write would change it.

mod hash;
mod list;
mod set;
mod sorted_set;
mod string;

pub use sorted_set::{ZAddFlags, ZAddOutcome};

use super::database::SnapshotEntry;
use super::entry::Entry;
use super::eviction::{EvictionPolicy, EVICTION_SAMPLE_SIZE};
use super::expiry::{now_ms, ExpiryIndex, ExpiryState, Ttl};
use super::pattern::glob_match;
use super::value::{entry_cost, Value};
use crate::error::{StoreError, StoreResult};
use bytes::Bytes;
use rand::seq::{index, SliceRandom};
use rand::Rng;
use siphasher::sip::SipHasher13;
use std::collections::HashMap;
use std::hash::BuildHasherDefault;

/// Type alias for our hash map with SipHasher
type StoreMap = HashMap<Bytes, Entry, BuildHasherDefault<SipHasher13>>;

/// Counters reported by INFO
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub keyspace_hits: u64,
    pub keyspace_misses: u64,
    pub expired_keys: u64,
    pub evicted_keys: u64,
}

impl StoreStats {
    pub fn merge(&mut self, other: &StoreStats) {
        self.keyspace_hits += other.keyspace_hits;
        self.keyspace_misses += other.keyspace_misses;
        self.expired_keys += other.expired_keys;
        self.evicted_keys += other.evicted_keys;
    }
}

/// Memory delta and change flag collected while a value is edited in place
#[derive(Debug, Default)]
pub(crate) struct Mutation {
    grown: usize,
    shrunk: usize,
    changed: bool,
}

impl Mutation {
    pub(crate) fn grow(&mut self, bytes: usize) {
        self.grown += bytes;
        self.changed = true;
    }

    pub(crate) fn shrink(&mut self, bytes: usize) {
        self.shrunk += bytes;
        self.changed = true;
    }

    pub(crate) fn replace(&mut self, old: usize, new: usize) {
        self.shrink(old);
        self.grow(new);
    }

    /// Record a change that does not move memory
    pub(crate) fn mark(&mut self) {
        self.changed = true;
    }
}

/// Result of one active expiry pass over a database
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpireRound {
    pub sampled: usize,
    pub expired: usize,
}

/// A copy-on-write capture of one database for a background rewrite
struct Capture {
    db: usize,
    epoch: u64,
    /// Next slot of the key order to visit
    cursor: usize,
    /// Entries copied out right before a write changed them
    copied: Vec<SnapshotEntry>,
}

/// In-memory key-value store for one logical database
pub struct MemoryStore {
    /// The main storage map
    entries: StoreMap,

    /// Every key, indexed by `Entry::slot`
    order: Vec<Bytes>,

    /// Bumped whenever a capture starts
    epoch: u64,

    capture: Option<Capture>,

    /// Deadlines of keys with a TTL
    expires: ExpiryIndex,

    /// Approximate bytes held by keys and values
    used_memory: usize,

    /// Bumped on every change to the keyspace
    dirty: u64,

    /// Keys removed by expiry that still have to be propagated as DEL
    expired: Vec<Bytes>,

    stats: StoreStats,
}

impl MemoryStore {
    /// Create a new memory store with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create a new memory store with specified initial capacity
    pub fn with_capacity(capacity: usize) -> Self {
        MemoryStore {
            entries: HashMap::with_capacity_and_hasher(
                capacity,
                BuildHasherDefault::<SipHasher13>::default(),
            ),
            order: Vec::with_capacity(capacity),
            epoch: 0,
            capture: None,
            expires: ExpiryIndex::new(),
            used_memory: 0,
            dirty: 0,
            expired: Vec::new(),
            stats: StoreStats::default(),
        }
    }

    /// Delete the key if its deadline has passed. Returns true if it did.
    fn expire_if_needed(&mut self, key: &[u8]) -> bool {
        if self.expires.state(key, now_ms()) != ExpiryState::Expired {
            return false;
        }
        if let Some((key, _)) = self.remove_entry(key) {
            self.expired.push(key);
            self.stats.expired_keys += 1;
        }
        true
    }

    /// Insert an entry for a key that is known to be absent
    fn insert_entry(&mut self, key: Bytes, value: Value, expire_at: Option<u64>) {
        self.used_memory += entry_cost(&key, &value);
        if let Some(deadline) = expire_at {
            self.expires.arm(key.clone(), deadline);
        }
        let mut entry = Entry::new(value);
        entry.slot = self.order.len();
        entry.epoch = self.epoch;
        self.order.push(key.clone());
        self.entries.insert(key, entry);
    }

    /// Remove an entry together with its deadline and memory charge
    fn remove_entry(&mut self, key: &[u8]) -> Option<(Bytes, Entry)> {
        self.preserve(key);
        let (key, entry) = self.entries.remove_entry(key)?;
        self.unlink(entry.slot);
        self.used_memory = self
            .used_memory
            .saturating_sub(entry_cost(&key, &entry.value));
        self.expires.disarm(&key);
        Some((key, entry))
    }

    /// Free a slot of the key order by moving the last key into it
    fn unlink(&mut self, slot: usize) {
        let Some(last) = self.order.len().checked_sub(1) else {
            return;
        };
        // A key moved behind the cursor would never be visited
        let behind_cursor = self.capture.as_ref().map_or(false, |c| slot < c.cursor);
        if slot != last && behind_cursor {
            let moved = self.order[last].clone();
            self.preserve(&moved);
        }
        self.order.swap_remove(slot);
        if let Some(moved) = self.order.get(slot) {
            if let Some(entry) = self.entries.get_mut(moved) {
                entry.slot = slot;
            }
        }
    }

    /// Copy an entry into the running capture before it changes, unless
    /// the capture already holds it
    fn preserve(&mut self, key: &[u8]) {
        let Some(capture) = self.capture.as_mut() else {
            return;
        };
        let Some(entry) = self.entries.get_mut(key) else {
            return;
        };
        if entry.epoch >= capture.epoch {
            return;
        }
        entry.epoch = capture.epoch;
        let expire_at = match self.expires.state(key, now_ms()) {
            ExpiryState::Expired => return,
            ExpiryState::Armed(deadline) => Some(deadline),
            ExpiryState::NoExpiry => None,
        };
        capture.copied.push(SnapshotEntry {
            db: capture.db,
            key: self.order[entry.slot].clone(),
            value: entry.value.clone(),
            expire_at,
        });
    }

    /// Start a copy-on-write capture of the current keyspace. The capture
    /// is collected with `capture_step` while writes continue.
    pub fn begin_capture(&mut self, db: usize) {
        self.epoch += 1;
        self.capture = Some(Capture {
            db,
            epoch: self.epoch,
            cursor: 0,
            copied: Vec::new(),
        });
    }

    /// Move up to `limit` more slots of the capture into `out`, along with
    /// entries copied on write. Returns true once every key is covered.
    pub fn capture_step(&mut self, limit: usize, out: &mut Vec<SnapshotEntry>) -> bool {
        let Some(capture) = self.capture.as_mut() else {
            return true;
        };
        out.append(&mut capture.copied);

        let now = now_ms();
        let start = capture.cursor;
        let end = start.saturating_add(limit).min(self.order.len());
        for slot in start..end {
            let key = &self.order[slot];
            let Some(entry) = self.entries.get_mut(key) else {
                continue;
            };
            if entry.epoch >= capture.epoch {
                continue;
            }
            entry.epoch = capture.epoch;
            let expire_at = match self.expires.state(key, now) {
                ExpiryState::Expired => continue,
                ExpiryState::Armed(deadline) => Some(deadline),
                ExpiryState::NoExpiry => None,
            };
            out.push(SnapshotEntry {
                db: capture.db,
                key: key.clone(),
                value: entry.value.clone(),
                expire_at,
            });
        }

        capture.cursor = end.max(start);
        if capture.cursor >= self.order.len() {
            self.capture = None;
            return true;
        }
        false
    }

    /// Drop a running capture
    pub fn abort_capture(&mut self) {
        self.capture = None;
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    /// Get a value by key, returns None if not found or expired
    pub fn get(&mut self, key: &[u8]) -> Option<&Value> {
        self.expire_if_needed(key);
        match self.entries.get_mut(key) {
            Some(entry) => {
                self.stats.keyspace_hits += 1;
                entry.touch();
                Some(&entry.value)
            }
            None => {
                self.stats.keyspace_misses += 1;
                None
            }
        }
    }

    /// Run a read-only closure against the live value of `key`
    pub(crate) fn read<T>(
        &mut self,
        key: &[u8],
        f: impl FnOnce(&Value) -> StoreResult<T>,
    ) -> StoreResult<Option<T>> {
        match self.get(key) {
            Some(value) => f(value).map(Some),
            None => Ok(None),
        }
    }

    /// Edit the live value of `key` in place
    ///
    /// When the key is absent it is created with `create`, or `Ok(None)` is
    /// returned if no constructor is given. Collections left empty are
    /// removed, and so is a freshly created key whose edit failed.
    pub(crate) fn modify<T>(
        &mut self,
        key: &Bytes,
        create: Option<fn() -> Value>,
        f: impl FnOnce(&mut Value, &mut Mutation) -> StoreResult<T>,
    ) -> StoreResult<Option<T>> {
        self.expire_if_needed(key);

        let created = if self.entries.contains_key(&key[..]) {
            false
        } else {
            match create {
                Some(make) => {
                    self.insert_entry(key.clone(), make(), None);
                    true
                }
                None => return Ok(None),
            }
        };

        self.preserve(key);
        let mut mutation = Mutation::default();
        let (result, now_empty) = match self.entries.get_mut(&key[..]) {
            Some(entry) => {
                entry.touch();
                let result = f(&mut entry.value, &mut mutation);
                (result, entry.value.is_empty_collection())
            }
            None => return Ok(None),
        };

        self.used_memory = (self.used_memory + mutation.grown).saturating_sub(mutation.shrunk);
        if now_empty || (created && result.is_err()) {
            self.remove_entry(key);
        }
        if mutation.changed || (created && result.is_ok()) {
            self.dirty += 1;
        }
        result.map(Some)
    }

    /// Store a value, replacing whatever the key held and clearing its TTL.
    /// A deadline that already passed leaves the key deleted.
    pub fn set(&mut self, key: Bytes, value: Value, expire_at: Option<u64>) {
        self.expire_if_needed(&key);
        self.remove_entry(&key);
        self.dirty += 1;
        if matches!(expire_at, Some(deadline) if deadline <= now_ms()) {
            return;
        }
        self.insert_entry(key, value, expire_at);
    }

    /// Add the elements of `part` to the value of `key`, which must already
    /// exist with the same type. Used to reassemble values split on disk.
    pub fn absorb(&mut self, key: Bytes, part: Value) -> bool {
        let cost = part.memory_usage();
        let outcome = self.modify(&key, None, |value, mutation| {
            if !value.absorb(part) {
                return Err(StoreError::WrongType);
            }
            mutation.grow(cost);
            Ok(())
        });
        matches!(outcome, Ok(Some(())))
    }

    /// Store a value while keeping the key's current deadline
    pub fn set_keep_ttl(&mut self, key: Bytes, value: Value) {
        self.expire_if_needed(&key);
        let deadline = self.expires.deadline(&key);
        self.set(key, value, deadline);
    }

    /// Delete a key, returns true if the key existed
    pub fn delete(&mut self, key: &[u8]) -> bool {
        if self.expire_if_needed(key) {
            return false;
        }
        match self.remove_entry(key) {
            Some(_) => {
                self.dirty += 1;
                true
            }
            None => false,
        }
    }

    /// Check if a key exists (and is not expired)
    pub fn exists(&mut self, key: &[u8]) -> bool {
        self.expire_if_needed(key);
        self.entries.contains_key(key)
    }

    /// Type name of the value held by a key
    pub fn value_type(&mut self, key: &[u8]) -> Option<&'static str> {
        self.expire_if_needed(key);
        self.entries.get(key).map(|entry| entry.value.type_name())
    }

    /// Arm an absolute deadline (unix ms) on an existing key. A deadline in
    /// the past deletes the key. Returns false if the key does not exist.
    pub fn expire_at(&mut self, key: &[u8], deadline: u64) -> bool {
        if self.expire_if_needed(key) {
            return false;
        }
        let key = match self.entries.get_key_value(key) {
            Some((key, _)) => key.clone(),
            None => return false,
        };
        self.preserve(&key);
        self.dirty += 1;
        if deadline <= now_ms() {
            self.remove_entry(&key);
        } else {
            self.expires.arm(key, deadline);
        }
        true
    }

    /// Remove the deadline of a key. Returns true if one was removed.
    pub fn persist(&mut self, key: &[u8]) -> bool {
        if self.expire_if_needed(key) {
            return false;
        }
        self.preserve(key);
        if self.expires.disarm(key).is_some() {
            self.dirty += 1;
            true
        } else {
            false
        }
    }

    /// Remaining lifetime of a key
    pub fn ttl(&mut self, key: &[u8]) -> Ttl {
        if self.expire_if_needed(key) || !self.entries.contains_key(key) {
            return Ttl::Missing;
        }
        match self.expires.deadline(key) {
            Some(deadline) => Ttl::Remaining(deadline.saturating_sub(now_ms())),
            None => Ttl::Persistent,
        }
    }

    /// Absolute deadline of a key, if it has one
    pub fn deadline(&self, key: &[u8]) -> Option<u64> {
        self.expires.deadline(key)
    }

    /// Move a value (and its deadline) to a new key, overwriting the target
    pub fn rename(&mut self, from: &[u8], to: Bytes) -> StoreResult<()> {
        self.expire_if_needed(from);
        self.expire_if_needed(&to);
        let deadline = self.expires.deadline(from);
        let (_, entry) = self.remove_entry(from).ok_or(StoreError::NoSuchKey)?;
        self.remove_entry(&to);
        self.insert_entry(to, entry.value, deadline);
        self.dirty += 1;
        Ok(())
    }

    /// Keys matching a glob pattern (expensive, walks the whole map)
    pub fn keys(&self, pattern: &[u8]) -> Vec<Bytes> {
        let now = now_ms();
        let match_all = pattern == b"*";
        self.entries
            .keys()
            .filter(|key| self.expires.state(key, now) != ExpiryState::Expired)
            .filter(|key| match_all || glob_match(pattern, key))
            .cloned()
            .collect()
    }

    /// A random live key
    pub fn random_key<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Bytes> {
        // Every iteration either returns or removes an expired key
        loop {
            let key = self.order.choose(rng)?.clone();
            if !self.expire_if_needed(&key) {
                return Some(key);
            }
        }
    }

    /// Remove all keys. A running capture keeps what it copied so far; the
    /// flush itself reaches the rewritten log through its tail.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        if let Some(capture) = self.capture.as_mut() {
            capture.cursor = 0;
        }
        self.expires.clear();
        self.used_memory = 0;
        self.dirty += 1;
    }

    /// Number of keys, including expired ones the sweep has not reached yet
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of keys with a deadline
    pub fn expires_count(&self) -> usize {
        self.expires.len()
    }

    pub fn used_memory(&self) -> usize {
        self.used_memory
    }

    pub fn dirty(&self) -> u64 {
        self.dirty
    }

    pub fn stats(&self) -> StoreStats {
        self.stats
    }

    /// Approximate bytes charged for one key
    pub fn memory_usage_of(&mut self, key: &[u8]) -> Option<usize> {
        self.expire_if_needed(key);
        self.entries
            .get_key_value(key)
            .map(|(key, entry)| entry_cost(key, &entry.value))
    }

    /// Keys removed by expiry since the last call
    pub fn take_expired(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.expired)
    }

    /// Sample armed keys and delete the expired ones
    pub fn active_expire<R: Rng + ?Sized>(&mut self, rng: &mut R, samples: usize) -> ExpireRound {
        let now = now_ms();
        let sample = self.expires.sample(rng, samples);
        let mut round = ExpireRound {
            sampled: sample.len(),
            expired: 0,
        };
        for (key, deadline) in sample {
            if deadline > now {
                continue;
            }
            if let Some((key, _)) = self.remove_entry(&key) {
                self.expired.push(key);
                self.stats.expired_keys += 1;
                round.expired += 1;
            }
        }
        round
    }

    /// Pick the key the policy would drop next
    fn eviction_candidate<R: Rng + ?Sized>(&self, policy: EvictionPolicy, rng: &mut R) -> Option<Bytes> {
        match policy {
            EvictionPolicy::NoEviction => None,
            EvictionPolicy::AllKeysLru => {
                let amount = EVICTION_SAMPLE_SIZE.min(self.order.len());
                index::sample(rng, self.order.len(), amount)
                    .into_iter()
                    .map(|slot| &self.order[slot])
                    .filter_map(|key| self.entries.get(key).map(|entry| (key, entry.last_access)))
                    .min_by_key(|(_, last_access)| *last_access)
                    .map(|(key, _)| key.clone())
            }
            EvictionPolicy::AllKeysRandom => self.order.choose(rng).cloned(),
            EvictionPolicy::VolatileTtl => self
                .expires
                .sample(rng, EVICTION_SAMPLE_SIZE)
                .into_iter()
                .min_by_key(|(_, deadline)| *deadline)
                .map(|(key, _)| key),
        }
    }

    /// Drop one key according to the policy, returning it
    pub fn evict<R: Rng + ?Sized>(&mut self, policy: EvictionPolicy, rng: &mut R) -> Option<Bytes> {
        let victim = self.eviction_candidate(policy, rng)?;
        let (key, _) = self.remove_entry(&victim)?;
        self.stats.evicted_keys += 1;
        Some(key)
    }

    /// Live entries with their deadlines, for snapshots
    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, &Value, Option<u64>)> + '_ {
        let now = now_ms();
        self.entries
            .iter()
            .filter_map(move |(key, entry)| match self.expires.state(key, now) {
                ExpiryState::Expired => None,
                ExpiryState::Armed(deadline) => Some((key, &entry.value, Some(deadline))),
                ExpiryState::NoExpiry => Some((key, &entry.value, None)),
            })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve Redis-style inclusive indices (negative counts from the end)
/// against a length. Returns `None` when the range is empty.
pub(crate) fn normalize_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let len = len as i64;
    let start = if start < 0 { (start + len).max(0) } else { start };
    let stop = if stop < 0 { stop + len } else { stop.min(len - 1) };
    if start > stop || start >= len {
        None
    } else {
        Some((start as usize, stop as usize))
    }
}

/// Resolve a single index (negative counts from the end)
pub(crate) fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let index = if index < 0 { index + len } else { index };
    if (0..len).contains(&index) {
        Some(index as usize)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_basic_set_get() {
        let mut store = MemoryStore::new();
        store.set(Bytes::from("key1"), Value::string("value1"), None);

        let value = store.get(b"key1").unwrap();
        assert_eq!(value.as_string().unwrap(), &Bytes::from("value1"));
    }

    #[test]
    fn test_delete() {
        let mut store = MemoryStore::new();
        store.set(Bytes::from("key1"), Value::string("value1"), None);

        assert!(store.delete(b"key1"));
        assert!(!store.exists(b"key1"));
        assert!(!store.delete(b"key1"));
    }

    #[test]
    fn test_memory_returns_to_zero() {
        let mut store = MemoryStore::new();
        store.set(Bytes::from("a"), Value::string("12345"), None);
        store.list_push(&Bytes::from("l"), &[Bytes::from("x"), Bytes::from("y")], false, true).unwrap();
        assert!(store.used_memory() > 0);

        store.list_pop(&Bytes::from("l"), true, 1).unwrap();
        store.delete(b"a");
        store.list_pop(&Bytes::from("l"), true, 1).unwrap();
        assert_eq!(store.used_memory(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_absorb_keeps_accounting() {
        let mut store = MemoryStore::new();
        let key = Bytes::from("big");
        store.set(key.clone(), Value::string("abc"), None);
        assert!(store.absorb(key.clone(), Value::string("def")));
        assert!(!store.absorb(Bytes::from("missing"), Value::string("x")));
        assert!(!store.absorb(key.clone(), Value::empty_list()));

        assert_eq!(store.get(b"big").unwrap(), &Value::string("abcdef"));
        let whole = entry_cost(&key, &Value::string("abcdef"));
        assert_eq!(store.used_memory(), whole);
        store.delete(b"big");
        assert_eq!(store.used_memory(), 0);
    }

    fn captured(entries: Vec<SnapshotEntry>) -> Vec<(Bytes, Value)> {
        let mut pairs: Vec<_> = entries.into_iter().map(|e| (e.key, e.value)).collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs
    }

    #[test]
    fn test_capture_sees_state_at_start() {
        let mut store = MemoryStore::new();
        for i in 0..10 {
            store.set(Bytes::from(format!("k{}", i)), Value::integer(i), None);
        }
        let before: Vec<(Bytes, Value)> = {
            let mut pairs: Vec<_> = store.iter().map(|(k, v, _)| (k.clone(), v.clone())).collect();
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
            pairs
        };

        store.begin_capture(0);
        let mut out = Vec::new();
        assert!(!store.capture_step(3, &mut out));

        // Writes against visited, unvisited and brand new keys
        for i in 0..10 {
            store.set(Bytes::from(format!("k{}", i)), Value::string("changed"), None);
        }
        store.delete(b"k4");
        store.delete(b"k0");
        store.set(Bytes::from("fresh"), Value::string("new"), None);
        store.rename(b"k7", Bytes::from("k77")).unwrap();

        while !store.capture_step(3, &mut out) {}
        assert!(!store.is_capturing());
        assert_eq!(captured(out), before);
    }

    #[test]
    fn test_capture_survives_swap_behind_cursor() {
        let mut store = MemoryStore::new();
        for i in 0..6 {
            store.set(Bytes::from(format!("k{}", i)), Value::integer(i), None);
        }
        store.begin_capture(2);
        let mut out = Vec::new();
        store.capture_step(2, &mut out);

        // Removing a visited key moves the last, unvisited key behind the cursor
        let first = out[0].key.clone();
        store.delete(&first);
        while !store.capture_step(2, &mut out) {}

        assert_eq!(out.len(), 6);
        assert!(out.iter().all(|e| e.db == 2));
    }

    #[test]
    fn test_capture_copies_deadline_before_change() {
        let mut store = MemoryStore::new();
        let deadline = now_ms() + 60_000;
        store.set(Bytes::from("t"), Value::string("v"), Some(deadline));
        store.begin_capture(0);
        store.persist(b"t");

        let mut out = Vec::new();
        assert!(store.capture_step(10, &mut out));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].expire_at, Some(deadline));
    }

    #[test]
    fn test_random_key_after_removals() {
        let mut store = MemoryStore::new();
        for i in 0..5 {
            store.set(Bytes::from(format!("k{}", i)), Value::integer(i), None);
        }
        for i in 0..4 {
            store.delete(format!("k{}", i).as_bytes());
        }
        let mut rng = rand::thread_rng();
        assert_eq!(store.random_key(&mut rng), Some(Bytes::from("k4")));
        store.clear();
        assert_eq!(store.random_key(&mut rng), None);
    }

    #[test]
    fn test_deadline_in_the_past_deletes() {
        let mut store = MemoryStore::new();
        store.set(Bytes::from("a"), Value::string("10"), Some(now_ms()));
        assert!(store.get(b"a").is_none());
        assert_eq!(store.len(), 0);

        store.set(Bytes::from("b"), Value::string("1"), None);
        assert!(store.expire_at(b"b", now_ms().saturating_sub(1)));
        assert!(!store.exists(b"b"));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_expiration() {
        let mut store = MemoryStore::new();
        store.set(Bytes::from("key1"), Value::string("value1"), Some(now_ms() + 20));

        assert!(store.exists(b"key1"));
        assert!(matches!(store.ttl(b"key1"), Ttl::Remaining(ms) if ms <= 20));

        std::thread::sleep(Duration::from_millis(40));

        assert!(store.get(b"key1").is_none());
        assert_eq!(store.ttl(b"key1"), Ttl::Missing);
        assert_eq!(store.take_expired(), vec![Bytes::from("key1")]);
        assert_eq!(store.stats().expired_keys, 1);
    }

    #[test]
    fn test_persist_and_keep_ttl() {
        let mut store = MemoryStore::new();
        let deadline = now_ms() + 60_000;
        store.set(Bytes::from("k"), Value::string("v"), Some(deadline));

        store.set_keep_ttl(Bytes::from("k"), Value::string("w"));
        assert_eq!(store.deadline(b"k"), Some(deadline));

        store.set(Bytes::from("k"), Value::string("x"), None);
        assert_eq!(store.ttl(b"k"), Ttl::Persistent);

        store.expire_at(b"k", deadline);
        assert!(store.persist(b"k"));
        assert!(!store.persist(b"k"));
        assert_eq!(store.expires_count(), 0);
    }

    #[test]
    fn test_rename_moves_deadline() {
        let mut store = MemoryStore::new();
        let deadline = now_ms() + 60_000;
        store.set(Bytes::from("src"), Value::string("v"), Some(deadline));
        store.set(Bytes::from("dst"), Value::string("old"), None);

        store.rename(b"src", Bytes::from("dst")).unwrap();
        assert!(!store.exists(b"src"));
        assert_eq!(store.deadline(b"dst"), Some(deadline));
        assert_eq!(store.get_string(b"dst").unwrap(), Some(Bytes::from("v")));
        assert_eq!(store.rename(b"missing", Bytes::from("x")), Err(StoreError::NoSuchKey));
    }

    #[test]
    fn test_keys_pattern_and_random_key() {
        let mut store = MemoryStore::new();
        for key in ["user:1", "user:2", "session:1"] {
            store.set(Bytes::from(key), Value::string("v"), None);
        }
        let mut keys = store.keys(b"user:*");
        keys.sort();
        assert_eq!(keys, vec![Bytes::from("user:1"), Bytes::from("user:2")]);

        let mut rng = rand::thread_rng();
        assert!(store.random_key(&mut rng).is_some());
        store.clear();
        assert!(store.random_key(&mut rng).is_none());
    }

    #[test]
    fn test_active_expire_collects_expired_keys() {
        let mut store = MemoryStore::new();
        let past_soon = now_ms() + 10;
        for i in 0..10 {
            store.set(Bytes::from(format!("t{}", i)), Value::string("v"), Some(past_soon));
        }
        store.set(Bytes::from("forever"), Value::string("v"), None);
        std::thread::sleep(Duration::from_millis(30));

        let mut rng = rand::thread_rng();
        let round = store.active_expire(&mut rng, 20);
        assert_eq!(round, ExpireRound { sampled: 10, expired: 10 });
        assert_eq!(store.len(), 1);
        assert_eq!(store.take_expired().len(), 10);
    }

    #[test]
    fn test_lru_eviction_prefers_idle_keys() {
        let mut store = MemoryStore::new();
        store.set(Bytes::from("old"), Value::string("v"), None);
        std::thread::sleep(Duration::from_millis(5));
        store.set(Bytes::from("new"), Value::string("v"), None);

        let mut rng = rand::thread_rng();
        assert_eq!(store.evict(EvictionPolicy::AllKeysLru, &mut rng), Some(Bytes::from("old")));
        assert_eq!(store.evict(EvictionPolicy::NoEviction, &mut rng), None);
        assert_eq!(store.evict(EvictionPolicy::VolatileTtl, &mut rng), None);
        assert_eq!(store.stats().evicted_keys, 1);
    }

    #[test]
    fn test_normalize_range() {
        assert_eq!(normalize_range(0, -1, 3), Some((0, 2)));
        assert_eq!(normalize_range(-2, -1, 3), Some((1, 2)));
        assert_eq!(normalize_range(0, 100, 3), Some((0, 2)));
        assert_eq!(normalize_range(-100, 0, 3), Some((0, 0)));
        assert_eq!(normalize_range(2, 1, 3), None);
        assert_eq!(normalize_range(5, 10, 3), None);
        assert_eq!(normalize_range(0, -1, 0), None);
        assert_eq!(normalize_index(-1, 3), Some(2));
        assert_eq!(normalize_index(3, 3), None);
    }
}
