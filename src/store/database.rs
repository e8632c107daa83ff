//! The set of logical databases selected with SELECT

use super::eviction::EvictionPolicy;
use super::memory::{ExpireRound, MemoryStore, StoreStats};
use super::value::Value;
use bytes::Bytes;
use rand::Rng;
use std::time::{Duration, Instant};

/// A key/value pair captured for a snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEntry {
    pub db: usize,
    pub key: Bytes,
    pub value: Value,
    /// Absolute deadline in unix milliseconds
    pub expire_at: Option<u64>,
}

/// Tuning for one active expiry cycle
#[derive(Debug, Clone, Copy)]
pub struct SweepLimits {
    /// Keys sampled per database per round
    pub samples: usize,
    /// Keep sampling a database while more than this share of a round expired
    pub repeat_ratio: f64,
    /// Wall clock budget for the whole cycle
    pub budget: Duration,
}

impl Default for SweepLimits {
    fn default() -> Self {
        SweepLimits {
            samples: 20,
            repeat_ratio: 0.25,
            budget: Duration::from_millis(25),
        }
    }
}

/// All logical databases of the server
pub struct Databases {
    dbs: Vec<MemoryStore>,
}

impl Databases {
    pub fn new(count: usize) -> Self {
        Databases {
            dbs: (0..count.max(1)).map(|_| MemoryStore::new()).collect(),
        }
    }

    /// Number of logical databases
    pub fn count(&self) -> usize {
        self.dbs.len()
    }

    pub fn db(&self, index: usize) -> Option<&MemoryStore> {
        self.dbs.get(index)
    }

    pub fn db_mut(&mut self, index: usize) -> Option<&mut MemoryStore> {
        self.dbs.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &MemoryStore)> {
        self.dbs.iter().enumerate()
    }

    pub fn used_memory(&self) -> usize {
        self.dbs.iter().map(|db| db.used_memory()).sum()
    }

    /// Sum of the change counters of every database
    pub fn dirty(&self) -> u64 {
        self.dbs.iter().map(|db| db.dirty()).sum()
    }

    pub fn total_keys(&self) -> usize {
        self.dbs.iter().map(|db| db.len()).sum()
    }

    pub fn stats(&self) -> StoreStats {
        let mut total = StoreStats::default();
        for db in &self.dbs {
            total.merge(&db.stats());
        }
        total
    }

    /// Keys removed by expiry since the last call, with their database
    pub fn drain_expired(&mut self) -> Vec<(usize, Bytes)> {
        let mut drained = Vec::new();
        for (index, db) in self.dbs.iter_mut().enumerate() {
            drained.extend(db.take_expired().into_iter().map(|key| (index, key)));
        }
        drained
    }

    pub fn flush_all(&mut self) {
        for db in &mut self.dbs {
            db.clear();
        }
    }

    /// One active expiry cycle over every database
    ///
    /// Each database is sampled repeatedly while the share of expired keys
    /// in a round stays above `repeat_ratio`, until the time budget runs out.
    /// Returns the number of keys removed; they are queued for propagation.
    pub fn active_expire_cycle<R: Rng + ?Sized>(&mut self, rng: &mut R, limits: SweepLimits) -> usize {
        let started = Instant::now();
        let mut removed = 0;
        for db in &mut self.dbs {
            loop {
                let ExpireRound { sampled, expired } = db.active_expire(rng, limits.samples);
                removed += expired;
                if sampled == 0 || (expired as f64) <= sampled as f64 * limits.repeat_ratio {
                    break;
                }
                if started.elapsed() >= limits.budget {
                    return removed;
                }
            }
        }
        removed
    }

    /// Evict keys until used memory fits `limit`. Returns the evicted keys
    /// and whether memory now fits.
    pub fn evict_to_fit<R: Rng + ?Sized>(
        &mut self,
        limit: usize,
        policy: EvictionPolicy,
        rng: &mut R,
    ) -> (Vec<(usize, Bytes)>, bool) {
        let mut evicted = Vec::new();
        while self.used_memory() > limit {
            let mut progress = false;
            for (index, db) in self.dbs.iter_mut().enumerate() {
                if db.is_empty() {
                    continue;
                }
                if let Some(key) = db.evict(policy, rng) {
                    evicted.push((index, key));
                    progress = true;
                    break;
                }
            }
            if !progress {
                return (evicted, false);
            }
        }
        (evicted, true)
    }

    /// Start a copy-on-write capture of every database
    pub fn begin_capture(&mut self) {
        for (index, db) in self.dbs.iter_mut().enumerate() {
            db.begin_capture(index);
        }
    }

    /// Collect the next chunk of a running capture, visiting at most
    /// `limit` keys. The flag is true once the capture is complete.
    pub fn capture_step(&mut self, limit: usize) -> (Vec<SnapshotEntry>, bool) {
        let mut chunk = Vec::new();
        if let Some(db) = self.dbs.iter_mut().find(|db| db.is_capturing()) {
            db.capture_step(limit, &mut chunk);
        }
        (chunk, !self.is_capturing())
    }

    pub fn abort_capture(&mut self) {
        for db in &mut self.dbs {
            db.abort_capture();
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.dbs.iter().any(|db| db.is_capturing())
    }

    /// Point-in-time copy of every live key
    pub fn snapshot(&self) -> Vec<SnapshotEntry> {
        let mut entries = Vec::with_capacity(self.total_keys());
        for (db, store) in self.iter() {
            entries.extend(store.iter().map(|(key, value, expire_at)| SnapshotEntry {
                db,
                key: key.clone(),
                value: value.clone(),
                expire_at,
            }));
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::expiry::now_ms;

    #[test]
    fn test_databases_are_isolated() {
        let mut dbs = Databases::new(16);
        assert_eq!(dbs.count(), 16);
        dbs.db_mut(0).unwrap().set(Bytes::from("k"), Value::string("zero"), None);
        dbs.db_mut(1).unwrap().set(Bytes::from("k"), Value::string("one"), None);

        assert_eq!(dbs.db_mut(0).unwrap().get_string(b"k").unwrap(), Some(Bytes::from("zero")));
        assert_eq!(dbs.db_mut(1).unwrap().get_string(b"k").unwrap(), Some(Bytes::from("one")));
        assert_eq!(dbs.total_keys(), 2);
        assert!(dbs.db(16).is_none());

        dbs.flush_all();
        assert_eq!(dbs.total_keys(), 0);
        assert_eq!(dbs.used_memory(), 0);
    }

    #[test]
    fn test_active_expire_cycle_drains_all_expired() {
        let mut dbs = Databases::new(2);
        let soon = now_ms() + 5;
        for i in 0..200 {
            let db = dbs.db_mut(i % 2).unwrap();
            db.set(Bytes::from(format!("k{}", i)), Value::string("v"), Some(soon));
        }
        dbs.db_mut(0).unwrap().set(Bytes::from("live"), Value::string("v"), None);
        std::thread::sleep(Duration::from_millis(20));

        let limits = SweepLimits {
            budget: Duration::from_secs(5),
            ..SweepLimits::default()
        };
        let removed = dbs.active_expire_cycle(&mut rand::thread_rng(), limits);
        assert_eq!(removed, 200);
        assert_eq!(dbs.total_keys(), 1);
        assert_eq!(dbs.drain_expired().len(), 200);
        assert!(dbs.drain_expired().is_empty());
    }

    #[test]
    fn test_evict_to_fit() {
        let mut dbs = Databases::new(1);
        for i in 0..10 {
            dbs.db_mut(0)
                .unwrap()
                .set(Bytes::from(format!("key{}", i)), Value::string("0123456789"), None);
        }
        let mut rng = rand::thread_rng();
        let limit = dbs.used_memory() / 2;

        let (evicted, fits) = dbs.evict_to_fit(limit, EvictionPolicy::AllKeysRandom, &mut rng);
        assert!(fits);
        assert!(!evicted.is_empty());
        assert!(dbs.used_memory() <= limit);

        let (evicted, fits) = dbs.evict_to_fit(0, EvictionPolicy::NoEviction, &mut rng);
        assert!(!fits);
        assert!(evicted.is_empty());
    }

    #[test]
    fn test_snapshot_carries_deadlines() {
        let mut dbs = Databases::new(2);
        let deadline = now_ms() + 60_000;
        dbs.db_mut(1).unwrap().set(Bytes::from("t"), Value::string("v"), Some(deadline));
        dbs.db_mut(0).unwrap().set(Bytes::from("p"), Value::string("v"), None);

        let mut snapshot = dbs.snapshot();
        snapshot.sort_by_key(|e| e.db);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].expire_at, None);
        assert_eq!(snapshot[1].db, 1);
        assert_eq!(snapshot[1].expire_at, Some(deadline));
    }

    #[test]
    fn test_capture_walks_every_database() {
        let mut dbs = Databases::new(3);
        for i in 0..30 {
            dbs.db_mut(i % 3)
                .unwrap()
                .set(Bytes::from(format!("k{}", i)), Value::string("old"), None);
        }
        dbs.begin_capture();
        assert!(dbs.is_capturing());

        let (mut captured, done) = dbs.capture_step(4);
        assert!(!done);
        dbs.db_mut(2).unwrap().set(Bytes::from("k2"), Value::string("new"), None);
        dbs.flush_all();

        loop {
            let (chunk, done) = dbs.capture_step(4);
            captured.extend(chunk);
            if done {
                break;
            }
        }
        // Database 2 had one key copied before the flush
        assert!(captured.len() >= 4);
        assert!(captured.iter().all(|e| e.value == Value::string("old")));
        assert!(captured.iter().any(|e| e.db == 2 && e.key == Bytes::from("k2")));
        assert!(!dbs.is_capturing());
    }

    #[test]
    fn test_abort_capture() {
        let mut dbs = Databases::new(2);
        dbs.db_mut(0).unwrap().set(Bytes::from("k"), Value::string("v"), None);
        dbs.begin_capture();
        dbs.abort_capture();
        assert!(!dbs.is_capturing());
        assert_eq!(dbs.capture_step(10), (Vec::new(), true));
    }
}
