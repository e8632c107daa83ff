//! Entry structure for key-value pairs

use super::value::Value;
use std::time::Instant;

/// Represents a single entry in the store
///
/// The deadline of a key lives in the database's expiry index, not here,
/// so the active sweep can sample armed keys without scanning entries.
#[derive(Debug, Clone)]
pub struct Entry {
    /// The value
    pub value: Value,

    /// Last time a command read or wrote this entry (LRU eviction)
    pub last_access: Instant,

    /// Position of the key in the database's dense key order
    pub(crate) slot: usize,

    /// Capture epoch the entry was created in or last copied for
    pub(crate) epoch: u64,
}

impl Entry {
    /// Create a new entry stamped with the current time
    pub fn new(value: Value) -> Self {
        Entry {
            value,
            last_access: Instant::now(),
            slot: 0,
            epoch: 0,
        }
    }

    /// Record an access
    pub fn touch(&mut self) {
        self.last_access = Instant::now();
    }

    /// Seconds since the entry was last accessed
    pub fn idle_secs(&self) -> u64 {
        self.last_access.elapsed().as_secs()
    }
}
