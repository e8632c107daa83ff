//! In-memory storage module
//!
//! Provides the core data structures for storing key-value pairs in memory.
//! This module is independent of protocol and command handling (loose coupling).

mod database;
mod entry;
mod eviction;
mod expiry;
mod memory;
mod pattern;
mod value;
mod zset;

pub use database::{Databases, SnapshotEntry, SweepLimits};
pub use entry::Entry;
pub use eviction::EvictionPolicy;
pub use expiry::{now_ms, ExpiryState, Ttl};
pub use memory::{ExpireRound, MemoryStore, StoreStats, ZAddFlags, ZAddOutcome};
pub use pattern::glob_match;
pub use value::{format_f64, parse_f64, parse_i64, Value};
pub use zset::{format_score, parse_score, ScoreBound, SortedSet};
