//! Sorted set operations

use super::{normalize_range, MemoryStore};
use crate::error::{StoreError, StoreResult};
use crate::store::value::{zset_member_cost, Value};
use crate::store::zset::{ScoreBound, SortedSet};
use bytes::Bytes;

/// ZADD modifiers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZAddFlags {
    /// Only add new members
    pub nx: bool,
    /// Only update existing members
    pub xx: bool,
    /// Treat the score as an increment (single member only)
    pub incr: bool,
}

/// What a ZADD call did
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ZAddOutcome {
    pub added: usize,
    /// Existing members whose score changed
    pub updated: usize,
    /// Final score of the last member touched; `None` if it was skipped
    pub score: Option<f64>,
}

fn zset_of(value: &Value) -> StoreResult<&SortedSet> {
    value.as_sorted_set().ok_or(StoreError::WrongType)
}

impl MemoryStore {
    pub fn zadd(&mut self, key: &Bytes, flags: ZAddFlags, items: &[(f64, Bytes)]) -> StoreResult<ZAddOutcome> {
        // XX never creates the key
        let constructor = if flags.xx { None } else { Some(Value::empty_sorted_set as fn() -> Value) };
        let outcome = self.modify(key, constructor, |value, mutation| {
            let Value::SortedSet(zset) = value else {
                return Err(StoreError::WrongType);
            };
            let mut outcome = ZAddOutcome::default();
            for (score, member) in items {
                outcome.score = None;
                match zset.score(member) {
                    Some(old) => {
                        if flags.nx {
                            continue;
                        }
                        let next = if flags.incr { old + score } else { *score };
                        if next.is_nan() {
                            return Err(StoreError::NanOrInfinity);
                        }
                        if next != old {
                            zset.insert(member.clone(), next);
                            outcome.updated += 1;
                            mutation.mark();
                        }
                        outcome.score = Some(next);
                    }
                    None => {
                        if flags.xx {
                            continue;
                        }
                        zset.insert(member.clone(), *score);
                        outcome.added += 1;
                        mutation.grow(zset_member_cost(member));
                        outcome.score = Some(*score);
                    }
                }
            }
            Ok(outcome)
        })?;
        Ok(outcome.unwrap_or_default())
    }

    /// Add `delta` to a member's score, creating it at `delta`
    pub fn zincr_by(&mut self, key: &Bytes, delta: f64, member: &Bytes) -> StoreResult<f64> {
        let flags = ZAddFlags {
            incr: true,
            ..ZAddFlags::default()
        };
        let outcome = self.zadd(key, flags, &[(delta, member.clone())])?;
        outcome.score.ok_or(StoreError::NanOrInfinity)
    }

    pub fn zrem(&mut self, key: &Bytes, members: &[Bytes]) -> StoreResult<usize> {
        let removed = self.modify(key, None, |value, mutation| {
            let Value::SortedSet(zset) = value else {
                return Err(StoreError::WrongType);
            };
            let mut removed = 0;
            for member in members {
                if zset.remove(member).is_some() {
                    removed += 1;
                    mutation.shrink(zset_member_cost(member));
                }
            }
            Ok(removed)
        })?;
        Ok(removed.unwrap_or(0))
    }

    pub fn zscore(&mut self, key: &[u8], member: &[u8]) -> StoreResult<Option<f64>> {
        Ok(self.read(key, |value| Ok(zset_of(value)?.score(member)))?.flatten())
    }

    pub fn zcard(&mut self, key: &[u8]) -> StoreResult<usize> {
        Ok(self.read(key, |value| zset_of(value).map(|z| z.len()))?.unwrap_or(0))
    }

    pub fn zrank(&mut self, key: &[u8], member: &[u8], reverse: bool) -> StoreResult<Option<usize>> {
        let rank = self.read(key, |value| {
            let zset = zset_of(value)?;
            Ok(if reverse { zset.rev_rank(member) } else { zset.rank(member) })
        })?;
        Ok(rank.flatten())
    }

    /// Members between two inclusive ranks (negative counts from the end)
    pub fn zrange(&mut self, key: &[u8], start: i64, stop: i64, reverse: bool) -> StoreResult<Vec<(Bytes, f64)>> {
        let items = self.read(key, |value| {
            let zset = zset_of(value)?;
            Ok(match normalize_range(start, stop, zset.len()) {
                Some((start, stop)) => zset.range_by_rank(start, stop, reverse),
                None => Vec::new(),
            })
        })?;
        Ok(items.unwrap_or_default())
    }

    pub fn zrange_by_score(
        &mut self,
        key: &[u8],
        min: ScoreBound,
        max: ScoreBound,
        offset: usize,
        limit: Option<usize>,
    ) -> StoreResult<Vec<(Bytes, f64)>> {
        let items = self.read(key, |value| {
            Ok(zset_of(value)?.range_by_score(min, max, offset, limit))
        })?;
        Ok(items.unwrap_or_default())
    }

    pub fn zcount(&mut self, key: &[u8], min: ScoreBound, max: ScoreBound) -> StoreResult<usize> {
        let count = self.read(key, |value| Ok(zset_of(value)?.count_in_range(min, max)))?;
        Ok(count.unwrap_or(0))
    }
}
