//! Set operations

use super::MemoryStore;
use crate::error::{StoreError, StoreResult};
use crate::store::value::{element_cost, Value};
use bytes::Bytes;
use rand::seq::IteratorRandom;
use rand::Rng;
use std::collections::HashSet;

fn set_of(value: &Value) -> StoreResult<&HashSet<Bytes>> {
    value.as_set().ok_or(StoreError::WrongType)
}

impl MemoryStore {
    /// Add members, returning how many were new
    pub fn set_add(&mut self, key: &Bytes, members: &[Bytes]) -> StoreResult<usize> {
        let added = self.modify(key, Some(Value::empty_set), |value, mutation| {
            let Value::Set(set) = value else {
                return Err(StoreError::WrongType);
            };
            let mut added = 0;
            for member in members {
                if set.insert(member.clone()) {
                    added += 1;
                    mutation.grow(element_cost(member));
                }
            }
            Ok(added)
        })?;
        Ok(added.unwrap_or(0))
    }

    /// Remove members, returning how many existed
    pub fn set_remove(&mut self, key: &Bytes, members: &[Bytes]) -> StoreResult<usize> {
        let removed = self.modify(key, None, |value, mutation| {
            let Value::Set(set) = value else {
                return Err(StoreError::WrongType);
            };
            let mut removed = 0;
            for member in members {
                if set.remove(&member[..]) {
                    removed += 1;
                    mutation.shrink(element_cost(member));
                }
            }
            Ok(removed)
        })?;
        Ok(removed.unwrap_or(0))
    }

    pub fn set_members(&mut self, key: &[u8]) -> StoreResult<Vec<Bytes>> {
        let members = self.read(key, |value| Ok(set_of(value)?.iter().cloned().collect()))?;
        Ok(members.unwrap_or_default())
    }

    pub fn set_is_member(&mut self, key: &[u8], member: &[u8]) -> StoreResult<bool> {
        let found = self.read(key, |value| Ok(set_of(value)?.contains(member)))?;
        Ok(found.unwrap_or(false))
    }

    pub fn set_card(&mut self, key: &[u8]) -> StoreResult<usize> {
        Ok(self.read(key, |value| set_of(value).map(|s| s.len()))?.unwrap_or(0))
    }

    /// Remove and return up to `count` random members. `None` when the key
    /// does not exist.
    pub fn set_pop<R: Rng + ?Sized>(
        &mut self,
        key: &Bytes,
        count: usize,
        rng: &mut R,
    ) -> StoreResult<Option<Vec<Bytes>>> {
        self.modify(key, None, |value, mutation| {
            let Value::Set(set) = value else {
                return Err(StoreError::WrongType);
            };
            let chosen: Vec<Bytes> = set.iter().cloned().choose_multiple(rng, count);
            for member in &chosen {
                set.remove(member);
                mutation.shrink(element_cost(member));
            }
            Ok(chosen)
        })
    }

    /// Resolve several keys to sets. Missing keys yield `None`; any key of
    /// another type fails the whole call.
    fn sets_for(&mut self, keys: &[Bytes]) -> StoreResult<Vec<Option<&HashSet<Bytes>>>> {
        for key in keys {
            self.expire_if_needed(key);
        }
        keys.iter()
            .map(|key| match self.entries.get(&key[..]) {
                Some(entry) => set_of(&entry.value).map(Some),
                None => Ok(None),
            })
            .collect()
    }

    pub fn set_inter(&mut self, keys: &[Bytes]) -> StoreResult<Vec<Bytes>> {
        let sets = self.sets_for(keys)?;
        let Some(mut sets) = sets.into_iter().collect::<Option<Vec<_>>>() else {
            return Ok(Vec::new());
        };
        sets.sort_by_key(|s| s.len());
        let Some((smallest, rest)) = sets.split_first() else {
            return Ok(Vec::new());
        };
        Ok(smallest
            .iter()
            .filter(|member| rest.iter().all(|other| other.contains(*member)))
            .cloned()
            .collect())
    }

    pub fn set_union(&mut self, keys: &[Bytes]) -> StoreResult<Vec<Bytes>> {
        let sets = self.sets_for(keys)?;
        let union: HashSet<&Bytes> = sets.into_iter().flatten().flatten().collect();
        Ok(union.into_iter().cloned().collect())
    }

    /// Members of the first set that are in none of the others
    pub fn set_diff(&mut self, keys: &[Bytes]) -> StoreResult<Vec<Bytes>> {
        let sets = self.sets_for(keys)?;
        let Some((Some(first), rest)) = sets.split_first() else {
            return Ok(Vec::new());
        };
        Ok(first
            .iter()
            .filter(|member| rest.iter().flatten().all(|other| !other.contains(*member)))
            .cloned()
            .collect())
    }
}
