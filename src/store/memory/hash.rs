//! Hash operations

use super::MemoryStore;
use crate::error::{StoreError, StoreResult};
use crate::store::value::{format_f64, pair_cost, parse_f64, parse_i64, Value};
use bytes::Bytes;
use std::collections::HashMap;

fn hash_of(value: &Value) -> StoreResult<&HashMap<Bytes, Bytes>> {
    value.as_hash().ok_or(StoreError::WrongType)
}

impl MemoryStore {
    /// Set fields, returning how many were newly created
    pub fn hash_set(&mut self, key: &Bytes, pairs: &[(Bytes, Bytes)]) -> StoreResult<usize> {
        let added = self.modify(key, Some(Value::empty_hash), |value, mutation| {
            let Value::Hash(hash) = value else {
                return Err(StoreError::WrongType);
            };
            let mut added = 0;
            for (field, val) in pairs {
                match hash.insert(field.clone(), val.clone()) {
                    Some(old) => mutation.replace(pair_cost(field, &old), pair_cost(field, val)),
                    None => {
                        added += 1;
                        mutation.grow(pair_cost(field, val));
                    }
                }
            }
            Ok(added)
        })?;
        Ok(added.unwrap_or(0))
    }

    pub fn hash_get(&mut self, key: &[u8], field: &[u8]) -> StoreResult<Option<Bytes>> {
        let val = self.read(key, |value| Ok(hash_of(value)?.get(field).cloned()))?;
        Ok(val.flatten())
    }

    pub fn hash_mget(&mut self, key: &[u8], fields: &[Bytes]) -> StoreResult<Vec<Option<Bytes>>> {
        let vals = self.read(key, |value| {
            let hash = hash_of(value)?;
            Ok(fields.iter().map(|f| hash.get(&f[..]).cloned()).collect())
        })?;
        Ok(vals.unwrap_or_else(|| vec![None; fields.len()]))
    }

    /// Delete fields, returning how many existed
    pub fn hash_del(&mut self, key: &Bytes, fields: &[Bytes]) -> StoreResult<usize> {
        let removed = self.modify(key, None, |value, mutation| {
            let Value::Hash(hash) = value else {
                return Err(StoreError::WrongType);
            };
            let mut removed = 0;
            for field in fields {
                if let Some(old) = hash.remove(&field[..]) {
                    removed += 1;
                    mutation.shrink(pair_cost(field, &old));
                }
            }
            Ok(removed)
        })?;
        Ok(removed.unwrap_or(0))
    }

    pub fn hash_getall(&mut self, key: &[u8]) -> StoreResult<Vec<(Bytes, Bytes)>> {
        let pairs = self.read(key, |value| {
            Ok(hash_of(value)?
                .iter()
                .map(|(f, v)| (f.clone(), v.clone()))
                .collect())
        })?;
        Ok(pairs.unwrap_or_default())
    }

    pub fn hash_keys(&mut self, key: &[u8]) -> StoreResult<Vec<Bytes>> {
        let fields = self.read(key, |value| Ok(hash_of(value)?.keys().cloned().collect()))?;
        Ok(fields.unwrap_or_default())
    }

    pub fn hash_vals(&mut self, key: &[u8]) -> StoreResult<Vec<Bytes>> {
        let vals = self.read(key, |value| Ok(hash_of(value)?.values().cloned().collect()))?;
        Ok(vals.unwrap_or_default())
    }

    pub fn hash_len(&mut self, key: &[u8]) -> StoreResult<usize> {
        Ok(self.read(key, |value| hash_of(value).map(|h| h.len()))?.unwrap_or(0))
    }

    pub fn hash_exists(&mut self, key: &[u8], field: &[u8]) -> StoreResult<bool> {
        let found = self.read(key, |value| Ok(hash_of(value)?.contains_key(field)))?;
        Ok(found.unwrap_or(false))
    }

    /// Add to an integer field; a missing field counts as 0
    pub fn hash_incr_by(&mut self, key: &Bytes, field: &Bytes, delta: i64) -> StoreResult<i64> {
        let next = self.modify(key, Some(Value::empty_hash), |value, mutation| {
            let Value::Hash(hash) = value else {
                return Err(StoreError::WrongType);
            };
            let current = match hash.get(&field[..]) {
                Some(raw) => parse_i64(raw).ok_or(StoreError::NotANumber)?,
                None => 0,
            };
            let next = current.checked_add(delta).ok_or(StoreError::Overflow)?;
            let text = Bytes::from(next.to_string());
            let cost = pair_cost(field, &text);
            match hash.insert(field.clone(), text) {
                Some(old) => mutation.replace(pair_cost(field, &old), cost),
                None => mutation.grow(cost),
            }
            Ok(next)
        })?;
        next.ok_or(StoreError::NoSuchKey)
    }

    /// Add a float to a field. Returns the new textual value.
    pub fn hash_incr_by_float(&mut self, key: &Bytes, field: &Bytes, delta: f64) -> StoreResult<Bytes> {
        let next = self.modify(key, Some(Value::empty_hash), |value, mutation| {
            let Value::Hash(hash) = value else {
                return Err(StoreError::WrongType);
            };
            let current = match hash.get(&field[..]) {
                Some(raw) => parse_f64(raw).ok_or(StoreError::NotAFloat)?,
                None => 0.0,
            };
            let next = current + delta;
            if !next.is_finite() {
                return Err(StoreError::NanOrInfinity);
            }
            let text = format_f64(next);
            match hash.insert(field.clone(), text.clone()) {
                Some(old) => mutation.replace(pair_cost(field, &old), pair_cost(field, &text)),
                None => mutation.grow(pair_cost(field, &text)),
            }
            Ok(text)
        })?;
        next.ok_or(StoreError::NoSuchKey)
    }
}
