//! String operations

use super::MemoryStore;
use crate::error::{StoreError, StoreResult};
use crate::store::value::{format_f64, parse_f64, parse_i64, Value};
use bytes::{Bytes, BytesMut};

fn empty_string() -> Value {
    Value::String(Bytes::new())
}

fn zero() -> Value {
    Value::integer(0)
}

impl MemoryStore {
    /// Value of a string key
    pub fn get_string(&mut self, key: &[u8]) -> StoreResult<Option<Bytes>> {
        self.read(key, |value| match value {
            Value::String(s) => Ok(s.clone()),
            _ => Err(StoreError::WrongType),
        })
    }

    /// Append to a string, creating it if needed. Returns the new length.
    pub fn append(&mut self, key: &Bytes, suffix: &[u8]) -> StoreResult<usize> {
        let len = self.modify(key, Some(empty_string), |value, mutation| {
            let Value::String(current) = value else {
                return Err(StoreError::WrongType);
            };
            let mut buf = BytesMut::with_capacity(current.len() + suffix.len());
            buf.extend_from_slice(current);
            buf.extend_from_slice(suffix);
            *current = buf.freeze();
            mutation.grow(suffix.len());
            Ok(current.len())
        })?;
        Ok(len.unwrap_or(0))
    }

    pub fn strlen(&mut self, key: &[u8]) -> StoreResult<usize> {
        let len = self.read(key, |value| match value {
            Value::String(s) => Ok(s.len()),
            _ => Err(StoreError::WrongType),
        })?;
        Ok(len.unwrap_or(0))
    }

    /// Add `delta` to an integer string; a missing key counts as 0
    pub fn incr_by(&mut self, key: &Bytes, delta: i64) -> StoreResult<i64> {
        let next = self.modify(key, Some(zero), |value, mutation| {
            let Value::String(current) = value else {
                return Err(StoreError::WrongType);
            };
            let n = parse_i64(current).ok_or(StoreError::NotANumber)?;
            let next = n.checked_add(delta).ok_or(StoreError::Overflow)?;
            let text = Bytes::from(next.to_string());
            mutation.replace(current.len(), text.len());
            *current = text;
            Ok(next)
        })?;
        next.ok_or(StoreError::NoSuchKey)
    }

    /// Add a float to a numeric string. Returns the new textual value.
    pub fn incr_by_float(&mut self, key: &Bytes, delta: f64) -> StoreResult<Bytes> {
        let next = self.modify(key, Some(zero), |value, mutation| {
            let Value::String(current) = value else {
                return Err(StoreError::WrongType);
            };
            let n = parse_f64(current).ok_or(StoreError::NotAFloat)?;
            let next = n + delta;
            if !next.is_finite() {
                return Err(StoreError::NanOrInfinity);
            }
            let text = format_f64(next);
            mutation.replace(current.len(), text.len());
            *current = text.clone();
            Ok(text)
        })?;
        next.ok_or(StoreError::NoSuchKey)
    }

    /// Get a string and delete the key
    pub fn getdel(&mut self, key: &[u8]) -> StoreResult<Option<Bytes>> {
        let value = self.get_string(key)?;
        if value.is_some() {
            self.delete(key);
        }
        Ok(value)
    }
}
