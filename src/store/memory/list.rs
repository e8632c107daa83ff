//! List operations

use super::{normalize_index, normalize_range, MemoryStore};
use crate::error::{StoreError, StoreResult};
use crate::store::value::{element_cost, Value};
use bytes::Bytes;
use std::collections::VecDeque;

fn list_of(value: &Value) -> StoreResult<&VecDeque<Bytes>> {
    value.as_list().ok_or(StoreError::WrongType)
}

impl MemoryStore {
    /// Push items to the head or tail. With `create == false` a missing key
    /// is left alone and 0 is returned (LPUSHX / RPUSHX).
    pub fn list_push(&mut self, key: &Bytes, items: &[Bytes], front: bool, create: bool) -> StoreResult<usize> {
        let constructor = if create { Some(Value::empty_list as fn() -> Value) } else { None };
        let len = self.modify(key, constructor, |value, mutation| {
            let Value::List(list) = value else {
                return Err(StoreError::WrongType);
            };
            for item in items {
                mutation.grow(element_cost(item));
                if front {
                    list.push_front(item.clone());
                } else {
                    list.push_back(item.clone());
                }
            }
            Ok(list.len())
        })?;
        Ok(len.unwrap_or(0))
    }

    /// Pop up to `count` items. `None` when the key does not exist.
    pub fn list_pop(&mut self, key: &Bytes, front: bool, count: usize) -> StoreResult<Option<Vec<Bytes>>> {
        self.modify(key, None, |value, mutation| {
            let Value::List(list) = value else {
                return Err(StoreError::WrongType);
            };
            let mut popped = Vec::with_capacity(count.min(list.len()));
            while popped.len() < count {
                let item = if front { list.pop_front() } else { list.pop_back() };
                match item {
                    Some(item) => {
                        mutation.shrink(element_cost(&item));
                        popped.push(item);
                    }
                    None => break,
                }
            }
            Ok(popped)
        })
    }

    /// Items between two inclusive indices
    pub fn list_range(&mut self, key: &[u8], start: i64, stop: i64) -> StoreResult<Vec<Bytes>> {
        let items = self.read(key, |value| {
            let list = list_of(value)?;
            Ok(match normalize_range(start, stop, list.len()) {
                Some((start, stop)) => list.range(start..=stop).cloned().collect(),
                None => Vec::new(),
            })
        })?;
        Ok(items.unwrap_or_default())
    }

    pub fn list_len(&mut self, key: &[u8]) -> StoreResult<usize> {
        Ok(self.read(key, |value| list_of(value).map(|l| l.len()))?.unwrap_or(0))
    }

    pub fn list_index(&mut self, key: &[u8], index: i64) -> StoreResult<Option<Bytes>> {
        let item = self.read(key, |value| {
            let list = list_of(value)?;
            Ok(normalize_index(index, list.len()).and_then(|i| list.get(i).cloned()))
        })?;
        Ok(item.flatten())
    }

    /// Overwrite the item at `index`
    pub fn list_set(&mut self, key: &Bytes, index: i64, item: Bytes) -> StoreResult<()> {
        let outcome = self.modify(key, None, |value, mutation| {
            let Value::List(list) = value else {
                return Err(StoreError::WrongType);
            };
            let i = normalize_index(index, list.len()).ok_or(StoreError::IndexOutOfRange)?;
            let old = std::mem::replace(&mut list[i], item);
            mutation.replace(element_cost(&old), element_cost(&list[i]));
            Ok(())
        })?;
        outcome.ok_or(StoreError::NoSuchKey)
    }

    /// Remove occurrences of `item`: the first `count` from the head when
    /// positive, from the tail when negative, all of them when zero
    pub fn list_remove(&mut self, key: &Bytes, count: i64, item: &[u8]) -> StoreResult<usize> {
        let removed = self.modify(key, None, |value, mutation| {
            let Value::List(list) = value else {
                return Err(StoreError::WrongType);
            };
            let limit = if count == 0 { usize::MAX } else { count.unsigned_abs() as usize };
            let mut removed = 0usize;
            if count >= 0 {
                list.retain(|candidate| {
                    if removed < limit && &candidate[..] == item {
                        removed += 1;
                        false
                    } else {
                        true
                    }
                });
            } else {
                let mut kept = VecDeque::with_capacity(list.len());
                while let Some(candidate) = list.pop_back() {
                    if removed < limit && &candidate[..] == item {
                        removed += 1;
                    } else {
                        kept.push_front(candidate);
                    }
                }
                *list = kept;
            }
            if removed > 0 {
                mutation.shrink(removed * element_cost(item));
            }
            Ok(removed)
        })?;
        Ok(removed.unwrap_or(0))
    }

    /// Keep only the items between two inclusive indices
    pub fn list_trim(&mut self, key: &Bytes, start: i64, stop: i64) -> StoreResult<()> {
        self.modify(key, None, |value, mutation| {
            let Value::List(list) = value else {
                return Err(StoreError::WrongType);
            };
            match normalize_range(start, stop, list.len()) {
                Some((start, stop)) => {
                    for item in list.drain(stop + 1..) {
                        mutation.shrink(element_cost(&item));
                    }
                    for item in list.drain(..start) {
                        mutation.shrink(element_cost(&item));
                    }
                }
                None => {
                    for item in list.drain(..) {
                        mutation.shrink(element_cost(&item));
                    }
                }
            }
            Ok(())
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(values: &[&'static str]) -> Vec<Bytes> {
        values.iter().map(|v| Bytes::from_static(v.as_bytes())).collect()
    }

    fn list_with(store: &mut MemoryStore, values: &[&'static str]) -> Bytes {
        let key = Bytes::from("l");
        store.list_push(&key, &items(values), false, true).unwrap();
        key
    }

    #[test]
    fn test_push_and_range() {
        let mut store = MemoryStore::new();
        let key = list_with(&mut store, &["x", "y", "z"]);
        assert_eq!(store.list_range(&key, 0, 1).unwrap(), items(&["x", "y"]));
        assert_eq!(store.list_range(&key, -2, -1).unwrap(), items(&["y", "z"]));
        assert_eq!(store.list_range(&key, 5, 10).unwrap(), Vec::<Bytes>::new());

        assert_eq!(store.list_push(&key, &items(&["a", "b"]), true, true).unwrap(), 5);
        assert_eq!(store.list_range(&key, 0, -1).unwrap(), items(&["b", "a", "x", "y", "z"]));
    }

    #[test]
    fn test_pushx_needs_existing_key() {
        let mut store = MemoryStore::new();
        let key = Bytes::from("nope");
        assert_eq!(store.list_push(&key, &items(&["a"]), true, false).unwrap(), 0);
        assert!(!store.exists(b"nope"));
    }

    #[test]
    fn test_pop_removes_empty_list() {
        let mut store = MemoryStore::new();
        let key = list_with(&mut store, &["a", "b", "c"]);
        assert_eq!(store.list_pop(&key, false, 2).unwrap(), Some(items(&["c", "b"])));
        assert_eq!(store.list_pop(&key, true, 5).unwrap(), Some(items(&["a"])));
        assert_eq!(store.list_pop(&key, true, 1).unwrap(), None);
        assert!(!store.exists(&key));
        assert_eq!(store.used_memory(), 0);
    }

    #[test]
    fn test_index_and_set() {
        let mut store = MemoryStore::new();
        let key = list_with(&mut store, &["a", "b", "c"]);
        assert_eq!(store.list_index(&key, -1).unwrap(), Some(Bytes::from("c")));
        assert_eq!(store.list_index(&key, 3).unwrap(), None);

        store.list_set(&key, 1, Bytes::from("B")).unwrap();
        assert_eq!(store.list_range(&key, 0, -1).unwrap(), items(&["a", "B", "c"]));
        assert_eq!(store.list_set(&key, 9, Bytes::from("x")), Err(StoreError::IndexOutOfRange));
        assert_eq!(
            store.list_set(&Bytes::from("missing"), 0, Bytes::from("x")),
            Err(StoreError::NoSuchKey)
        );
    }

    #[test]
    fn test_remove_directions() {
        let mut store = MemoryStore::new();
        let key = list_with(&mut store, &["a", "x", "b", "x", "c", "x"]);
        assert_eq!(store.list_remove(&key, -2, b"x").unwrap(), 2);
        assert_eq!(store.list_range(&key, 0, -1).unwrap(), items(&["a", "x", "b", "c"]));
        assert_eq!(store.list_remove(&key, 1, b"x").unwrap(), 1);
        assert_eq!(store.list_remove(&key, 0, b"nothing").unwrap(), 0);
        assert_eq!(store.list_range(&key, 0, -1).unwrap(), items(&["a", "b", "c"]));
    }

    #[test]
    fn test_trim() {
        let mut store = MemoryStore::new();
        let key = list_with(&mut store, &["a", "b", "c", "d"]);
        store.list_trim(&key, 1, -2).unwrap();
        assert_eq!(store.list_range(&key, 0, -1).unwrap(), items(&["b", "c"]));
        store.list_trim(&key, 5, 10).unwrap();
        assert!(!store.exists(&key));
        assert_eq!(store.used_memory(), 0);
    }

    #[test]
    fn test_wrong_type() {
        let mut store = MemoryStore::new();
        store.set(Bytes::from("s"), Value::string("v"), None);
        let key = Bytes::from("s");
        assert_eq!(store.list_push(&key, &items(&["a"]), true, true), Err(StoreError::WrongType));
        assert_eq!(store.list_range(&key, 0, -1), Err(StoreError::WrongType));
        assert_eq!(store.get_string(b"s").unwrap(), Some(Bytes::from("v")));
    }
}
