//! Value types for the key-value store

use super::zset::SortedSet;
use bytes::{Bytes, BytesMut};
use std::collections::{HashMap, HashSet, VecDeque};

/// Fixed cost charged for every key: map slot, entry header and bookkeeping
pub(crate) const ENTRY_OVERHEAD: usize = 64;

/// Fixed cost charged for every element held inside a collection
pub(crate) const ELEMENT_OVERHEAD: usize = 16;

/// Approximate cost of one list or set element
pub(crate) fn element_cost(item: &[u8]) -> usize {
    item.len() + ELEMENT_OVERHEAD
}

/// Approximate cost of one hash field/value pair
pub(crate) fn pair_cost(field: &[u8], value: &[u8]) -> usize {
    field.len() + value.len() + 2 * ELEMENT_OVERHEAD
}

/// Approximate cost of one sorted set member (map slot + index slot + score)
pub(crate) fn zset_member_cost(member: &[u8]) -> usize {
    member.len() + 2 * ELEMENT_OVERHEAD + std::mem::size_of::<f64>()
}

/// Approximate cost of a whole key/value pair
pub(crate) fn entry_cost(key: &[u8], value: &Value) -> usize {
    ENTRY_OVERHEAD + key.len() + value.memory_usage()
}

/// Parse an integer the strict way Redis does: optional `-`, no `+`,
/// no whitespace, no leading zeros
pub fn parse_i64(raw: &[u8]) -> Option<i64> {
    if raw.is_empty() || raw.len() > 20 || raw[0] == b'+' {
        return None;
    }
    let digits = raw.strip_prefix(b"-").unwrap_or(raw);
    if digits.len() > 1 && digits[0] == b'0' {
        return None;
    }
    std::str::from_utf8(raw).ok()?.parse().ok()
}

/// Parse a float argument or stored value; NaN is never accepted
pub fn parse_f64(raw: &[u8]) -> Option<f64> {
    let text = std::str::from_utf8(raw).ok()?;
    if text.is_empty() || text.trim() != text {
        return None;
    }
    let value = match text.to_ascii_lowercase().as_str() {
        "inf" | "+inf" => f64::INFINITY,
        "-inf" => f64::NEG_INFINITY,
        other => other.parse::<f64>().ok()?,
    };
    if value.is_nan() {
        None
    } else {
        Some(value)
    }
}

/// Render a float in its shortest round-tripping decimal form
pub fn format_f64(value: f64) -> Bytes {
    Bytes::from(value.to_string())
}

/// Represents the different types of values that can be stored
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// String value (binary-safe). Integers and floats are stored in their
    /// decimal representation.
    String(Bytes),

    /// List of values (ordered)
    List(VecDeque<Bytes>),

    /// Hash map (field -> value)
    Hash(HashMap<Bytes, Bytes>),

    /// Set of unique values (unordered)
    Set(HashSet<Bytes>),

    /// Members ordered by score, then by member bytes
    SortedSet(SortedSet),
}

impl Value {
    /// Create a string value
    pub fn string(bytes: impl Into<Bytes>) -> Self {
        Value::String(bytes.into())
    }

    /// Create a string holding the decimal form of an integer
    pub fn integer(i: i64) -> Self {
        Value::String(Bytes::from(i.to_string()))
    }

    /// Create an empty list
    pub fn empty_list() -> Self {
        Value::List(VecDeque::new())
    }

    /// Create an empty set
    pub fn empty_set() -> Self {
        Value::Set(HashSet::new())
    }

    /// Create an empty hash
    pub fn empty_hash() -> Self {
        Value::Hash(HashMap::new())
    }

    /// Create an empty sorted set
    pub fn empty_sorted_set() -> Self {
        Value::SortedSet(SortedSet::new())
    }

    /// Get the type name as reported by TYPE
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Hash(_) => "hash",
            Value::Set(_) => "set",
            Value::SortedSet(_) => "zset",
        }
    }

    /// Check if value is a string
    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    /// Try to get as string bytes
    pub fn as_string(&self) -> Option<&Bytes> {
        match self {
            Value::String(b) => Some(b),
            _ => None,
        }
    }

    /// Try to get as list reference
    pub fn as_list(&self) -> Option<&VecDeque<Bytes>> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    /// Try to get as hash reference
    pub fn as_hash(&self) -> Option<&HashMap<Bytes, Bytes>> {
        match self {
            Value::Hash(hash) => Some(hash),
            _ => None,
        }
    }

    /// Try to get as set reference
    pub fn as_set(&self) -> Option<&HashSet<Bytes>> {
        match self {
            Value::Set(set) => Some(set),
            _ => None,
        }
    }

    /// Try to get as sorted set reference
    pub fn as_sorted_set(&self) -> Option<&SortedSet> {
        match self {
            Value::SortedSet(zset) => Some(zset),
            _ => None,
        }
    }

    /// Whether a collection value has no elements left
    pub fn is_empty_collection(&self) -> bool {
        match self {
            Value::String(_) => false,
            Value::List(list) => list.is_empty(),
            Value::Hash(hash) => hash.is_empty(),
            Value::Set(set) => set.is_empty(),
            Value::SortedSet(zset) => zset.is_empty(),
        }
    }

    /// Append the elements of `part` to this value. Returns false if the
    /// two values are of different types.
    pub fn absorb(&mut self, part: Value) -> bool {
        match (self, part) {
            (Value::String(s), Value::String(more)) => {
                let mut joined = BytesMut::with_capacity(s.len() + more.len());
                joined.extend_from_slice(s);
                joined.extend_from_slice(&more);
                *s = joined.freeze();
            }
            (Value::List(list), Value::List(more)) => list.extend(more),
            (Value::Hash(hash), Value::Hash(more)) => hash.extend(more),
            (Value::Set(set), Value::Set(more)) => set.extend(more),
            (Value::SortedSet(zset), Value::SortedSet(more)) => {
                for (member, score) in more.iter() {
                    zset.insert(member.clone(), score);
                }
            }
            _ => return false,
        }
        true
    }

    /// Calculate approximate memory usage in bytes
    ///
    /// Must agree with the per-element costs charged by incremental
    /// operations, since the store subtracts this value on removal.
    pub fn memory_usage(&self) -> usize {
        match self {
            Value::String(bytes) => bytes.len(),
            Value::List(list) => list.iter().map(|b| element_cost(b)).sum(),
            Value::Hash(hash) => hash.iter().map(|(k, v)| pair_cost(k, v)).sum(),
            Value::Set(set) => set.iter().map(|b| element_cost(b)).sum(),
            Value::SortedSet(zset) => zset.memory_usage(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(Value::string("a").type_name(), "string");
        assert_eq!(Value::empty_list().type_name(), "list");
        assert_eq!(Value::empty_hash().type_name(), "hash");
        assert_eq!(Value::empty_set().type_name(), "set");
        assert_eq!(Value::empty_sorted_set().type_name(), "zset");
    }

    #[test]
    fn test_memory_usage_matches_element_costs() {
        let mut list = VecDeque::new();
        list.push_back(Bytes::from("abc"));
        list.push_back(Bytes::from("de"));
        let value = Value::List(list);
        assert_eq!(value.memory_usage(), element_cost(b"abc") + element_cost(b"de"));
        assert_eq!(Value::integer(-42).as_string().unwrap(), &Bytes::from("-42"));
    }

    #[test]
    fn test_absorb_appends_elements() {
        let mut value = Value::string("ab");
        assert!(value.absorb(Value::string("cd")));
        assert_eq!(value, Value::string("abcd"));

        let mut list = Value::List(VecDeque::from(vec![Bytes::from("a")]));
        assert!(list.absorb(Value::List(VecDeque::from(vec![Bytes::from("b")]))));
        assert_eq!(list.as_list().unwrap().len(), 2);
        assert_eq!(list.as_list().unwrap()[1], Bytes::from("b"));

        assert!(!list.absorb(Value::string("x")));
    }

    #[test]
    fn test_parse_i64_is_strict() {
        assert_eq!(parse_i64(b"10"), Some(10));
        assert_eq!(parse_i64(b"-7"), Some(-7));
        assert_eq!(parse_i64(b"0"), Some(0));
        assert_eq!(parse_i64(b"+1"), None);
        assert_eq!(parse_i64(b" 1"), None);
        assert_eq!(parse_i64(b"01"), None);
        assert_eq!(parse_i64(b"1.5"), None);
        assert_eq!(parse_i64(b"9223372036854775808"), None);
        assert_eq!(parse_i64(b""), None);
    }

    #[test]
    fn test_parse_and_format_f64() {
        assert_eq!(parse_f64(b"10.5"), Some(10.5));
        assert_eq!(parse_f64(b"-inf"), Some(f64::NEG_INFINITY));
        assert_eq!(parse_f64(b"nan"), None);
        assert_eq!(parse_f64(b"abc"), None);
        assert_eq!(format_f64(3.0), Bytes::from("3"));
        assert_eq!(format_f64(10.5), Bytes::from("10.5"));
    }
}
