//! RESP2 value types
//!
//! Defines the core data types for RESP2 protocol

use bytes::Bytes;
use std::fmt;
use thiserror::Error;

/// RESP2 value types
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// Simple strings: +OK\r\n
    SimpleString(String),

    /// Errors: -Error message\r\n
    Error(String),

    /// Integers: :1000\r\n
    Integer(i64),

    /// Bulk strings: $6\r\nfoobar\r\n
    BulkString(Bytes),

    /// Null bulk string: $-1\r\n
    Null,

    /// Null array: *-1\r\n
    NullArray,

    /// Arrays: *2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Create a simple string
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    /// The `+OK` status reply
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    /// Create an error
    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    /// Create an integer
    pub fn integer(i: i64) -> Self {
        RespValue::Integer(i)
    }

    /// Create a bulk string from bytes
    pub fn bulk_string(b: impl Into<Bytes>) -> Self {
        RespValue::BulkString(b.into())
    }

    /// Bulk string or null, depending on presence
    pub fn optional_bulk(b: Option<Bytes>) -> Self {
        match b {
            Some(b) => RespValue::BulkString(b),
            None => RespValue::Null,
        }
    }

    /// Create a null value
    pub fn null() -> Self {
        RespValue::Null
    }

    /// Create an array
    pub fn array(v: Vec<RespValue>) -> Self {
        RespValue::Array(v)
    }

    /// Array of bulk strings
    pub fn bulk_array<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Bytes>,
    {
        RespValue::Array(items.into_iter().map(RespValue::BulkString).collect())
    }

    /// Check if this is an array
    pub fn is_array(&self) -> bool {
        matches!(self, RespValue::Array(_))
    }

    /// Check if this is an error reply
    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    /// Try to extract array elements
    pub fn as_array(&self) -> Option<&Vec<RespValue>> {
        match self {
            RespValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to extract bulk string bytes
    pub fn as_bulk_string(&self) -> Option<&Bytes> {
        match self {
            RespValue::BulkString(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Try to extract integer value
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RespValue::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespValue::SimpleString(s) => write!(f, "SimpleString({})", s),
            RespValue::Error(e) => write!(f, "Error({})", e),
            RespValue::Integer(i) => write!(f, "Integer({})", i),
            RespValue::BulkString(b) => write!(f, "BulkString({} bytes)", b.len()),
            RespValue::Null => write!(f, "Null"),
            RespValue::NullArray => write!(f, "NullArray"),
            RespValue::Array(arr) => write!(f, "Array({} elements)", arr.len()),
        }
    }
}

/// RESP parsing errors
///
/// Any of these means the byte stream can no longer be framed, so the
/// connection that produced it is closed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RespError {
    /// Incomplete data, need more bytes
    #[error("incomplete data")]
    Incomplete,

    /// Invalid protocol format
    #[error("{0}")]
    InvalidProtocol(String),

    /// Invalid UTF-8 in a simple string or error line
    #[error("invalid UTF-8")]
    InvalidUtf8,

    /// Malformed or out of range length header
    #[error("invalid {0} length")]
    InvalidLength(&'static str),

    /// A frame exceeds the configured limits
    #[error("{kind} too large: {size} (max {max})")]
    TooLarge {
        kind: &'static str,
        size: usize,
        max: usize,
    },
}
