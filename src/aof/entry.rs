//! AOF record format
//!
//! Every record is framed as:
//! `[tag(u8)] [body_len(u32)] [body] [checksum(u64)]`
//! where the checksum is xxhash64 over tag, length and body. Integers are
//! little endian.
//!
//! Command body: `[db(u32)] [timestamp(u64)] [argc(u32)] ([len(u32)] [bytes])*`
//!
//! Snapshot body: `[db(u32)] [expire_at(i64), -1 for none] [key] [type(u8)] [payload]`
//! with payloads per type:
//! - string: `[len] [bytes]`
//! - list / set: `[count(u32)] ([len] [bytes])*`
//! - hash: `[count(u32)] ([field] [value])*`
//! - zset: `[count(u32)] ([member] [score(f64)])*`
//!
//! Values too large for one body are written as a snapshot record holding
//! the first slice of elements, followed by part records (same body layout)
//! that add the rest to the same key.

use crate::store::{now_ms, SnapshotEntry, SortedSet, Value};
use bytes::Bytes;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use thiserror::Error;

/// Tag of a command record
pub const RECORD_COMMAND: u8 = 1;
/// Tag of a snapshot entry
pub const RECORD_SNAPSHOT: u8 = 2;
/// Tag of more elements for the key of the preceding snapshot entry
pub const RECORD_SNAPSHOT_PART: u8 = 3;

const HEADER_LEN: usize = 5;
const CHECKSUM_LEN: usize = 8;

/// Larger bodies can only come from a damaged length field
const MAX_BODY_LEN: usize = 1 << 30;

/// Snapshot payloads above this size are split across part records
pub(crate) const SNAPSHOT_PART_LEN: usize = 64 << 20;

const TYPE_STRING: u8 = 0;
const TYPE_LIST: u8 = 1;
const TYPE_HASH: u8 = 2;
const TYPE_SET: u8 = 3;
const TYPE_ZSET: u8 = 4;

/// Why a record could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The buffer ends before the record does
    #[error("record is incomplete")]
    Incomplete,

    /// The record is damaged; `frame_len` is how many bytes it claimed
    #[error("record is corrupt: {reason}")]
    Corrupt { frame_len: usize, reason: String },
}

/// A record whose body would not load back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("record body of {0} bytes exceeds the 1 GiB limit")]
pub struct RecordTooLarge(pub usize);

impl From<RecordTooLarge> for io::Error {
    fn from(err: RecordTooLarge) -> Self {
        io::Error::new(io::ErrorKind::InvalidInput, err)
    }
}

/// One record of the append-only file
#[derive(Debug, Clone, PartialEq)]
pub enum AofRecord {
    /// A mutating command as it was applied
    Command {
        db: u32,
        /// Milliseconds since UNIX epoch
        timestamp: u64,
        argv: Vec<Bytes>,
    },
    /// One key of a compacted snapshot
    Snapshot(SnapshotEntry),
    /// More elements for the key of the preceding `Snapshot`
    SnapshotPart(SnapshotEntry),
}

impl AofRecord {
    /// Create a command record stamped with the current time
    pub fn command(db: usize, argv: Vec<Bytes>) -> Self {
        AofRecord::Command {
            db: db as u32,
            timestamp: now_ms(),
            argv,
        }
    }

    /// Whether this is the bare `name` command record, e.g. MULTI or EXEC
    pub fn is_marker(&self, name: &str) -> bool {
        match self {
            AofRecord::Command { argv, .. } => {
                argv.len() == 1 && argv[0].eq_ignore_ascii_case(name.as_bytes())
            }
            _ => false,
        }
    }

    /// Serialize into `out`, framed and checksummed. A snapshot entry may
    /// take several frames. Nothing is left in `out` on error.
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), RecordTooLarge> {
        let start = out.len();
        let result = match self {
            AofRecord::Command { db, timestamp, argv } => frame(out, RECORD_COMMAND, |out| {
                out.extend_from_slice(&db.to_le_bytes());
                out.extend_from_slice(&timestamp.to_le_bytes());
                out.extend_from_slice(&(argv.len() as u32).to_le_bytes());
                for arg in argv {
                    put_bytes(out, arg);
                }
            }),
            AofRecord::Snapshot(entry) => encode_snapshot(out, entry, SNAPSHOT_PART_LEN),
            AofRecord::SnapshotPart(entry) => frame(out, RECORD_SNAPSHOT_PART, |out| {
                snapshot_body(out, entry, &entry.value)
            }),
        };
        if result.is_err() {
            out.truncate(start);
        }
        result
    }

    /// Serialize to a fresh buffer
    #[cfg(test)]
    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf).unwrap();
        buf
    }

    /// Decode the record at the start of `data`, returning it and its size
    pub fn decode(data: &[u8]) -> Result<(AofRecord, usize), DecodeError> {
        if data.len() < HEADER_LEN {
            return Err(DecodeError::Incomplete);
        }

        let tag = data[0];
        let body_len = u32::from_le_bytes([data[1], data[2], data[3], data[4]]) as usize;
        if body_len > MAX_BODY_LEN {
            return Err(DecodeError::Corrupt {
                frame_len: data.len(),
                reason: format!("implausible body length {}", body_len),
            });
        }

        let frame_len = HEADER_LEN + body_len + CHECKSUM_LEN;
        if data.len() < frame_len {
            return Err(DecodeError::Incomplete);
        }

        let corrupt = |reason: &str| DecodeError::Corrupt {
            frame_len,
            reason: reason.to_string(),
        };

        let body_end = HEADER_LEN + body_len;
        let mut stored = [0u8; CHECKSUM_LEN];
        stored.copy_from_slice(&data[body_end..frame_len]);
        let stored = u64::from_le_bytes(stored);
        if xxhash_rust::xxh64::xxh64(&data[..body_end], 0) != stored {
            return Err(corrupt("checksum mismatch"));
        }

        let mut body = BodyReader::new(&data[HEADER_LEN..body_end]);
        let record = match tag {
            RECORD_COMMAND => decode_command(&mut body),
            RECORD_SNAPSHOT => decode_snapshot(&mut body).map(AofRecord::Snapshot),
            RECORD_SNAPSHOT_PART => decode_snapshot(&mut body).map(AofRecord::SnapshotPart),
            _ => None,
        }
        .ok_or_else(|| corrupt("malformed body"))?;

        if !body.is_exhausted() {
            return Err(corrupt("trailing bytes in body"));
        }

        Ok((record, frame_len))
    }
}

/// Write one framed record whose body is produced by `body`
fn frame(out: &mut Vec<u8>, tag: u8, body: impl FnOnce(&mut Vec<u8>)) -> Result<(), RecordTooLarge> {
    let start = out.len();
    out.push(tag);
    // Length placeholder, patched once the body is written
    out.extend_from_slice(&[0u8; 4]);
    body(&mut *out);

    let body_len = out.len() - start - HEADER_LEN;
    if body_len > MAX_BODY_LEN {
        return Err(RecordTooLarge(body_len));
    }
    out[start + 1..start + HEADER_LEN].copy_from_slice(&(body_len as u32).to_le_bytes());

    let checksum = xxhash_rust::xxh64::xxh64(&out[start..], 0);
    out.extend_from_slice(&checksum.to_le_bytes());
    Ok(())
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
}

/// Encode a snapshot entry, splitting values whose payload exceeds
/// `part_len` into a head record and part records
pub(crate) fn encode_snapshot(out: &mut Vec<u8>, entry: &SnapshotEntry, part_len: usize) -> Result<(), RecordTooLarge> {
    if payload_len(&entry.value) <= part_len {
        return frame(out, RECORD_SNAPSHOT, |out| snapshot_body(out, entry, &entry.value));
    }
    for (i, slice) in split_value(&entry.value, part_len).iter().enumerate() {
        let tag = if i == 0 { RECORD_SNAPSHOT } else { RECORD_SNAPSHOT_PART };
        frame(out, tag, |out| snapshot_body(out, entry, slice))?;
    }
    Ok(())
}

/// Encoded size of a value's payload
fn payload_len(value: &Value) -> usize {
    match value {
        Value::String(s) => 4 + s.len(),
        Value::List(list) => 4 + list.iter().map(|item| 4 + item.len()).sum::<usize>(),
        Value::Hash(hash) => 4 + hash.iter().map(|(f, v)| 8 + f.len() + v.len()).sum::<usize>(),
        Value::Set(set) => 4 + set.iter().map(|member| 4 + member.len()).sum::<usize>(),
        Value::SortedSet(zset) => 4 + zset.iter().map(|(member, _)| 12 + member.len()).sum::<usize>(),
    }
}

/// Cut a value into slices whose payloads stay near `part_len`. Merging
/// the slices in order gives back the value.
fn split_value(value: &Value, part_len: usize) -> Vec<Value> {
    let part_len = part_len.max(1);
    let mut slices = Vec::new();
    match value {
        Value::String(s) => {
            let mut pos = 0;
            while pos < s.len() {
                let end = (pos + part_len).min(s.len());
                slices.push(Value::String(s.slice(pos..end)));
                pos = end;
            }
            if slices.is_empty() {
                slices.push(Value::String(Bytes::new()));
            }
        }
        Value::List(list) => {
            let mut current = VecDeque::new();
            let mut size = 0;
            for item in list {
                current.push_back(item.clone());
                size += 4 + item.len();
                if size >= part_len {
                    slices.push(Value::List(std::mem::take(&mut current)));
                    size = 0;
                }
            }
            if !current.is_empty() {
                slices.push(Value::List(current));
            }
        }
        Value::Hash(hash) => {
            let mut current = HashMap::new();
            let mut size = 0;
            for (field, value) in hash {
                current.insert(field.clone(), value.clone());
                size += 8 + field.len() + value.len();
                if size >= part_len {
                    slices.push(Value::Hash(std::mem::take(&mut current)));
                    size = 0;
                }
            }
            if !current.is_empty() {
                slices.push(Value::Hash(current));
            }
        }
        Value::Set(set) => {
            let mut current = HashSet::new();
            let mut size = 0;
            for member in set {
                current.insert(member.clone());
                size += 4 + member.len();
                if size >= part_len {
                    slices.push(Value::Set(std::mem::take(&mut current)));
                    size = 0;
                }
            }
            if !current.is_empty() {
                slices.push(Value::Set(current));
            }
        }
        Value::SortedSet(zset) => {
            let mut current = SortedSet::new();
            let mut size = 0;
            for (member, score) in zset.iter() {
                current.insert(member.clone(), score);
                size += 12 + member.len();
                if size >= part_len {
                    slices.push(Value::SortedSet(std::mem::replace(&mut current, SortedSet::new())));
                    size = 0;
                }
            }
            if !current.is_empty() {
                slices.push(Value::SortedSet(current));
            }
        }
    }
    slices
}

fn snapshot_body(out: &mut Vec<u8>, entry: &SnapshotEntry, value: &Value) {
    out.extend_from_slice(&(entry.db as u32).to_le_bytes());
    let expire_at = entry.expire_at.map(|d| d as i64).unwrap_or(-1);
    out.extend_from_slice(&expire_at.to_le_bytes());
    put_bytes(out, &entry.key);

    match value {
        Value::String(s) => {
            out.push(TYPE_STRING);
            put_bytes(out, s);
        }
        Value::List(list) => {
            out.push(TYPE_LIST);
            out.extend_from_slice(&(list.len() as u32).to_le_bytes());
            for item in list {
                put_bytes(out, item);
            }
        }
        Value::Hash(hash) => {
            out.push(TYPE_HASH);
            out.extend_from_slice(&(hash.len() as u32).to_le_bytes());
            for (field, value) in hash {
                put_bytes(out, field);
                put_bytes(out, value);
            }
        }
        Value::Set(set) => {
            out.push(TYPE_SET);
            out.extend_from_slice(&(set.len() as u32).to_le_bytes());
            for member in set {
                put_bytes(out, member);
            }
        }
        Value::SortedSet(zset) => {
            out.push(TYPE_ZSET);
            out.extend_from_slice(&(zset.len() as u32).to_le_bytes());
            for (member, score) in zset.iter() {
                put_bytes(out, member);
                out.extend_from_slice(&score.to_le_bytes());
            }
        }
    }
}

fn decode_command(body: &mut BodyReader<'_>) -> Option<AofRecord> {
    let db = body.u32()?;
    let timestamp = body.u64()?;
    let argc = body.u32()? as usize;
    let mut argv = Vec::with_capacity(argc.min(1024));
    for _ in 0..argc {
        argv.push(body.bytes()?);
    }
    Some(AofRecord::Command { db, timestamp, argv })
}

fn decode_snapshot(body: &mut BodyReader<'_>) -> Option<SnapshotEntry> {
    let db = body.u32()? as usize;
    let expire_at = body.i64()?;
    let key = body.bytes()?;

    let value = match body.u8()? {
        TYPE_STRING => Value::String(body.bytes()?),
        TYPE_LIST => {
            let count = body.u32()? as usize;
            let mut list = VecDeque::with_capacity(count.min(1024));
            for _ in 0..count {
                list.push_back(body.bytes()?);
            }
            Value::List(list)
        }
        TYPE_HASH => {
            let count = body.u32()? as usize;
            let mut hash = HashMap::with_capacity(count.min(1024));
            for _ in 0..count {
                let field = body.bytes()?;
                hash.insert(field, body.bytes()?);
            }
            Value::Hash(hash)
        }
        TYPE_SET => {
            let count = body.u32()? as usize;
            let mut set = HashSet::with_capacity(count.min(1024));
            for _ in 0..count {
                set.insert(body.bytes()?);
            }
            Value::Set(set)
        }
        TYPE_ZSET => {
            let count = body.u32()? as usize;
            let mut zset = SortedSet::new();
            for _ in 0..count {
                let member = body.bytes()?;
                zset.insert(member, body.f64()?);
            }
            Value::SortedSet(zset)
        }
        _ => return None,
    };

    Some(SnapshotEntry {
        db,
        key,
        value,
        expire_at: if expire_at < 0 { None } else { Some(expire_at as u64) },
    })
}

/// Bounds-checked cursor over a record body
struct BodyReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BodyReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        BodyReader { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        let slice = self.data.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    fn array<const N: usize>(&mut self) -> Option<[u8; N]> {
        self.take(N)?.try_into().ok()
    }

    fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    fn u32(&mut self) -> Option<u32> {
        self.array().map(u32::from_le_bytes)
    }

    fn u64(&mut self) -> Option<u64> {
        self.array().map(u64::from_le_bytes)
    }

    fn i64(&mut self) -> Option<i64> {
        self.array().map(i64::from_le_bytes)
    }

    fn f64(&mut self) -> Option<f64> {
        self.array().map(f64::from_le_bytes)
    }

    fn bytes(&mut self) -> Option<Bytes> {
        let len = self.u32()? as usize;
        self.take(len).map(Bytes::copy_from_slice)
    }

    fn is_exhausted(&self) -> bool {
        self.pos == self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_command() -> AofRecord {
        AofRecord::Command {
            db: 3,
            timestamp: 1_700_000_000_000,
            argv: vec![Bytes::from("SET"), Bytes::from("mykey"), Bytes::from("myvalue")],
        }
    }

    #[test]
    fn test_command_record() {
        let record = set_command();
        let bytes = record.to_bytes();
        let (decoded, size) = AofRecord::decode(&bytes).unwrap();

        assert_eq!(size, bytes.len());
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_snapshot_record_with_zset() {
        let mut zset = SortedSet::new();
        zset.insert(Bytes::from("a"), 1.5);
        zset.insert(Bytes::from("b"), f64::NEG_INFINITY);
        let record = AofRecord::Snapshot(SnapshotEntry {
            db: 0,
            key: Bytes::from("z"),
            value: Value::SortedSet(zset),
            expire_at: Some(1_800_000_000_000),
        });

        let (decoded, _) = AofRecord::decode(&record.to_bytes()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_incomplete_record() {
        let bytes = set_command().to_bytes();
        assert_eq!(AofRecord::decode(&bytes[..3]), Err(DecodeError::Incomplete));
        assert_eq!(
            AofRecord::decode(&bytes[..bytes.len() - 1]),
            Err(DecodeError::Incomplete)
        );
    }

    #[test]
    fn test_checksum_validation() {
        let mut bytes = set_command().to_bytes();

        // Corrupt one byte of the body
        bytes[HEADER_LEN + 2] ^= 0xFF;

        match AofRecord::decode(&bytes) {
            Err(DecodeError::Corrupt { frame_len, reason }) => {
                assert_eq!(frame_len, bytes.len());
                assert!(reason.contains("checksum"));
            }
            other => panic!("expected corruption, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_tag_is_corrupt() {
        let mut bytes = set_command().to_bytes();
        bytes[0] = 9;
        // Fix up the checksum so only the tag is wrong
        let end = bytes.len() - CHECKSUM_LEN;
        let checksum = xxhash_rust::xxh64::xxh64(&bytes[..end], 0);
        bytes[end..].copy_from_slice(&checksum.to_le_bytes());

        assert!(matches!(
            AofRecord::decode(&bytes),
            Err(DecodeError::Corrupt { .. })
        ));
    }

    fn decode_all(mut data: &[u8]) -> Vec<AofRecord> {
        let mut records = Vec::new();
        while !data.is_empty() {
            let (record, size) = AofRecord::decode(data).unwrap();
            records.push(record);
            data = &data[size..];
        }
        records
    }

    #[test]
    fn test_large_value_is_split_into_parts() {
        let list: VecDeque<Bytes> = (0..100).map(|i| Bytes::from(format!("item:{:03}", i))).collect();
        let entry = SnapshotEntry {
            db: 1,
            key: Bytes::from("biglist"),
            value: Value::List(list),
            expire_at: Some(1_800_000_000_000),
        };

        let mut out = Vec::new();
        encode_snapshot(&mut out, &entry, 200).unwrap();
        let records = decode_all(&out);
        assert!(records.len() > 1);

        let mut rebuilt = match &records[0] {
            AofRecord::Snapshot(head) => head.clone(),
            other => panic!("expected a snapshot head, got {:?}", other),
        };
        for record in &records[1..] {
            match record {
                AofRecord::SnapshotPart(part) => {
                    assert_eq!(part.key, entry.key);
                    assert_eq!(part.expire_at, entry.expire_at);
                    assert!(rebuilt.value.absorb(part.value.clone()));
                }
                other => panic!("expected a part, got {:?}", other),
            }
        }
        assert_eq!(rebuilt, entry);
    }

    #[test]
    fn test_large_string_is_split_into_parts() {
        let text: String = (0..1000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let entry = SnapshotEntry {
            db: 0,
            key: Bytes::from("s"),
            value: Value::string(text),
            expire_at: None,
        };

        let mut out = Vec::new();
        encode_snapshot(&mut out, &entry, 300).unwrap();
        let records = decode_all(&out);
        assert_eq!(records.len(), 4);

        let mut value = Value::string("");
        for record in records {
            match record {
                AofRecord::Snapshot(e) | AofRecord::SnapshotPart(e) => assert!(value.absorb(e.value)),
                other => panic!("unexpected record {:?}", other),
            }
        }
        assert_eq!(value, entry.value);
    }

    #[test]
    fn test_small_value_stays_whole() {
        let entry = SnapshotEntry {
            db: 0,
            key: Bytes::from("k"),
            value: Value::string("v"),
            expire_at: None,
        };
        let mut out = Vec::new();
        encode_snapshot(&mut out, &entry, SNAPSHOT_PART_LEN).unwrap();
        assert_eq!(out, AofRecord::Snapshot(entry).to_bytes());
    }

    #[test]
    fn test_too_large_converts_to_io_error() {
        let err: io::Error = RecordTooLarge(MAX_BODY_LEN + 1).into();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
