//! RESP2 parser and encoder
//!
//! Parsing is two-phase: a frame is first measured against the buffered
//! bytes without consuming anything, and only a complete frame is split off
//! and decoded. A request split across several reads therefore stays in the
//! buffer untouched until its last byte arrives.

use super::types::{RespError, RespValue};
use bytes::{BufMut, Bytes, BytesMut};

const CRLF: &[u8] = b"\r\n";

/// Default upper bound for a single bulk string (512 MiB)
pub const DEFAULT_MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Default upper bound for the number of elements in one array
pub const DEFAULT_MAX_ARRAY_LEN: usize = 1024 * 1024;

/// Longest header or inline command line we are willing to buffer
const MAX_INLINE_LEN: usize = 64 * 1024;

/// Deepest array nesting accepted
const MAX_DEPTH: usize = 32;

/// RESP2 Parser
#[derive(Debug, Clone)]
pub struct RespParser {
    max_bulk_len: usize,
    max_array_len: usize,
}

impl Default for RespParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RespParser {
    /// Create a parser with default limits
    pub fn new() -> Self {
        RespParser {
            max_bulk_len: DEFAULT_MAX_BULK_LEN,
            max_array_len: DEFAULT_MAX_ARRAY_LEN,
        }
    }

    /// Create a parser with explicit frame limits
    pub fn with_limits(max_bulk_len: usize, max_array_len: usize) -> Self {
        RespParser {
            max_bulk_len,
            max_array_len,
        }
    }

    /// Parse a RESP value from a buffer
    ///
    /// Returns Ok(Some(value)) if a complete value was parsed,
    /// Ok(None) if more data is needed,
    /// Err(e) if parsing failed
    pub fn parse(&self, buf: &mut BytesMut) -> Result<Option<RespValue>, RespError> {
        let end = match self.measure(buf, 0, 0)? {
            Some(end) => end,
            None => return Ok(None),
        };

        let frame = buf.split_to(end).freeze();
        let mut pos = 0;
        let value = decode(&frame, &mut pos)?;
        Ok(Some(value))
    }

    /// Parse one client request
    ///
    /// Requests are either arrays of bulk strings or inline commands (a
    /// single whitespace separated line). An empty request yields an empty
    /// vector, which callers should simply skip.
    pub fn parse_command(&self, buf: &mut BytesMut) -> Result<Option<Vec<Bytes>>, RespError> {
        if buf.is_empty() {
            return Ok(None);
        }

        if buf[0] != b'*' {
            return self.parse_inline(buf);
        }

        match self.parse(buf)? {
            Some(RespValue::Array(items)) => {
                let mut args = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        RespValue::BulkString(b) => args.push(b),
                        other => {
                            return Err(RespError::InvalidProtocol(format!(
                                "expected '$', got {}",
                                other
                            )))
                        }
                    }
                }
                Ok(Some(args))
            }
            Some(RespValue::NullArray) => Ok(Some(Vec::new())),
            Some(other) => Err(RespError::InvalidProtocol(format!(
                "expected array, got {}",
                other
            ))),
            None => Ok(None),
        }
    }

    /// Inline command: `SET key value\r\n`
    fn parse_inline(&self, buf: &mut BytesMut) -> Result<Option<Vec<Bytes>>, RespError> {
        let newline = match buf.iter().position(|&b| b == b'\n') {
            Some(i) => i,
            None => {
                if buf.len() > MAX_INLINE_LEN {
                    return Err(RespError::TooLarge {
                        kind: "inline request",
                        size: buf.len(),
                        max: MAX_INLINE_LEN,
                    });
                }
                return Ok(None);
            }
        };

        let line = buf.split_to(newline + 1).freeze();
        let mut content = &line[..newline];
        if content.last() == Some(&b'\r') {
            content = &content[..content.len() - 1];
        }

        let args = content
            .split(|b| b.is_ascii_whitespace())
            .filter(|part| !part.is_empty())
            .map(|part| line.slice_ref(part))
            .collect();

        Ok(Some(args))
    }

    /// Compute the end offset of the value starting at `pos`, if it is fully
    /// buffered. Nothing is consumed.
    fn measure(&self, buf: &[u8], pos: usize, depth: usize) -> Result<Option<usize>, RespError> {
        if pos >= buf.len() {
            return Ok(None);
        }
        if depth > MAX_DEPTH {
            return Err(RespError::InvalidProtocol("nesting too deep".to_string()));
        }

        let line_end = match find_crlf(buf, pos + 1)? {
            Some(i) => i,
            None => return Ok(None),
        };
        let after_line = line_end + 2;

        match buf[pos] {
            b'+' | b'-' | b':' => Ok(Some(after_line)),
            b'$' => {
                let len = parse_length(&buf[pos + 1..line_end], "bulk")?;
                if len < 0 {
                    return Ok(Some(after_line));
                }
                let len = len as usize;
                if len > self.max_bulk_len {
                    return Err(RespError::TooLarge {
                        kind: "bulk string",
                        size: len,
                        max: self.max_bulk_len,
                    });
                }
                let end = after_line + len + 2;
                if buf.len() < end {
                    return Ok(None);
                }
                if &buf[end - 2..end] != CRLF {
                    return Err(RespError::InvalidProtocol(
                        "missing CRLF after bulk string data".to_string(),
                    ));
                }
                Ok(Some(end))
            }
            b'*' => {
                let count = parse_length(&buf[pos + 1..line_end], "multibulk")?;
                if count < 0 {
                    return Ok(Some(after_line));
                }
                let count = count as usize;
                if count > self.max_array_len {
                    return Err(RespError::TooLarge {
                        kind: "multibulk",
                        size: count,
                        max: self.max_array_len,
                    });
                }
                let mut cursor = after_line;
                for _ in 0..count {
                    match self.measure(buf, cursor, depth + 1)? {
                        Some(next) => cursor = next,
                        None => return Ok(None),
                    }
                }
                Ok(Some(cursor))
            }
            other => Err(RespError::InvalidProtocol(format!(
                "unknown type prefix: {:?}",
                other as char
            ))),
        }
    }
}

/// Locate the next CRLF at or after `from`
fn find_crlf(buf: &[u8], from: usize) -> Result<Option<usize>, RespError> {
    let mut i = from;
    while i + 1 < buf.len() {
        if buf[i] == b'\r' && buf[i + 1] == b'\n' {
            return Ok(Some(i));
        }
        i += 1;
    }
    if buf.len().saturating_sub(from) > MAX_INLINE_LEN {
        return Err(RespError::TooLarge {
            kind: "header line",
            size: buf.len() - from,
            max: MAX_INLINE_LEN,
        });
    }
    Ok(None)
}

fn parse_length(digits: &[u8], kind: &'static str) -> Result<i64, RespError> {
    let s = std::str::from_utf8(digits).map_err(|_| RespError::InvalidLength(kind))?;
    let n = s.parse::<i64>().map_err(|_| RespError::InvalidLength(kind))?;
    if n < -1 {
        return Err(RespError::InvalidLength(kind));
    }
    Ok(n)
}

/// Decode a value out of a frame already known to be complete
fn decode(frame: &Bytes, pos: &mut usize) -> Result<RespValue, RespError> {
    let start = *pos;
    let line_end = match find_crlf(frame, start + 1)? {
        Some(i) => i,
        None => return Err(RespError::Incomplete),
    };
    let line = &frame[start + 1..line_end];
    *pos = line_end + 2;

    match frame[start] {
        b'+' => {
            let s = std::str::from_utf8(line).map_err(|_| RespError::InvalidUtf8)?;
            Ok(RespValue::SimpleString(s.to_string()))
        }
        b'-' => {
            let s = std::str::from_utf8(line).map_err(|_| RespError::InvalidUtf8)?;
            Ok(RespValue::Error(s.to_string()))
        }
        b':' => {
            let s = std::str::from_utf8(line).map_err(|_| RespError::InvalidUtf8)?;
            let i = s
                .parse::<i64>()
                .map_err(|_| RespError::InvalidProtocol(format!("invalid integer: {}", s)))?;
            Ok(RespValue::Integer(i))
        }
        b'$' => {
            let len = parse_length(line, "bulk")?;
            if len < 0 {
                return Ok(RespValue::Null);
            }
            let data_start = *pos;
            let data_end = data_start + len as usize;
            *pos = data_end + 2;
            Ok(RespValue::BulkString(frame.slice(data_start..data_end)))
        }
        b'*' => {
            let count = parse_length(line, "multibulk")?;
            if count < 0 {
                return Ok(RespValue::NullArray);
            }
            let mut elements = Vec::with_capacity(count as usize);
            for _ in 0..count {
                elements.push(decode(frame, pos)?);
            }
            Ok(RespValue::Array(elements))
        }
        other => Err(RespError::InvalidProtocol(format!(
            "unknown type prefix: {:?}",
            other as char
        ))),
    }
}

/// RESP2 Encoder
pub struct RespEncoder;

impl RespEncoder {
    /// Encode a RESP value to bytes
    pub fn encode(value: &RespValue) -> Bytes {
        let mut buf = BytesMut::new();
        Self::encode_to(&mut buf, value);
        buf.freeze()
    }

    /// Encode a RESP value into an existing buffer
    pub fn encode_to(buf: &mut BytesMut, value: &RespValue) {
        match value {
            RespValue::SimpleString(s) => {
                buf.put_u8(b'+');
                buf.put_slice(s.as_bytes());
                buf.put_slice(CRLF);
            }
            RespValue::Error(e) => {
                buf.put_u8(b'-');
                buf.put_slice(e.as_bytes());
                buf.put_slice(CRLF);
            }
            RespValue::Integer(i) => {
                buf.put_u8(b':');
                buf.put_slice(i.to_string().as_bytes());
                buf.put_slice(CRLF);
            }
            RespValue::BulkString(bytes) => {
                buf.put_u8(b'$');
                buf.put_slice(bytes.len().to_string().as_bytes());
                buf.put_slice(CRLF);
                buf.put_slice(bytes);
                buf.put_slice(CRLF);
            }
            RespValue::Null => {
                buf.put_slice(b"$-1\r\n");
            }
            RespValue::NullArray => {
                buf.put_slice(b"*-1\r\n");
            }
            RespValue::Array(arr) => {
                buf.put_u8(b'*');
                buf.put_slice(arr.len().to_string().as_bytes());
                buf.put_slice(CRLF);
                for elem in arr {
                    Self::encode_to(buf, elem);
                }
            }
        }
    }

    /// Encode a request (array of bulk strings)
    pub fn encode_command(buf: &mut BytesMut, args: &[Bytes]) {
        buf.put_u8(b'*');
        buf.put_slice(args.len().to_string().as_bytes());
        buf.put_slice(CRLF);
        for arg in args {
            buf.put_u8(b'$');
            buf.put_slice(arg.len().to_string().as_bytes());
            buf.put_slice(CRLF);
            buf.put_slice(arg);
            buf.put_slice(CRLF);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<Option<RespValue>, RespError> {
        let mut buf = BytesMut::from(input);
        RespParser::new().parse(&mut buf)
    }

    #[test]
    fn test_parse_simple_string() {
        assert_eq!(
            parse("+OK\r\n").unwrap(),
            Some(RespValue::SimpleString("OK".to_string()))
        );
    }

    #[test]
    fn test_parse_error() {
        assert_eq!(
            parse("-Error message\r\n").unwrap(),
            Some(RespValue::Error("Error message".to_string()))
        );
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse(":1000\r\n").unwrap(), Some(RespValue::Integer(1000)));
    }

    #[test]
    fn test_parse_bulk_string() {
        assert_eq!(
            parse("$6\r\nfoobar\r\n").unwrap(),
            Some(RespValue::BulkString(Bytes::from("foobar")))
        );
    }

    #[test]
    fn test_parse_binary_bulk_string() {
        let mut buf = BytesMut::from(&b"$4\r\na\r\nb\r\n"[..]);
        let value = RespParser::new().parse(&mut buf).unwrap();
        assert_eq!(value, Some(RespValue::BulkString(Bytes::from("a\r\nb"))));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_parse_null() {
        assert_eq!(parse("$-1\r\n").unwrap(), Some(RespValue::Null));
        assert_eq!(parse("*-1\r\n").unwrap(), Some(RespValue::NullArray));
    }

    #[test]
    fn test_parse_array() {
        assert_eq!(
            parse("*2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n").unwrap(),
            Some(RespValue::Array(vec![
                RespValue::BulkString(Bytes::from("foo")),
                RespValue::BulkString(Bytes::from("bar")),
            ]))
        );
    }

    #[test]
    fn test_partial_frame_is_not_consumed() {
        let parser = RespParser::new();
        let full = b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$5\r\nhello\r\n";

        for split in 1..full.len() {
            let mut buf = BytesMut::from(&full[..split]);
            assert_eq!(parser.parse_command(&mut buf).unwrap(), None, "split at {}", split);
            assert_eq!(buf.len(), split);

            buf.extend_from_slice(&full[split..]);
            let args = parser.parse_command(&mut buf).unwrap().unwrap();
            assert_eq!(
                args,
                vec![Bytes::from("SET"), Bytes::from("k"), Bytes::from("hello")]
            );
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn test_pipelined_frames() {
        let parser = RespParser::new();
        let mut buf = BytesMut::from("*1\r\n$4\r\nPING\r\n*2\r\n$4\r\nECHO\r\n$2\r\nhi\r\n*1\r\n$3");

        assert_eq!(
            parser.parse_command(&mut buf).unwrap(),
            Some(vec![Bytes::from("PING")])
        );
        assert_eq!(
            parser.parse_command(&mut buf).unwrap(),
            Some(vec![Bytes::from("ECHO"), Bytes::from("hi")])
        );
        assert_eq!(parser.parse_command(&mut buf).unwrap(), None);
        assert_eq!(&buf[..], b"*1\r\n$3");
    }

    #[test]
    fn test_inline_command() {
        let parser = RespParser::new();
        let mut buf = BytesMut::from("SET  key value\r\nPING\n");
        assert_eq!(
            parser.parse_command(&mut buf).unwrap(),
            Some(vec![Bytes::from("SET"), Bytes::from("key"), Bytes::from("value")])
        );
        assert_eq!(
            parser.parse_command(&mut buf).unwrap(),
            Some(vec![Bytes::from("PING")])
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_invalid_frames() {
        let parser = RespParser::new();

        let mut buf = BytesMut::from("*1\r\n:12\r\n");
        assert!(parser.parse_command(&mut buf).is_err());

        let mut buf = BytesMut::from("$abc\r\n");
        assert!(parser.parse(&mut buf).is_err());

        let mut buf = BytesMut::from("$3\r\nfooXX");
        assert!(parser.parse(&mut buf).is_err());

        let mut buf = BytesMut::from("*1\r\n$10\r\n");
        let small = RespParser::with_limits(4, 16);
        assert!(matches!(
            small.parse(&mut buf),
            Err(RespError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_encode_simple_string() {
        let value = RespValue::SimpleString("OK".to_string());
        let encoded = RespEncoder::encode(&value);
        assert_eq!(encoded, Bytes::from("+OK\r\n"));
    }

    #[test]
    fn test_encode_bulk_string() {
        let value = RespValue::BulkString(Bytes::from("foobar"));
        let encoded = RespEncoder::encode(&value);
        assert_eq!(encoded, Bytes::from("$6\r\nfoobar\r\n"));
    }

    #[test]
    fn test_encode_nested_array() {
        let value = RespValue::array(vec![
            RespValue::integer(1),
            RespValue::array(vec![RespValue::Null]),
        ]);
        assert_eq!(RespEncoder::encode(&value), Bytes::from("*2\r\n:1\r\n*1\r\n$-1\r\n"));
    }
}
