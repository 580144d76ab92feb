//! RESP (Redis Serialization Protocol) codec for the cache client
//!
//! Based on the RESP2 specification with the RESP3 null:
//! https://redis.io/docs/reference/protocol-spec/
//!
//! Frames are parsed from a borrowed slice first and the buffer is only
//! advanced once a complete value is available, so a reply split across
//! several socket reads decodes correctly.

use bytes::{Buf, BytesMut};
use std::io::{self, Write};
use thiserror::Error;

/// RESP protocol errors
#[derive(Error, Debug)]
pub enum RespError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Protocol parsing error
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid encoding
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),
}

pub type RespResult<T> = Result<T, RespError>;

/// RESP value types
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// Simple string: +OK\r\n
    SimpleString(String),
    /// Error: -ERR message\r\n
    Error(String),
    /// Integer: :1000\r\n
    Integer(i64),
    /// Bulk string: $6\r\nfoobar\r\n (or $-1\r\n for null)
    BulkString(Option<Vec<u8>>),
    /// Array: *2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n (or *-1\r\n for null)
    Array(Vec<RespValue>),
    /// Null: _\r\n (RESP3)
    Null,
}

impl RespValue {
    /// Build a command as an array of bulk strings
    pub fn command(parts: &[&[u8]]) -> Self {
        RespValue::Array(
            parts
                .iter()
                .map(|p| RespValue::BulkString(Some(p.to_vec())))
                .collect(),
        )
    }

    /// Encode RESP value to bytes
    pub fn encode(&self, buf: &mut Vec<u8>) -> io::Result<()> {
        match self {
            RespValue::SimpleString(s) => {
                write!(buf, "+{}\r\n", s)?;
            }
            RespValue::Error(e) => {
                write!(buf, "-{}\r\n", e)?;
            }
            RespValue::Integer(i) => {
                write!(buf, ":{}\r\n", i)?;
            }
            RespValue::BulkString(None) => {
                write!(buf, "$-1\r\n")?;
            }
            RespValue::BulkString(Some(data)) => {
                write!(buf, "${}\r\n", data.len())?;
                buf.extend_from_slice(data);
                write!(buf, "\r\n")?;
            }
            RespValue::Array(items) => {
                write!(buf, "*{}\r\n", items.len())?;
                for item in items {
                    item.encode(buf)?;
                }
            }
            RespValue::Null => {
                write!(buf, "_\r\n")?;
            }
        }
        Ok(())
    }

    /// Parse one RESP value from the buffer.
    ///
    /// Returns `Ok(None)` and leaves the buffer untouched when the frame is
    /// not complete yet.
    pub fn decode(buf: &mut BytesMut) -> RespResult<Option<RespValue>> {
        match Self::parse(&buf[..], 0)? {
            Some((value, consumed)) => {
                buf.advance(consumed);
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn parse(data: &[u8], pos: usize) -> RespResult<Option<(RespValue, usize)>> {
        let Some((line, next)) = Self::line(data, pos) else {
            return Ok(None);
        };
        if line.is_empty() {
            return Err(RespError::Protocol("Empty RESP line".to_string()));
        }
        let body = &line[1..];

        match line[0] {
            b'+' => Ok(Some((RespValue::SimpleString(Self::utf8(body)?), next))),
            b'-' => Ok(Some((RespValue::Error(Self::utf8(body)?), next))),
            b':' => Ok(Some((RespValue::Integer(Self::number(body)?), next))),
            b'_' => Ok(Some((RespValue::Null, next))),
            b'$' => {
                let len = Self::number(body)?;
                if len < 0 {
                    return Ok(Some((RespValue::BulkString(None), next)));
                }
                let len = len as usize;
                if data.len() < next + len + 2 {
                    return Ok(None);
                }
                if &data[next + len..next + len + 2] != b"\r\n" {
                    return Err(RespError::Protocol(
                        "Missing \\r\\n after bulk string".to_string(),
                    ));
                }
                let payload = data[next..next + len].to_vec();
                Ok(Some((RespValue::BulkString(Some(payload)), next + len + 2)))
            }
            b'*' => {
                let len = Self::number(body)?;
                if len < 0 {
                    return Ok(Some((RespValue::Null, next)));
                }
                let mut elements = Vec::with_capacity(len as usize);
                let mut cursor = next;
                for _ in 0..len {
                    match Self::parse(data, cursor)? {
                        Some((value, after)) => {
                            elements.push(value);
                            cursor = after;
                        }
                        None => return Ok(None),
                    }
                }
                Ok(Some((RespValue::Array(elements), cursor)))
            }
            other => Err(RespError::Protocol(format!(
                "Unknown RESP type: {}",
                other as char
            ))),
        }
    }

    /// CRLF-terminated line starting at `pos`, and the offset after it
    fn line(data: &[u8], pos: usize) -> Option<(&[u8], usize)> {
        let rest = data.get(pos..)?;
        let end = rest.windows(2).position(|w| w == b"\r\n")?;
        Some((&rest[..end], pos + end + 2))
    }

    fn utf8(bytes: &[u8]) -> RespResult<String> {
        String::from_utf8(bytes.to_vec()).map_err(|e| RespError::InvalidEncoding(e.to_string()))
    }

    fn number(bytes: &[u8]) -> RespResult<i64> {
        Self::utf8(bytes)?
            .parse::<i64>()
            .map_err(|e| RespError::Protocol(format!("Invalid integer: {}", e)))
    }

    /// Convert to array or error
    pub fn as_array(&self) -> RespResult<&[RespValue]> {
        match self {
            RespValue::Array(arr) => Ok(arr),
            RespValue::Null => Ok(&[]),
            _ => Err(RespError::Protocol("Expected array".to_string())),
        }
    }

    /// Convert to bulk string or error
    pub fn as_bulk_string(&self) -> RespResult<Option<&[u8]>> {
        match self {
            RespValue::BulkString(Some(data)) => Ok(Some(data)),
            RespValue::BulkString(None) | RespValue::Null => Ok(None),
            _ => Err(RespError::Protocol("Expected bulk string".to_string())),
        }
    }

    /// Convert bulk string to UTF-8 string
    pub fn as_string(&self) -> RespResult<Option<String>> {
        match self.as_bulk_string()? {
            Some(bytes) => Ok(Some(Self::utf8(bytes)?)),
            None => Ok(None),
        }
    }

    /// Convert to integer or error
    pub fn as_integer(&self) -> RespResult<i64> {
        match self {
            RespValue::Integer(i) => Ok(*i),
            _ => Err(RespError::Protocol("Expected integer".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_command() {
        let val = RespValue::command(&[b"GET", b"/ctx"]);
        let mut buf = Vec::new();
        val.encode(&mut buf).unwrap();
        assert_eq!(buf, b"*2\r\n$3\r\nGET\r\n$4\r\n/ctx\r\n");
    }

    #[test]
    fn test_encode_null_bulk_string() {
        let val = RespValue::BulkString(None);
        let mut buf = Vec::new();
        val.encode(&mut buf).unwrap();
        assert_eq!(buf, b"$-1\r\n");
    }

    #[test]
    fn test_decode_simple_string() {
        let mut buf = BytesMut::from(&b"+OK\r\n"[..]);
        let val = RespValue::decode(&mut buf).unwrap().unwrap();
        assert_eq!(val, RespValue::SimpleString("OK".to_string()));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_error_reply() {
        let mut buf = BytesMut::from(&b"-NOAUTH Authentication required.\r\n"[..]);
        let val = RespValue::decode(&mut buf).unwrap().unwrap();
        assert_eq!(
            val,
            RespValue::Error("NOAUTH Authentication required.".to_string())
        );
    }

    #[test]
    fn test_decode_keys_reply() {
        let mut buf = BytesMut::from(&b"*2\r\n$4\r\n/a/b\r\n$6\r\n/a/b/c\r\n"[..]);
        let val = RespValue::decode(&mut buf).unwrap().unwrap();
        let keys: Vec<String> = val
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_string().unwrap().unwrap())
            .collect();
        assert_eq!(keys, vec!["/a/b", "/a/b/c"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_nil_bulk() {
        let mut buf = BytesMut::from(&b"$-1\r\n"[..]);
        let val = RespValue::decode(&mut buf).unwrap().unwrap();
        assert_eq!(val.as_bulk_string().unwrap(), None);
    }

    #[test]
    fn test_decode_incomplete_keeps_buffer() {
        let mut buf = BytesMut::from(&b"$6\r\nfoo"[..]);
        assert!(RespValue::decode(&mut buf).unwrap().is_none());
        assert_eq!(&buf[..], b"$6\r\nfoo");

        buf.extend_from_slice(b"bar\r\n");
        let val = RespValue::decode(&mut buf).unwrap().unwrap();
        assert_eq!(val, RespValue::BulkString(Some(b"foobar".to_vec())));
    }

    #[test]
    fn test_decode_incomplete_array() {
        let mut buf = BytesMut::from(&b"*2\r\n$1\r\na\r\n"[..]);
        assert!(RespValue::decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 11);
    }

    #[test]
    fn test_decode_unknown_type() {
        let mut buf = BytesMut::from(&b"!oops\r\n"[..]);
        assert!(matches!(
            RespValue::decode(&mut buf),
            Err(RespError::Protocol(_))
        ));
    }
}
