//! Tagged binary layout of a cursor payload.
//!
//! ```text
//! +---------+-------+----------------------------------+
//! | version | count | count x (tag, payload)           |
//! |  1 byte | 1 byte|                                  |
//! +---------+-------+----------------------------------+
//! ```
//!
//! | Tag    | Type      | Payload                                  |
//! |--------|-----------|------------------------------------------|
//! | `0x00` | null      | none                                     |
//! | `0x01` | bool      | 1 byte, `0` or `1`                       |
//! | `0x02` | int       | 8 bytes, big-endian `i64`                |
//! | `0x03` | float     | 8 bytes, big-endian IEEE-754 bits        |
//! | `0x04` | string    | big-endian `u32` length, then UTF-8      |
//! | `0x05` | timestamp | big-endian `i64` seconds, `u32` nanos    |

use chrono::{DateTime, Utc};

use super::CursorError;
use crate::Value;

/// Current layout version.
pub(super) const FORMAT_VERSION: u8 = 1;

const TAG_NULL: u8 = 0x00;
const TAG_BOOL: u8 = 0x01;
const TAG_INT: u8 = 0x02;
const TAG_FLOAT: u8 = 0x03;
const TAG_STRING: u8 = 0x04;
const TAG_TIMESTAMP: u8 = 0x05;

/// Serialize values into the tagged layout.
///
/// The caller enforces the field limit, so `values.len()` fits in a byte.
pub(super) fn write_values(values: &[Value]) -> Result<Vec<u8>, CursorError> {
    let count = u8::try_from(values.len()).map_err(|_| CursorError::TooManyFields)?;
    let mut out = Vec::with_capacity(2 + values.len() * 9);
    out.push(FORMAT_VERSION);
    out.push(count);

    for value in values {
        match value {
            Value::Null => out.push(TAG_NULL),
            Value::Bool(b) => {
                out.push(TAG_BOOL);
                out.push(u8::from(*b));
            },
            Value::Int(i) => {
                out.push(TAG_INT);
                out.extend_from_slice(&i.to_be_bytes());
            },
            Value::Float(f) => {
                out.push(TAG_FLOAT);
                out.extend_from_slice(&f.to_bits().to_be_bytes());
            },
            Value::String(s) => {
                let len = u32::try_from(s.len()).map_err(|_| CursorError::TooLarge)?;
                out.push(TAG_STRING);
                out.extend_from_slice(&len.to_be_bytes());
                out.extend_from_slice(s.as_bytes());
            },
            Value::Timestamp(ts) => {
                out.push(TAG_TIMESTAMP);
                out.extend_from_slice(&ts.timestamp().to_be_bytes());
                out.extend_from_slice(&ts.timestamp_subsec_nanos().to_be_bytes());
            },
        }
    }

    Ok(out)
}

/// Parse the tagged layout back into values.
pub(super) fn read_values(bytes: &[u8], max_fields: usize) -> Result<Vec<Value>, CursorError> {
    let mut reader = Reader { bytes, pos: 0 };

    let version = reader.byte()?;
    if version != FORMAT_VERSION {
        return Err(CursorError::UnsupportedVersion(version));
    }

    let count = usize::from(reader.byte()?);
    if count > max_fields {
        return Err(CursorError::TooManyFields);
    }

    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        values.push(reader.value()?);
    }

    if reader.pos != bytes.len() {
        return Err(CursorError::TrailingBytes);
    }

    Ok(values)
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], CursorError> {
        let end = self.pos.checked_add(n).ok_or(CursorError::Truncated)?;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(CursorError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CursorError> {
        let slice = self.take(N)?;
        <[u8; N]>::try_from(slice).map_err(|_| CursorError::Truncated)
    }

    fn byte(&mut self) -> Result<u8, CursorError> {
        Ok(self.array::<1>()?[0])
    }

    fn value(&mut self) -> Result<Value, CursorError> {
        let tag = self.byte()?;
        match tag {
            TAG_NULL => Ok(Value::Null),
            TAG_BOOL => match self.byte()? {
                0 => Ok(Value::Bool(false)),
                1 => Ok(Value::Bool(true)),
                other => Err(CursorError::InvalidBool(other)),
            },
            TAG_INT => Ok(Value::Int(i64::from_be_bytes(self.array()?))),
            TAG_FLOAT => Ok(Value::Float(f64::from_bits(u64::from_be_bytes(
                self.array()?,
            )))),
            TAG_STRING => {
                let len = u32::from_be_bytes(self.array()?) as usize;
                let raw = self.take(len)?;
                let s = std::str::from_utf8(raw).map_err(|_| CursorError::InvalidUtf8)?;
                Ok(Value::String(s.to_string()))
            },
            TAG_TIMESTAMP => {
                let secs = i64::from_be_bytes(self.array()?);
                let nanos = u32::from_be_bytes(self.array()?);
                DateTime::<Utc>::from_timestamp(secs, nanos)
                    .map(Value::Timestamp)
                    .ok_or(CursorError::InvalidTimestamp)
            },
            other => Err(CursorError::UnknownTag(other)),
        }
    }
}
