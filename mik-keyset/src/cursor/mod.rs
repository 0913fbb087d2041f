//! Opaque cursor encoding/decoding.

mod codec;
mod encoding;

use crate::{Record, Value};

use encoding::{base64_decode, base64_encode};

/// Maximum allowed cursor size in bytes (4KB).
/// This prevents DoS attacks via oversized cursor payloads.
pub const MAX_CURSOR_SIZE: usize = 4 * 1024;

/// Maximum number of values allowed in a cursor.
pub const MAX_CURSOR_FIELDS: usize = 16;

/// A position in a sorted result set.
///
/// A cursor is the ordered tuple of sort-key values of one boundary record,
/// one value per cursor field. It travels to clients as an opaque URL-safe
/// string (see [`Cursor::encode`]).
///
/// # Security Note
///
/// Cursors are **not encrypted**. Their content is easy to decode, so only put
/// sort-key values in them. Tampered cursors decode to other positions or fail
/// with a [`CursorError`]; they cannot widen the base query.
///
/// # Example
///
/// ```
/// # use mik_keyset::Cursor;
/// let cursor = Cursor::new().string("2024-01-15T10:00:00Z").int(42);
/// let token = cursor.encode().unwrap();
/// assert_eq!(Cursor::decode(&token).unwrap(), cursor);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[non_exhaustive]
#[must_use = "cursor must be encoded with .encode() or used with a paginator"]
pub struct Cursor {
    /// Sort-key values, in cursor-field order.
    pub values: Vec<Value>,
}

impl Cursor {
    /// Create a new empty cursor.
    pub const fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Build a cursor from a list of values.
    pub const fn from_values(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Build the cursor of `record` for the given fields.
    ///
    /// Fields the record does not have read as [`Value::Null`].
    pub fn from_record<R, S>(record: &R, fields: &[S]) -> Self
    where
        R: Record + ?Sized,
        S: AsRef<str>,
    {
        let values = fields
            .iter()
            .map(|field| record.get(field.as_ref()).unwrap_or(Value::Null))
            .collect();
        Self { values }
    }

    /// Append a value.
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.values.push(value.into());
        self
    }

    /// Append an integer.
    pub fn int(self, value: i64) -> Self {
        self.value(Value::Int(value))
    }

    /// Append a string.
    pub fn string(self, value: impl Into<String>) -> Self {
        self.value(Value::String(value.into()))
    }

    /// Append a null.
    pub fn null(self) -> Self {
        self.value(Value::Null)
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the cursor holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Encode the cursor to its opaque string form.
    ///
    /// Identical cursors always encode to identical strings. Fails if the
    /// cursor would exceed [`MAX_CURSOR_FIELDS`] or [`MAX_CURSOR_SIZE`], since
    /// such a string could never be decoded again.
    pub fn encode(&self) -> Result<String, CursorError> {
        if self.values.len() > MAX_CURSOR_FIELDS {
            return Err(CursorError::TooManyFields);
        }
        let bytes = codec::write_values(&self.values)?;
        let encoded = base64_encode(&bytes);
        if encoded.len() > MAX_CURSOR_SIZE {
            return Err(CursorError::TooLarge);
        }
        Ok(encoded)
    }

    /// Decode a cursor from its opaque string form.
    ///
    /// Safe to call on untrusted input: every malformed string yields a
    /// [`CursorError`].
    pub fn decode(encoded: &str) -> Result<Self, CursorError> {
        // Check size before decoding to prevent DoS attacks
        if encoded.len() > MAX_CURSOR_SIZE {
            return Err(CursorError::TooLarge);
        }
        let bytes = base64_decode(encoded).map_err(|()| CursorError::InvalidBase64)?;
        let values = codec::read_values(&bytes, MAX_CURSOR_FIELDS)?;
        Ok(Self { values })
    }

    /// Decode a cursor and check that it has one value per cursor field.
    pub fn decode_for(encoded: &str, field_count: usize) -> Result<Self, CursorError> {
        let cursor = Self::decode(encoded)?;
        if cursor.values.len() != field_count {
            return Err(CursorError::FieldCountMismatch {
                expected: field_count,
                found: cursor.values.len(),
            });
        }
        Ok(cursor)
    }
}

/// Errors that can occur when encoding or decoding a cursor.
///
/// Decoding client-supplied cursors fails routinely; map these to an
/// "invalid pagination token" response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum CursorError {
    /// The base64 encoding is invalid.
    #[error("invalid base64 encoding in cursor")]
    InvalidBase64,
    /// The payload was written by an unknown format version.
    #[error("unsupported cursor format version {0}")]
    UnsupportedVersion(u8),
    /// The payload ends before the announced values do.
    #[error("cursor payload is truncated")]
    Truncated,
    /// A value carries an unknown type tag.
    #[error("unknown cursor value tag 0x{0:02x}")]
    UnknownTag(u8),
    /// A boolean byte other than 0 or 1.
    #[error("invalid boolean byte {0} in cursor")]
    InvalidBool(u8),
    /// A string value is not valid UTF-8.
    #[error("cursor string value is not valid UTF-8")]
    InvalidUtf8,
    /// A timestamp value is out of range.
    #[error("cursor timestamp value is out of range")]
    InvalidTimestamp,
    /// Bytes follow the last announced value.
    #[error("unexpected bytes after the last cursor value")]
    TrailingBytes,
    /// The cursor exceeds the maximum allowed size.
    #[error("cursor exceeds maximum size ({}KB limit)", MAX_CURSOR_SIZE / 1024)]
    TooLarge,
    /// The cursor has too many values.
    #[error("cursor has too many fields (max {})", MAX_CURSOR_FIELDS)]
    TooManyFields,
    /// The cursor does not have one value per cursor field.
    #[error("cursor has {found} values but {expected} cursor fields are configured")]
    FieldCountMismatch {
        /// Number of configured cursor fields.
        expected: usize,
        /// Number of values in the cursor.
        found: usize,
    },
}

impl CursorError {
    /// Returns `true` if this is an encoding/format error.
    #[inline]
    #[must_use]
    pub const fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidBase64
                | Self::UnsupportedVersion(_)
                | Self::Truncated
                | Self::UnknownTag(_)
                | Self::InvalidBool(_)
                | Self::InvalidUtf8
                | Self::InvalidTimestamp
                | Self::TrailingBytes
                | Self::FieldCountMismatch { .. }
        )
    }

    /// Returns `true` if this is a size/limit error.
    ///
    /// Includes `TooLarge` and `TooManyFields`.
    #[inline]
    #[must_use]
    pub const fn is_limit_error(&self) -> bool {
        matches!(self, Self::TooLarge | Self::TooManyFields)
    }
}
