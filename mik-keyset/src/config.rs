//! Pagination configuration.
//!
//! Configuration comes in two layers:
//!
//! - [`Defaults`] - set once per integration (in code, or loaded with
//!   [`Defaults::from_json`]) and shared by every call.
//! - [`Options`] - per-call overrides, including the `after` / `before`
//!   cursors supplied by the client.
//!
//! [`Config::resolve`] merges the two (per-call wins) into the immutable
//! [`Config`] that drives one pagination call.
//!
//! | Key                     | Default      | Effect                                   |
//! |-------------------------|--------------|------------------------------------------|
//! | `cursor_fields`         | required     | ordered sort / boundary fields           |
//! | `after`                 | none         | records after this cursor                |
//! | `before`                | none         | records before this cursor               |
//! | `limit`                 | `50`         | page size                                |
//! | `maximum_limit`         | `500`        | upper bound for `limit`                  |
//! | `sort_direction`        | `asc`        | direction of fields that name none       |
//! | `include_total_count`   | `false`      | run the count query                      |
//! | `total_count_limit`     | `10000`      | count cap, or `"unbounded"`              |
//! | `total_count_key_field` | none         | column selected inside the count query   |

use miniserde::json::{self, Number, Value as JsonValue};

use crate::query::{SortDir, SortField};

/// Page size when neither the call nor the integration sets one.
pub const DEFAULT_LIMIT: u32 = 50;

/// Upper bound on the page size when the integration sets none.
pub const DEFAULT_MAXIMUM_LIMIT: u32 = 500;

/// Count cap when the integration sets none.
pub const DEFAULT_TOTAL_COUNT_LIMIT: u64 = 10_000;

/// A cursor field as configured: a name with an optional direction.
///
/// Fields without a direction take the resolved `sort_direction`. Any
/// non-empty name is accepted here; the query binding decides which names it
/// can use. The SQL binding only takes plain or dot-qualified identifiers
/// ([`is_valid_identifier`](crate::is_valid_identifier)).
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct CursorField {
    /// Field (column) name.
    pub name: String,
    /// Direction, if set explicitly.
    pub dir: Option<SortDir>,
}

impl CursorField {
    /// A field that follows the default sort direction.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dir: None,
        }
    }

    /// A field sorted ascending.
    pub fn asc(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dir: Some(SortDir::Asc),
        }
    }

    /// A field sorted descending.
    pub fn desc(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dir: Some(SortDir::Desc),
        }
    }

    /// Parse a sort string like `"-created_at,id,+name"`.
    ///
    /// `-` marks a descending field, `+` an ascending one and a bare name
    /// follows the default direction. Empty segments are skipped. Names are
    /// checked later against the query binding (see [`Config::check_fields`]).
    ///
    /// ```
    /// # use mik_keyset::{CursorField, SortDir};
    /// let fields = CursorField::parse_list("-created_at,id").unwrap();
    /// assert_eq!(fields[0].dir, Some(SortDir::Desc));
    /// assert_eq!(fields[1].dir, None);
    /// ```
    pub fn parse_list(sort: &str) -> Result<Vec<Self>, ConfigError> {
        sort.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Self::parse)
            .collect()
    }

    fn parse(part: &str) -> Result<Self, ConfigError> {
        let (name, dir) = if let Some(stripped) = part.strip_prefix('-') {
            (stripped, Some(SortDir::Desc))
        } else if let Some(stripped) = part.strip_prefix('+') {
            (stripped, Some(SortDir::Asc))
        } else {
            (part, None)
        };

        if name.is_empty() {
            return Err(ConfigError::InvalidFieldName(part.to_string()));
        }

        Ok(Self {
            name: name.to_string(),
            dir,
        })
    }
}

impl AsRef<str> for CursorField {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

impl From<&str> for CursorField {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<SortField> for CursorField {
    fn from(sort: SortField) -> Self {
        Self {
            name: sort.field,
            dir: Some(sort.dir),
        }
    }
}

/// Cap applied to the total-count query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum CountLimit {
    /// Count at most this many rows; report whether more exist.
    Capped(u64),
    /// Count every row.
    Unbounded,
}

impl Default for CountLimit {
    fn default() -> Self {
        Self::Capped(DEFAULT_TOTAL_COUNT_LIMIT)
    }
}

/// Integration-level defaults.
///
/// Build once, share by reference between calls.
///
/// ```
/// # use mik_keyset::{CountLimit, CursorField, Defaults};
/// let defaults = Defaults::new()
///     .cursor_fields(vec![CursorField::desc("created_at"), CursorField::asc("id")])
///     .limit(20)
///     .maximum_limit(100)
///     .include_total_count(true)
///     .total_count_limit(CountLimit::Capped(1_000));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct Defaults {
    /// Default cursor fields.
    pub cursor_fields: Vec<CursorField>,
    /// Default page size.
    pub limit: Option<u32>,
    /// Upper bound for the page size.
    pub maximum_limit: Option<u32>,
    /// Direction of cursor fields that name none.
    pub sort_direction: Option<SortDir>,
    /// Whether to run the count query.
    pub include_total_count: bool,
    /// Count cap.
    pub total_count_limit: Option<CountLimit>,
    /// Column selected inside the count query.
    pub total_count_key_field: Option<String>,
}

impl Defaults {
    /// Empty defaults; every key falls back to the built-in value.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default cursor fields.
    #[must_use]
    pub fn cursor_fields(mut self, fields: Vec<CursorField>) -> Self {
        self.cursor_fields = fields;
        self
    }

    /// Set the default page size.
    #[must_use]
    pub const fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the page size upper bound.
    #[must_use]
    pub const fn maximum_limit(mut self, maximum: u32) -> Self {
        self.maximum_limit = Some(maximum);
        self
    }

    /// Set the default sort direction.
    #[must_use]
    pub const fn sort_direction(mut self, dir: SortDir) -> Self {
        self.sort_direction = Some(dir);
        self
    }

    /// Run the count query by default.
    #[must_use]
    pub const fn include_total_count(mut self, include: bool) -> Self {
        self.include_total_count = include;
        self
    }

    /// Set the count cap.
    #[must_use]
    pub const fn total_count_limit(mut self, limit: CountLimit) -> Self {
        self.total_count_limit = Some(limit);
        self
    }

    /// Set the column selected inside the count query.
    #[must_use]
    pub fn total_count_key_field(mut self, field: impl Into<String>) -> Self {
        self.total_count_key_field = Some(field.into());
        self
    }

    /// Load defaults from a JSON object.
    ///
    /// Recognized keys are the ones in the [module table](self), except the
    /// per-call cursors. `cursor_fields` is an array of sort-string entries
    /// (`"-created_at"`) or a single sort string; `total_count_limit` is a
    /// number or `"unbounded"`; `sort_direction` is `"asc"` or `"desc"`.
    /// Unknown keys are rejected.
    ///
    /// ```
    /// # use mik_keyset::{CountLimit, Defaults};
    /// let defaults = Defaults::from_json(r#"{
    ///     "cursor_fields": ["-created_at", "id"],
    ///     "limit": 25,
    ///     "total_count_limit": "unbounded"
    /// }"#).unwrap();
    /// assert_eq!(defaults.limit, Some(25));
    /// assert_eq!(defaults.total_count_limit, Some(CountLimit::Unbounded));
    /// ```
    pub fn from_json(input: &str) -> Result<Self, ConfigError> {
        let value: JsonValue = json::from_str(input).map_err(|_| ConfigError::InvalidJson)?;
        let JsonValue::Object(object) = value else {
            return Err(ConfigError::InvalidJson);
        };

        let mut defaults = Self::default();
        for (key, value) in object.iter() {
            match key.as_str() {
                "cursor_fields" => defaults.cursor_fields = json_cursor_fields(key, value)?,
                "limit" => defaults.limit = json_opt(value, |v| json_u32(key, v))?,
                "maximum_limit" => defaults.maximum_limit = json_opt(value, |v| json_u32(key, v))?,
                "sort_direction" => {
                    defaults.sort_direction = json_opt(value, |v| json_sort_dir(key, v))?;
                },
                "include_total_count" => {
                    defaults.include_total_count = match value {
                        JsonValue::Bool(b) => *b,
                        JsonValue::Null => false,
                        _ => return Err(ConfigError::invalid_key(key, "a boolean")),
                    };
                },
                "total_count_limit" => {
                    defaults.total_count_limit = json_opt(value, |v| json_count_limit(key, v))?;
                },
                "total_count_key_field" => {
                    defaults.total_count_key_field = json_opt(value, |v| json_string(key, v))?;
                },
                _ => return Err(ConfigError::UnknownKey(key.clone())),
            }
        }

        Ok(defaults)
    }
}

fn json_opt<T>(
    value: &JsonValue,
    parse: impl FnOnce(&JsonValue) -> Result<T, ConfigError>,
) -> Result<Option<T>, ConfigError> {
    match value {
        JsonValue::Null => Ok(None),
        other => parse(other).map(Some),
    }
}

fn json_u64(key: &str, value: &JsonValue) -> Result<u64, ConfigError> {
    let n = match value {
        JsonValue::Number(Number::U64(n)) => Some(*n),
        JsonValue::Number(Number::I64(n)) => u64::try_from(*n).ok(),
        _ => None,
    };
    n.filter(|n| *n > 0)
        .ok_or_else(|| ConfigError::invalid_key(key, "a positive integer"))
}

fn json_u32(key: &str, value: &JsonValue) -> Result<u32, ConfigError> {
    u32::try_from(json_u64(key, value)?)
        .map_err(|_| ConfigError::invalid_key(key, "an integer below 2^32"))
}

fn json_string(key: &str, value: &JsonValue) -> Result<String, ConfigError> {
    match value {
        JsonValue::String(s) => Ok(s.clone()),
        _ => Err(ConfigError::invalid_key(key, "a string")),
    }
}

fn json_sort_dir(key: &str, value: &JsonValue) -> Result<SortDir, ConfigError> {
    match json_string(key, value)?.to_ascii_lowercase().as_str() {
        "asc" | "ascending" => Ok(SortDir::Asc),
        "desc" | "descending" => Ok(SortDir::Desc),
        _ => Err(ConfigError::invalid_key(key, "\"asc\" or \"desc\"")),
    }
}

fn json_count_limit(key: &str, value: &JsonValue) -> Result<CountLimit, ConfigError> {
    match value {
        JsonValue::String(s) if s == "unbounded" => Ok(CountLimit::Unbounded),
        JsonValue::Number(_) => json_u64(key, value).map(CountLimit::Capped),
        _ => Err(ConfigError::invalid_key(key, "a positive integer or \"unbounded\"")),
    }
}

fn json_cursor_fields(key: &str, value: &JsonValue) -> Result<Vec<CursorField>, ConfigError> {
    match value {
        JsonValue::String(s) => CursorField::parse_list(s),
        JsonValue::Array(items) => {
            let mut fields = Vec::with_capacity(items.len());
            for item in items.iter() {
                fields.extend(CursorField::parse_list(&json_string(key, item)?)?);
            }
            Ok(fields)
        },
        JsonValue::Null => Ok(Vec::new()),
        _ => Err(ConfigError::invalid_key(key, "an array of field names")),
    }
}

/// Per-call pagination options. Every key overrides the matching
/// [`Defaults`] key.
///
/// ```
/// # use mik_keyset::Options;
/// let options = Options::new().after("AQECAAAAAAAAAAI").limit(20);
/// assert_eq!(options.limit, Some(20));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct Options {
    /// Cursor to page forward from.
    pub after: Option<String>,
    /// Cursor to page backward from.
    pub before: Option<String>,
    /// Cursor fields for this call.
    pub cursor_fields: Option<Vec<CursorField>>,
    /// Page size.
    pub limit: Option<u32>,
    /// Upper bound for the page size.
    pub maximum_limit: Option<u32>,
    /// Direction of cursor fields that name none.
    pub sort_direction: Option<SortDir>,
    /// Whether to run the count query.
    pub include_total_count: Option<bool>,
    /// Count cap.
    pub total_count_limit: Option<CountLimit>,
    /// Column selected inside the count query.
    pub total_count_key_field: Option<String>,
}

impl Options {
    /// Options that override nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Page forward from `cursor`.
    #[must_use]
    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.after = Some(cursor.into());
        self
    }

    /// Page backward from `cursor`.
    #[must_use]
    pub fn before(mut self, cursor: impl Into<String>) -> Self {
        self.before = Some(cursor.into());
        self
    }

    /// Set the cursor fields for this call.
    #[must_use]
    pub fn cursor_fields(mut self, fields: Vec<CursorField>) -> Self {
        self.cursor_fields = Some(fields);
        self
    }

    /// Set the page size.
    #[must_use]
    pub const fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the page size upper bound.
    #[must_use]
    pub const fn maximum_limit(mut self, maximum: u32) -> Self {
        self.maximum_limit = Some(maximum);
        self
    }

    /// Set the default sort direction.
    #[must_use]
    pub const fn sort_direction(mut self, dir: SortDir) -> Self {
        self.sort_direction = Some(dir);
        self
    }

    /// Request (or suppress) the total count.
    #[must_use]
    pub const fn include_total_count(mut self, include: bool) -> Self {
        self.include_total_count = Some(include);
        self
    }

    /// Set the count cap.
    #[must_use]
    pub const fn total_count_limit(mut self, limit: CountLimit) -> Self {
        self.total_count_limit = Some(limit);
        self
    }

    /// Set the column selected inside the count query.
    #[must_use]
    pub fn total_count_key_field(mut self, field: impl Into<String>) -> Self {
        self.total_count_key_field = Some(field.into());
        self
    }
}

/// Resolved configuration of one pagination call.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Config {
    cursor_fields: Vec<SortField>,
    after: Option<String>,
    before: Option<String>,
    limit: u32,
    include_total_count: bool,
    total_count_limit: CountLimit,
    total_count_key_field: Option<String>,
}

impl Config {
    /// Merge per-call options over integration defaults.
    ///
    /// - `limit = min(limit ?? 50, maximum_limit ?? 500)`, and never below 1.
    /// - Fields without a direction take `sort_direction ?? asc`.
    /// - Empty cursor strings count as absent.
    ///
    /// Fails if no cursor fields are configured, a field name is empty, or
    /// `maximum_limit` or a capped `total_count_limit` is zero. Whether a
    /// name suits the store is up to the binding; see
    /// [`check_fields`](Self::check_fields).
    pub fn resolve(defaults: &Defaults, options: Options) -> Result<Self, ConfigError> {
        let fields = match options.cursor_fields {
            Some(fields) => fields,
            None => defaults.cursor_fields.clone(),
        };
        if fields.is_empty() {
            return Err(ConfigError::MissingCursorFields);
        }

        let default_dir = options
            .sort_direction
            .or(defaults.sort_direction)
            .unwrap_or_default();

        let mut cursor_fields = Vec::with_capacity(fields.len());
        for field in fields {
            if field.name.is_empty() {
                return Err(ConfigError::InvalidFieldName(field.name));
            }
            let dir = field.dir.unwrap_or(default_dir);
            cursor_fields.push(SortField::new(field.name, dir));
        }

        let requested = options.limit.or(defaults.limit).unwrap_or(DEFAULT_LIMIT);
        let maximum = options
            .maximum_limit
            .or(defaults.maximum_limit)
            .unwrap_or(DEFAULT_MAXIMUM_LIMIT);
        if maximum == 0 {
            return Err(ConfigError::invalid_key("maximum_limit", "a positive integer"));
        }
        let limit = requested.min(maximum).max(1);

        let total_count_limit = options
            .total_count_limit
            .or(defaults.total_count_limit)
            .unwrap_or_default();
        if total_count_limit == CountLimit::Capped(0) {
            return Err(ConfigError::invalid_key(
                "total_count_limit",
                "a positive integer or \"unbounded\"",
            ));
        }

        let total_count_key_field = options
            .total_count_key_field
            .or_else(|| defaults.total_count_key_field.clone());
        if total_count_key_field.as_deref() == Some("") {
            return Err(ConfigError::InvalidFieldName(String::new()));
        }

        Ok(Self {
            cursor_fields,
            after: options.after.filter(|c| !c.is_empty()),
            before: options.before.filter(|c| !c.is_empty()),
            limit,
            include_total_count: options
                .include_total_count
                .unwrap_or(defaults.include_total_count),
            total_count_limit,
            total_count_key_field,
        })
    }

    /// Check every field name (cursor fields and count key) with `accepts`.
    ///
    /// [`Paginator::paginate`](crate::Paginator::paginate) runs this with the
    /// query's [`Queryable::accepts_field`](crate::Queryable::accepts_field)
    /// before any query runs. Call it yourself when driving a
    /// [`FetchPlan`](crate::FetchPlan) directly with client-supplied fields.
    ///
    /// ```
    /// # use mik_keyset::{Config, ConfigError, CursorField, Defaults, Options, is_valid_identifier};
    /// let defaults = Defaults::new().cursor_fields(vec![CursorField::new("sort-key")]);
    /// let config = Config::resolve(&defaults, Options::new()).unwrap();
    ///
    /// assert!(config.check_fields(|_| true).is_ok());
    /// assert_eq!(
    ///     config.check_fields(is_valid_identifier),
    ///     Err(ConfigError::InvalidFieldName("sort-key".into()))
    /// );
    /// ```
    pub fn check_fields(&self, accepts: impl Fn(&str) -> bool) -> Result<(), ConfigError> {
        let names = self
            .cursor_fields
            .iter()
            .map(|f| f.field.as_str())
            .chain(self.total_count_key_field.as_deref());
        for name in names {
            if !accepts(name) {
                return Err(ConfigError::InvalidFieldName(name.to_string()));
            }
        }
        Ok(())
    }

    /// Cursor fields with their resolved directions.
    #[must_use]
    pub fn cursor_fields(&self) -> &[SortField] {
        &self.cursor_fields
    }

    /// Cursor to page forward from.
    #[must_use]
    pub fn after(&self) -> Option<&str> {
        self.after.as_deref()
    }

    /// Cursor to page backward from.
    #[must_use]
    pub fn before(&self) -> Option<&str> {
        self.before.as_deref()
    }

    /// Effective page size.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Whether the count query runs.
    #[must_use]
    pub const fn include_total_count(&self) -> bool {
        self.include_total_count
    }

    /// Count cap.
    #[must_use]
    pub const fn total_count_limit(&self) -> CountLimit {
        self.total_count_limit
    }

    /// Column selected inside the count query.
    #[must_use]
    pub fn total_count_key_field(&self) -> Option<&str> {
        self.total_count_key_field.as_deref()
    }

    /// `true` when only `before` is set, so rows are fetched in reverse.
    #[must_use]
    pub const fn is_backward(&self) -> bool {
        self.before.is_some() && self.after.is_none()
    }
}

/// Configuration errors. Raised before any query runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// No cursor fields in either the defaults or the options.
    #[error("cursor fields are required for keyset pagination")]
    MissingCursorFields,
    /// A field name is empty or not usable by the store.
    #[error("invalid field name '{0}'")]
    InvalidFieldName(String),
    /// The defaults document is not a JSON object.
    #[error("invalid JSON in pagination defaults (expected an object)")]
    InvalidJson,
    /// A known key holds a value of the wrong shape.
    #[error("invalid value for '{key}': expected {expected}")]
    InvalidKey {
        /// The offending key.
        key: String,
        /// Description of what was expected.
        expected: &'static str,
    },
    /// A key the defaults document does not know.
    #[error("unknown pagination key '{0}'")]
    UnknownKey(String),
}

impl ConfigError {
    fn invalid_key(key: &str, expected: &'static str) -> Self {
        Self::InvalidKey {
            key: key.to_string(),
            expected,
        }
    }
}
