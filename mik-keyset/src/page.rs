//! Page assembly: trimming fetched rows and deriving boundary cursors.

use crate::config::Config;
use crate::count::TotalCount;
use crate::cursor::{Cursor, CursorError};
use crate::query::Record;

/// Cursors and counts describing one page.
///
/// # Example
///
/// ```ignore
/// let meta = &page.metadata;
/// ok!({
///     "data": entries,
///     "page_info": {
///         "has_next": page.has_next(),
///         "has_prev": page.has_prev(),
///         "after": meta.after,
///         "before": meta.before,
///         "total": meta.total_count
///     }
/// })
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct PageMetadata {
    /// Cursor of the first entry, present when earlier records may exist.
    pub before: Option<String>,
    /// Cursor of the last entry, present when later records may exist.
    pub after: Option<String>,
    /// Effective page size.
    pub limit: u32,
    /// Total count, if requested. Capped at the configured count limit.
    pub total_count: Option<u64>,
    /// Whether the real total exceeds `total_count`, if counted.
    pub total_count_cap_exceeded: Option<bool>,
}

/// One page of records.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct Page<R> {
    /// Records of this page, in the configured order.
    pub entries: Vec<R>,
    /// Cursors and counts.
    pub metadata: PageMetadata,
}

impl<R: Record> Page<R> {
    /// Build a page from the rows fetched with a
    /// [`FetchPlan`](crate::FetchPlan) for `config`.
    ///
    /// `rows` holds up to `limit + 1` records in fetch order. The extra row
    /// only signals that another page exists and never becomes an entry.
    /// Rows fetched backward (only `before` set) are flipped back into the
    /// configured order.
    ///
    /// Fails only if a boundary cursor cannot be encoded (sort-key values
    /// beyond the cursor size limit).
    pub fn assemble(rows: Vec<R>, config: &Config) -> Result<Self, CursorError> {
        let limit = config.limit() as usize;
        let has_more = rows.len() > limit;

        let mut entries = rows;
        entries.truncate(limit);
        if config.is_backward() {
            entries.reverse();
        }

        let has_after_cursor = config.after().is_some();
        let has_before_cursor = config.before().is_some();

        let before = if has_after_cursor || (has_before_cursor && has_more) {
            entries.first()
        } else {
            None
        };
        let after = if has_before_cursor || has_more {
            entries.last()
        } else {
            None
        };

        let fields = config.cursor_fields();
        let encode = |record: &R| Cursor::from_record(record, fields).encode();

        Ok(Self {
            metadata: PageMetadata {
                before: before.map(encode).transpose()?,
                after: after.map(encode).transpose()?,
                limit: config.limit(),
                total_count: None,
                total_count_cap_exceeded: None,
            },
            entries,
        })
    }
}

impl<R> Page<R> {
    /// Attach a count produced by [`count::estimate`](crate::count::estimate).
    #[must_use]
    pub fn with_total_count(mut self, total: Option<TotalCount>) -> Self {
        self.metadata.total_count = total.map(|t| t.count);
        self.metadata.total_count_cap_exceeded = total.map(|t| t.cap_exceeded);
        self
    }

    /// Whether a next page may exist.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.metadata.after.is_some()
    }

    /// Whether a previous page may exist.
    #[must_use]
    pub const fn has_prev(&self) -> bool {
        self.metadata.before.is_some()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the page has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Split into entries and metadata.
    pub fn into_parts(self) -> (Vec<R>, PageMetadata) {
        (self.entries, self.metadata)
    }
}
