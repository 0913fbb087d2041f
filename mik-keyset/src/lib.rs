// =============================================================================
// CRATE-LEVEL QUALITY LINTS (following Tokio/Serde standards)
// =============================================================================
#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]
#![warn(unreachable_pub)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
// =============================================================================
// CLIPPY CONFIGURATION
// =============================================================================
#![allow(clippy::doc_markdown)] // Code items in docs - extensive doc changes needed
#![allow(clippy::missing_errors_doc)] // # Errors sections - doc-heavy
#![allow(clippy::missing_panics_doc)] // # Panics sections - doc-heavy
#![allow(clippy::module_name_repetitions)] // Type names matching module - acceptable
#![allow(clippy::return_self_not_must_use)] // Builder methods return Self
#![allow(clippy::must_use_candidate)] // Builder methods - fluent API doesn't need must_use
#![allow(clippy::format_push_string)] // String building style preference
#![allow(clippy::cast_possible_truncation)] // Page sizes are u32, row counts fit in u64
#![allow(clippy::double_must_use)] // Functions returning must_use types can have their own docs

//! # mik-keyset - Keyset (cursor) pagination
//!
//! Pages through sorted record sets with opaque cursors instead of offsets:
//! no drift when rows are inserted ahead of the reader, and no large-offset
//! scans.
//!
//! A call goes through five steps:
//!
//! 1. [`Config::resolve`] merges per-call [`Options`] over integration
//!    [`Defaults`].
//! 2. [`FetchPlan::from_config`] decodes the cursor, builds the lexicographic
//!    boundary filter and the ordering, and asks for `limit + 1` rows.
//! 3. The [`Executor`] runs the augmented [`Queryable`].
//! 4. [`Page::assemble`] trims the rows and derives `before` / `after` cursors.
//! 5. [`count::estimate`] optionally runs a capped count.
//!
//! [`Paginator::paginate`] does all of it.
//!
//! ## Quick Start
//!
//! ```
//! # use mik_keyset::prelude::*;
//! # use mik_keyset::memory::{MemoryQuery, MemoryTable, row};
//! let table: MemoryTable = (1..=5).map(|id| row([("id", id)])).collect();
//! let paginator = Paginator::new(
//!     Defaults::new()
//!         .cursor_fields(vec![CursorField::asc("id")])
//!         .limit(2),
//! );
//!
//! let first = paginator
//!     .paginate(MemoryQuery::new(), Options::new(), &table, &())
//!     .unwrap();
//! assert_eq!(first.len(), 2);
//! assert!(first.metadata.before.is_none());
//!
//! let after = first.metadata.after.clone().unwrap();
//! let second = paginator
//!     .paginate(MemoryQuery::new(), Options::new().after(after), &table, &())
//!     .unwrap();
//! assert_eq!(second.entries[0].get("id"), Some(&Value::Int(3)));
//! ```
//!
//! ## SQL
//!
//! ```
//! # use mik_keyset::prelude::*;
//! let query = postgres("posts")
//!     .fields(&["id", "title", "created_at"])
//!     .filter("published", Operator::Eq, true);
//!
//! let config = Config::resolve(
//!     &Defaults::new().cursor_fields(CursorField::parse_list("-created_at,id").unwrap()),
//!     Options::new().limit(20),
//! )
//! .unwrap();
//! let result = FetchPlan::from_config(&config).unwrap().apply(query).build();
//!
//! assert!(result.sql.ends_with("ORDER BY created_at DESC, id ASC LIMIT 21"));
//! ```
//!
//! ## Cursors
//!
//! A cursor holds the sort-key values of a boundary record in a tagged binary
//! layout, wrapped in URL-safe base64. Cursors are not encrypted or signed;
//! see [`Cursor`].

pub mod count;
pub mod memory;
pub mod sql;

mod config;
mod cursor;
mod ident;
mod keyset;
mod page;
mod query;
mod value;

use tracing::debug;

pub use config::{
    Config, ConfigError, CountLimit, CursorField, DEFAULT_LIMIT, DEFAULT_MAXIMUM_LIMIT,
    DEFAULT_TOTAL_COUNT_LIMIT, Defaults, Options,
};
pub use count::TotalCount;
pub use cursor::{Cursor, CursorError, MAX_CURSOR_FIELDS, MAX_CURSOR_SIZE};
pub use ident::is_valid_identifier;
pub use keyset::{FetchPlan, KeysetCondition};
pub use page::{Page, PageMetadata};
pub use query::{
    CompoundFilter, Executor, Filter, FilterExpr, LogicalOp, Operator, Queryable, Record,
    SortDir, SortField, and, not, or, simple,
};
pub use sql::{QueryResult, SelectQuery, postgres, sqlite};
pub use value::Value;

/// Failure of a pagination call. No partial page is ever returned.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PaginateError<E> {
    /// The configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A client-supplied cursor is invalid.
    #[error(transparent)]
    Cursor(#[from] CursorError),
    /// A boundary cursor of the page cannot be encoded, because the sort-key
    /// values of a record exceed the cursor limits. The client did nothing
    /// wrong; the cursor fields need smaller values.
    #[error("cannot encode page boundary cursor: {0}")]
    Boundary(#[source] CursorError),
    /// The executor failed. Passed through unchanged.
    #[error("executor failed: {0}")]
    Executor(#[source] E),
}

impl<E> PaginateError<E> {
    /// Returns `true` if a client-supplied cursor was rejected.
    ///
    /// Map these to an "invalid pagination token" response. Boundary
    /// encoding failures are not included.
    #[must_use]
    pub const fn is_invalid_cursor(&self) -> bool {
        matches!(self, Self::Cursor(_))
    }

    /// The executor error, if that is what failed.
    pub fn into_executor_error(self) -> Option<E> {
        match self {
            Self::Executor(e) => Some(e),
            _ => None,
        }
    }
}

/// Keyset paginator bound to integration defaults.
///
/// Immutable and `Send + Sync`; build one per integration and share it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paginator {
    defaults: Defaults,
}

impl Paginator {
    /// Create a paginator with the given defaults.
    #[must_use]
    pub const fn new(defaults: Defaults) -> Self {
        Self { defaults }
    }

    /// The integration defaults.
    #[must_use]
    pub const fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    /// Fetch one page of `query`.
    ///
    /// Runs at most two executor calls: the page fetch and, when requested,
    /// the capped count. Executor errors are returned unchanged inside
    /// [`PaginateError::Executor`].
    pub fn paginate<Q, E>(
        &self,
        query: Q,
        options: Options,
        executor: &E,
        exec_options: &E::Options,
    ) -> Result<Page<E::Record>, PaginateError<E::Error>>
    where
        Q: Queryable + Clone,
        E: Executor<Q>,
    {
        let config = Config::resolve(&self.defaults, options)?;
        config.check_fields(Q::accepts_field)?;
        debug!(
            limit = config.limit(),
            after = config.after().is_some(),
            before = config.before().is_some(),
            include_total_count = config.include_total_count(),
            "resolved pagination config"
        );

        let plan = FetchPlan::from_config(&config)?;
        let count_query = config.include_total_count().then(|| query.clone());

        let rows = executor
            .fetch(plan.apply(query), exec_options)
            .map_err(PaginateError::Executor)?;
        debug!(rows = rows.len(), fetch_limit = plan.fetch_limit, "fetched rows");

        let page = Page::assemble(rows, &config).map_err(PaginateError::Boundary)?;

        let total = match count_query {
            Some(query) => count::estimate(query, &config, executor, exec_options)
                .map_err(PaginateError::Executor)?,
            None => None,
        };

        Ok(page.with_total_count(total))
    }
}

/// Fetch one page of `query` with built-in defaults.
///
/// `options` must name the cursor fields.
pub fn paginate<Q, E>(
    query: Q,
    options: Options,
    executor: &E,
    exec_options: &E::Options,
) -> Result<Page<E::Record>, PaginateError<E::Error>>
where
    Q: Queryable + Clone,
    E: Executor<Q>,
{
    Paginator::default().paginate(query, options, executor, exec_options)
}

/// Build the cursor of `record` without running a query.
///
/// Useful to start paging at a known record. Missing fields encode as null.
///
/// ```
/// # use mik_keyset::{CursorField, cursor_for_record, memory::row};
/// let record = row([("id", 42i64)]);
/// let cursor = cursor_for_record(&record, &[CursorField::asc("id")]).unwrap();
/// assert!(!cursor.is_empty());
/// ```
pub fn cursor_for_record<R, S>(record: &R, fields: &[S]) -> Result<String, CursorError>
where
    R: Record + ?Sized,
    S: AsRef<str>,
{
    Cursor::from_record(record, fields).encode()
}

/// Common imports.
pub mod prelude {
    pub use crate::{
        Config, CountLimit, Cursor, CursorError, CursorField, Defaults, Executor, FetchPlan,
        FilterExpr, Operator, Options, Page, PaginateError, Paginator, Queryable, Record,
        SortDir, SortField, Value, and, cursor_for_record, not, or, paginate, postgres, simple,
        sqlite,
    };
}


// ============================================================================
// API Contract Tests (compile-time assertions)
// ============================================================================
