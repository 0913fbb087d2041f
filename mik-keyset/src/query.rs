//! Query-side types and the storage capability traits.
//!
//! The pagination engine never builds or runs a query on its own. It talks to
//! a storage binding through three traits:
//!
//! - [`Queryable`] - a query that can take an ordering, a filter and a limit,
//!   and can be turned into a count query.
//! - [`Executor`] - runs a [`Queryable`] and its count form.
//! - [`Record`] - a fetched row with read access to named fields.
//!
//! [`SelectQuery`](crate::SelectQuery) and [`MemoryQuery`](crate::memory::MemoryQuery)
//! are the bindings that ship with this crate.

use std::collections::{BTreeMap, HashMap};

use crate::Value;

/// Comparison operators used by filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Operator {
    /// Equal: `=` (or `IS NULL` against null)
    Eq,
    /// Not equal: `!=` (or `IS NOT NULL` against null)
    Ne,
    /// Greater than: `>`
    Gt,
    /// Greater than or equal: `>=`
    Gte,
    /// Less than: `<`
    Lt,
    /// Less than or equal: `<=`
    Lte,
}

impl Operator {
    /// SQL spelling of the operator.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }
}

/// Logical operators for compound filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum LogicalOp {
    /// All conditions must match: `AND`
    And,
    /// At least one condition must match: `OR`
    Or,
    /// Negate the condition: `NOT`
    Not,
}

/// A filter expression that can be simple or compound.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum FilterExpr {
    /// A simple field comparison.
    Simple(Filter),
    /// A compound filter with logical operator.
    Compound(CompoundFilter),
}

/// A single field comparison.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct Filter {
    /// Field (column) name.
    pub field: String,
    /// Comparison operator.
    pub op: Operator,
    /// Right-hand side.
    pub value: Value,
}

impl Filter {
    /// Create a filter.
    pub fn new(field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }
}

/// A compound filter combining multiple expressions with a logical operator.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct CompoundFilter {
    /// How the children are combined.
    pub op: LogicalOp,
    /// Child expressions. `Not` holds exactly one.
    pub filters: Vec<FilterExpr>,
}

impl CompoundFilter {
    /// Create an AND compound filter.
    #[must_use]
    pub const fn and(filters: Vec<FilterExpr>) -> Self {
        Self {
            op: LogicalOp::And,
            filters,
        }
    }

    /// Create an OR compound filter.
    #[must_use]
    pub const fn or(filters: Vec<FilterExpr>) -> Self {
        Self {
            op: LogicalOp::Or,
            filters,
        }
    }

    /// Create a NOT compound filter (wraps a single filter).
    #[must_use]
    pub fn not(filter: FilterExpr) -> Self {
        Self {
            op: LogicalOp::Not,
            filters: vec![filter],
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum SortDir {
    /// Smallest first.
    #[default]
    Asc,
    /// Largest first.
    Desc,
}

impl SortDir {
    /// The opposite direction.
    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    /// SQL keyword for this direction.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Sort field with an explicit direction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct SortField {
    /// Field (column) name.
    pub field: String,
    /// Direction.
    pub dir: SortDir,
}

impl SortField {
    /// Create a new sort field.
    pub fn new(field: impl Into<String>, dir: SortDir) -> Self {
        Self {
            field: field.into(),
            dir,
        }
    }

    /// Ascending sort on `field`.
    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortDir::Asc)
    }

    /// Descending sort on `field`.
    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortDir::Desc)
    }

    /// Same field, opposite direction.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self::new(self.field.clone(), self.dir.reversed())
    }
}

impl AsRef<str> for SortField {
    fn as_ref(&self) -> &str {
        &self.field
    }
}

/// Helper function to create a simple filter expression.
pub fn simple(field: impl Into<String>, op: Operator, value: impl Into<Value>) -> FilterExpr {
    FilterExpr::Simple(Filter::new(field, op, value))
}

/// Helper function to create an AND compound filter.
#[must_use]
pub const fn and(filters: Vec<FilterExpr>) -> FilterExpr {
    FilterExpr::Compound(CompoundFilter::and(filters))
}

/// Helper function to create an OR compound filter.
#[must_use]
pub const fn or(filters: Vec<FilterExpr>) -> FilterExpr {
    FilterExpr::Compound(CompoundFilter::or(filters))
}

/// Helper function to create a NOT filter.
#[must_use]
pub fn not(filter: FilterExpr) -> FilterExpr {
    FilterExpr::Compound(CompoundFilter::not(filter))
}

/// A query that the paginator can augment.
///
/// Implementations are plain values: every method consumes the query and
/// returns the augmented one.
pub trait Queryable: Sized {
    /// The count form of this query, consumed by [`Executor::count`].
    type Count;

    /// Replace any ordering with `sorts`, applied in order.
    fn order_by(self, sorts: Vec<SortField>) -> Self;

    /// Add a filter, combined with existing filters by `AND`.
    fn and_filter(self, expr: FilterExpr) -> Self;

    /// Cap the number of returned rows.
    fn limit(self, limit: u64) -> Self;

    /// Remove ordering, selection and eager-load instructions that have no
    /// bearing on a row count. Filters, grouping and distinctness stay.
    fn strip_for_count(self) -> Self;

    /// Project only `field`. Used as the inner selection of a count.
    ///
    /// A grouped query already yields one row per group and keeps its group
    /// projection instead.
    fn select_key(self, field: &str) -> Self;

    /// Wrap this query so that counting it counts its result rows.
    fn into_count(self) -> Self::Count;

    /// Whether `field` can be used as a cursor or count key field.
    ///
    /// Checked before any query runs, so client-supplied names are reported
    /// as [`ConfigError::InvalidFieldName`](crate::ConfigError::InvalidFieldName).
    /// Accepts every name by default.
    fn accepts_field(_field: &str) -> bool {
        true
    }
}

/// Runs queries against a store.
///
/// Errors are returned unchanged to the caller of
/// [`paginate`](crate::paginate); the paginator never retries.
pub trait Executor<Q: Queryable> {
    /// Row type produced by [`fetch`](Executor::fetch).
    type Record: Record;
    /// Store error.
    type Error;
    /// Per-call execution options (timeouts, transaction handles, ...).
    type Options;

    /// Run `query`. Rows must come back in the requested order.
    fn fetch(&self, query: Q, options: &Self::Options) -> Result<Vec<Self::Record>, Self::Error>;

    /// Run a count query and return the number of rows it counts.
    fn count(&self, query: Q::Count, options: &Self::Options) -> Result<u64, Self::Error>;
}

/// Read access to a fetched row.
pub trait Record {
    /// Value of `field`, or `None` if the row has no such field.
    fn get(&self, field: &str) -> Option<Value>;
}

impl Record for BTreeMap<String, Value> {
    fn get(&self, field: &str) -> Option<Value> {
        Self::get(self, field).cloned()
    }
}

impl<S: std::hash::BuildHasher> Record for HashMap<String, Value, S> {
    fn get(&self, field: &str) -> Option<Value> {
        Self::get(self, field).cloned()
    }
}

impl<R: Record + ?Sized> Record for &R {
    fn get(&self, field: &str) -> Option<Value> {
        (**self).get(field)
    }
}
