//! In-memory storage binding.
//!
//! [`MemoryTable`] holds rows as ordered maps and runs [`MemoryQuery`] with the
//! same semantics a SQL database would use: comparisons against null are
//! unknown (never match), `= NULL` filters test for null, and nulls sort last
//! in ascending order. Handy for paginating in-process collections and for
//! testing integrations without a database.
//!
//! ```
//! use mik_keyset::memory::{MemoryQuery, MemoryTable, row};
//! use mik_keyset::{CursorField, Options, paginate};
//!
//! let table: MemoryTable = (1..=5).map(|id| row([("id", id)])).collect();
//! let options = Options::new()
//!     .cursor_fields(vec![CursorField::new("id")])
//!     .limit(2);
//!
//! let page = paginate(MemoryQuery::new(), options, &table, &()).unwrap();
//! assert_eq!(page.len(), 2);
//! assert!(page.has_next());
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::convert::Infallible;

use crate::Value;
use crate::query::{
    CompoundFilter, Executor, Filter, FilterExpr, LogicalOp, Operator, Queryable, SortDir,
    SortField,
};

/// A row: field name to value.
pub type Row = BTreeMap<String, Value>;

/// Build a row from `(field, value)` pairs.
///
/// ```
/// # use mik_keyset::{Value, memory::row};
/// let r = row([("id", Value::Int(1)), ("name", Value::from("Ann"))]);
/// assert_eq!(r.len(), 2);
/// ```
pub fn row<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Row
where
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// An in-memory table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryTable {
    rows: Vec<Row>,
}

impl MemoryTable {
    /// Create a table from rows.
    #[must_use]
    pub const fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// Append a row.
    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    /// All rows, in insertion order.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn run(&self, query: &MemoryQuery) -> Vec<Row> {
        let mut matched: Vec<&Row> = self
            .rows
            .iter()
            .filter(|row| query.filters.iter().all(|f| matches(row, f)))
            .collect();

        // stable, so rows with equal keys keep insertion order
        matched.sort_by(|a, b| compare_rows(a, b, &query.order));

        let limit = query
            .limit
            .map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));

        matched
            .into_iter()
            .take(limit)
            .map(|row| match &query.select {
                Some(fields) => fields
                    .iter()
                    .filter_map(|f| row.get(f).map(|v| (f.clone(), v.clone())))
                    .collect(),
                None => row.clone(),
            })
            .collect()
    }
}

impl FromIterator<Row> for MemoryTable {
    fn from_iter<I: IntoIterator<Item = Row>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// A query against a [`MemoryTable`].
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "queries do nothing until passed to an executor"]
pub struct MemoryQuery {
    filters: Vec<FilterExpr>,
    order: Vec<SortField>,
    limit: Option<u64>,
    select: Option<Vec<String>>,
}

impl MemoryQuery {
    /// A query matching every row, unordered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter, combined with the others by `AND`.
    pub fn filter(mut self, expr: FilterExpr) -> Self {
        self.filters.push(expr);
        self
    }

    /// Return only these fields.
    pub fn select(mut self, fields: &[&str]) -> Self {
        self.select = Some(fields.iter().map(|f| (*f).to_string()).collect());
        self
    }

    /// Current filters.
    #[must_use]
    pub fn filters(&self) -> &[FilterExpr] {
        &self.filters
    }

    /// Current ordering.
    #[must_use]
    pub fn ordering(&self) -> &[SortField] {
        &self.order
    }

    /// Current row limit.
    #[must_use]
    pub const fn row_limit(&self) -> Option<u64> {
        self.limit
    }

    /// Current projection, if any.
    #[must_use]
    pub fn selection(&self) -> Option<&[String]> {
        self.select.as_deref()
    }
}

impl Queryable for MemoryQuery {
    type Count = MemoryCount;

    fn order_by(mut self, sorts: Vec<SortField>) -> Self {
        self.order = sorts;
        self
    }

    fn and_filter(self, expr: FilterExpr) -> Self {
        self.filter(expr)
    }

    fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    fn strip_for_count(mut self) -> Self {
        self.order.clear();
        self.select = None;
        self
    }

    fn select_key(mut self, field: &str) -> Self {
        self.select = Some(vec![field.to_string()]);
        self
    }

    fn into_count(self) -> MemoryCount {
        MemoryCount(self)
    }
}

/// Count form of a [`MemoryQuery`]: counts the rows the query returns.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryCount(MemoryQuery);

impl Executor<MemoryQuery> for MemoryTable {
    type Record = Row;
    type Error = Infallible;
    type Options = ();

    fn fetch(&self, query: MemoryQuery, _options: &()) -> Result<Vec<Row>, Infallible> {
        Ok(self.run(&query))
    }

    fn count(&self, query: MemoryCount, _options: &()) -> Result<u64, Infallible> {
        Ok(self.run(&query.0).len() as u64)
    }
}

/// Whether `row` satisfies `expr`. Unknown (null) results do not match.
#[must_use]
pub fn matches(row: &Row, expr: &FilterExpr) -> bool {
    eval(row, expr) == Some(true)
}

/// Three-valued evaluation; `None` is SQL's `UNKNOWN`.
fn eval(row: &Row, expr: &FilterExpr) -> Option<bool> {
    match expr {
        FilterExpr::Simple(filter) => eval_simple(row, filter),
        FilterExpr::Compound(compound) => eval_compound(row, compound),
    }
}

fn eval_simple(row: &Row, filter: &Filter) -> Option<bool> {
    let lhs = row.get(&filter.field).unwrap_or(&Value::Null);
    let rhs = &filter.value;

    match (filter.op, rhs) {
        (Operator::Eq, Value::Null) => return Some(lhs.is_null()),
        (Operator::Ne, Value::Null) => return Some(!lhs.is_null()),
        _ => {},
    }

    let ord = lhs.compare(rhs)?;
    Some(match filter.op {
        Operator::Eq => ord == Ordering::Equal,
        Operator::Ne => ord != Ordering::Equal,
        Operator::Gt => ord == Ordering::Greater,
        Operator::Gte => ord != Ordering::Less,
        Operator::Lt => ord == Ordering::Less,
        Operator::Lte => ord != Ordering::Greater,
    })
}

fn eval_compound(row: &Row, compound: &CompoundFilter) -> Option<bool> {
    let mut results = compound.filters.iter().map(|f| eval(row, f));
    match compound.op {
        LogicalOp::And => results.fold(Some(true), |acc, r| match (acc, r) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        }),
        LogicalOp::Or => results.fold(Some(false), |acc, r| match (acc, r) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        }),
        // holds a single child
        LogicalOp::Not => results
            .try_fold(true, |acc, r| r.map(|b| acc && b))
            .map(|b| !b),
    }
}

fn compare_rows(a: &Row, b: &Row, order: &[SortField]) -> Ordering {
    order
        .iter()
        .map(|sort| {
            let ord = sort_key_cmp(
                a.get(&sort.field).unwrap_or(&Value::Null),
                b.get(&sort.field).unwrap_or(&Value::Null),
            );
            match sort.dir {
                SortDir::Asc => ord,
                SortDir::Desc => ord.reverse(),
            }
        })
        .find(|ord| ord.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Total order for sorting: nulls after everything, mismatched types by kind.
fn sort_key_cmp(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a
            .compare(b)
            .unwrap_or_else(|| kind_rank(a).cmp(&kind_rank(b))),
    }
}

const fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Float(_) => 2,
        Value::String(_) => 3,
        Value::Timestamp(_) => 4,
    }
}
