//! SELECT query builder implementing [`Queryable`].

use super::dialect::{Dialect, Postgres, Sqlite};
use super::filter::{assert_valid_filter_fields, build_filter_expr_impl};
use crate::Value;
use crate::ident::{assert_valid_identifier, is_valid_identifier};
use crate::query::{Filter, FilterExpr, Operator, Queryable, SortDir, SortField};

/// Rendered SQL with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct QueryResult {
    /// SQL text with dialect placeholders.
    pub sql: String,
    /// Parameter values, in placeholder order.
    pub params: Vec<Value>,
}

/// Build a Postgres SELECT on `table`.
///
/// # Panics
///
/// Panics if the table name is not a valid SQL identifier.
pub fn postgres(table: impl Into<String>) -> SelectQuery<Postgres> {
    SelectQuery::new(Postgres, table)
}

/// Build a `SQLite` SELECT on `table`.
///
/// # Panics
///
/// Panics if the table name is not a valid SQL identifier.
pub fn sqlite(table: impl Into<String>) -> SelectQuery<Sqlite> {
    SelectQuery::new(Sqlite, table)
}

/// SQL SELECT builder with dialect support.
///
/// ```
/// # use mik_keyset::prelude::*;
/// let result = postgres("posts")
///     .fields(&["id", "title"])
///     .filter("published", Operator::Eq, true)
///     .sort("id", SortDir::Asc)
///     .build();
///
/// assert_eq!(
///     result.sql,
///     "SELECT id, title FROM posts WHERE published = $1 ORDER BY id ASC"
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
#[must_use = "queries do nothing until built or passed to an executor"]
pub struct SelectQuery<D: Dialect> {
    dialect: D,
    table: String,
    fields: Vec<String>,
    distinct: bool,
    filters: Vec<FilterExpr>,
    group_by: Vec<String>,
    preloads: Vec<String>,
    sorts: Vec<SortField>,
    limit: Option<u64>,
}

impl<D: Dialect> SelectQuery<D> {
    /// Create a new query for the given table.
    ///
    /// # Panics
    ///
    /// Panics if the table name is not a valid SQL identifier.
    pub fn new(dialect: D, table: impl Into<String>) -> Self {
        let table = table.into();
        assert_valid_identifier(&table, "table");
        Self {
            dialect,
            table,
            fields: Vec::new(),
            distinct: false,
            filters: Vec::new(),
            group_by: Vec::new(),
            preloads: Vec::new(),
            sorts: Vec::new(),
            limit: None,
        }
    }

    /// Set the fields to SELECT.
    ///
    /// # Panics
    ///
    /// Panics if any field name is not a valid SQL identifier.
    pub fn fields(mut self, fields: &[&str]) -> Self {
        for field in fields {
            assert_valid_identifier(field, "field");
        }
        self.fields = fields.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Return distinct rows only.
    pub const fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Add a filter condition.
    ///
    /// # Panics
    ///
    /// Panics if the field name is not a valid SQL identifier.
    pub fn filter(mut self, field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        let field = field.into();
        assert_valid_identifier(&field, "filter field");
        self.filters
            .push(FilterExpr::Simple(Filter::new(field, op, value)));
        self
    }

    /// Add a filter expression, combined with the others by `AND`.
    ///
    /// # Panics
    ///
    /// Panics if a referenced field name is not a valid SQL identifier.
    pub fn filter_expr(mut self, expr: FilterExpr) -> Self {
        assert_valid_filter_fields(&expr);
        self.filters.push(expr);
        self
    }

    /// Add GROUP BY fields.
    ///
    /// # Panics
    ///
    /// Panics if any field name is not a valid SQL identifier.
    pub fn group_by(mut self, fields: &[&str]) -> Self {
        for field in fields {
            assert_valid_identifier(field, "group by field");
        }
        self.group_by = fields.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Ask the executor to eager-load an association with the rows.
    ///
    /// Preloads are not rendered into SQL; executors read them with
    /// [`preloads`](Self::preloads). They are dropped for counts.
    pub fn preload(mut self, association: impl Into<String>) -> Self {
        self.preloads.push(association.into());
        self
    }

    /// Add a sort field.
    ///
    /// # Panics
    ///
    /// Panics if the field name is not a valid SQL identifier.
    pub fn sort(mut self, field: impl Into<String>, dir: SortDir) -> Self {
        let field = field.into();
        assert_valid_identifier(&field, "sort field");
        self.sorts.push(SortField::new(field, dir));
        self
    }

    /// Table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Eager-load hints.
    #[must_use]
    pub fn preloads(&self) -> &[String] {
        &self.preloads
    }

    /// Current ordering.
    #[must_use]
    pub fn sorts(&self) -> &[SortField] {
        &self.sorts
    }

    /// Build the SQL query and parameters.
    pub fn build(&self) -> QueryResult {
        let (sql, params, _) = self.build_from(1);
        QueryResult { sql, params }
    }

    fn build_from(&self, start_idx: usize) -> (String, Vec<Value>, usize) {
        let mut params = Vec::new();
        let mut param_idx = start_idx;

        let select_str = if self.fields.is_empty() {
            "*".to_string()
        } else {
            self.fields.join(", ")
        };
        let distinct = if self.distinct { "DISTINCT " } else { "" };
        let mut sql = format!("SELECT {distinct}{select_str} FROM {}", self.table);

        if !self.filters.is_empty() {
            let mut conditions = Vec::with_capacity(self.filters.len());
            for expr in &self.filters {
                let (condition, new_params, new_idx) =
                    build_filter_expr_impl(&self.dialect, expr, param_idx);
                conditions.push(condition);
                params.extend(new_params);
                param_idx = new_idx;
            }
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        if !self.group_by.is_empty() {
            sql.push_str(&format!(" GROUP BY {}", self.group_by.join(", ")));
        }

        if !self.sorts.is_empty() {
            let sort_parts: Vec<String> = self
                .sorts
                .iter()
                .map(|s| format!("{} {}", s.field, s.dir.as_sql()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&sort_parts.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        (sql, params, param_idx)
    }
}

impl<D: Dialect> Queryable for SelectQuery<D> {
    type Count = CountQuery<D>;

    fn order_by(mut self, sorts: Vec<SortField>) -> Self {
        for sort in &sorts {
            assert_valid_identifier(&sort.field, "sort field");
        }
        self.sorts = sorts;
        self
    }

    fn and_filter(self, expr: FilterExpr) -> Self {
        self.filter_expr(expr)
    }

    fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    fn strip_for_count(mut self) -> Self {
        self.sorts.clear();
        self.preloads.clear();
        // a grouped query still has to select its groups
        self.fields.clone_from(&self.group_by);
        self
    }

    fn select_key(mut self, field: &str) -> Self {
        assert_valid_identifier(field, "count key field");
        // grouped rows are already one per group; only group columns may be selected
        if self.group_by.is_empty() {
            self.fields = vec![field.to_string()];
        }
        self
    }

    fn into_count(self) -> CountQuery<D> {
        CountQuery { inner: self }
    }

    fn accepts_field(field: &str) -> bool {
        is_valid_identifier(field)
    }
}

/// Counts the rows of a wrapped [`SelectQuery`].
///
/// Renders `SELECT COUNT(*) FROM (<inner>) AS keyset_count`, so `DISTINCT`,
/// `GROUP BY` and `LIMIT` of the inner query all apply before counting.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "queries do nothing until built or passed to an executor"]
pub struct CountQuery<D: Dialect> {
    inner: SelectQuery<D>,
}

impl<D: Dialect> CountQuery<D> {
    /// The wrapped query.
    pub const fn inner(&self) -> &SelectQuery<D> {
        &self.inner
    }

    /// Build the SQL query and parameters.
    pub fn build(&self) -> QueryResult {
        let (inner, params, _) = self.inner.build_from(1);
        QueryResult {
            sql: format!("SELECT COUNT(*) FROM ({inner}) AS keyset_count"),
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, CursorField, Defaults, Options};
    use crate::cursor::Cursor;
    use crate::keyset::FetchPlan;

    #[test]
    fn test_plain_select() {
        let result = sqlite("users").build();
        assert_eq!(result.sql, "SELECT * FROM users");
        assert!(result.params.is_empty());
    }

    #[test]
    fn test_select_all_parts() {
        let result = postgres("posts")
            .fields(&["author_id"])
            .distinct()
            .filter("published", Operator::Eq, true)
            .filter("deleted_at", Operator::Eq, Value::Null)
            .group_by(&["author_id"])
            .sort("author_id", SortDir::Desc)
            .limit(10)
            .build();

        insta::assert_snapshot!(
            result.sql,
            @"SELECT DISTINCT author_id FROM posts WHERE published = $1 AND deleted_at IS NULL GROUP BY author_id ORDER BY author_id DESC LIMIT 10"
        );
        assert_eq!(result.params, vec![Value::Bool(true)]);
    }

    #[test]
    fn test_keyset_page_query() {
        let defaults = Defaults::new()
            .cursor_fields(vec![CursorField::desc("created_at"), CursorField::asc("id")])
            .limit(20);
        let after = Cursor::new().int(5).int(1).encode().unwrap();
        let config = Config::resolve(&defaults, Options::new().after(after)).unwrap();
        let plan = FetchPlan::from_config(&config).unwrap();

        let query = postgres("posts")
            .fields(&["id", "title", "created_at"])
            .filter("published", Operator::Eq, true)
            .sort("title", SortDir::Asc);
        let result = plan.apply(query).build();

        insta::assert_snapshot!(
            result.sql,
            @"SELECT id, title, created_at FROM posts WHERE published = $1 AND (created_at < $2 OR (created_at = $3 AND id > $4)) ORDER BY created_at DESC, id ASC LIMIT 21"
        );
        assert_eq!(
            result.params,
            vec![
                Value::Bool(true),
                Value::Int(5),
                Value::Int(5),
                Value::Int(1)
            ]
        );
    }

    #[test]
    fn test_count_query_strips_and_wraps() {
        let query = sqlite("posts")
            .fields(&["id", "title"])
            .filter("published", Operator::Eq, true)
            .sort("id", SortDir::Asc)
            .preload("comments");
        assert_eq!(query.preloads(), ["comments".to_string()]);

        let count = query.strip_for_count().limit(101).into_count();
        assert!(count.inner().preloads().is_empty());
        insta::assert_snapshot!(
            count.build().sql,
            @"SELECT COUNT(*) FROM (SELECT * FROM posts WHERE published = ?1 LIMIT 101) AS keyset_count"
        );
    }

    #[test]
    fn test_count_query_with_key_field() {
        let count = postgres("posts")
            .distinct()
            .strip_for_count()
            .select_key("author_id")
            .into_count();
        assert_eq!(
            count.build().sql,
            "SELECT COUNT(*) FROM (SELECT DISTINCT author_id FROM posts) AS keyset_count"
        );
    }

    #[test]
    fn test_count_query_keeps_groups() {
        let count = postgres("posts")
            .fields(&["author_id", "title"])
            .group_by(&["author_id"])
            .strip_for_count()
            .into_count();
        assert_eq!(
            count.build().sql,
            "SELECT COUNT(*) FROM (SELECT author_id FROM posts GROUP BY author_id) AS keyset_count"
        );
    }

    #[test]
    fn test_count_query_key_keeps_groups() {
        let count = postgres("posts")
            .fields(&["author_id", "title"])
            .group_by(&["author_id"])
            .strip_for_count()
            .select_key("id")
            .into_count();
        assert_eq!(
            count.build().sql,
            "SELECT COUNT(*) FROM (SELECT author_id FROM posts GROUP BY author_id) AS keyset_count"
        );
    }

    #[test]
    fn test_order_by_replaces_sorts() {
        let query = sqlite("t")
            .sort("a", SortDir::Asc)
            .order_by(vec![SortField::desc("b")]);
        assert_eq!(query.sorts(), [SortField::desc("b")]);
        assert_eq!(query.table(), "t");
    }

    #[test]
    #[should_panic(expected = "Invalid table name")]
    fn test_invalid_table_panics() {
        let _ = postgres("users; DROP TABLE users");
    }

    #[test]
    #[should_panic(expected = "Invalid sort field name")]
    fn test_invalid_order_by_panics() {
        let _ = sqlite("t").order_by(vec![SortField::asc("a b")]);
    }
}
