//! Keyset pagination condition generation and fetch planning.

use tracing::trace;

use crate::config::Config;
use crate::cursor::{Cursor, CursorError};
use crate::query::{
    CompoundFilter, Filter, FilterExpr, LogicalOp, Operator, Queryable, SortDir, SortField,
};
use crate::Value;

/// Keyset pagination condition.
///
/// Generates `(col1, col2) > ($1, $2)` style boundaries, expanded into plain
/// comparisons so every per-field direction is honored.
#[derive(Debug, Clone, PartialEq)]
pub struct KeysetCondition {
    /// The sort fields and their directions.
    pub sort_fields: Vec<SortField>,
    /// The cursor values for each field.
    pub cursor_values: Vec<Value>,
    /// Direction: true for "after", false for "before".
    pub forward: bool,
}

impl KeysetCondition {
    /// Condition selecting rows strictly after `cursor` in `sorts` order.
    pub fn after(sorts: &[SortField], cursor: &Cursor) -> Result<Self, CursorError> {
        Self::new(sorts, cursor, true)
    }

    /// Condition selecting rows strictly before `cursor` in `sorts` order.
    pub fn before(sorts: &[SortField], cursor: &Cursor) -> Result<Self, CursorError> {
        Self::new(sorts, cursor, false)
    }

    fn new(sorts: &[SortField], cursor: &Cursor, forward: bool) -> Result<Self, CursorError> {
        if cursor.len() != sorts.len() {
            return Err(CursorError::FieldCountMismatch {
                expected: sorts.len(),
                found: cursor.len(),
            });
        }

        Ok(Self {
            sort_fields: sorts.to_vec(),
            cursor_values: cursor.values.clone(),
            forward,
        })
    }

    /// Convert to a filter expression for the query.
    ///
    /// For a single field, generates: `field > $1` (or `<` for DESC)
    ///
    /// For multiple fields, generates proper compound OR conditions:
    /// `(a, b) > (1, 2)` becomes: `(a > 1) OR (a = 1 AND b > 2)`
    ///
    /// For 3+ fields: `(a > 1) OR (a = 1 AND b > 2) OR (a = 1 AND b = 2 AND c > 3)`
    ///
    /// An empty condition is an empty `AND`, which matches every row.
    /// See: <https://use-the-index-luke.com/no-offset>
    #[must_use]
    pub fn to_filter_expr(&self) -> FilterExpr {
        if self.sort_fields.is_empty() {
            return FilterExpr::Compound(CompoundFilter::and(Vec::new()));
        }

        let pairs: Vec<(&SortField, &Value)> =
            self.sort_fields.iter().zip(&self.cursor_values).collect();

        let mut or_conditions = Vec::with_capacity(pairs.len());
        for (i, (sort, value)) in pairs.iter().enumerate() {
            // equality on every preceding field, strict comparison on this one
            let mut and_conditions: Vec<FilterExpr> = pairs
                .iter()
                .take(i)
                .map(|(prev, prev_value)| {
                    FilterExpr::Simple(Filter::new(
                        prev.field.clone(),
                        Operator::Eq,
                        (*prev_value).clone(),
                    ))
                })
                .collect();
            and_conditions.push(FilterExpr::Simple(Filter::new(
                sort.field.clone(),
                self.operator(sort.dir),
                (*value).clone(),
            )));

            or_conditions.push(collapse(LogicalOp::And, and_conditions));
        }

        collapse(LogicalOp::Or, or_conditions)
    }

    const fn operator(&self, dir: SortDir) -> Operator {
        match (self.forward, dir) {
            (true, SortDir::Asc) | (false, SortDir::Desc) => Operator::Gt,
            (true, SortDir::Desc) | (false, SortDir::Asc) => Operator::Lt,
        }
    }
}

/// A single expression stands for itself; more become a compound.
fn collapse(op: LogicalOp, mut filters: Vec<FilterExpr>) -> FilterExpr {
    if filters.len() == 1
        && let Some(only) = filters.pop()
    {
        return only;
    }
    FilterExpr::Compound(CompoundFilter { op, filters })
}

/// How to fetch one page: ordering, boundary filter and row limit.
///
/// `fetch_limit` is one more than the page size; the extra row tells the
/// page assembler that another page exists without a second query.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct FetchPlan {
    /// Ordering to apply, replacing any on the base query.
    pub order: Vec<SortField>,
    /// Boundary filter, if a cursor was supplied.
    pub filter: Option<FilterExpr>,
    /// Rows to fetch.
    pub fetch_limit: u64,
}

impl FetchPlan {
    /// Plan the fetch for a resolved configuration.
    ///
    /// | `after` | `before` | ordering  | filter                  |
    /// |---------|----------|-----------|-------------------------|
    /// | -       | -        | forward   | none                    |
    /// | set     | -        | forward   | after boundary          |
    /// | -       | set      | reversed  | before boundary         |
    /// | set     | set      | forward   | both boundaries, `AND`  |
    ///
    /// Fails if a cursor does not decode or does not carry one value per
    /// cursor field.
    pub fn from_config(config: &Config) -> Result<Self, CursorError> {
        let fields = config.cursor_fields();

        let after = config
            .after()
            .map(|encoded| {
                let cursor = Cursor::decode_for(encoded, fields.len())?;
                KeysetCondition::after(fields, &cursor).map(|c| c.to_filter_expr())
            })
            .transpose()?;
        let before = config
            .before()
            .map(|encoded| {
                let cursor = Cursor::decode_for(encoded, fields.len())?;
                KeysetCondition::before(fields, &cursor).map(|c| c.to_filter_expr())
            })
            .transpose()?;

        let filter = match (after, before) {
            (Some(after), Some(before)) => Some(FilterExpr::Compound(CompoundFilter::and(vec![
                after, before,
            ]))),
            (after, before) => after.or(before),
        };

        let order = if config.is_backward() {
            fields.iter().map(SortField::reversed).collect()
        } else {
            fields.to_vec()
        };

        let plan = Self {
            order,
            filter,
            fetch_limit: u64::from(config.limit()) + 1,
        };
        trace!(?plan, "fetch plan");
        Ok(plan)
    }

    /// Attach ordering, filter and limit to `query`.
    pub fn apply<Q: Queryable>(&self, query: Q) -> Q {
        let query = query.order_by(self.order.clone());
        let query = match &self.filter {
            Some(filter) => query.and_filter(filter.clone()),
            None => query,
        };
        query.limit(self.fetch_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CursorField, Defaults, Options};
    use crate::memory::MemoryQuery;

    fn simple_filter(expr: &FilterExpr) -> &Filter {
        match expr {
            FilterExpr::Simple(f) => f,
            FilterExpr::Compound(_) => panic!("Expected simple filter, got {expr:?}"),
        }
    }

    fn compound(expr: &FilterExpr) -> &CompoundFilter {
        match expr {
            FilterExpr::Compound(c) => c,
            FilterExpr::Simple(_) => panic!("Expected compound filter, got {expr:?}"),
        }
    }

    #[test]
    fn test_keyset_condition_asc() {
        let sorts = vec![SortField::asc("id")];
        let cursor = Cursor::new().int(100);

        let expr = KeysetCondition::after(&sorts, &cursor)
            .unwrap()
            .to_filter_expr();

        let f = simple_filter(&expr);
        assert_eq!(f.field, "id");
        assert_eq!(f.op, Operator::Gt);
        assert_eq!(f.value, Value::Int(100));
    }

    #[test]
    fn test_keyset_condition_desc() {
        let sorts = vec![SortField::desc("created_at")];
        let cursor = Cursor::new().string("2024-01-01");

        let expr = KeysetCondition::after(&sorts, &cursor)
            .unwrap()
            .to_filter_expr();
        assert_eq!(simple_filter(&expr).op, Operator::Lt);

        let expr = KeysetCondition::before(&sorts, &cursor)
            .unwrap()
            .to_filter_expr();
        assert_eq!(simple_filter(&expr).op, Operator::Gt);
    }

    #[test]
    fn test_keyset_condition_before() {
        let sorts = vec![SortField::asc("id")];
        let cursor = Cursor::new().int(100);

        let expr = KeysetCondition::before(&sorts, &cursor)
            .unwrap()
            .to_filter_expr();
        assert_eq!(simple_filter(&expr).op, Operator::Lt);
    }

    #[test]
    fn test_keyset_condition_multi_field_asc_asc() {
        // (created_at > '2024-01-01') OR (created_at = '2024-01-01' AND id > 100)
        let sorts = vec![SortField::asc("created_at"), SortField::asc("id")];
        let cursor = Cursor::new().string("2024-01-01").int(100);

        let expr = KeysetCondition::after(&sorts, &cursor)
            .unwrap()
            .to_filter_expr();

        let or = compound(&expr);
        assert_eq!(or.op, LogicalOp::Or);
        assert_eq!(or.filters.len(), 2);

        let first = simple_filter(&or.filters[0]);
        assert_eq!(first.field, "created_at");
        assert_eq!(first.op, Operator::Gt);

        let second = compound(&or.filters[1]);
        assert_eq!(second.op, LogicalOp::And);
        assert_eq!(
            second.filters,
            vec![
                FilterExpr::Simple(Filter::new("created_at", Operator::Eq, "2024-01-01")),
                FilterExpr::Simple(Filter::new("id", Operator::Gt, 100i64)),
            ]
        );
    }

    #[test]
    fn test_keyset_condition_multi_field_desc_asc() {
        // ORDER BY created_at DESC, id ASC with cursor after
        let sorts = vec![SortField::desc("created_at"), SortField::asc("id")];
        let cursor = Cursor::new().string("2024-01-01").int(100);

        let expr = KeysetCondition::after(&sorts, &cursor)
            .unwrap()
            .to_filter_expr();
        let or = compound(&expr);

        assert_eq!(simple_filter(&or.filters[0]).op, Operator::Lt);
        let tie_break = compound(&or.filters[1]);
        assert_eq!(simple_filter(&tie_break.filters[1]).op, Operator::Gt);
    }

    #[test]
    fn test_keyset_condition_three_fields() {
        // (a > 1) OR (a = 1 AND b > 2) OR (a = 1 AND b = 2 AND c > 3)
        let sorts = vec![
            SortField::asc("a"),
            SortField::asc("b"),
            SortField::asc("c"),
        ];
        let cursor = Cursor::new().int(1).int(2).int(3);

        let expr = KeysetCondition::after(&sorts, &cursor)
            .unwrap()
            .to_filter_expr();
        let or = compound(&expr);
        assert_eq!(or.filters.len(), 3);

        assert_eq!(simple_filter(&or.filters[0]).field, "a");
        assert_eq!(compound(&or.filters[1]).filters.len(), 2);

        let last = compound(&or.filters[2]);
        assert_eq!(last.filters.len(), 3);
        let ops: Vec<Operator> = last.filters.iter().map(|f| simple_filter(f).op).collect();
        assert_eq!(ops, vec![Operator::Eq, Operator::Eq, Operator::Gt]);
    }

    #[test]
    fn test_keyset_with_wrong_arity() {
        let sorts = vec![SortField::asc("created_at"), SortField::asc("id")];
        let cursor = Cursor::new().int(100);

        assert_eq!(
            KeysetCondition::after(&sorts, &cursor),
            Err(CursorError::FieldCountMismatch {
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn test_keyset_with_empty_sorts_matches_everything() {
        let condition = KeysetCondition::after(&[], &Cursor::new()).unwrap();
        assert_eq!(
            condition.to_filter_expr(),
            FilterExpr::Compound(CompoundFilter::and(vec![]))
        );
    }

    fn config(options: Options) -> Config {
        let defaults = Defaults::new()
            .cursor_fields(vec![CursorField::desc("created_at"), CursorField::asc("id")])
            .limit(10);
        Config::resolve(&defaults, options).unwrap()
    }

    fn token(created_at: i64, id: i64) -> String {
        Cursor::new().int(created_at).int(id).encode().unwrap()
    }

    #[test]
    fn test_plan_first_page() {
        let plan = FetchPlan::from_config(&config(Options::new())).unwrap();
        assert_eq!(
            plan.order,
            vec![SortField::desc("created_at"), SortField::asc("id")]
        );
        assert_eq!(plan.filter, None);
        assert_eq!(plan.fetch_limit, 11);
    }

    #[test]
    fn test_plan_after_keeps_order() {
        let plan = FetchPlan::from_config(&config(Options::new().after(token(5, 1)))).unwrap();
        assert_eq!(plan.order[0], SortField::desc("created_at"));

        let expected = KeysetCondition::after(
            &[SortField::desc("created_at"), SortField::asc("id")],
            &Cursor::new().int(5).int(1),
        )
        .unwrap()
        .to_filter_expr();
        assert_eq!(plan.filter, Some(expected));
    }

    #[test]
    fn test_plan_before_reverses_order() {
        let plan = FetchPlan::from_config(&config(Options::new().before(token(5, 1)))).unwrap();
        assert_eq!(
            plan.order,
            vec![SortField::asc("created_at"), SortField::desc("id")]
        );

        let or = compound(plan.filter.as_ref().unwrap());
        // created_at DESC, before -> created_at > 5
        assert_eq!(simple_filter(&or.filters[0]).op, Operator::Gt);
    }

    #[test]
    fn test_plan_both_cursors_is_a_window() {
        let options = Options::new().after(token(9, 1)).before(token(3, 1));
        let plan = FetchPlan::from_config(&config(options)).unwrap();

        assert_eq!(plan.order[0], SortField::desc("created_at"));
        let and = compound(plan.filter.as_ref().unwrap());
        assert_eq!(and.op, LogicalOp::And);
        assert_eq!(and.filters.len(), 2);
    }

    #[test]
    fn test_plan_rejects_bad_cursors() {
        let err = FetchPlan::from_config(&config(Options::new().after("!!"))).unwrap_err();
        assert_eq!(err, CursorError::InvalidBase64);

        let short = Cursor::new().int(1).encode().unwrap();
        let err = FetchPlan::from_config(&config(Options::new().before(short))).unwrap_err();
        assert!(matches!(err, CursorError::FieldCountMismatch { .. }));
    }

    #[test]
    fn test_plan_apply_sets_query_parts() {
        let plan = FetchPlan::from_config(&config(Options::new().after(token(5, 1)))).unwrap();
        let query = plan.apply(MemoryQuery::new().order_by(vec![SortField::asc("name")]));

        assert_eq!(query.ordering(), plan.order.as_slice());
        assert_eq!(query.filters().len(), 1);
        assert_eq!(query.row_limit(), Some(11));
    }
}
