//! Rendering of filter expressions to parameterized SQL.

use super::dialect::Dialect;
use crate::Value;
use crate::ident::assert_valid_identifier;
use crate::query::{CompoundFilter, Filter, FilterExpr, LogicalOp, Operator};

/// Build a filter expression (simple or compound).
///
/// Returns the SQL fragment, its parameters and the next placeholder index.
pub(super) fn build_filter_expr_impl<D: Dialect>(
    dialect: &D,
    expr: &FilterExpr,
    start_idx: usize,
) -> (String, Vec<Value>, usize) {
    match expr {
        FilterExpr::Simple(filter) => build_condition_impl(dialect, filter, start_idx),
        FilterExpr::Compound(compound) => build_compound_filter_impl(dialect, compound, start_idx),
    }
}

/// Build a compound filter (AND, OR, NOT).
pub(super) fn build_compound_filter_impl<D: Dialect>(
    dialect: &D,
    compound: &CompoundFilter,
    start_idx: usize,
) -> (String, Vec<Value>, usize) {
    let mut idx = start_idx;
    let mut all_params = Vec::new();
    let mut conditions = Vec::with_capacity(compound.filters.len());

    for filter_expr in &compound.filters {
        let (condition, params, new_idx) = build_filter_expr_impl(dialect, filter_expr, idx);
        conditions.push(condition);
        all_params.extend(params);
        idx = new_idx;
    }

    let sql = match compound.op {
        // empty AND is true, empty OR is false
        LogicalOp::And => join_conditions(conditions, " AND ", "1=1"),
        LogicalOp::Or => join_conditions(conditions, " OR ", "1=0"),
        LogicalOp::Not => {
            let inner = join_conditions(conditions, " AND ", "1=1");
            format!("NOT ({inner})")
        },
    };

    (sql, all_params, idx)
}

fn join_conditions(mut conditions: Vec<String>, sep: &str, empty: &str) -> String {
    match conditions.len() {
        0 => empty.to_string(),
        1 => conditions.pop().unwrap_or_default(),
        _ => format!("({})", conditions.join(sep)),
    }
}

/// Build a single filter condition.
pub(super) fn build_condition_impl<D: Dialect>(
    dialect: &D,
    filter: &Filter,
    start_idx: usize,
) -> (String, Vec<Value>, usize) {
    let field = &filter.field;
    let idx = start_idx;

    match (filter.op, &filter.value) {
        // NULL handling
        (Operator::Eq, Value::Null) => (format!("{field} IS NULL"), vec![], idx),
        (Operator::Ne, Value::Null) => (format!("{field} IS NOT NULL"), vec![], idx),

        (op, value) => {
            let sql = format!("{} {} {}", field, op.as_sql(), dialect.param(idx));
            (sql, vec![value.clone()], idx + 1)
        },
    }
}

/// Assert that every field referenced by `expr` is a valid identifier.
pub(super) fn assert_valid_filter_fields(expr: &FilterExpr) {
    match expr {
        FilterExpr::Simple(filter) => assert_valid_identifier(&filter.field, "filter field"),
        FilterExpr::Compound(compound) => {
            compound.filters.iter().for_each(assert_valid_filter_fields);
        },
    }
}
