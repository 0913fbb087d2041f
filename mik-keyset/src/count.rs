//! Capped total counts.
//!
//! A full `COUNT(*)` over a large table costs as much as reading it. With a
//! cap of `K` the inner query stops after `K + 1` rows, so the count is cheap
//! and still tells the caller "at least `K`".

use tracing::debug;

use crate::config::{Config, CountLimit};
use crate::query::{Executor, Queryable};

/// A total count, possibly capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct TotalCount {
    /// Number of matching rows, at most the cap.
    pub count: u64,
    /// Whether more rows than the cap exist.
    pub cap_exceeded: bool,
}

impl TotalCount {
    /// Interpret a raw count against a cap.
    ///
    /// ```
    /// # use mik_keyset::{CountLimit, TotalCount};
    /// let total = TotalCount::from_raw(10_001, CountLimit::Capped(10_000));
    /// assert_eq!(total.count, 10_000);
    /// assert!(total.cap_exceeded);
    /// ```
    #[must_use]
    pub fn from_raw(raw: u64, limit: CountLimit) -> Self {
        match limit {
            CountLimit::Capped(cap) => Self {
                count: raw.min(cap),
                cap_exceeded: raw > cap,
            },
            CountLimit::Unbounded => Self {
                count: raw,
                cap_exceeded: false,
            },
        }
    }
}

/// Count the rows of the base query, if the configuration asks for it.
///
/// Ordering, selection and eager loads are stripped first. The key field is
/// projected when configured, then the query is wrapped so grouping and
/// `DISTINCT` still count result rows. A capped count limits the inner
/// query to `cap + 1` rows.
///
/// Returns `Ok(None)` without touching the executor when counting is off.
pub fn estimate<Q, E>(
    query: Q,
    config: &Config,
    executor: &E,
    options: &E::Options,
) -> Result<Option<TotalCount>, E::Error>
where
    Q: Queryable,
    E: Executor<Q>,
{
    if !config.include_total_count() {
        return Ok(None);
    }

    let mut query = query.strip_for_count();
    if let Some(key) = config.total_count_key_field() {
        query = query.select_key(key);
    }

    let limit = config.total_count_limit();
    if let CountLimit::Capped(cap) = limit {
        query = query.limit(cap.saturating_add(1));
    }

    let raw = executor.count(query.into_count(), options)?;
    let total = TotalCount::from_raw(raw, limit);
    debug!(
        count = total.count,
        cap_exceeded = total.cap_exceeded,
        "total count computed"
    );
    Ok(Some(total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CursorField, Defaults, Options};
    use crate::memory::{MemoryQuery, MemoryTable, row};
    use crate::query::{Operator, simple};

    fn table(n: i64) -> MemoryTable {
        MemoryTable::new((1..=n).map(|id| row([("id", id)])).collect())
    }

    fn config(options: Options) -> Config {
        let defaults = Defaults::new().cursor_fields(vec![CursorField::new("id")]);
        Config::resolve(&defaults, options).unwrap()
    }

    #[test]
    fn test_from_raw() {
        assert_eq!(
            TotalCount::from_raw(5, CountLimit::Capped(10)),
            TotalCount {
                count: 5,
                cap_exceeded: false
            }
        );
        assert_eq!(
            TotalCount::from_raw(10, CountLimit::Capped(10)),
            TotalCount {
                count: 10,
                cap_exceeded: false
            }
        );
        assert_eq!(
            TotalCount::from_raw(11, CountLimit::Capped(10)),
            TotalCount {
                count: 10,
                cap_exceeded: true
            }
        );
        assert!(!TotalCount::from_raw(u64::MAX, CountLimit::Unbounded).cap_exceeded);
    }

    #[test]
    fn test_disabled_returns_none() {
        let total = estimate(MemoryQuery::new(), &config(Options::new()), &table(3), &()).unwrap();
        assert_eq!(total, None);
    }

    #[test]
    fn test_capped_count() {
        let options = Options::new()
            .include_total_count(true)
            .total_count_limit(CountLimit::Capped(4));

        let total = estimate(MemoryQuery::new(), &config(options.clone()), &table(3), &())
            .unwrap()
            .unwrap();
        assert_eq!(total.count, 3);
        assert!(!total.cap_exceeded);

        let total = estimate(MemoryQuery::new(), &config(options), &table(100), &())
            .unwrap()
            .unwrap();
        assert_eq!(total.count, 4);
        assert!(total.cap_exceeded);
    }

    #[test]
    fn test_unbounded_count() {
        let options = Options::new()
            .include_total_count(true)
            .total_count_limit(CountLimit::Unbounded);
        let total = estimate(MemoryQuery::new(), &config(options), &table(20_000), &())
            .unwrap()
            .unwrap();
        assert_eq!(total.count, 20_000);
        assert!(!total.cap_exceeded);
    }

    #[test]
    fn test_count_ignores_ordering_and_limit_but_keeps_filters() {
        let query = MemoryQuery::new()
            .filter(simple("id", Operator::Gt, 2i64))
            .order_by(vec![crate::SortField::desc("id")])
            .limit(1);
        let options = Options::new()
            .include_total_count(true)
            .total_count_key_field("id");

        let total = estimate(query, &config(options), &table(10), &())
            .unwrap()
            .unwrap();
        assert_eq!(total.count, 8);
    }
}
