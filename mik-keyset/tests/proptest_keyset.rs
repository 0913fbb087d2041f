//! Property-based tests for cursors and paging using proptest.
//!
//! Paging runs against the in-memory binding, which evaluates the generated
//! boundary filters the way a SQL store would.

use chrono::{DateTime, Utc};
use mik_keyset::memory::{MemoryQuery, MemoryTable, Row, row};
use mik_keyset::{
    Config, CountLimit, Cursor, CursorField, Defaults, Options, Page, Paginator, Value,
    cursor_for_record,
};
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        // NaN never equals itself, so it cannot round-trip by `==`
        any::<f64>()
            .prop_filter("NaN", |f| !f.is_nan())
            .prop_map(Value::Float),
        "\\PC{0,32}".prop_map(Value::String),
        (-8_000_000_000_000i64..8_000_000_000_000, 0u32..1_000_000_000)
            .prop_filter_map("timestamp out of range", |(secs, nanos)| {
                DateTime::<Utc>::from_timestamp(secs, nanos).map(Value::Timestamp)
            }),
    ]
}

fn tuple_strategy() -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec(value_strategy(), 0..=16)
}

/// Rows with unique ids and heavily duplicated scores.
fn dataset(scores: &[i64]) -> MemoryTable {
    scores
        .iter()
        .zip(1i64..)
        .map(|(score, id)| row([("id", Value::Int(id)), ("score", Value::Int(*score))]))
        .collect()
}

/// Ids in `score DESC, id ASC` order.
fn expected_order(scores: &[i64]) -> Vec<i64> {
    let mut pairs: Vec<(i64, i64)> = scores.iter().copied().zip(1i64..).collect();
    pairs.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    pairs.into_iter().map(|(_, id)| id).collect()
}

fn paginator(limit: u32) -> Paginator {
    Paginator::new(
        Defaults::new()
            .cursor_fields(vec![CursorField::desc("score"), CursorField::asc("id")])
            .limit(limit),
    )
}

fn ids(page: &Page<Row>) -> Vec<i64> {
    page.entries
        .iter()
        .filter_map(|r| match r.get("id") {
            Some(Value::Int(id)) => Some(*id),
            _ => None,
        })
        .collect()
}

// =============================================================================
// Cursor Codec Property Tests
// =============================================================================

proptest! {
    /// Decoding an encoded tuple gives back the same tuple
    #[test]
    fn cursor_round_trips(values in tuple_strategy()) {
        let cursor = Cursor::from_values(values);
        let encoded = cursor.encode().unwrap();
        prop_assert_eq!(Cursor::decode(&encoded).unwrap(), cursor);
    }

    /// Encoding is a pure function of the tuple
    #[test]
    fn cursor_encoding_is_deterministic(values in tuple_strategy()) {
        let a = Cursor::from_values(values.clone()).encode().unwrap();
        let b = Cursor::from_values(values).encode().unwrap();
        prop_assert_eq!(a, b);
    }

    /// Encoded cursors only use URL-safe characters
    #[test]
    fn cursor_encoding_is_url_safe(values in tuple_strategy()) {
        let encoded = Cursor::from_values(values).encode().unwrap();
        prop_assert!(encoded
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    /// Arbitrary client input never panics the decoder
    #[test]
    fn cursor_decode_never_panics(input in "\\PC{0,200}") {
        let _ = Cursor::decode(&input);
    }

    /// Corrupting a byte of a valid cursor yields an error or another cursor,
    /// never a panic
    #[test]
    fn cursor_decode_survives_bit_flips(values in tuple_strategy(), pos in any::<prop::sample::Index>()) {
        let encoded = Cursor::from_values(values).encode().unwrap();
        prop_assume!(!encoded.is_empty());
        let mut bytes = encoded.into_bytes();
        let i = pos.index(bytes.len());
        bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
        let corrupted = String::from_utf8(bytes).unwrap();
        let _ = Cursor::decode(&corrupted);
    }
}

// =============================================================================
// Paging Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The first page holds the first `min(L, D)` records
    #[test]
    fn first_page_shape(scores in prop::collection::vec(0i64..5, 0..40), limit in 1u32..12) {
        let table = dataset(&scores);
        let expected = expected_order(&scores);

        let page = paginator(limit)
            .paginate(MemoryQuery::new(), Options::new(), &table, &())
            .unwrap();

        let take = expected.len().min(limit as usize);
        prop_assert_eq!(ids(&page), expected[..take].to_vec());
        prop_assert_eq!(page.metadata.before, None);

        if expected.len() > limit as usize {
            let last = page.entries.last().unwrap();
            let fields = [CursorField::desc("score"), CursorField::asc("id")];
            prop_assert_eq!(page.metadata.after, Some(cursor_for_record(last, &fields).unwrap()));
        } else {
            prop_assert_eq!(page.metadata.after, None);
        }
    }

    /// Following `after` cursors visits every record once, in order
    #[test]
    fn exhaustive_forward_paging(scores in prop::collection::vec(0i64..5, 1..40), limit in 1u32..12) {
        let table = dataset(&scores);
        let paginator = paginator(limit);

        let mut seen = Vec::new();
        let mut after: Option<String> = None;
        for _ in 0..=scores.len() {
            let options = match after.take() {
                Some(cursor) => Options::new().after(cursor),
                None => Options::new(),
            };
            let page = paginator.paginate(MemoryQuery::new(), options, &table, &()).unwrap();
            prop_assert!(page.len() <= limit as usize);
            seen.extend(ids(&page));
            after = page.metadata.after;
            if after.is_none() {
                break;
            }
        }

        prop_assert!(after.is_none(), "paging did not terminate");
        prop_assert_eq!(seen, expected_order(&scores));
    }

    /// Following `before` cursors from past the end visits every record once
    #[test]
    fn exhaustive_backward_paging(scores in prop::collection::vec(0i64..5, 1..40), limit in 1u32..12) {
        let table = dataset(&scores);
        let paginator = paginator(limit);

        // sorts after every row under `score DESC, id ASC`
        let past_end = Cursor::new().int(i64::MIN).int(i64::MAX).encode().unwrap();

        let mut seen: Vec<i64> = Vec::new();
        let mut before = Some(past_end);
        for _ in 0..=scores.len() {
            let Some(cursor) = before.take() else { break };
            let page = paginator
                .paginate(MemoryQuery::new(), Options::new().before(cursor), &table, &())
                .unwrap();
            prop_assert!(page.len() <= limit as usize);
            let mut chunk = ids(&page);
            chunk.extend(seen);
            seen = chunk;
            before = page.metadata.before;
        }

        prop_assert!(before.is_none(), "paging did not terminate");
        prop_assert_eq!(seen, expected_order(&scores));
    }

    /// A page's `before` cursor leads back to exactly the previous records
    #[test]
    fn before_cursor_returns_previous_page(scores in prop::collection::vec(0i64..5, 2..40), limit in 1u32..8) {
        let table = dataset(&scores);
        let expected = expected_order(&scores);
        let paginator = paginator(limit);

        let first = paginator.paginate(MemoryQuery::new(), Options::new(), &table, &()).unwrap();
        let Some(after) = first.metadata.after.clone() else { return Ok(()); };
        let second = paginator
            .paginate(MemoryQuery::new(), Options::new().after(after), &table, &())
            .unwrap();
        let before = second.metadata.before.clone().unwrap();

        let back = paginator
            .paginate(MemoryQuery::new(), Options::new().before(before), &table, &())
            .unwrap();
        prop_assert_eq!(ids(&back), expected[..limit as usize].to_vec());
    }

    /// The effective limit never exceeds the maximum
    #[test]
    fn limit_is_clamped(requested in 0u32..2_000, maximum in 1u32..1_000) {
        let defaults = Defaults::new()
            .cursor_fields(vec![CursorField::asc("id")])
            .maximum_limit(maximum);
        let config = Config::resolve(&defaults, Options::new().limit(requested)).unwrap();
        prop_assert_eq!(config.limit(), requested.min(maximum).max(1));
    }

    /// Capped totals report `min(D, K)` and whether `D > K`
    #[test]
    fn total_count_is_capped(size in 0usize..60, cap in 1u64..60) {
        let table = dataset(&vec![0; size]);
        let options = Options::new()
            .include_total_count(true)
            .total_count_limit(CountLimit::Capped(cap));

        let page = paginator(10).paginate(MemoryQuery::new(), options, &table, &()).unwrap();
        let size = size as u64;
        prop_assert_eq!(page.metadata.total_count, Some(size.min(cap)));
        prop_assert_eq!(page.metadata.total_count_cap_exceeded, Some(size > cap));
    }
}

// =============================================================================
// Concrete Scenario
// =============================================================================

#[test]
fn ids_one_to_five_in_pages_of_two() {
    let table: MemoryTable = (1..=5).map(|id: i64| row([("id", id)])).collect();
    let paginator = Paginator::new(
        Defaults::new()
            .cursor_fields(vec![CursorField::asc("id")])
            .limit(2),
    );
    let c = |id: i64| Cursor::new().int(id).encode().unwrap();

    let page = paginator
        .paginate(MemoryQuery::new(), Options::new(), &table, &())
        .unwrap();
    assert_eq!(ids(&page), vec![1, 2]);
    assert_eq!(page.metadata.before, None);
    assert_eq!(page.metadata.after, Some(c(2)));

    let page = paginator
        .paginate(MemoryQuery::new(), Options::new().after(c(2)), &table, &())
        .unwrap();
    assert_eq!(ids(&page), vec![3, 4]);
    assert_eq!(page.metadata.before, Some(c(3)));
    assert_eq!(page.metadata.after, Some(c(4)));

    let page = paginator
        .paginate(MemoryQuery::new(), Options::new().after(c(4)), &table, &())
        .unwrap();
    assert_eq!(ids(&page), vec![5]);
    assert_eq!(page.metadata.before, Some(c(5)));
    assert_eq!(page.metadata.after, None);
}
