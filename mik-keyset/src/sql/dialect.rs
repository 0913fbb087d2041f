//! SQL dialect implementations for Postgres and `SQLite`.
//!
//! Keyset predicates only use plain comparisons, so the dialects differ in
//! their parameter placeholders alone.

use std::fmt::Debug;

/// SQL dialect trait for database-specific syntax.
pub trait Dialect: Clone + Copy + Debug + PartialEq {
    /// Format a parameter placeholder (e.g., `$1` for Postgres, `?1` for `SQLite`).
    fn param(&self, idx: usize) -> String;
}

/// Postgres dialect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct Postgres;

impl Dialect for Postgres {
    #[inline]
    fn param(&self, idx: usize) -> String {
        format!("${idx}")
    }
}

/// `SQLite` dialect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct Sqlite;

impl Dialect for Sqlite {
    #[inline]
    fn param(&self, idx: usize) -> String {
        format!("?{idx}")
    }
}
