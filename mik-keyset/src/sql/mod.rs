//! SQL storage binding.
//!
//! [`SelectQuery`] renders parameterized SQL for Postgres and `SQLite` and
//! implements [`Queryable`](crate::Queryable), so any executor that can run
//! a [`QueryResult`] can serve pages. Running the SQL is left to the
//! integration; the crate ships no database driver.

mod dialect;
mod filter;
mod select;

pub use dialect::{Dialect, Postgres, Sqlite};
pub use select::{CountQuery, QueryResult, SelectQuery, postgres, sqlite};
