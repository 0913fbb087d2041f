//! Identifier validation for field and table names.
//!
//! Cursor fields end up in `ORDER BY` and `WHERE` clauses, and they may come
//! from a client-supplied sort string, so every name is checked before use.

/// Maximum length of one identifier segment (`PostgreSQL` limit is 63).
const MAX_SEGMENT_LENGTH: usize = 63;

/// Maximum number of dot-separated segments (`schema.table.column`).
const MAX_SEGMENTS: usize = 3;

/// Validate a field or table name.
///
/// Accepts plain identifiers (`created_at`) and dot-qualified ones
/// (`posts.created_at`). Every segment starts with an ASCII letter or an
/// underscore, continues with ASCII alphanumerics or underscores, and is at
/// most 63 characters long.
///
/// # Examples
///
/// ```
/// use mik_keyset::is_valid_identifier;
///
/// assert!(is_valid_identifier("created_at"));
/// assert!(is_valid_identifier("posts.id"));
///
/// assert!(!is_valid_identifier(""));
/// assert!(!is_valid_identifier("1st"));
/// assert!(!is_valid_identifier("id; DROP TABLE posts"));
/// assert!(!is_valid_identifier("posts."));
/// ```
#[must_use]
pub fn is_valid_identifier(s: &str) -> bool {
    let mut segments = 0;
    for segment in s.split('.') {
        segments += 1;
        if segments > MAX_SEGMENTS || !is_valid_segment(segment) {
            return false;
        }
    }
    true
}

fn is_valid_segment(segment: &str) -> bool {
    if segment.is_empty() || segment.len() > MAX_SEGMENT_LENGTH {
        return false;
    }

    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {},
        _ => return false,
    }

    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Assert that a name hard-coded by the integrator is a valid identifier.
///
/// # Panics
///
/// Panics with a descriptive message if the name is invalid. Meant for names
/// written in code (table names in a query builder), never for client input;
/// client-controlled names go through [`Config::resolve`](crate::Config::resolve),
/// which reports a [`ConfigError`](crate::ConfigError) instead.
pub(crate) fn assert_valid_identifier(s: &str, context: &str) {
    assert!(
        is_valid_identifier(s),
        "Invalid {context} name '{s}': segments must start with letter/underscore, \
             contain only ASCII alphanumeric/underscore, and be 1-63 chars"
    );
}
