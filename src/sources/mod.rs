//! Row sources that feed templated URLs into a sitemap.
//!
//! The relational store behind a sitemap is an external collaborator; the
//! generator only needs an ordered, pageable sequence of rows with named
//! fields. Every source implements [`RowSource`]:
//!
//! 1. **Counting**: `row_count()` tells the builder how many pages to walk
//! 2. **Paging**: `fetch_page(offset, limit)` returns one window of rows,
//!    in the same stable order on every call
//!
//! # Provided Sources
//!
//! | Source | Module | Backing |
//! |--------|--------|---------|
//! | [`VecRowSource`] | [`memory`] | rows already in memory |
//! | [`load_json_rows`] | [`json`] | a JSON array of objects on disk |
//!
//! A database-backed source implements the trait by appending its own
//! `LIMIT`/`OFFSET` window to an `ORDER BY` query.

pub mod json;
pub mod memory;

pub use json::load_json_rows;
pub use memory::VecRowSource;

use crate::errors::{Result, SitemapError};
use serde_json::{Map, Value};

/// One record with field-addressable values.
pub type Row = Map<String, Value>;

/// An ordered, paginated provider of rows.
pub trait RowSource {
    /// Total number of rows the source will yield.
    fn row_count(&mut self) -> Result<usize>;

    /// Return up to `limit` rows starting at `offset`.
    ///
    /// Implementations must keep ordering stable across calls and return an
    /// empty page once `offset` is past the end.
    fn fetch_page(&mut self, offset: usize, limit: usize) -> Result<Vec<Row>>;

    /// `true` when the source has no rows at all.
    fn is_empty(&mut self) -> Result<bool> {
        Ok(self.row_count()? == 0)
    }
}

/// Read a row field as text suitable for a URL or tag.
///
/// Strings are used as-is, numbers and booleans are formatted. Missing,
/// `null`, array and object values are rejected.
pub fn field_text(row: &Row, field: &str) -> Result<String> {
    match row.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(Value::Null) | None => Err(SitemapError::DataSource(format!(
            "row has no value for field `{field}`"
        ))),
        Some(other) => Err(SitemapError::DataSource(format!(
            "field `{field}` is not a scalar value: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_field_text_scalars() {
        let r = row(json!({"name": "toronto", "id": 42, "open": true}));
        assert_eq!(field_text(&r, "name").unwrap(), "toronto");
        assert_eq!(field_text(&r, "id").unwrap(), "42");
        assert_eq!(field_text(&r, "open").unwrap(), "true");
    }

    #[test]
    fn test_field_text_rejects_missing_and_compound() {
        let r = row(json!({"tags": ["a"], "gone": null}));
        assert!(matches!(field_text(&r, "tags"), Err(SitemapError::DataSource(_))));
        assert!(matches!(field_text(&r, "gone"), Err(SitemapError::DataSource(_))));
        assert!(matches!(field_text(&r, "absent"), Err(SitemapError::DataSource(_))));
    }
}
