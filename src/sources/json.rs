//! Rows loaded from a JSON export.
//!
//! The file must hold a single JSON array of objects, typically the output of
//! a `SELECT ... ORDER BY ...` dumped by the database tooling:
//!
//! ```json
//! [
//!   { "city_name": "toronto", "oct_name": "pizza", "oct_id": 12 },
//!   { "city_name": "ottawa",  "oct_name": "sushi", "oct_id": 7 }
//! ]
//! ```

use super::memory::VecRowSource;
use crate::errors::{Result, SitemapError};
use std::fs;
use std::path::Path;
use tracing::{info, instrument};

/// Load a JSON rows file into a [`VecRowSource`], preserving array order.
///
/// # Errors
///
/// Returns [`SitemapError::DataSource`] if the file cannot be read, is not
/// valid JSON, is not an array, or contains a non-object element.
#[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
pub fn load_json_rows(path: impl AsRef<Path>) -> Result<VecRowSource> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|e| {
        SitemapError::DataSource(format!("cannot read rows file {}: {e}", path.display()))
    })?;
    let value: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
        SitemapError::DataSource(format!("rows file {} is not valid JSON: {e}", path.display()))
    })?;
    let serde_json::Value::Array(values) = value else {
        return Err(SitemapError::DataSource(format!(
            "rows file {} must contain a JSON array",
            path.display()
        )));
    };

    let count = values.len();
    let source = VecRowSource::from_values(values)?;
    info!(count, "Loaded rows");
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::RowSource;

    #[test]
    fn test_load_json_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.json");
        fs::write(&path, r#"[{"url": "a"}, {"url": "b"}]"#).unwrap();

        let mut source = load_json_rows(&path).unwrap();
        assert_eq!(source.row_count().unwrap(), 2);
        assert_eq!(source.fetch_page(1, 10).unwrap()[0]["url"], "b");
    }

    #[test]
    fn test_load_json_rows_requires_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.json");
        fs::write(&path, r#"{"url": "a"}"#).unwrap();

        assert!(matches!(load_json_rows(&path), Err(SitemapError::DataSource(_))));
    }

    #[test]
    fn test_load_json_rows_missing_file() {
        assert!(matches!(
            load_json_rows("/nonexistent/rows.json"),
            Err(SitemapError::DataSource(_))
        ));
    }
}
