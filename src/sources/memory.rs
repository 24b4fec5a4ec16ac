//! In-memory row source.

use super::{Row, RowSource};
use crate::errors::{Result, SitemapError};
use tracing::debug;

/// Rows held in a `Vec`, paged in insertion order.
#[derive(Debug, Clone, Default)]
pub struct VecRowSource {
    rows: Vec<Row>,
}

impl VecRowSource {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// Build rows from `serde_json::Value`s, rejecting anything that is not an object.
    pub fn from_values(values: Vec<serde_json::Value>) -> Result<Self> {
        let rows = values
            .into_iter()
            .enumerate()
            .map(|(i, value)| match value {
                serde_json::Value::Object(map) => Ok(map),
                other => Err(SitemapError::DataSource(format!(
                    "row {i} is not an object: {other}"
                ))),
            })
            .collect::<Result<Vec<Row>>>()?;
        Ok(Self::new(rows))
    }
}

impl RowSource for VecRowSource {
    fn row_count(&mut self) -> Result<usize> {
        Ok(self.rows.len())
    }

    fn fetch_page(&mut self, offset: usize, limit: usize) -> Result<Vec<Row>> {
        if limit == 0 {
            return Err(SitemapError::DataSource("page limit must be greater than zero".into()));
        }
        let page: Vec<Row> = self.rows.iter().skip(offset).take(limit).cloned().collect();
        debug!(offset, limit, returned = page.len(), "Fetched in-memory page");
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source(n: usize) -> VecRowSource {
        VecRowSource::from_values((0..n).map(|i| json!({ "id": i })).collect()).unwrap()
    }

    #[test]
    fn test_pages_in_order() {
        let mut src = source(5);
        assert_eq!(src.row_count().unwrap(), 5);

        let first = src.fetch_page(0, 2).unwrap();
        let second = src.fetch_page(2, 2).unwrap();
        let third = src.fetch_page(4, 2).unwrap();
        assert_eq!(first[0]["id"], 0);
        assert_eq!(second[1]["id"], 3);
        assert_eq!(third.len(), 1);
        assert!(src.fetch_page(6, 2).unwrap().is_empty());
    }

    #[test]
    fn test_zero_limit_is_rejected() {
        assert!(source(1).fetch_page(0, 0).is_err());
    }

    #[test]
    fn test_from_values_rejects_non_objects() {
        let err = VecRowSource::from_values(vec![json!({"a": 1}), json!("nope")]).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn test_empty_source() {
        assert!(VecRowSource::default().is_empty().unwrap());
    }
}
