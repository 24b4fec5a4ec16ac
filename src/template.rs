//! Location templates with positional `[placeholder]` substitution.
//!
//! A template such as `/online-[city_name]-coupons/category-[oct_name]-[oct_id]/`
//! is paired with an ordered list of row field names. Placeholders are matched
//! to fields by position, left to right; the text inside the brackets is only
//! a label for the reader and is never looked up.
//!
//! The template text is never evaluated. Substituted values are inserted as
//! plain text and escaped for XML when the document is serialized.

use crate::errors::{Result, SitemapError};
use crate::sources::{Row, field_text};
use once_cell::sync::Lazy;
use regex::Regex;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\[\]]+\]").expect("placeholder regex is valid"));

/// A parsed template bound to its field list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationTemplate {
    /// Literal text between placeholders; always `fields.len() + 1` pieces.
    literals: Vec<String>,
    fields: Vec<String>,
}

impl LocationTemplate {
    /// Parse `template` and bind it to `fields`.
    ///
    /// # Errors
    ///
    /// Returns [`SitemapError::Configuration`] if the template is empty or the
    /// number of placeholders differs from the number of fields.
    pub fn parse<S: AsRef<str>>(template: &str, fields: &[S]) -> Result<Self> {
        if template.trim().is_empty() {
            return Err(SitemapError::Configuration(
                "location template cannot be empty".into(),
            ));
        }

        let placeholders = PLACEHOLDER.find_iter(template).count();
        if placeholders != fields.len() {
            return Err(SitemapError::Configuration(format!(
                "template `{template}` has {placeholders} placeholder(s) but {} field name(s) were given",
                fields.len()
            )));
        }

        let literals = PLACEHOLDER
            .split(template)
            .map(str::to_string)
            .collect::<Vec<_>>();

        Ok(Self {
            literals,
            fields: fields.iter().map(|f| f.as_ref().to_string()).collect(),
        })
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Substitute the row's field values into the template.
    ///
    /// # Errors
    ///
    /// Returns [`SitemapError::DataSource`] if the row lacks one of the fields.
    pub fn render(&self, row: &Row) -> Result<String> {
        let mut out = String::with_capacity(self.literals.iter().map(String::len).sum::<usize>() + 32);
        for (i, literal) in self.literals.iter().enumerate() {
            out.push_str(literal);
            if let Some(field) = self.fields.get(i) {
                out.push_str(&field_text(row, field)?);
            }
        }
        Ok(out)
    }
}
