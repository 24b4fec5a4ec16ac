//! Reading generated sitemaps back.
//!
//! Used by the `inspect` subcommand and by tests to check what was written.
//! Both `<urlset>` and `<sitemapindex>` documents are understood; `.gz`
//! files are decompressed first.

use crate::errors::{Result, SitemapError};
use flate2::read::GzDecoder;
use quick_xml::Reader;
use quick_xml::events::Event;
use quick_xml::escape::resolve_predefined_entity;
use std::io::Read;
use std::path::Path;
use tracing::{debug, instrument};

/// Root element of a parsed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentRoot {
    Urlset,
    SitemapIndex,
}

/// Locations found in a sitemap or sitemap index, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSitemap {
    pub root: DocumentRoot,
    pub locations: Vec<String>,
}

/// Parse a `<urlset>` or `<sitemapindex>` document.
///
/// # Errors
///
/// Returns [`SitemapError::Parse`] if the XML is malformed or the root is
/// neither element.
pub fn parse_sitemap(xml: &str) -> Result<ParsedSitemap> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut root: Option<DocumentRoot> = None;
    let mut locations = Vec::new();
    let mut in_item = false;
    let mut current_loc: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match (root, name.as_str()) {
                    (None, "urlset") => root = Some(DocumentRoot::Urlset),
                    (None, "sitemapindex") => root = Some(DocumentRoot::SitemapIndex),
                    (None, other) => {
                        return Err(SitemapError::Parse(format!("unexpected root element <{other}>")));
                    }
                    (Some(DocumentRoot::Urlset), "url") | (Some(DocumentRoot::SitemapIndex), "sitemap") => {
                        in_item = true;
                    }
                    (Some(_), "loc") if in_item => current_loc = Some(String::new()),
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match name.as_str() {
                    "loc" => {
                        if let Some(loc) = current_loc.take() {
                            locations.push(loc.trim().to_string());
                        }
                    }
                    "url" | "sitemap" => in_item = false,
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(loc) = current_loc.as_mut() {
                    loc.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if let Some(loc) = current_loc.as_mut() {
                    let name = String::from_utf8_lossy(&e).to_string();
                    if let Some(resolved) = resolve_predefined_entity(&name) {
                        loc.push_str(resolved);
                    } else if let Ok(Some(ch)) = e.resolve_char_ref() {
                        loc.push(ch);
                    } else {
                        return Err(SitemapError::Parse(format!("unknown entity &{name};")));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SitemapError::Parse(format!("XML parse error: {e}"))),
            _ => {}
        }
        buf.clear();
    }

    let root = root.ok_or_else(|| SitemapError::Parse("document has no root element".into()))?;
    Ok(ParsedSitemap { root, locations })
}

/// `<loc>` values of every `<url>` in a urlset.
pub fn read_locations(xml: &str) -> Result<Vec<String>> {
    expect_root(parse_sitemap(xml)?, DocumentRoot::Urlset)
}

/// `<loc>` values of every `<sitemap>` in a sitemap index.
pub fn read_index_locations(xml: &str) -> Result<Vec<String>> {
    expect_root(parse_sitemap(xml)?, DocumentRoot::SitemapIndex)
}

fn expect_root(parsed: ParsedSitemap, root: DocumentRoot) -> Result<Vec<String>> {
    if parsed.root != root {
        return Err(SitemapError::Parse(format!(
            "expected {root:?} document, found {:?}",
            parsed.root
        )));
    }
    Ok(parsed.locations)
}

/// Read and parse a sitemap file, gunzipping it when the name ends in `.gz`.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn read_file(path: &Path) -> Result<ParsedSitemap> {
    let raw = std::fs::read(path).map_err(|e| SitemapError::io(path, e))?;

    let xml = if path.extension().is_some_and(|ext| ext == "gz") {
        let mut xml = String::new();
        GzDecoder::new(&raw[..])
            .read_to_string(&mut xml)
            .map_err(|e| SitemapError::io(path, e))?;
        xml
    } else {
        String::from_utf8(raw).map_err(|e| SitemapError::Parse(format!("not UTF-8: {e}")))?
    };

    let parsed = parse_sitemap(&xml)?;
    debug!(root = ?parsed.root, locations = parsed.locations.len(), "Parsed sitemap");
    Ok(parsed)
}
