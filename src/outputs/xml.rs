//! XML serialization for urlset, news urlset and sitemapindex documents.
//!
//! The layout follows the Google 0.84 sitemap schema with one element per
//! line:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <urlset xmlns="http://www.google.com/schemas/sitemap/0.84"
//! xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
//! xsi:schemaLocation="http://www.google.com/schemas/sitemap/0.84
//! http://www.google.com/schemas/sitemap/0.84/sitemap.xsd">
//!    <url>
//!       <loc>https://www.example.com/a/</loc>
//!    </url>
//! </urlset>
//! ```
//!
//! `<changefreq>` is never written; crawlers ignore it.

use crate::config::LineEnding;
use crate::models::{DEFAULT_PRIORITY, SitemapDocument, SitemapEntry, SitemapIndex, SitemapKind};
use quick_xml::escape::partial_escape;
use std::borrow::Cow;
use std::fmt::Write;

pub const SITEMAP_NS: &str = "http://www.google.com/schemas/sitemap/0.84";
pub const NEWS_NS: &str = "http://www.google.com/schemas/sitemap-news/0.9";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Escape text content: `&`, `<` and `>` only.
pub fn escape_text(s: &str) -> Cow<'_, str> {
    partial_escape(s)
}

fn open_root(out: &mut String, root: &str, xsd: &str, news: bool, nl: &str) {
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    out.push_str(nl);
    let _ = write!(out, r#"<{root} xmlns="{SITEMAP_NS}""#);
    out.push_str(nl);
    if news {
        let _ = write!(out, r#"xmlns:news="{NEWS_NS}""#);
        out.push_str(nl);
    }
    let _ = write!(out, r#"xmlns:xsi="{XSI_NS}""#);
    out.push_str(nl);
    let _ = write!(out, r#"xsi:schemaLocation="{SITEMAP_NS}"#);
    out.push_str(nl);
    let _ = write!(out, r#"{SITEMAP_NS}/{xsd}">"#);
    out.push_str(nl);
}

fn push_element(out: &mut String, indent: &str, name: &str, text: &str, nl: &str) {
    let _ = write!(out, "{indent}<{name}>{}</{name}>", escape_text(text));
    out.push_str(nl);
}

/// Shortest form that reads back as the same value; whole numbers keep one decimal.
fn format_priority(priority: f32) -> String {
    if priority.fract() == 0.0 {
        format!("{priority:.1}")
    } else {
        priority.to_string()
    }
}

fn push_entry(out: &mut String, entry: &SitemapEntry, kind: SitemapKind, nl: &str) {
    out.push_str("   <url>");
    out.push_str(nl);
    push_element(out, "      ", "loc", &entry.location, nl);

    if let Some(lastmod) = &entry.last_modified {
        push_element(out, "      ", "lastmod", lastmod.trim(), nl);
    }
    if let Some(priority) = entry.priority {
        if (priority - DEFAULT_PRIORITY).abs() > f32::EPSILON {
            push_element(out, "      ", "priority", &format_priority(priority), nl);
        }
    }

    if kind == SitemapKind::News {
        if let Some(news) = &entry.news {
            out.push_str("      <news:news>");
            out.push_str(nl);
            out.push_str("         <news:publication>");
            out.push_str(nl);
            push_element(out, "            ", "news:name", &news.publication.name, nl);
            push_element(out, "            ", "news:language", &news.publication.language, nl);
            out.push_str("         </news:publication>");
            out.push_str(nl);
            push_element(out, "         ", "news:publication_date", news.publication_date.trim(), nl);
            push_element(out, "         ", "news:title", &news.title, nl);
            out.push_str("      </news:news>");
            out.push_str(nl);
        }
    }

    out.push_str("   </url>");
    out.push_str(nl);
}

/// Serialize a document as a complete `<urlset>`.
pub fn render_urlset(document: &SitemapDocument, line_ending: LineEnding) -> String {
    let nl = line_ending.as_str();
    let news = document.kind() == SitemapKind::News;
    let mut out = String::with_capacity(512 + document.len() * 96);

    open_root(&mut out, "urlset", "sitemap.xsd", news, nl);
    for entry in document.entries() {
        push_entry(&mut out, entry, document.kind(), nl);
    }
    out.push_str("</urlset>");
    out.push_str(nl);
    out
}

/// Serialize a complete `<sitemapindex>`.
pub fn render_index(index: &SitemapIndex, line_ending: LineEnding) -> String {
    let nl = line_ending.as_str();
    let mut out = String::with_capacity(512 + index.len() * 128);

    open_root(&mut out, "sitemapindex", "siteindex.xsd", false, nl);
    for entry in &index.entries {
        out.push_str("   <sitemap>");
        out.push_str(nl);
        push_element(&mut out, "      ", "loc", &entry.location, nl);
        push_element(&mut out, "      ", "lastmod", &entry.last_modified, nl);
        out.push_str("   </sitemap>");
        out.push_str(nl);
    }
    out.push_str("</sitemapindex>");
    out.push_str(nl);
    out
}
