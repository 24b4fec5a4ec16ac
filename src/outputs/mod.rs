//! Output generation for sitemap documents and the sitemap index.
//!
//! # Submodules
//!
//! - [`xml`]: Serializes documents to `urlset` / news `urlset` / `sitemapindex` XML
//! - [`writer`]: Compresses and stores documents through a [`writer::DocumentSink`]
//! - [`report`]: The status/error log handed back to the caller
//!
//! # Output Structure
//!
//! ```text
//! output_directory/
//! ├── sitemap.xml        # sitemapindex listing every file below
//! ├── sitemap1.xml.gz    # first 50,000 URLs
//! ├── sitemap2.xml.gz    # next 50,000 URLs
//! └── ...
//! ```

pub mod report;
pub mod writer;
pub mod xml;
