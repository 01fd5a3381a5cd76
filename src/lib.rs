//! # Gallery Farm
//!
//! Builds and maintains large static image-gallery sites. Every page gets a
//! unique descriptive keyword, generated text that fits search-snippet
//! length limits, pagination and prev/next links, and can be rewritten in
//! place any number of times without piling up duplicate edits.
//!
//! # Architecture: Three Independent Stages
//!
//! ```text
//! 1. Build    category dirs  →  pageN.html + <image>.html   (scan, graph, render)
//! 2. Patch    any *.html     →  same files, fixed in place  (document, patch)
//! 3. Sitemap  category dirs  →  sitemap.xml + robots.txt    (sitemap)
//! ```
//!
//! The stages share only the site tree and the keyword ledger. Patch works
//! on pages this tool never built (hand-edited, scraped, legacy), and the
//! sitemap does not care whether either of the other stages has run.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Category discovery: directories that directly hold images |
//! | [`keywords`] | Keyword pools: curated, raw and global lists per category |
//! | [`ledger`] | Page → keyword assignments and the consumed set, behind a [`ledger::LedgerStore`] |
//! | [`assign`] | Pool lookup, exhaustion policy and derived fallback keywords |
//! | [`rng`] | Seeded random source: same seed string, same draws |
//! | [`synth`] | Title, description and paragraph synthesis within length bounds |
//! | [`document`] | Typed reads over a permissive parse, span edits over the source |
//! | [`patch`] | Quality-gated rewrite plus canonical / JSON-LD normalization |
//! | [`graph`] | Listing chunks, detail pages, links, orphan detection |
//! | [`render`] | Listing and detail pages rendered with Maud |
//! | [`sitemap`] | `sitemap.xml` with stable lastmod, `robots.txt` |
//! | [`pipeline`] | Stage orchestration and reports |
//! | [`config`] | `farm.toml` layering and validation, `config.json` site identity |
//! | [`naming`] | Listing/detail file names and keyword text normalization |
//! | [`types`] | [`types::PageId`] and [`types::PageKind`] |
//! | [`fsio`] | Atomic writes, write-if-changed, one-time backups |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`output`] | CLI output formatting of stage reports |
//!
//! # Design Decisions
//!
//! ## Keys Are Root-Relative Paths
//!
//! A page is identified by its path relative to the site root
//! (`cats/page1.html`), never by an absolute path. Ledger keys and random
//! seeds therefore survive moving the site or running the tool from another
//! working directory.
//!
//! ## One Keyword, One Page
//!
//! A keyword is consumed the moment it is recorded against a page and is
//! never offered to another page afterwards, even across sites that share a
//! consumed-set file. Allocation starts at an offset hashed from the page
//! id, so the choice is reproducible; when a pool runs dry the configured
//! policy either derives a keyword from the page or reuses one, and both
//! cases are logged separately from normal allocations.
//!
//! ## Deterministic Text
//!
//! All variation in generated text comes from [`rng::SeededRng`] seeded
//! with the page id and the field name. Re-running synthesis for a page
//! yields the same text, which is what makes repeated builds write nothing.
//!
//! ## Edits Are Span Replacements
//!
//! Pages are read through a forgiving HTML5 parser but never re-serialized.
//! Each edit replaces one span of the original source, and generated body
//! text lives between `AUTO_DESC` marker comments, so a second patch finds
//! and replaces its own earlier output instead of adding to it.
//!
//! ## Nothing Destructive
//!
//! Every write is temp-file-plus-rename. A patched page keeps its original
//! as `<file>.bak` (written once). Pages left over after images are removed
//! are reported, not deleted.

/// Lazily compiled regex behind a zero-argument accessor.
macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static ::regex::Regex {
            static RE: ::std::sync::OnceLock<::regex::Regex> = ::std::sync::OnceLock::new();
            RE.get_or_init(|| ::regex::Regex::new($pattern).expect("static regex must compile"))
        }
    };
}

pub mod assign;
pub mod config;
pub mod document;
pub mod fsio;
pub mod graph;
pub mod keywords;
pub mod ledger;
pub mod logging;
pub mod naming;
pub mod output;
pub mod patch;
pub mod pipeline;
pub mod render;
pub mod rng;
pub mod scan;
pub mod sitemap;
pub mod synth;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
