//! `sitemap.xml` and `robots.txt`.
//!
//! The sitemap lists every HTML file found in each category directory,
//! whether or not it was built or patched by this tool. `<lastmod>` comes
//! from the file's modification time (UTC date), except that a date
//! already present in the previous sitemap for the same `<loc>` is kept.

use crate::fsio::write_if_changed;
use crate::scan::Category;
use chrono::{DateTime, Utc};
use maud::html;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

pub const SITEMAP_FILE: &str = "sitemap.xml";
pub const ROBOTS_FILE: &str = "robots.txt";

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;
const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

#[derive(Error, Debug)]
pub enum SitemapError {
    #[error("Sitemap IO error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> SitemapError + '_ {
    move |source| SitemapError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapEntry {
    pub loc: String,
    /// `YYYY-MM-DD`.
    pub lastmod: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SitemapReport {
    pub entries: usize,
    /// Entries whose lastmod came from the previous sitemap.
    pub preserved: usize,
    pub sitemap_written: bool,
    pub robots_written: bool,
}

/// One entry per `*.html` file directly inside each category directory,
/// ordered by category then file name.
pub fn collect_entries(
    categories: &[Category],
    domain: &str,
    previous: &HashMap<String, String>,
) -> Result<(Vec<SitemapEntry>, usize), SitemapError> {
    let mut entries = Vec::new();
    let mut preserved = 0;

    for category in categories {
        let mut files: Vec<(String, Option<SystemTime>)> = fs::read_dir(&category.dir)
            .map_err(io_err(&category.dir))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                let modified = entry.metadata().and_then(|m| m.modified()).ok();
                name.ends_with(".html").then_some((name, modified))
            })
            .collect();
        files.sort();

        for (name, modified) in files {
            let loc = format!("{domain}/{}/{name}", category.name);
            let lastmod = match previous.get(&loc) {
                Some(date) => {
                    preserved += 1;
                    date.clone()
                }
                None => utc_date(modified.unwrap_or_else(SystemTime::now)),
            };
            entries.push(SitemapEntry { loc, lastmod });
        }
    }

    Ok((entries, preserved))
}

pub fn utc_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).format("%Y-%m-%d").to_string()
}

/// `loc → lastmod` from an existing sitemap. Entries without a lastmod are
/// skipped; XML entities in `loc` are decoded.
pub fn parse_lastmods(xml: &str) -> HashMap<String, String> {
    url_block_re()
        .captures_iter(xml)
        .filter_map(|caps| {
            let block = caps.get(1)?.as_str();
            let loc = loc_re().captures(block)?.get(1)?.as_str().trim();
            let lastmod = lastmod_re().captures(block)?.get(1)?.as_str().trim();
            Some((unescape_xml(loc), lastmod.to_string()))
        })
        .collect()
}

pub fn render_sitemap(entries: &[SitemapEntry]) -> String {
    let body = html! {
        urlset xmlns=(SITEMAP_NS) {
            @for entry in entries {
                url {
                    loc { (entry.loc) }
                    lastmod { (entry.lastmod) }
                }
            }
        }
    };
    format!("{XML_DECLARATION}\n{}\n", body.into_string())
}

pub fn render_robots(domain: &str) -> String {
    format!("User-agent: *\nAllow: /\nSitemap: {domain}/{SITEMAP_FILE}\n")
}

/// Write `sitemap.xml` and `robots.txt` at `root`. Files whose bytes would
/// not change are left alone; `dry_run` writes nothing.
pub fn write_sitemap(
    root: &Path,
    categories: &[Category],
    domain: &str,
    dry_run: bool,
) -> Result<SitemapReport, SitemapError> {
    let sitemap_path = root.join(SITEMAP_FILE);
    let previous = match fs::read_to_string(&sitemap_path) {
        Ok(xml) => parse_lastmods(&xml),
        Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
        Err(e) => return Err(io_err(&sitemap_path)(e)),
    };

    let (entries, preserved) = collect_entries(categories, domain, &previous)?;
    let sitemap = render_sitemap(&entries);
    let robots_path = root.join(ROBOTS_FILE);
    let robots = render_robots(domain);

    let (sitemap_written, robots_written) = if dry_run {
        (
            differs(&sitemap_path, &sitemap),
            differs(&robots_path, &robots),
        )
    } else {
        (
            write_if_changed(&sitemap_path, sitemap.as_bytes()).map_err(io_err(&sitemap_path))?,
            write_if_changed(&robots_path, robots.as_bytes()).map_err(io_err(&robots_path))?,
        )
    };

    Ok(SitemapReport {
        entries: entries.len(),
        preserved,
        sitemap_written,
        robots_written,
    })
}

fn differs(path: &Path, content: &str) -> bool {
    fs::read(path).map_or(true, |existing| existing != content.as_bytes())
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

static_regex!(url_block_re, r"(?is)<url>(.*?)</url>");
static_regex!(loc_re, r"(?is)<loc>(.*?)</loc>");
static_regex!(lastmod_re, r"(?is)<lastmod>(.*?)</lastmod>");
