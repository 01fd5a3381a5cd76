//! Document model for in-place page edits.
//!
//! Pages on disk are hand-edited, generated by older tools, or scraped, so
//! their markup is of unknown quality. Reads go through a permissive HTML5
//! parser ([`scraper`]) and are exposed as a typed [`Snapshot`]: title,
//! meta description, canonical links, JSON-LD blocks, visible body text
//! length and first heading.
//!
//! Edits are applied to the original source text as span replacements, so
//! everything the pipeline does not touch survives byte for byte. Tag
//! searches skip comments and the contents of `<script>`/`<style>`
//! elements. Replacement tags are rendered with maud, which escapes text
//! and attribute values.
//!
//! Generated body text lives between two marker comments:
//!
//! ```html
//! <!--AUTO_DESC_START--><p class="auto-desc">...</p><!--AUTO_DESC_END-->
//! ```
//!
//! A page carries at most one such block; writing again replaces it.

use maud::{PreEscaped, html};
use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use std::ops::Range;
use thiserror::Error;

pub const MARKER_START: &str = "<!--AUTO_DESC_START-->";
pub const MARKER_END: &str = "<!--AUTO_DESC_END-->";

/// Schema.org types treated as "the page" in JSON-LD.
pub const PAGE_SCHEMA_TYPES: &[&str] = &["WebPage", "CollectionPage", "ItemPage"];

/// Elements whose text is never visible.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DocumentError {
    #[error("not valid UTF-8")]
    Unreadable,
    #[error("no HTML markup found")]
    NoMarkup,
}

/// Typed read view of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub title: Option<String>,
    pub meta_description: Option<String>,
    /// `href` of every `<link rel="canonical">`, in document order.
    pub canonical_links: Vec<String>,
    /// Raw text of every `application/ld+json` script, in document order.
    pub json_ld_blocks: Vec<String>,
    /// Characters of visible body text, whitespace collapsed.
    pub body_text_len: usize,
    /// Text of the first `h1`..`h6`.
    pub first_heading: Option<String>,
}

impl Snapshot {
    pub fn title_len(&self) -> usize {
        self.title.as_deref().map_or(0, |t| t.chars().count())
    }

    pub fn description_len(&self) -> usize {
        self.meta_description
            .as_deref()
            .map_or(0, |d| d.chars().count())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    source: String,
}

impl Document {
    /// Accept any UTF-8 text that contains at least one tag.
    pub fn parse(bytes: &[u8]) -> Result<Self, DocumentError> {
        let source = String::from_utf8(bytes.to_vec()).map_err(|_| DocumentError::Unreadable)?;
        if !markup_re().is_match(&source) {
            return Err(DocumentError::NoMarkup);
        }
        Ok(Self { source })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn into_source(self) -> String {
        self.source
    }

    pub fn snapshot(&self) -> Snapshot {
        let doc = Html::parse_document(&self.source);

        let title = select(&doc, "title")
            .into_iter()
            .next()
            .map(|el| collapse_ws(&el.text().collect::<Vec<_>>().join(" ")));

        let meta_description = select(&doc, "meta")
            .into_iter()
            .find(|el| {
                el.value()
                    .attr("name")
                    .is_some_and(|n| n.trim().eq_ignore_ascii_case("description"))
            })
            .map(|el| el.value().attr("content").unwrap_or_default().trim().to_string());

        let canonical_links = select(&doc, "link")
            .into_iter()
            .filter(|el| {
                el.value().attr("rel").is_some_and(|rel| {
                    rel.split_whitespace()
                        .any(|r| r.eq_ignore_ascii_case("canonical"))
                })
            })
            .map(|el| el.value().attr("href").unwrap_or_default().to_string())
            .collect();

        let json_ld_blocks = select(&doc, "script")
            .into_iter()
            .filter(|el| {
                el.value()
                    .attr("type")
                    .is_some_and(|t| t.trim().eq_ignore_ascii_case("application/ld+json"))
            })
            .map(|el| el.text().collect::<String>())
            .collect();

        let body_text_len = select(&doc, "body")
            .into_iter()
            .next()
            .map(|body| {
                let mut text = String::new();
                visible_text(body, &mut text);
                collapse_ws(&text).chars().count()
            })
            .unwrap_or(0);

        let first_heading = select(&doc, "h1, h2, h3, h4, h5, h6")
            .into_iter()
            .next()
            .map(|el| collapse_ws(&el.text().collect::<Vec<_>>().join(" ")));

        Snapshot {
            title,
            meta_description,
            canonical_links,
            json_ld_blocks,
            body_text_len,
            first_heading,
        }
    }

    // =========================================================================
    // Head edits
    // =========================================================================

    /// Replace the first `<title>` element, or add one to the head.
    /// Returns `true` when the source changed.
    pub fn set_title(&mut self, title: &str) -> bool {
        let tag = html! { title { (title) } }.into_string();
        let opaque = opaque_spans(&self.source, true);
        let found = first_outside(title_re(), &self.source, &opaque);
        self.put_head_tag(found, &tag)
    }

    /// Replace the first description `<meta>`, or add one to the head.
    /// Returns `true` when the source changed.
    pub fn set_meta_description(&mut self, description: &str) -> bool {
        let tag = html! { meta name="description" content=(description); }.into_string();
        let opaque = opaque_spans(&self.source, true);
        let found = all_outside(meta_re(), &self.source, &opaque)
            .into_iter()
            .find(|span| meta_name_re().is_match(&self.source[span.clone()]));
        self.put_head_tag(found, &tag)
    }

    fn put_head_tag(&mut self, found: Option<Range<usize>>, tag: &str) -> bool {
        match found {
            Some(span) if self.source[span.clone()] == *tag => false,
            Some(span) => {
                self.source.replace_range(span, tag);
                true
            }
            None => {
                self.insert_into_head(tag);
                true
            }
        }
    }

    /// Make the document carry exactly one canonical link pointing at
    /// `href`. Returns `true` when the source changed.
    pub fn set_canonical(&mut self, href: &str) -> bool {
        let opaque = opaque_spans(&self.source, true);
        let spans: Vec<Range<usize>> = all_outside(link_re(), &self.source, &opaque)
            .into_iter()
            .filter(|span| canonical_rel_re().is_match(&self.source[span.clone()]))
            .collect();

        if spans.len() == 1 && self.snapshot().canonical_links == [href] {
            return false;
        }

        let tag = html! { link rel="canonical" href=(href); }.into_string();
        match spans.split_first() {
            Some((first, rest)) => {
                // back to front so earlier offsets stay valid
                for span in rest.iter().rev() {
                    self.source.replace_range(span.clone(), "");
                }
                self.source.replace_range(first.clone(), &tag);
            }
            None => self.insert_into_head(&tag),
        }
        true
    }

    /// Point the first page-typed JSON-LD object at `url`, or add a minimal
    /// `WebPage` block named `name`. Returns `true` when the source changed.
    ///
    /// Blocks that fail to parse are left alone.
    pub fn set_page_schema_url(&mut self, url: &str, name: &str) -> bool {
        let opaque = opaque_spans(&self.source, false);
        let blocks: Vec<Range<usize>> = json_ld_re()
            .captures_iter(&self.source)
            .filter_map(|caps| caps.get(1).map(|m| m.range()))
            .filter(|body| !overlaps(body, &opaque))
            .collect();

        for body in blocks {
            let Ok(mut value) = serde_json::from_str::<Value>(&self.source[body.clone()]) else {
                continue;
            };
            let Some(node) = page_node(&mut value) else {
                continue;
            };
            if node.get("url").and_then(Value::as_str) == Some(url) {
                return false;
            }
            node.insert("url".into(), Value::String(url.to_string()));
            self.source.replace_range(body, &script_safe_json(&value));
            return true;
        }

        let block = serde_json::json!({
            "@context": "https://schema.org",
            "@type": "WebPage",
            "name": name,
            "url": url,
        });
        let tag = html! {
            script type="application/ld+json" { (PreEscaped(script_safe_json(&block))) }
        }
        .into_string();
        self.insert_into_head(&tag);
        true
    }

    fn insert_into_head(&mut self, tag: &str) {
        let opaque = opaque_spans(&self.source, true);
        if let Some(close) = first_outside(head_close_re(), &self.source, &opaque) {
            self.source.insert_str(close.start, &format!("{tag}\n"));
        } else if let Some(open) = first_outside(html_open_re(), &self.source, &opaque) {
            self.source
                .insert_str(open.end, &format!("\n<head>\n{tag}\n</head>"));
        } else {
            self.source.insert_str(0, &format!("<head>\n{tag}\n</head>\n"));
        }
    }

    // =========================================================================
    // Generated body block
    // =========================================================================

    pub fn has_generated_block(&self) -> bool {
        self.marker_range().is_some()
    }

    /// Write `paragraph` into the marker block, replacing an existing block
    /// or inserting a new one after the first heading, else after the first
    /// image, else at the end of the body. Headings and images inside
    /// `<noscript>`/`<template>` are not anchors. Returns `true` when the
    /// source changed.
    pub fn upsert_generated_block(&mut self, paragraph: &str) -> bool {
        let block = format!(
            "{MARKER_START}{}{MARKER_END}",
            html! { p class="auto-desc" { (paragraph) } }.into_string()
        );

        if let Some(range) = self.marker_range() {
            if !overlaps(&range, &hidden_spans(&self.source)) {
                if self.source[range.clone()] == block {
                    return false;
                }
                self.source.replace_range(range, &block);
                return true;
            }
            // A block inside hidden markup never counts as body text.
            self.source.replace_range(range, "");
        }

        let mut opaque = opaque_spans(&self.source, true);
        opaque.extend(hidden_spans(&self.source));
        let at = first_outside(heading_re(), &self.source, &opaque)
            .or_else(|| first_outside(img_re(), &self.source, &opaque))
            .map(|span| span.end);
        match at {
            Some(pos) => self.source.insert_str(pos, &format!("\n{block}")),
            None => match first_outside(body_close_re(), &self.source, &opaque) {
                Some(close) => self.source.insert_str(close.start, &format!("{block}\n")),
                None => {
                    if !self.source.ends_with('\n') {
                        self.source.push('\n');
                    }
                    self.source.push_str(&block);
                    self.source.push('\n');
                }
            },
        }
        true
    }

    fn marker_range(&self) -> Option<Range<usize>> {
        let start = self.source.find(MARKER_START)?;
        let end = self.source[start..].find(MARKER_END)? + start + MARKER_END.len();
        Some(start..end)
    }
}

// =============================================================================
// Read helpers
// =============================================================================

fn select<'a>(doc: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(sel) => doc.select(&sel).collect(),
        Err(_) => Vec::new(),
    }
}

fn visible_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(e) if !HIDDEN_ELEMENTS.contains(&e.name()) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    visible_text(child_el, out);
                }
            }
            _ => {}
        }
    }
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First object in `value` whose `@type` names a page type. Looks inside
/// arrays and `@graph`.
fn page_node(value: &mut Value) -> Option<&mut Map<String, Value>> {
    match value {
        Value::Object(map) => {
            if is_page_type(map.get("@type")) {
                return Some(map);
            }
            map.get_mut("@graph").and_then(page_node)
        }
        Value::Array(items) => items.iter_mut().find_map(page_node),
        _ => None,
    }
}

fn is_page_type(ty: Option<&Value>) -> bool {
    match ty {
        Some(Value::String(s)) => PAGE_SCHEMA_TYPES.contains(&s.as_str()),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .any(|s| PAGE_SCHEMA_TYPES.contains(&s)),
        _ => false,
    }
}

/// JSON that cannot close its surrounding `<script>` element.
pub fn script_safe_json(value: &Value) -> String {
    value.to_string().replace("</", "<\\/")
}

// =============================================================================
// Source spans
// =============================================================================

/// Comments, plus `<script>`/`<style>` elements when `raw_text` is set.
fn opaque_spans(src: &str, raw_text: bool) -> Vec<Range<usize>> {
    let mut spans: Vec<Range<usize>> = comment_re().find_iter(src).map(|m| m.range()).collect();
    if raw_text {
        spans.extend(raw_text_re().find_iter(src).map(|m| m.range()));
    }
    spans
}

/// `<noscript>` and `<template>` elements.
fn hidden_spans(src: &str) -> Vec<Range<usize>> {
    hidden_re().find_iter(src).map(|m| m.range()).collect()
}

fn overlaps(span: &Range<usize>, opaque: &[Range<usize>]) -> bool {
    opaque
        .iter()
        .any(|o| span.start < o.end && o.start < span.end)
}

fn all_outside(re: &Regex, src: &str, opaque: &[Range<usize>]) -> Vec<Range<usize>> {
    re.find_iter(src)
        .map(|m| m.range())
        .filter(|span| !overlaps(span, opaque))
        .collect()
}

fn first_outside(re: &Regex, src: &str, opaque: &[Range<usize>]) -> Option<Range<usize>> {
    re.find_iter(src)
        .map(|m| m.range())
        .find(|span| !overlaps(span, opaque))
}

static_regex!(markup_re, r"<[A-Za-z!/]");
static_regex!(comment_re, r"(?s)<!--.*?-->");
static_regex!(
    raw_text_re,
    r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>"
);
static_regex!(
    hidden_re,
    r"(?is)<noscript\b[^>]*>.*?</noscript\s*>|<template\b[^>]*>.*?</template\s*>"
);
static_regex!(title_re, r"(?is)<title\b[^>]*>.*?</title\s*>");
static_regex!(meta_re, r"(?i)<meta\b[^>]*>");
static_regex!(
    meta_name_re,
    r#"(?i)\bname\s*=\s*(?:"\s*description\s*"|'\s*description\s*'|description\b)"#
);
static_regex!(link_re, r"(?i)<link\b[^>]*>");
static_regex!(
    canonical_rel_re,
    r#"(?i)\brel\s*=\s*(?:"[^"]*\bcanonical\b[^"]*"|'[^']*\bcanonical\b[^']*'|canonical\b)"#
);
static_regex!(
    json_ld_re,
    r#"(?is)<script\b[^>]*\btype\s*=\s*["']?\s*application/ld\+json\s*["']?[^>]*>(.*?)</script\s*>"#
);
static_regex!(head_close_re, r"(?i)</head\s*>");
static_regex!(html_open_re, r"(?i)<html\b[^>]*>");
static_regex!(body_close_re, r"(?i)</body\s*>");
static_regex!(img_re, r"(?i)<img\b[^>]*>");
static_regex!(
    heading_re,
    r"(?is)<h1\b[^>]*>.*?</h1\s*>|<h2\b[^>]*>.*?</h2\s*>|<h3\b[^>]*>.*?</h3\s*>|<h4\b[^>]*>.*?</h4\s*>|<h5\b[^>]*>.*?</h5\s*>|<h6\b[^>]*>.*?</h6\s*>"
);
