//! HTML rendering of listing and detail pages.
//!
//! Pages are rendered with [Maud](https://maud.lambda.xyz/), so every
//! keyword and synthesized string is escaped at compile-checked template
//! boundaries. Rendering is a pure function of the page graph, the keyword
//! assignments and the synthesizer: no timestamps, so an unchanged site
//! renders byte-identical pages and the build leaves their mtimes alone.
//!
//! A freshly rendered page already satisfies everything the patcher
//! checks: text lengths pass the quality gate, the paragraph sits in the
//! marker block, and with a domain configured the canonical link and
//! page-typed JSON-LD are present. Patching a built site is a no-op.
//!
//! ## Page Types
//!
//! | Page | Content |
//! |------|---------|
//! | Listing (`pageN.html`) | Heading, lead line, thumbnail grid, paragraph, pager |
//! | Detail (`<stem>.html`) | Keyword heading, image, paragraph, prev/next, back link |

use crate::assign::KeywordAssigner;
use crate::document::{MARKER_END, MARKER_START, script_safe_json};
use crate::graph::{PageGraph, PageRecord};
use crate::ledger::LedgerError;
use crate::naming::display_category;
use crate::synth::{ContentSynthesizer, PageText};
use crate::types::{PageId, PageKind};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use serde_json::{Value, json};
use std::collections::HashMap;

/// One rendered page, ready to write to `root/id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub id: PageId,
    pub kind: PageKind,
    pub html: String,
}

pub struct Renderer<'a> {
    synth: &'a ContentSynthesizer,
    domain: Option<&'a str>,
}

impl<'a> Renderer<'a> {
    pub fn new(synth: &'a ContentSynthesizer, domain: Option<&'a str>) -> Self {
        Self { synth, domain }
    }

    /// Render every page of `graph`.
    ///
    /// Detail pages are rendered first, in image order, so keyword
    /// allocation follows the gallery order and listing thumbnails can use
    /// the detail keywords as alt text.
    pub fn render_graph(
        &self,
        graph: &PageGraph,
        assigner: &mut KeywordAssigner,
    ) -> Result<Vec<RenderedPage>, LedgerError> {
        let mut keywords: HashMap<&PageId, String> = HashMap::new();
        let mut pages = Vec::with_capacity(graph.details.len() + graph.listings.len());

        for record in &graph.details {
            let keyword = assigner.assign(&record.id, None)?.keyword;
            pages.push(RenderedPage {
                id: record.id.clone(),
                kind: PageKind::Detail,
                html: self.render_detail(record, &keyword).into_string(),
            });
            keywords.insert(&record.id, keyword);
        }

        let listing_keyword = format!("{} gallery", display_category(leaf(&graph.category)))
            .to_lowercase();
        for record in &graph.listings {
            let thumbs: Vec<(&PageId, &str)> = record
                .children
                .iter()
                .map(|child| {
                    let alt = keywords.get(child).map(String::as_str).unwrap_or_default();
                    (child, alt)
                })
                .collect();
            let html = self
                .render_listing(graph, record, &listing_keyword, &thumbs)
                .into_string();
            pages.push(RenderedPage {
                id: record.id.clone(),
                kind: PageKind::Listing,
                html,
            });
        }

        Ok(pages)
    }

    fn url(&self, id: &PageId) -> Option<String> {
        self.domain.map(|d| format!("{d}/{id}"))
    }

    fn render_listing(
        &self,
        graph: &PageGraph,
        record: &PageRecord,
        keyword: &str,
        thumbs: &[(&PageId, &str)],
    ) -> Markup {
        let text = self
            .synth
            .synthesize(keyword, record.id.as_str(), PageKind::Listing);
        let heading = match graph.listing_count() {
            1 => display_category(leaf(&graph.category)),
            n => format!(
                "{} ({} of {n})",
                display_category(leaf(&graph.category)),
                record.ordinal
            ),
        };
        let images: HashMap<&PageId, &str> = graph
            .details
            .iter()
            .filter_map(|d| d.image.as_deref().map(|img| (&d.id, img)))
            .collect();

        let content = html! {
            h1 { (heading) }
            p.lead { (text.description) }
            ul.thumbnail-grid {
                @for (child, alt) in thumbs {
                    li {
                        a href=(child.file_name()) {
                            img src=(images.get(child).copied().unwrap_or_default()) alt=(alt) loading="lazy";
                        }
                    }
                }
            }
            (generated_block(&text.paragraph))
            nav.pager {
                @if let Some(prev) = &record.prev {
                    a rel="prev" href=(prev.file_name()) { "Previous" }
                }
                a href="/" { "Home" }
                @if let Some(next) = &record.next {
                    a rel="next" href=(next.file_name()) { "Next" }
                }
            }
        };

        let schema = self.page_schema(record, &text);
        base_document(&text, self.url(&record.id).as_deref(), &[schema], "listing", content)
    }

    fn render_detail(&self, record: &PageRecord, keyword: &str) -> Markup {
        let text = self
            .synth
            .synthesize(keyword, record.id.as_str(), PageKind::Detail);
        let image = record.image.as_deref().unwrap_or_default();

        let content = html! {
            h1 { (keyword) }
            figure {
                img src=(image) alt=(keyword);
            }
            (generated_block(&text.paragraph))
            nav.pager {
                @if let Some(prev) = &record.prev {
                    a rel="prev" href=(prev.file_name()) { "Previous" }
                }
                @if let Some(parent) = &record.parent {
                    a href=(parent.file_name()) { "Back to gallery" }
                }
                a href="/" { "Home" }
                @if let Some(next) = &record.next {
                    a rel="next" href=(next.file_name()) { "Next" }
                }
            }
        };

        let category = record.id.dir_components().join("/");
        let content_url = match self.domain {
            Some(d) => format!("{d}/{category}/{image}"),
            None => image.to_string(),
        };
        let image_schema = json!({
            "@context": "https://schema.org",
            "@type": "ImageObject",
            "name": keyword,
            "contentUrl": content_url,
        });
        let schemas = [self.page_schema(record, &text), Some(image_schema)];
        base_document(&text, self.url(&record.id).as_deref(), &schemas, "detail", content)
    }

    /// `CollectionPage`/`ItemPage` block, only when a domain is known.
    fn page_schema(&self, record: &PageRecord, text: &PageText) -> Option<Value> {
        self.url(&record.id).map(|url| {
            json!({
                "@context": "https://schema.org",
                "@type": record.kind.schema_type(),
                "name": text.title,
                "url": url,
            })
        })
    }
}

fn base_document(
    text: &PageText,
    canonical: Option<&str>,
    schemas: &[Option<Value>],
    body_class: &str,
    content: Markup,
) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (text.title) }
                meta name="description" content=(text.description);
                @if let Some(href) = canonical {
                    link rel="canonical" href=(href);
                }
                @for schema in schemas.iter().flatten() {
                    script type="application/ld+json" { (PreEscaped(script_safe_json(schema))) }
                }
            }
            body class=(body_class) {
                (content)
            }
        }
    }
}

/// Paragraph wrapped in the marker comments the patcher looks for.
fn generated_block(paragraph: &str) -> Markup {
    html! {
        (PreEscaped(MARKER_START))
        p class="auto-desc" { (paragraph) }
        (PreEscaped(MARKER_END))
    }
}

fn leaf(category: &str) -> &str {
    category.rsplit('/').next().unwrap_or(category)
}
