//! Page graph for one category.
//!
//! Images are sorted by file name and split into chunks of `page_size`.
//! Chunk `i` becomes listing page `page{i+1}.html`; every image gets a
//! detail page. Links:
//!
//! - listing pages link to the previous and next listing page;
//! - detail pages link to their neighbours *within the same chunk* and back
//!   to the owning listing page.
//!
//! Numbering is by chunk index, so inserting an image shifts every later
//! image one slot. Rerunning on an unchanged image set yields an identical
//! graph.
//!
//! [`find_orphans`] compares a built graph with the HTML already on disk:
//! listing pages beyond the new count and detail pages whose image is gone
//! are reported, never deleted.

use crate::naming::{detail_file_names, listing_file_name, parse_listing_number};
use crate::scan::Category;
use crate::types::{PageId, PageKind};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::warn;

/// One page of the graph. Links are page ids, not owned records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    pub id: PageId,
    pub kind: PageKind,
    /// 1-based position: listing number, or image position in the category.
    pub ordinal: usize,
    pub prev: Option<PageId>,
    pub next: Option<PageId>,
    /// Owning listing page (detail pages only).
    pub parent: Option<PageId>,
    /// Source image file name (detail pages only).
    pub image: Option<String>,
    /// Detail pages in this chunk (listing pages only).
    pub children: Vec<PageId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageGraph {
    /// Category name, root-relative.
    pub category: String,
    pub listings: Vec<PageRecord>,
    pub details: Vec<PageRecord>,
}

impl PageGraph {
    pub fn listing_count(&self) -> usize {
        self.listings.len()
    }

    /// Listings first, then details.
    pub fn records(&self) -> impl Iterator<Item = &PageRecord> {
        self.listings.iter().chain(self.details.iter())
    }

    pub fn get(&self, id: &PageId) -> Option<&PageRecord> {
        self.records().find(|r| &r.id == id)
    }
}

/// Build the page graph for `category`.
pub fn build(category: &Category, page_size: usize) -> PageGraph {
    let page_size = page_size.max(1);
    let mut images: Vec<String> = category
        .images
        .iter()
        .map(|img| img.file_name.clone())
        .collect();
    images.sort();

    let id = |file: &str| PageId::new(format!("{}/{file}", category.name));
    let detail_ids: Vec<PageId> = detail_file_names(&images).iter().map(|f| id(f)).collect();
    let chunk_count = images.len().div_ceil(page_size);
    let listing_ids: Vec<PageId> = (1..=chunk_count).map(|n| id(&listing_file_name(n))).collect();

    let listings = listing_ids
        .iter()
        .enumerate()
        .map(|(i, listing)| {
            let start = i * page_size;
            let end = (start + page_size).min(images.len());
            PageRecord {
                id: listing.clone(),
                kind: PageKind::Listing,
                ordinal: i + 1,
                prev: i.checked_sub(1).map(|p| listing_ids[p].clone()),
                next: listing_ids.get(i + 1).cloned(),
                parent: None,
                image: None,
                children: detail_ids[start..end].to_vec(),
            }
        })
        .collect();

    let details = images
        .iter()
        .enumerate()
        .map(|(i, image)| {
            let chunk = i / page_size;
            let chunk_start = chunk * page_size;
            let chunk_end = (chunk_start + page_size).min(images.len());
            PageRecord {
                id: detail_ids[i].clone(),
                kind: PageKind::Detail,
                ordinal: i + 1,
                prev: (i > chunk_start).then(|| detail_ids[i - 1].clone()),
                next: (i + 1 < chunk_end).then(|| detail_ids[i + 1].clone()),
                parent: Some(listing_ids[chunk].clone()),
                image: Some(image.clone()),
                children: Vec::new(),
            }
        })
        .collect();

    PageGraph {
        category: category.name.clone(),
        listings,
        details,
    }
}

// =============================================================================
// Orphans
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrphanReason {
    /// A listing page numbered past the current listing count.
    ListingBeyondEnd { listing_count: usize },
    /// A detail page with no image behind it.
    MissingImage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Orphan {
    pub page: PageId,
    pub path: PathBuf,
    pub reason: OrphanReason,
}

/// HTML files in the category directory that `graph` no longer produces.
///
/// `index.html` is never considered an orphan.
pub fn find_orphans(category: &Category, graph: &PageGraph) -> io::Result<Vec<Orphan>> {
    let expected: HashSet<&str> = graph.records().map(|r| r.id.file_name()).collect();

    let mut files: Vec<String> = fs::read_dir(&category.dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .filter_map(|entry| entry.file_name().to_str().map(String::from))
        .filter(|name| name.ends_with(".html") && name != "index.html")
        .filter(|name| !expected.contains(name.as_str()))
        .collect();
    files.sort();

    let orphans: Vec<Orphan> = files
        .into_iter()
        .map(|name| {
            let reason = match parse_listing_number(&name) {
                Some(_) => OrphanReason::ListingBeyondEnd {
                    listing_count: graph.listing_count(),
                },
                None => OrphanReason::MissingImage,
            };
            Orphan {
                page: PageId::new(format!("{}/{name}", category.name)),
                path: category.dir.join(&name),
                reason,
            }
        })
        .collect();

    for orphan in &orphans {
        warn!(
            target: "gallery_farm::graph",
            page = %orphan.page,
            reason = ?orphan.reason,
            "orphaned page left in place"
        );
    }
    Ok(orphans)
}
