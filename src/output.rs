//! CLI output formatting for all pipeline stages.
//!
//! Each stage report is shown as a short inventory: one header line per
//! entity (category, skipped page) with indented detail lines beneath it,
//! and a closing summary line.
//!
//! ## Build
//!
//! ```text
//! 001 cats (2 listings, 25 detail pages)
//!     27 written, 0 unchanged
//!     Orphan: cats/page3.html (listing beyond 2)
//! Keywords: 0 existing, 2 fresh, 23 derived (25 total)
//! ```
//!
//! ## Patch
//!
//! ```text
//! Skipped
//!     cats/broken.html
//!         Reason: Skipping site/cats/broken.html: not valid UTF-8
//! Patched 40 pages: 3 rewritten, 12 normalized, 27 unchanged, 1 skipped
//! Keywords: 38 existing, 2 fresh, 1 derived (41 total)
//! ```
//!
//! ## Sitemap
//!
//! ```text
//! Sitemap: 52 URLs (50 dates kept), written
//! robots.txt: unchanged
//! ```
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::graph::OrphanReason;
use crate::pipeline::{BuildReport, PatchReport, RunReport};
use crate::sitemap::SitemapReport;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{n} {}", if n == 1 { one } else { many })
}

fn written_word(written: bool, dry_run: bool) -> &'static str {
    match (written, dry_run) {
        (true, true) => "would be written",
        (true, false) => "written",
        (false, _) => "unchanged",
    }
}

// ============================================================================
// Build
// ============================================================================

pub fn format_build_report(report: &BuildReport, dry_run: bool) -> Vec<String> {
    let mut lines = Vec::new();
    let verb = if dry_run { "would be written" } else { "written" };

    for (i, cat) in report.categories.iter().enumerate() {
        lines.push(format!(
            "{} {} ({}, {})",
            format_index(i + 1),
            cat.name,
            plural(cat.listings, "listing", "listings"),
            plural(cat.details, "detail page", "detail pages"),
        ));
        lines.push(format!(
            "{}{} {verb}, {} unchanged",
            indent(1),
            cat.written,
            cat.unchanged
        ));
        if cat.failed > 0 {
            lines.push(format!("{}{} failed", indent(1), cat.failed));
        }
        for orphan in &cat.orphans {
            let reason = match &orphan.reason {
                OrphanReason::ListingBeyondEnd { listing_count } => {
                    format!("listing beyond {listing_count}")
                }
                OrphanReason::MissingImage => "image missing".to_string(),
            };
            lines.push(format!("{}Orphan: {} ({reason})", indent(1), orphan.page));
        }
    }

    if report.categories.is_empty() {
        lines.push("No categories found".to_string());
    }
    lines.push(format!("Keywords: {}", report.allocations));
    lines
}

pub fn print_build_report(report: &BuildReport, dry_run: bool) {
    for line in format_build_report(report, dry_run) {
        println!("{}", line);
    }
}

// ============================================================================
// Patch
// ============================================================================

pub fn format_patch_report(report: &PatchReport) -> Vec<String> {
    let mut lines = Vec::new();

    if !report.skipped.is_empty() {
        lines.push("Skipped".to_string());
        for (page, reason) in &report.skipped {
            lines.push(format!("{}{}", indent(1), page));
            lines.push(format!("{}Reason: {}", indent(2), reason));
        }
    }

    lines.push(format!(
        "Patched {}: {} rewritten, {} normalized, {} unchanged, {} skipped",
        plural(report.scanned, "page", "pages"),
        report.rewritten,
        report.normalized,
        report.unchanged,
        report.skipped.len(),
    ));
    lines.push(format!("Keywords: {}", report.allocations));
    lines
}

pub fn print_patch_report(report: &PatchReport) {
    for line in format_patch_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Sitemap
// ============================================================================

pub fn format_sitemap_report(report: Option<&SitemapReport>, dry_run: bool) -> Vec<String> {
    match report {
        None => vec!["Sitemap: skipped (no domain in config.json)".to_string()],
        Some(r) => vec![
            format!(
                "Sitemap: {} ({} dates kept), {}",
                plural(r.entries, "URL", "URLs"),
                r.preserved,
                written_word(r.sitemap_written, dry_run),
            ),
            format!("robots.txt: {}", written_word(r.robots_written, dry_run)),
        ],
    }
}

pub fn print_sitemap_report(report: Option<&SitemapReport>, dry_run: bool) {
    for line in format_sitemap_report(report, dry_run) {
        println!("{}", line);
    }
}

// ============================================================================
// Full run
// ============================================================================

pub fn format_run_report(report: &RunReport, dry_run: bool) -> Vec<String> {
    let mut lines = vec!["==> Build".to_string()];
    lines.extend(format_build_report(&report.build, dry_run));
    lines.push("==> Patch".to_string());
    lines.extend(format_patch_report(&report.patch));
    lines.push("==> Sitemap".to_string());
    lines.extend(format_sitemap_report(report.sitemap.as_ref(), dry_run));
    lines
}

pub fn print_run_report(report: &RunReport, dry_run: bool) {
    for line in format_run_report(report, dry_run) {
        println!("{}", line);
    }
}
