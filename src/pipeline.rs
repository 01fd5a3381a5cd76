//! Stage orchestration.
//!
//! ```text
//! build    scan → page graph → render → write changed pages (+ orphan report)
//! patch    every *.html → quality gate + normalization → backup + write
//! sitemap  category *.html → sitemap.xml + robots.txt
//! ```
//!
//! Each stage opens its own keyword ledger and drops it (releasing the
//! lock) when done. Per-page failures are logged and counted without
//! stopping the stage; configuration, scan and ledger failures abort it.
//!
//! In dry-run mode the ledger is an in-memory copy of the on-disk state
//! and nothing is written; reports describe what a real run would change.

use crate::assign::{AllocationStats, KeywordAssigner};
use crate::config::{self, ConfigError, FarmConfig, SiteConfig};
use crate::fsio::write_if_changed;
use crate::graph::{self, Orphan};
use crate::ledger::{AllocationLedger, FileStore, LedgerError, LedgerStore, MemoryStore};
use crate::patch::{DocumentPatcher, PatchError};
use crate::render::Renderer;
use crate::scan::{self, ScanError};
use crate::sitemap::{self, SitemapError, SitemapReport};
use crate::synth::ContentSynthesizer;
use crate::types::PageId;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Sitemap(#[from] SitemapError),
}

/// Everything the stages need to know about one site.
#[derive(Debug, Clone)]
pub struct Site {
    pub root: PathBuf,
    pub config: FarmConfig,
    pub site: SiteConfig,
    pub brand: String,
}

impl Site {
    /// Load `farm.toml` and `config.json` from `root`.
    ///
    /// `shared_ledger` overrides `keywords.shared_consumed`.
    pub fn load(
        root: &Path,
        brand: Option<&str>,
        shared_ledger: Option<&Path>,
    ) -> Result<Self, PipelineError> {
        let mut farm = config::load_config(root)?;
        if let Some(shared) = shared_ledger {
            farm.keywords.shared_consumed = Some(shared.to_string_lossy().into_owned());
        }
        let site = config::load_site_config(root)?;
        let brand = config::resolve_brand(brand, &site, root);
        Ok(Self {
            root: root.to_path_buf(),
            config: farm,
            site,
            brand,
        })
    }

    pub fn domain(&self) -> Option<&str> {
        self.site.domain()
    }

    fn synthesizer(&self) -> ContentSynthesizer {
        ContentSynthesizer::new(&self.config.content, &self.brand)
    }

    /// Assigner over the site's ledger. Dry runs get an unlocked in-memory
    /// copy instead of the file store.
    pub fn open_assigner(&self, dry_run: bool) -> Result<KeywordAssigner, PipelineError> {
        let keywords = &self.config.keywords;
        let mapping = keywords.ledger_path(&self.root);
        let consumed = keywords.consumed_path(&self.root);
        let store: Box<dyn LedgerStore> = if dry_run {
            Box::new(MemoryStore::seeded(FileStore::read_state(&mapping, &consumed)?))
        } else {
            Box::new(FileStore::open(&mapping, &consumed)?)
        };
        let ledger = AllocationLedger::open(store)?;
        Ok(KeywordAssigner::new(&self.root, keywords, ledger))
    }
}

// =============================================================================
// Build
// =============================================================================

#[derive(Debug, Default, Clone)]
pub struct CategoryBuild {
    pub name: String,
    pub listings: usize,
    pub details: usize,
    pub written: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub orphans: Vec<Orphan>,
}

#[derive(Debug, Default, Clone)]
pub struct BuildReport {
    pub categories: Vec<CategoryBuild>,
    pub allocations: AllocationStats,
}

/// Render and write every category's pages.
pub fn build_site(site: &Site, dry_run: bool) -> Result<BuildReport, PipelineError> {
    let categories = scan::scan(&site.root, &site.config.scan)?;
    let mut assigner = site.open_assigner(dry_run)?;
    let synth = site.synthesizer();
    let renderer = Renderer::new(&synth, site.domain());

    let mut report = BuildReport::default();
    for category in &categories {
        let graph = graph::build(category, site.config.pages.page_size);
        let pages = renderer.render_graph(&graph, &mut assigner)?;

        let mut summary = CategoryBuild {
            name: category.name.clone(),
            listings: graph.listing_count(),
            details: graph.details.len(),
            ..CategoryBuild::default()
        };
        for page in &pages {
            let path = site.root.join(page.id.as_str());
            let result = if dry_run {
                Ok(fs::read(&path).map_or(true, |old| old != page.html.as_bytes()))
            } else {
                write_if_changed(&path, page.html.as_bytes())
            };
            match result {
                Ok(true) => summary.written += 1,
                Ok(false) => summary.unchanged += 1,
                Err(e) => {
                    warn!(page = %page.id, error = %e, "failed to write page");
                    summary.failed += 1;
                }
            }
        }

        summary.orphans = graph::find_orphans(category, &graph).unwrap_or_else(|e| {
            warn!(category = %category.name, error = %e, "orphan check failed");
            Vec::new()
        });
        info!(
            category = %category.name,
            written = summary.written,
            unchanged = summary.unchanged,
            "category built"
        );
        report.categories.push(summary);
    }

    report.allocations = assigner.stats().clone();
    Ok(report)
}

// =============================================================================
// Patch
// =============================================================================

#[derive(Debug, Default, Clone)]
pub struct PatchReport {
    pub scanned: usize,
    pub rewritten: usize,
    pub normalized: usize,
    pub unchanged: usize,
    /// Pages left untouched because they could not be read or parsed.
    pub skipped: Vec<(PageId, String)>,
    pub allocations: AllocationStats,
}

/// Patch every HTML document under the site root.
pub fn patch_site(site: &Site, dry_run: bool) -> Result<PatchReport, PipelineError> {
    let documents = scan::html_documents(&site.root, &site.config.scan)?;
    if site.domain().is_none() {
        warn!(
            target: "gallery_farm::patch",
            "no domain in config.json; skipping canonical and JSON-LD normalization"
        );
    }

    let mut assigner = site.open_assigner(dry_run)?;
    let patcher = DocumentPatcher::new(&site.config.quality, site.synthesizer(), site.domain());

    let mut report = PatchReport::default();
    for path in documents {
        let Some(page) = PageId::from_path(&site.root, &path) else {
            continue;
        };
        report.scanned += 1;
        match patcher.patch_file(&path, &page, &mut assigner, dry_run) {
            Ok(outcome) => {
                if outcome.rewritten {
                    report.rewritten += 1;
                }
                if outcome.normalized {
                    report.normalized += 1;
                }
                if !outcome.changed() {
                    report.unchanged += 1;
                }
            }
            Err(PatchError::Ledger(e)) => return Err(e.into()),
            Err(e) => {
                warn!(target: "gallery_farm::patch", page = %page, error = %e, "page skipped");
                report.skipped.push((page, e.to_string()));
            }
        }
    }

    report.allocations = assigner.stats().clone();
    Ok(report)
}

// =============================================================================
// Sitemap
// =============================================================================

/// Write the sitemap; `None` when no domain is configured.
pub fn write_site_sitemap(
    site: &Site,
    dry_run: bool,
) -> Result<Option<SitemapReport>, PipelineError> {
    let Some(domain) = site.domain() else {
        warn!(
            target: "gallery_farm::patch",
            "no domain in config.json; skipping sitemap"
        );
        return Ok(None);
    };
    let categories = scan::scan(&site.root, &site.config.scan)?;
    let report = sitemap::write_sitemap(&site.root, &categories, domain, dry_run)?;
    Ok(Some(report))
}

// =============================================================================
// Full run
// =============================================================================

#[derive(Debug, Default, Clone)]
pub struct RunReport {
    pub build: BuildReport,
    pub patch: PatchReport,
    pub sitemap: Option<SitemapReport>,
}

/// build → patch → sitemap.
pub fn run(site: &Site, dry_run: bool) -> Result<RunReport, PipelineError> {
    let build = build_site(site, dry_run)?;
    let patch = patch_site(site, dry_run)?;
    let sitemap = write_site_sitemap(site, dry_run)?;
    Ok(RunReport {
        build,
        patch,
        sitemap,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        numbered_images, read, thin_page, touch_images, write_keywords, write_site_config,
    };
    use tempfile::TempDir;

    fn site(root: &Path) -> Site {
        Site::load(root, None, None).unwrap()
    }

    // =========================================================================
    // Site loading
    // =========================================================================

    #[test]
    fn brand_falls_back_to_site_name() {
        let tmp = TempDir::new().unwrap();
        write_site_config(tmp.path(), "https://x.test/");
        let s = site(tmp.path());
        assert_eq!(s.brand, "Test Site");
        assert_eq!(s.domain(), Some("https://x.test"));

        let s = Site::load(tmp.path(), Some("Override"), None).unwrap();
        assert_eq!(s.brand, "Override");
    }

    #[test]
    fn shared_ledger_flag_overrides_config() {
        let tmp = TempDir::new().unwrap();
        let shared = tmp.path().join("shared/used.txt");
        let s = Site::load(tmp.path(), None, Some(&shared)).unwrap();
        assert_eq!(s.config.keywords.consumed_path(tmp.path()), shared);
    }

    #[test]
    fn malformed_site_config_is_fatal() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.json"), "{ nope").unwrap();
        assert!(matches!(
            Site::load(tmp.path(), None, None),
            Err(PipelineError::Config(_))
        ));
    }

    // =========================================================================
    // Stages
    // =========================================================================

    #[test]
    fn build_twice_writes_once() {
        let tmp = TempDir::new().unwrap();
        touch_images(&tmp.path().join("cats"), &numbered_images(3));
        let s = site(tmp.path());

        let first = build_site(&s, false).unwrap();
        assert_eq!(first.categories[0].written, 4);
        let second = build_site(&s, false).unwrap();
        assert_eq!(second.categories[0].written, 0);
        assert_eq!(second.categories[0].unchanged, 4);
        assert_eq!(second.allocations.existing, 3);
    }

    #[test]
    fn dry_run_leaves_tree_and_ledger_untouched() {
        let tmp = TempDir::new().unwrap();
        touch_images(&tmp.path().join("cats"), &numbered_images(2));
        write_keywords(tmp.path(), "keywords/cats.txt", &["a", "b"]);
        let s = site(tmp.path());

        let report = build_site(&s, true).unwrap();
        assert_eq!(report.categories[0].written, 3);
        assert_eq!(report.allocations.fresh, 2);
        assert!(!tmp.path().join("cats/page1.html").exists());
        assert!(!tmp.path().join("keywords/.kw_map.json").exists());
    }

    #[test]
    fn patch_skips_broken_pages_and_continues() {
        let tmp = TempDir::new().unwrap();
        write_site_config(tmp.path(), "https://x.test");
        fs::create_dir_all(tmp.path().join("cats")).unwrap();
        fs::write(tmp.path().join("cats/bad.html"), b"\xff\xfe").unwrap();
        fs::write(tmp.path().join("cats/good.html"), thin_page("Cats")).unwrap();
        let s = site(tmp.path());

        let report = patch_site(&s, false).unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].0.as_str(), "cats/bad.html");
        assert_eq!(report.rewritten, 1);
        assert!(read(tmp.path(), "cats/good.html").contains("rel=\"canonical\""));
        assert_eq!(fs::read(tmp.path().join("cats/bad.html")).unwrap(), b"\xff\xfe");
    }

    #[test]
    fn held_lock_aborts_stage() {
        let tmp = TempDir::new().unwrap();
        touch_images(&tmp.path().join("cats"), &numbered_images(1));
        let s = site(tmp.path());
        let _held = s.open_assigner(false).unwrap();

        assert!(matches!(
            build_site(&s, false),
            Err(PipelineError::Ledger(LedgerError::Locked(_)))
        ));
    }

    #[test]
    fn sitemap_needs_domain() {
        let tmp = TempDir::new().unwrap();
        touch_images(&tmp.path().join("cats"), &numbered_images(1));
        assert!(write_site_sitemap(&site(tmp.path()), false).unwrap().is_none());
    }
}
