//! Keyword assignment policy on top of the ledger.
//!
//! For each page the assigner:
//!
//! 1. returns the page's existing ledger entry, if any;
//! 2. otherwise finds the page's pool (deepest directory with a list, else
//!    the global list) and allocates from it;
//! 3. when the pool is empty, or exhausted under
//!    [`ExhaustionPolicy::Derive`], records a keyword derived from the page
//!    itself (first heading text, else the file stem).
//!
//! Under [`ExhaustionPolicy::Reuse`] an exhausted pool hands out an already
//! consumed keyword instead. Reuse and derivation are logged on the
//! `gallery_farm::allocation` target, separately from fresh allocations.

use crate::config::{ExhaustionPolicy, KeywordsConfig};
use crate::keywords::KeywordPool;
use crate::ledger::{Allocation, AllocationKind, AllocationLedger, LedgerError};
use crate::naming::{derive_keyword, normalize_keyword};
use crate::types::PageId;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Per-run allocation counters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AllocationStats {
    pub existing: u32,
    pub fresh: u32,
    pub reused: u32,
    pub derived: u32,
}

impl AllocationStats {
    fn note(&mut self, kind: AllocationKind) {
        match kind {
            AllocationKind::Existing => self.existing += 1,
            AllocationKind::Fresh => self.fresh += 1,
            AllocationKind::Reused => self.reused += 1,
            AllocationKind::Derived => self.derived += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.existing + self.fresh + self.reused + self.derived
    }
}

impl fmt::Display for AllocationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} existing, {} fresh, {} derived",
            self.existing, self.fresh, self.derived
        )?;
        if self.reused > 0 {
            write!(f, ", {} reused", self.reused)?;
        }
        write!(f, " ({} total)", self.total())
    }
}

pub struct KeywordAssigner {
    root: PathBuf,
    config: KeywordsConfig,
    ledger: AllocationLedger,
    /// Pools keyed by the page's directory.
    pools: HashMap<String, KeywordPool>,
    stats: AllocationStats,
}

impl KeywordAssigner {
    pub fn new(root: &Path, config: &KeywordsConfig, ledger: AllocationLedger) -> Self {
        Self {
            root: root.to_path_buf(),
            config: config.clone(),
            ledger,
            pools: HashMap::new(),
            stats: AllocationStats::default(),
        }
    }

    /// Keyword for `page`. `heading` is the page's first heading text, used
    /// ahead of the file stem when a keyword has to be derived.
    pub fn assign(
        &mut self,
        page: &PageId,
        heading: Option<&str>,
    ) -> Result<Allocation, LedgerError> {
        let allocation = self.allocate(page, heading)?;
        self.stats.note(allocation.kind);
        Ok(allocation)
    }

    fn allocate(&mut self, page: &PageId, heading: Option<&str>) -> Result<Allocation, LedgerError> {
        if let Some(existing) = self.ledger.get(page) {
            return Ok(Allocation {
                keyword: existing.to_string(),
                kind: AllocationKind::Existing,
            });
        }

        let pool = self.pool_for(page).keywords().to_vec();
        let from_pool = match self.config.on_exhausted {
            ExhaustionPolicy::Reuse => self.ledger.allocate(page, &pool)?,
            ExhaustionPolicy::Derive => self.ledger.allocate_unique(page, &pool)?,
        };
        if let Some(allocation) = from_pool {
            if allocation.kind == AllocationKind::Reused {
                warn!(
                    target: "gallery_farm::allocation",
                    page = %page,
                    keyword = %allocation.keyword,
                    "keyword pool exhausted; reusing keyword"
                );
            } else {
                debug!(page = %page, keyword = %allocation.keyword, "allocated keyword");
            }
            return Ok(allocation);
        }

        let keyword = derived_keyword(page, heading);
        if self.ledger.is_consumed(&keyword) {
            warn!(
                target: "gallery_farm::allocation",
                page = %page,
                keyword = %keyword,
                "derived keyword is already in use elsewhere"
            );
        }
        warn!(
            target: "gallery_farm::allocation",
            page = %page,
            keyword = %keyword,
            pool_size = pool.len(),
            "no pool keyword available; using derived keyword"
        );
        self.ledger.record(page, &keyword)
    }

    fn pool_for(&mut self, page: &PageId) -> &KeywordPool {
        let key = page.dir_components().join("/");
        self.pools
            .entry(key)
            .or_insert_with(|| KeywordPool::for_page(&self.root, &self.config, page))
    }

    pub fn stats(&self) -> &AllocationStats {
        &self.stats
    }

    pub fn ledger(&self) -> &AllocationLedger {
        &self.ledger
    }
}

/// Heading text when it has any, else the file stem.
fn derived_keyword(page: &PageId, heading: Option<&str>) -> String {
    heading
        .map(normalize_keyword)
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| derive_keyword(page.file_stem()))
}
