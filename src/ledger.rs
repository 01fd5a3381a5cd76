//! Keyword allocation ledger.
//!
//! The ledger records which keyword each page was given and which keywords
//! have been consumed. A consumed keyword is never offered to another page
//! for the lifetime of the ledger, and a page that already has a keyword
//! always gets the same one back, so re-running the pipeline neither
//! re-allocates nor leaks keywords.
//!
//! ## Storage
//!
//! Persistence goes through the [`LedgerStore`] trait. [`FileStore`] keeps
//! two files:
//!
//! - **mapping** (`keywords/.kw_map.json`): pretty-printed JSON object
//!   `{ "cats/001.html": "red dress", ... }` with sorted keys. Rewritten
//!   atomically after every allocation.
//! - **consumed** (`keywords/used_keywords.txt`): one keyword per line,
//!   append-only. Several sites may point at one consumed file to keep
//!   keywords unique across all of them.
//!
//! The consumed keyword is appended before the mapping is rewritten, so a
//! crash between the two can only leave an unused keyword marked consumed,
//! never a mapped keyword that is free for reuse. Opening the ledger also
//! repairs that direction: any mapped keyword missing from the consumed
//! file is appended.
//!
//! [`FileStore`] holds an exclusive `<consumed>.lock` file while open. A
//! second concurrent run against the same consumed set fails with
//! [`LedgerError::Locked`] instead of racing.
//!
//! [`MemoryStore`] backs dry runs and tests.

use crate::fsio::{with_suffix, write_atomic};
use crate::naming::normalize_keyword;
use crate::rng::SeededRng;
use crate::types::PageId;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Ledger IO error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("Corrupt ledger mapping {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Ledger is locked by another run: {0}")]
    Locked(PathBuf),
}

impl LedgerError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Everything a store persists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerState {
    pub assignment: BTreeMap<PageId, String>,
    pub consumed: BTreeSet<String>,
}

/// Persistence backend for [`AllocationLedger`].
pub trait LedgerStore {
    fn load(&mut self) -> Result<LedgerState, LedgerError>;
    /// Replace the stored mapping with `assignment`.
    fn save_assignments(&mut self, assignment: &BTreeMap<PageId, String>)
    -> Result<(), LedgerError>;
    /// Add `keywords` to the stored consumed set.
    fn append_consumed(&mut self, keywords: &[String]) -> Result<(), LedgerError>;
}

// =============================================================================
// File store
// =============================================================================

/// Mapping JSON + append-only consumed list, guarded by a lock file.
#[derive(Debug)]
pub struct FileStore {
    mapping: PathBuf,
    consumed: PathBuf,
    _lock: LockGuard,
}

impl FileStore {
    /// Open the store, taking the consumed-set lock.
    pub fn open(mapping: &Path, consumed: &Path) -> Result<Self, LedgerError> {
        let lock = LockGuard::acquire(&with_suffix(consumed, ".lock"))?;
        Ok(Self {
            mapping: mapping.to_path_buf(),
            consumed: consumed.to_path_buf(),
            _lock: lock,
        })
    }

    /// Read both files without locking. Missing files read as empty.
    pub fn read_state(mapping: &Path, consumed: &Path) -> Result<LedgerState, LedgerError> {
        let assignment = match fs::read_to_string(mapping) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text).map_err(|source| LedgerError::Json {
                path: mapping.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(LedgerError::io(mapping, e)),
        };

        let consumed_set = match fs::read(consumed) {
            Ok(bytes) => String::from_utf8_lossy(&bytes)
                .lines()
                .map(normalize_keyword)
                .filter(|k| !k.is_empty())
                .collect(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeSet::new(),
            Err(e) => return Err(LedgerError::io(consumed, e)),
        };

        Ok(LedgerState {
            assignment,
            consumed: consumed_set,
        })
    }
}

impl LedgerStore for FileStore {
    fn load(&mut self) -> Result<LedgerState, LedgerError> {
        Self::read_state(&self.mapping, &self.consumed)
    }

    fn save_assignments(
        &mut self,
        assignment: &BTreeMap<PageId, String>,
    ) -> Result<(), LedgerError> {
        let mut json = serde_json::to_string_pretty(assignment).map_err(|source| {
            LedgerError::Json {
                path: self.mapping.clone(),
                source,
            }
        })?;
        json.push('\n');
        write_atomic(&self.mapping, json.as_bytes()).map_err(|e| LedgerError::io(&self.mapping, e))
    }

    fn append_consumed(&mut self, keywords: &[String]) -> Result<(), LedgerError> {
        if keywords.is_empty() {
            return Ok(());
        }
        let path = &self.consumed;
        let append = || -> io::Result<()> {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent)?;
            }
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            for keyword in keywords {
                writeln!(file, "{keyword}")?;
            }
            file.sync_all()
        };
        append().map_err(|e| LedgerError::io(path, e))
    }
}

/// Exclusive lock file, removed on drop.
#[derive(Debug)]
struct LockGuard {
    path: PathBuf,
    _file: File,
}

impl LockGuard {
    fn acquire(path: &Path) -> Result<Self, LedgerError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| LedgerError::io(parent, e))?;
        }
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                let _ = writeln!(
                    file,
                    "pid={}\nutc={}",
                    std::process::id(),
                    Utc::now().to_rfc3339()
                );
                Ok(Self {
                    path: path.to_path_buf(),
                    _file: file,
                })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(LedgerError::Locked(path.to_path_buf()))
            }
            Err(e) => Err(LedgerError::io(path, e)),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

// =============================================================================
// Memory store
// =============================================================================

/// In-memory store for dry runs and tests. Writes are kept, never persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: LedgerState,
}

impl MemoryStore {
    pub fn seeded(state: LedgerState) -> Self {
        Self { state }
    }
}

impl LedgerStore for MemoryStore {
    fn load(&mut self) -> Result<LedgerState, LedgerError> {
        Ok(self.state.clone())
    }

    fn save_assignments(
        &mut self,
        assignment: &BTreeMap<PageId, String>,
    ) -> Result<(), LedgerError> {
        self.state.assignment = assignment.clone();
        Ok(())
    }

    fn append_consumed(&mut self, keywords: &[String]) -> Result<(), LedgerError> {
        self.state.consumed.extend(keywords.iter().cloned());
        Ok(())
    }
}

// =============================================================================
// Ledger
// =============================================================================

/// How a page got its keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationKind {
    /// Already assigned on an earlier run.
    Existing,
    /// First unconsumed keyword from the pool.
    Fresh,
    /// Pool exhausted; a consumed pool keyword was handed out again.
    Reused,
    /// Not from a pool; derived from the page and recorded.
    Derived,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub keyword: String,
    pub kind: AllocationKind,
}

/// Page → keyword assignments plus the consumed set, persisted through a
/// [`LedgerStore`] after every change.
pub struct AllocationLedger {
    assignment: BTreeMap<PageId, String>,
    consumed: BTreeSet<String>,
    store: Box<dyn LedgerStore>,
}

impl std::fmt::Debug for AllocationLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllocationLedger")
            .field("assigned", &self.assignment.len())
            .field("consumed", &self.consumed.len())
            .finish()
    }
}

impl AllocationLedger {
    /// Load state from `store`, repairing the consumed set if a mapped
    /// keyword is missing from it.
    pub fn open(mut store: Box<dyn LedgerStore>) -> Result<Self, LedgerError> {
        let LedgerState {
            assignment,
            mut consumed,
        } = store.load()?;

        let missing: Vec<String> = assignment
            .values()
            .filter(|k| !consumed.contains(*k))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if !missing.is_empty() {
            warn!(
                target: "gallery_farm::allocation",
                count = missing.len(),
                "assigned keywords missing from consumed set; repairing"
            );
            store.append_consumed(&missing)?;
            consumed.extend(missing);
        }

        debug!(
            assigned = assignment.len(),
            consumed = consumed.len(),
            "ledger opened"
        );
        Ok(Self {
            assignment,
            consumed,
            store,
        })
    }

    pub fn get(&self, page: &PageId) -> Option<&str> {
        self.assignment.get(page).map(String::as_str)
    }

    pub fn is_consumed(&self, keyword: &str) -> bool {
        self.consumed.contains(keyword)
    }

    pub fn assigned_count(&self) -> usize {
        self.assignment.len()
    }

    pub fn consumed_count(&self) -> usize {
        self.consumed.len()
    }

    pub fn assignments(&self) -> &BTreeMap<PageId, String> {
        &self.assignment
    }

    /// Allocate a pool keyword for `page`, reusing one when the pool is
    /// exhausted. `None` only for an empty pool with no prior assignment.
    pub fn allocate(
        &mut self,
        page: &PageId,
        pool: &[String],
    ) -> Result<Option<Allocation>, LedgerError> {
        if let Some(existing) = self.existing(page) {
            return Ok(Some(existing));
        }
        let Some((start, free)) = self.pick(page, pool) else {
            return Ok(None);
        };
        let (keyword, kind) = match free {
            Some(keyword) => (keyword, AllocationKind::Fresh),
            None => (pool[start].clone(), AllocationKind::Reused),
        };
        self.commit(page, &keyword)?;
        Ok(Some(Allocation { keyword, kind }))
    }

    /// Allocate an unconsumed pool keyword for `page`. `None` when the pool
    /// is empty or exhausted; nothing is recorded in that case.
    pub fn allocate_unique(
        &mut self,
        page: &PageId,
        pool: &[String],
    ) -> Result<Option<Allocation>, LedgerError> {
        if let Some(existing) = self.existing(page) {
            return Ok(Some(existing));
        }
        let Some((_, Some(keyword))) = self.pick(page, pool) else {
            return Ok(None);
        };
        self.commit(page, &keyword)?;
        Ok(Some(Allocation {
            keyword,
            kind: AllocationKind::Fresh,
        }))
    }

    /// Record a keyword that did not come from a pool. A page that already
    /// has a keyword keeps it.
    pub fn record(&mut self, page: &PageId, keyword: &str) -> Result<Allocation, LedgerError> {
        if let Some(existing) = self.existing(page) {
            return Ok(existing);
        }
        let keyword = normalize_keyword(keyword);
        self.commit(page, &keyword)?;
        Ok(Allocation {
            keyword,
            kind: AllocationKind::Derived,
        })
    }

    fn existing(&self, page: &PageId) -> Option<Allocation> {
        self.assignment.get(page).map(|keyword| Allocation {
            keyword: keyword.clone(),
            kind: AllocationKind::Existing,
        })
    }

    /// Deterministic start offset for `page`, and the first unconsumed
    /// keyword scanning the pool circularly from there.
    fn pick(&self, page: &PageId, pool: &[String]) -> Option<(usize, Option<String>)> {
        if pool.is_empty() {
            return None;
        }
        let start = SeededRng::for_seed(&format!("kw:{page}")).below(pool.len());
        let free = (0..pool.len())
            .map(|i| &pool[(start + i) % pool.len()])
            .find(|k| !self.consumed.contains(k.as_str()))
            .cloned();
        Some((start, free))
    }

    fn commit(&mut self, page: &PageId, keyword: &str) -> Result<(), LedgerError> {
        if !self.consumed.contains(keyword) {
            self.store.append_consumed(&[keyword.to_string()])?;
            self.consumed.insert(keyword.to_string());
        }
        self.assignment.insert(page.clone(), keyword.to_string());
        self.store.save_assignments(&self.assignment)
    }
}
