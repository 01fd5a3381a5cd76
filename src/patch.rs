//! In-place page patching.
//!
//! Two independent sub-operations run on every page:
//!
//! 1. **Content rewrite**, gated on quality. When the current title, meta
//!    description or visible body text is shorter than the configured
//!    threshold, the page gets a keyword from the ledger and freshly
//!    synthesized title, description and marker-delimited paragraph.
//!    Synthesized text always clears the thresholds, so a rewritten page
//!    is left alone on the next run.
//! 2. **Normalization**, whenever a domain is known: exactly one canonical
//!    link at `domain/page`, and a page-typed JSON-LD block whose `url`
//!    matches.
//!
//! Before the first write to a file its original bytes are kept as
//! `<file>.bak`. Writes are atomic.

use crate::assign::KeywordAssigner;
use crate::config::QualityConfig;
use crate::document::{Document, DocumentError, Snapshot};
use crate::fsio::{backup_once, write_atomic};
use crate::ledger::LedgerError;
use crate::naming::parse_listing_number;
use crate::synth::ContentSynthesizer;
use crate::types::{PageId, PageKind};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("Skipping {path}: {source}")]
    Document {
        path: PathBuf,
        source: DocumentError,
    },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("IO error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

impl PatchError {
    /// Ledger failures abort the run; everything else only skips one file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Ledger(_))
    }
}

/// What a patch did to one document.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PatchOutcome {
    /// Title, description or paragraph text changed.
    pub rewritten: bool,
    /// Canonical link or JSON-LD url was fixed.
    pub normalized: bool,
}

impl PatchOutcome {
    pub fn changed(&self) -> bool {
        self.rewritten || self.normalized
    }
}

pub struct DocumentPatcher {
    quality: QualityConfig,
    synth: ContentSynthesizer,
    domain: Option<String>,
}

impl DocumentPatcher {
    pub fn new(quality: &QualityConfig, synth: ContentSynthesizer, domain: Option<&str>) -> Self {
        Self {
            quality: quality.clone(),
            synth,
            domain: domain.map(String::from),
        }
    }

    /// True when any of title, description or body text is too short.
    pub fn needs_rewrite(&self, snap: &Snapshot) -> bool {
        snap.title_len() < self.quality.min_title
            || snap.description_len() < self.quality.min_description
            || snap.body_text_len < self.quality.min_body
    }

    /// `domain/page`, when a domain is configured.
    pub fn canonical_url(&self, page: &PageId) -> Option<String> {
        self.domain.as_deref().map(|d| format!("{d}/{page}"))
    }

    /// Patch `doc` in memory.
    pub fn patch(
        &self,
        doc: &mut Document,
        page: &PageId,
        assigner: &mut KeywordAssigner,
    ) -> Result<PatchOutcome, LedgerError> {
        let mut outcome = PatchOutcome::default();
        let snap = doc.snapshot();

        if self.needs_rewrite(&snap) {
            let allocation = assigner.assign(page, snap.first_heading.as_deref())?;
            let text = self
                .synth
                .synthesize(&allocation.keyword, page.as_str(), page_kind(page));
            let title = doc.set_title(&text.title);
            let description = doc.set_meta_description(&text.description);
            let block = doc.upsert_generated_block(&text.paragraph);
            outcome.rewritten = title || description || block;
            if outcome.rewritten {
                debug!(page = %page, keyword = %allocation.keyword, "rewrote page text");
            }
        }

        if let Some(url) = self.canonical_url(page) {
            let name = doc
                .snapshot()
                .title
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| page.file_stem().to_string());
            let canonical = doc.set_canonical(&url);
            let schema = doc.set_page_schema_url(&url, &name);
            outcome.normalized = canonical || schema;
        }

        Ok(outcome)
    }

    /// Patch the file at `path`, backing it up and rewriting it atomically
    /// when anything changed. With `dry_run` nothing is written.
    pub fn patch_file(
        &self,
        path: &Path,
        page: &PageId,
        assigner: &mut KeywordAssigner,
        dry_run: bool,
    ) -> Result<PatchOutcome, PatchError> {
        let io_err = |source| PatchError::Io {
            path: path.to_path_buf(),
            source,
        };
        let bytes = fs::read(path).map_err(io_err)?;
        let mut doc = Document::parse(&bytes).map_err(|source| PatchError::Document {
            path: path.to_path_buf(),
            source,
        })?;

        let outcome = self.patch(&mut doc, page, assigner)?;
        if outcome.changed() && !dry_run {
            backup_once(path).map_err(io_err)?;
            write_atomic(path, doc.source().as_bytes()).map_err(io_err)?;
        }
        Ok(outcome)
    }
}

fn page_kind(page: &PageId) -> PageKind {
    if parse_listing_number(page.file_name()).is_some() {
        PageKind::Listing
    } else {
        PageKind::Detail
    }
}
