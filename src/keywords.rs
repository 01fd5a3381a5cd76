//! Keyword pools.
//!
//! A pool is the ordered list of candidate keywords for one category.
//! Sources are plain text files, one keyword per line, looked up in order:
//!
//! 1. `selected_keywords/<category>.txt`: curated list
//! 2. `keywords/<category>.txt`: raw list
//! 3. `keywords/all.txt`: global fallback
//!
//! Lines are normalized ([`normalize_keyword`]) and de-duplicated keeping
//! the first occurrence. A missing source is not an error: the pool is
//! simply empty and callers derive a keyword from the page instead.

use crate::config::KeywordsConfig;
use crate::naming::normalize_keyword;
use crate::types::PageId;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where a pool's keywords came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolSource {
    Selected(PathBuf),
    Category(PathBuf),
    Fallback(PathBuf),
    /// No source file exists.
    None,
}

#[derive(Debug, Clone)]
pub struct KeywordPool {
    keywords: Vec<String>,
    source: PoolSource,
}

impl KeywordPool {
    pub fn empty() -> Self {
        Self {
            keywords: Vec::new(),
            source: PoolSource::None,
        }
    }

    /// Build a pool from raw lines (normalizes and de-duplicates).
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>, source: PoolSource) -> Self {
        let mut seen = HashSet::new();
        let keywords = lines
            .into_iter()
            .map(normalize_keyword)
            .filter(|k| !k.is_empty())
            .filter(|k| seen.insert(k.clone()))
            .collect();
        Self { keywords, source }
    }

    /// Load the pool for `category` (a category's leaf directory name,
    /// matched lower-cased).
    pub fn load(root: &Path, config: &KeywordsConfig, category: &str) -> Self {
        match category_source(root, config, &category.to_lowercase()) {
            Some(source) => read_pool(source),
            None => Self::load_fallback(root, config),
        }
    }

    /// Load the pool for an arbitrary page: the deepest directory of
    /// `page` that has a category list wins, else the global list.
    pub fn for_page(root: &Path, config: &KeywordsConfig, page: &PageId) -> Self {
        page.dir_components()
            .iter()
            .rev()
            .find_map(|dir| category_source(root, config, &dir.to_lowercase()))
            .map(read_pool)
            .unwrap_or_else(|| Self::load_fallback(root, config))
    }

    fn load_fallback(root: &Path, config: &KeywordsConfig) -> Self {
        let path = root.join(&config.dir).join(&config.fallback);
        if path.is_file() {
            read_pool(PoolSource::Fallback(path))
        } else {
            Self::empty()
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn source(&self) -> &PoolSource {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

fn category_source(root: &Path, config: &KeywordsConfig, category: &str) -> Option<PoolSource> {
    if category.is_empty() {
        return None;
    }
    let file = format!("{category}.txt");
    let selected = root.join(&config.selected_dir).join(&file);
    if selected.is_file() {
        return Some(PoolSource::Selected(selected));
    }
    let raw = root.join(&config.dir).join(&file);
    raw.is_file().then_some(PoolSource::Category(raw))
}

fn read_pool(source: PoolSource) -> KeywordPool {
    let path = match &source {
        PoolSource::Selected(p) | PoolSource::Category(p) | PoolSource::Fallback(p) => p.clone(),
        PoolSource::None => return KeywordPool::empty(),
    };
    // Keyword lists come from assorted scrapers; tolerate bad bytes.
    let text = match fs::read(&path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "keyword list unreadable");
            return KeywordPool::empty();
        }
    };
    let pool = KeywordPool::from_lines(text.lines(), source);
    debug!(path = %path.display(), keywords = pool.len(), "loaded keyword pool");
    pool
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::write_keywords;
    use tempfile::TempDir;

    fn cfg() -> KeywordsConfig {
        KeywordsConfig::default()
    }

    // =========================================================================
    // Normalization
    // =========================================================================

    #[test]
    fn lines_normalized_and_deduplicated_in_order() {
        let pool = KeywordPool::from_lines(
            ["  Red  Dress ", "blue hat", "", "red dress", "BLUE HAT", "green"],
            PoolSource::None,
        );
        assert_eq!(pool.keywords(), ["red dress", "blue hat", "green"]);
    }

    // =========================================================================
    // Source resolution
    // =========================================================================

    #[test]
    fn selected_list_wins() {
        let tmp = TempDir::new().unwrap();
        write_keywords(tmp.path(), "selected_keywords/cats.txt", &["curated"]);
        write_keywords(tmp.path(), "keywords/cats.txt", &["raw"]);
        write_keywords(tmp.path(), "keywords/all.txt", &["global"]);

        let pool = KeywordPool::load(tmp.path(), &cfg(), "cats");
        assert_eq!(pool.keywords(), ["curated"]);
        assert!(matches!(pool.source(), PoolSource::Selected(_)));
    }

    #[test]
    fn category_list_before_fallback() {
        let tmp = TempDir::new().unwrap();
        write_keywords(tmp.path(), "keywords/cats.txt", &["raw"]);
        write_keywords(tmp.path(), "keywords/all.txt", &["global"]);

        let pool = KeywordPool::load(tmp.path(), &cfg(), "cats");
        assert_eq!(pool.keywords(), ["raw"]);
    }

    #[test]
    fn fallback_used_when_no_category_list() {
        let tmp = TempDir::new().unwrap();
        write_keywords(tmp.path(), "keywords/all.txt", &["global"]);

        let pool = KeywordPool::load(tmp.path(), &cfg(), "dogs");
        assert_eq!(pool.keywords(), ["global"]);
        assert!(matches!(pool.source(), PoolSource::Fallback(_)));
    }

    #[test]
    fn missing_everything_is_empty_not_error() {
        let tmp = TempDir::new().unwrap();
        let pool = KeywordPool::load(tmp.path(), &cfg(), "cats");
        assert!(pool.is_empty());
        assert_eq!(pool.source(), &PoolSource::None);
    }

    #[test]
    fn invalid_utf8_is_tolerated() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("keywords")).unwrap();
        fs::write(tmp.path().join("keywords/cats.txt"), b"ok one\n\xff\xfe\nok two\n").unwrap();

        let pool = KeywordPool::load(tmp.path(), &cfg(), "cats");
        assert!(pool.keywords().contains(&"ok one".to_string()));
        assert!(pool.keywords().contains(&"ok two".to_string()));
    }

    // =========================================================================
    // Page lookup
    // =========================================================================

    #[test]
    fn for_page_prefers_deepest_directory() {
        let tmp = TempDir::new().unwrap();
        write_keywords(tmp.path(), "keywords/travel.txt", &["travel kw"]);
        write_keywords(tmp.path(), "keywords/japan.txt", &["japan kw"]);

        let page = PageId::new("travel/japan/001.html");
        let pool = KeywordPool::for_page(tmp.path(), &cfg(), &page);
        assert_eq!(pool.keywords(), ["japan kw"]);

        let page = PageId::new("travel/italy/001.html");
        let pool = KeywordPool::for_page(tmp.path(), &cfg(), &page);
        assert_eq!(pool.keywords(), ["travel kw"]);
    }

    #[test]
    fn for_page_matches_directory_case_insensitively() {
        let tmp = TempDir::new().unwrap();
        write_keywords(tmp.path(), "keywords/cats.txt", &["kitten"]);

        let page = PageId::new("Cats/001.html");
        let pool = KeywordPool::for_page(tmp.path(), &cfg(), &page);
        assert_eq!(pool.keywords(), ["kitten"]);
    }

    #[test]
    fn for_top_level_page_uses_fallback() {
        let tmp = TempDir::new().unwrap();
        write_keywords(tmp.path(), "keywords/all.txt", &["global"]);

        let pool = KeywordPool::for_page(tmp.path(), &cfg(), &PageId::new("index.html"));
        assert_eq!(pool.keywords(), ["global"]);
    }
}
