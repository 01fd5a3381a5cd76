//! Shared types used across all pipeline stages.
//!
//! A page is identified by its path relative to the site root, always with
//! `/` separators. The same logical page maps to the same [`PageId`] no
//! matter which directory the tool was started from, which is what makes
//! the allocation ledger keys and the random seeds stable across runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path};

/// Root-relative, `/`-separated identifier of a page (e.g. `cats/page1.html`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(String);

impl PageId {
    /// Build an id from a relative path string.
    ///
    /// Backslashes become `/`, and leading `./` or `/` segments are dropped so
    /// `./cats/a.html`, `/cats/a.html` and `cats\a.html` all name the same page.
    pub fn new(rel: impl Into<String>) -> Self {
        let raw = rel.into().replace('\\', "/");
        let parts: Vec<&str> = raw
            .split('/')
            .filter(|p| !p.is_empty() && *p != ".")
            .collect();
        Self(parts.join("/"))
    }

    /// Id of `path` relative to `root`. `None` when `path` is outside `root`
    /// or climbs out of it with `..`.
    pub fn from_path(root: &Path, path: &Path) -> Option<Self> {
        let rel = path.strip_prefix(root).ok()?;
        let mut parts = Vec::new();
        for component in rel.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                _ => return None,
            }
        }
        if parts.is_empty() {
            return None;
        }
        Some(Self(parts.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment (`page1.html`).
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// File name without its final extension (`page1`).
    pub fn file_stem(&self) -> &str {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => name,
            Some(dot) => &name[..dot],
        }
    }

    /// Directory segments leading to the file, outermost first.
    pub fn dir_components(&self) -> Vec<&str> {
        let mut parts: Vec<&str> = self.0.split('/').collect();
        parts.pop();
        parts
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The two shapes of generated page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    /// Paginated index of one chunk of a category's images.
    Listing,
    /// One page per image.
    Detail,
}

impl PageKind {
    /// Schema.org type used for the page-level JSON-LD block.
    pub fn schema_type(self) -> &'static str {
        match self {
            PageKind::Listing => "CollectionPage",
            PageKind::Detail => "ItemPage",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn page_id_normalizes_separators() {
        assert_eq!(PageId::new("cats\\page1.html").as_str(), "cats/page1.html");
        assert_eq!(PageId::new("./cats/page1.html").as_str(), "cats/page1.html");
        assert_eq!(PageId::new("/cats//page1.html").as_str(), "cats/page1.html");
    }

    #[test]
    fn page_id_from_path_is_root_relative() {
        let root = PathBuf::from("/srv/site");
        let id = PageId::from_path(&root, &root.join("cats").join("001.html")).unwrap();
        assert_eq!(id.as_str(), "cats/001.html");
    }

    #[test]
    fn page_id_from_path_outside_root_is_none() {
        let root = PathBuf::from("/srv/site");
        assert!(PageId::from_path(&root, Path::new("/srv/other/a.html")).is_none());
        assert!(PageId::from_path(&root, &root).is_none());
    }

    #[test]
    fn page_id_parts() {
        let id = PageId::new("cats/sub/IMG_01.html");
        assert_eq!(id.file_name(), "IMG_01.html");
        assert_eq!(id.file_stem(), "IMG_01");
        assert_eq!(id.dir_components(), vec!["cats", "sub"]);

        let top = PageId::new("index.html");
        assert!(top.dir_components().is_empty());
        assert_eq!(top.file_stem(), "index");
    }

    #[test]
    fn schema_types_per_kind() {
        assert_eq!(PageKind::Listing.schema_type(), "CollectionPage");
        assert_eq!(PageKind::Detail.schema_type(), "ItemPage");
    }
}
