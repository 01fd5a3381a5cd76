//! Category discovery.
//!
//! First stage of the build. A site root holds one directory per category;
//! a category is any non-skipped directory under the root that directly
//! contains image files:
//!
//! ```text
//! site/
//! ├── config.json
//! ├── keywords/            # skipped (see [scan] skip_dirs)
//! │   ├── cats.txt
//! │   └── all.txt
//! ├── cats/                # category "cats"
//! │   ├── 001.jpg
//! │   ├── 002.jpg
//! │   ├── page1.html       # generated
//! │   └── 001.html         # generated
//! └── travel/
//!     └── japan/           # category "travel/japan"
//!         └── tokyo.webp
//! ```
//!
//! Images are sorted by file name (byte order), never by directory
//! iteration order, so pagination is stable across runs and machines.

use crate::config::ScanConfig;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// A directory of images that becomes one paginated gallery.
#[derive(Debug, Clone)]
pub struct Category {
    /// Root-relative, `/`-separated directory (`cats`, `travel/japan`).
    pub name: String,
    pub dir: PathBuf,
    /// Sorted by file name.
    pub images: Vec<ImageAsset>,
}

/// One source image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAsset {
    pub file_name: String,
    /// Name of the owning category.
    pub category: String,
    pub modified: Option<SystemTime>,
}

impl Category {
    /// Last path segment, used for keyword pool lookup and display.
    pub fn leaf_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// Discover every category under `root`, sorted by name.
pub fn scan(root: &Path, config: &ScanConfig) -> Result<Vec<Category>, ScanError> {
    let mut categories = Vec::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !e.file_type().is_dir() || !is_skipped(e.path(), root, config));

    for entry in walker {
        let entry = entry.map_err(|source| ScanError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let images = collect_images(entry.path())?;
        if images.is_empty() {
            continue;
        }
        let Some(name) = relative_name(root, entry.path()) else {
            continue;
        };
        let images = images
            .into_iter()
            .map(|(file_name, modified)| ImageAsset {
                file_name,
                category: name.clone(),
                modified,
            })
            .collect();
        categories.push(Category {
            name,
            dir: entry.path().to_path_buf(),
            images,
        });
    }

    categories.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(categories)
}

/// Every `*.html` file under `root` outside skipped directories, in walk
/// order (sorted by file name at each level). Backups (`*.html.bak`) are
/// not documents.
pub fn html_documents(root: &Path, config: &ScanConfig) -> Result<Vec<PathBuf>, ScanError> {
    let walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !e.file_type().is_dir() || !is_skipped(e.path(), root, config));

    let mut documents = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|source| ScanError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        let is_html = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("html"));
        if entry.file_type().is_file() && is_html {
            documents.push(entry.into_path());
        }
    }
    Ok(documents)
}

/// Hidden directories are always skipped; `skip_dirs` only applies to
/// top-level names.
fn is_skipped(path: &Path, root: &Path, config: &ScanConfig) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    if name.starts_with('.') {
        return true;
    }
    let top_level = path.parent() == Some(root);
    top_level && config.skip_dirs.iter().any(|s| s.as_str() == name)
}

fn collect_images(dir: &Path) -> Result<Vec<(String, Option<SystemTime>)>, ScanError> {
    let mut images = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !is_image(&path) {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let modified = entry.metadata().and_then(|m| m.modified()).ok();
        images.push((file_name, modified));
    }
    images.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(images)
}

pub fn is_image(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    IMAGE_EXTENSIONS.contains(&ext.as_str())
}

fn relative_name(root: &Path, dir: &Path) -> Option<String> {
    let rel = dir.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
