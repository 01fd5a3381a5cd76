//! Shared test utilities for the gallery-farm test suite.
//!
//! Builds site fixtures inside a temp directory: image stubs, keyword
//! lists, a `config.json`, and thin HTML pages that fail the quality gate.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! touch_images(&tmp.path().join("cats"), &numbered_images(25));
//! write_keywords(tmp.path(), "keywords/cats.txt", &["a", "b"]);
//! write_site_config(tmp.path(), "https://x.test");
//! ```

use std::fs;
use std::path::Path;

// =========================================================================
// Fixture setup
// =========================================================================

/// Create `dir` and write a few placeholder bytes per image name.
pub fn touch_images(dir: &Path, names: &[impl AsRef<str>]) {
    fs::create_dir_all(dir).unwrap();
    for name in names {
        fs::write(dir.join(name.as_ref()), b"\xff\xd8\xff").unwrap();
    }
}

/// `001.jpg` .. `{n:03}.jpg`.
pub fn numbered_images(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("{i:03}.jpg")).collect()
}

/// Write a keyword list at `rel` (relative to `root`), one per line.
pub fn write_keywords(root: &Path, rel: &str, keywords: &[&str]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, keywords.join("\n") + "\n").unwrap();
}

/// Write a `config.json` carrying `domain`.
pub fn write_site_config(root: &Path, domain: &str) {
    let json = serde_json::json!({ "domain": domain, "site_name": "Test Site" });
    fs::write(root.join("config.json"), json.to_string()).unwrap();
}

/// A minimal page that fails every quality threshold.
pub fn thin_page(heading: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<title>Hi</title>\n</head>\n<body>\n<h1>{heading}</h1>\n<img src=\"001.jpg\">\n</body>\n</html>\n"
    )
}

/// A page that passes every quality threshold with the default config.
pub fn rich_page() -> String {
    let body = "Long form copy about the gallery. ".repeat(10);
    format!(
        "<html><head><title>A perfectly reasonable page title for testing</title>\
         <meta name=\"description\" content=\"{desc}\"></head>\
         <body><h1>Gallery</h1><p>{body}</p></body></html>",
        desc = "Description text that is long enough to pass. ".repeat(3),
    )
}

// =========================================================================
// Assertions
// =========================================================================

/// Number of non-overlapping occurrences of `needle` in `haystack`.
pub fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

/// Read a file under `root` as a string. Panics with the path on failure.
pub fn read(root: &Path, rel: &str) -> String {
    fs::read_to_string(root.join(rel))
        .unwrap_or_else(|e| panic!("failed to read {rel}: {e}"))
}
