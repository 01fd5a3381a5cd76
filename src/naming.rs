//! Centralized file naming for generated pages and keyword text.
//!
//! Every category directory holds two kinds of generated file:
//!
//! - **Listing pages**: `page1.html`, `page2.html`, ... one per chunk of images.
//! - **Detail pages**: `<image stem>.html`, one per image (`IMG_0001.jpg` →
//!   `IMG_0001.html`).
//!
//! Two images sharing a stem (`a.jpg` and `a.png`), or an image whose stem
//! looks like a listing page (`page3.jpg`), would fight over the same HTML
//! file. Those get the extension folded into the name instead:
//! `a-png.html`, `page3-jpg.html`.
//!
//! ## Keyword text
//!
//! Keywords are compared as normalized strings: trimmed, inner whitespace
//! collapsed to one space, lower-cased. When no keyword can be allocated a
//! page falls back to one derived from its file name, with `_` and `-`
//! turned into spaces (`sunny_beach-02` → "sunny beach 02").

use std::collections::HashMap;
use std::path::Path;

/// Keyword used when a file name yields nothing usable.
pub const FALLBACK_KEYWORD: &str = "photo gallery";

const LISTING_PREFIX: &str = "page";

/// File name of the 1-based listing page `number`.
pub fn listing_file_name(number: usize) -> String {
    format!("{LISTING_PREFIX}{number}.html")
}

/// Parse the page number out of a listing file name (`page12.html` → 12).
///
/// Only `page<digits>.html` with a number of at least 1 qualifies.
pub fn parse_listing_number(file_name: &str) -> Option<usize> {
    let stem = file_name.strip_suffix(".html")?;
    listing_stem_number(stem)
}

fn listing_stem_number(stem: &str) -> Option<usize> {
    let digits = stem.strip_prefix(LISTING_PREFIX)?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|n| *n >= 1)
}

/// Detail page file names for a list of image file names, in the same order.
///
/// Stems that collide with another image or with the listing naming scheme
/// get their extension appended (`a.png` → `a-png.html`).
pub fn detail_file_names(image_names: &[String]) -> Vec<String> {
    let mut stem_counts: HashMap<String, usize> = HashMap::new();
    for name in image_names {
        *stem_counts.entry(split_name(name).0.to_lowercase()).or_default() += 1;
    }

    image_names
        .iter()
        .map(|name| {
            let (stem, ext) = split_name(name);
            let clashes = stem_counts.get(&stem.to_lowercase()).copied().unwrap_or(0) > 1
                || listing_stem_number(stem).is_some();
            match ext {
                Some(ext) if clashes => format!("{stem}-{}.html", ext.to_lowercase()),
                _ => format!("{stem}.html"),
            }
        })
        .collect()
}

fn split_name(name: &str) -> (&str, Option<&str>) {
    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    let ext = path.extension().and_then(|e| e.to_str());
    (stem, ext)
}

/// Normalize keyword text: trim, collapse whitespace, lower-case.
pub fn normalize_keyword(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Derive a keyword from a file stem or heading text.
///
/// `_` and `-` become spaces before normalizing. Returns
/// [`FALLBACK_KEYWORD`] when nothing is left.
pub fn derive_keyword(stem: &str) -> String {
    let spaced = stem.replace(['_', '-'], " ");
    let keyword = normalize_keyword(&spaced);
    if keyword.is_empty() {
        FALLBACK_KEYWORD.to_string()
    } else {
        keyword
    }
}

/// Human title for a category directory (`dark-room` → "Dark Room").
pub fn display_category(name: &str) -> String {
    name.replace(['_', '-'], " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
