//! Configuration loading.
//!
//! Two optional documents live at the site root:
//!
//! - **`config.json`**: site identity shared with other tooling. Only
//!   `domain` and `site_name` are read; other keys are ignored.
//! - **`farm.toml`**: pipeline settings. Stock defaults are merged under the
//!   user file, unknown keys are rejected and values are validated.
//!
//! ## `farm.toml`
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [pages]
//! page_size = 20                 # images per listing page
//!
//! [content]
//! title = [45, 60]               # synthesized title length bounds
//! description = [130, 155]       # synthesized meta-description bounds
//! paragraph_min = 200
//! paragraph_max = 400
//!
//! [quality]                      # thresholds below which a page is rewritten
//! min_title = 30
//! min_description = 110
//! min_body = 200
//!
//! [keywords]
//! dir = "keywords"
//! selected_dir = "selected_keywords"
//! fallback = "all.txt"
//! ledger = "keywords/.kw_map.json"
//! consumed = "keywords/used_keywords.txt"
//! # shared_consumed = "/srv/farm/used_keywords_global.txt"
//! on_exhausted = "derive"        # or "reuse"
//!
//! [scan]
//! skip_dirs = [".git", "assets", ...]
//! ```
//!
//! Quality thresholds may not exceed the synthesized minimums: a page the
//! patcher rewrote must pass the gate on the next run.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Pipeline config file name at the site root.
pub const FARM_CONFIG_FILE: &str = "farm.toml";
/// Site identity file name at the site root.
pub const SITE_CONFIG_FILE: &str = "config.json";

/// Files or directories whose presence marks a site root.
const ROOT_MARKERS: &[&str] = &[
    FARM_CONFIG_FILE,
    SITE_CONFIG_FILE,
    "keywords",
    "sitemap.xml",
    "index.html",
];
const ROOT_SEARCH_DEPTH: usize = 4;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("JSON parse error in config.json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

// =============================================================================
// farm.toml
// =============================================================================

/// Pipeline configuration loaded from `farm.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FarmConfig {
    pub pages: PagesConfig,
    pub content: ContentConfig,
    pub quality: QualityConfig,
    pub keywords: KeywordsConfig,
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PagesConfig {
    /// Images per listing page.
    pub page_size: usize,
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self { page_size: 20 }
    }
}

/// Length bounds for synthesized text, in characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContentConfig {
    pub title: [usize; 2],
    pub description: [usize; 2],
    pub paragraph_min: usize,
    pub paragraph_max: usize,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            title: [45, 60],
            description: [130, 155],
            paragraph_min: 200,
            paragraph_max: 400,
        }
    }
}

/// Content-rewrite gate. A page below any threshold gets new text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityConfig {
    pub min_title: usize,
    pub min_description: usize,
    pub min_body: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_title: 30,
            min_description: 110,
            min_body: 200,
        }
    }
}

/// What to record when every keyword in a page's pool is already consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExhaustionPolicy {
    /// Record a keyword derived from the page itself.
    #[default]
    Derive,
    /// Reuse the pool keyword at the page's deterministic offset.
    Reuse,
}

/// Keyword sources and ledger locations. Relative paths resolve against
/// the site root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeywordsConfig {
    pub dir: String,
    pub selected_dir: String,
    pub fallback: String,
    pub ledger: String,
    pub consumed: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_consumed: Option<String>,
    pub on_exhausted: ExhaustionPolicy,
}

impl Default for KeywordsConfig {
    fn default() -> Self {
        Self {
            dir: "keywords".into(),
            selected_dir: "selected_keywords".into(),
            fallback: "all.txt".into(),
            ledger: "keywords/.kw_map.json".into(),
            consumed: "keywords/used_keywords.txt".into(),
            shared_consumed: None,
            on_exhausted: ExhaustionPolicy::Derive,
        }
    }
}

impl KeywordsConfig {
    /// Mapping file location under `root`.
    pub fn ledger_path(&self, root: &Path) -> PathBuf {
        root.join(&self.ledger)
    }

    /// Consumed-set location: the shared path when configured, else the
    /// per-site file.
    pub fn consumed_path(&self, root: &Path) -> PathBuf {
        match &self.shared_consumed {
            Some(shared) => root.join(shared),
            None => root.join(&self.consumed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// Top-level directory names never treated as categories.
    pub skip_dirs: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            skip_dirs: [
                ".git",
                "assets",
                "static",
                "vendor",
                "node_modules",
                "keywords",
                "selected_keywords",
                "keywords_enriched",
                "generator",
                "images",
                "logs",
                "tools",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl FarmConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pages.page_size == 0 {
            return Err(ConfigError::Validation(
                "pages.page_size must be at least 1".into(),
            ));
        }
        check_bounds("content.title", self.content.title)?;
        check_bounds("content.description", self.content.description)?;
        check_bounds(
            "content.paragraph_min/paragraph_max",
            [self.content.paragraph_min, self.content.paragraph_max],
        )?;

        let q = &self.quality;
        if q.min_title > self.content.title[0] {
            return Err(ConfigError::Validation(
                "quality.min_title must not exceed content.title minimum".into(),
            ));
        }
        if q.min_description > self.content.description[0] {
            return Err(ConfigError::Validation(
                "quality.min_description must not exceed content.description minimum".into(),
            ));
        }
        if q.min_body > self.content.paragraph_min {
            return Err(ConfigError::Validation(
                "quality.min_body must not exceed content.paragraph_min".into(),
            ));
        }
        if self.keywords.fallback.trim().is_empty() {
            return Err(ConfigError::Validation(
                "keywords.fallback must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn check_bounds(name: &str, [min, max]: [usize; 2]) -> Result<(), ConfigError> {
    if min == 0 {
        return Err(ConfigError::Validation(format!(
            "{name}: minimum must be greater than 0"
        )));
    }
    if min > max {
        return Err(ConfigError::Validation(format!(
            "{name}: minimum {min} exceeds maximum {max}"
        )));
    }
    Ok(())
}

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(FarmConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key by key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `farm.toml` from `root` as a raw TOML value, `None` when absent.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(FARM_CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<FarmConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: FarmConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `farm.toml` from the site root over stock defaults.
pub fn load_config(root: &Path) -> Result<FarmConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

/// Fully commented stock `farm.toml`, printed by `gen-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# gallery-farm configuration
# ==========================
# All settings are optional. Values shown below are the defaults.
# Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Pagination
# ---------------------------------------------------------------------------
[pages]
# Images per listing page. Listing page N holds images (N-1)*page_size+1
# through N*page_size of the category, sorted by file name.
page_size = 20

# ---------------------------------------------------------------------------
# Synthesized text bounds (characters)
# ---------------------------------------------------------------------------
[content]
title = [45, 60]
description = [130, 155]
paragraph_min = 200
paragraph_max = 400

# ---------------------------------------------------------------------------
# Rewrite gate
# ---------------------------------------------------------------------------
# A page whose title, meta description or visible body text is shorter
# than these gets new text. Must not exceed the bounds above.
[quality]
min_title = 30
min_description = 110
min_body = 200

# ---------------------------------------------------------------------------
# Keywords and the allocation ledger
# ---------------------------------------------------------------------------
[keywords]
# Raw per-category lists (<category>.txt) and the global fallback list.
dir = "keywords"
# Curated per-category lists, preferred over the raw ones.
selected_dir = "selected_keywords"
fallback = "all.txt"
# Page -> keyword mapping (JSON).
ledger = "keywords/.kw_map.json"
# Consumed keywords, one per line, append-only.
consumed = "keywords/used_keywords.txt"
# Point several sites at one consumed list to keep keywords unique across
# all of them. Overridden by --shared-ledger / GALLERY_FARM_SHARED_LEDGER.
# shared_consumed = "/srv/farm/used_keywords_global.txt"
# When a pool runs dry: "derive" a keyword from the page itself, or
# "reuse" a pool keyword.
on_exhausted = "derive"

# ---------------------------------------------------------------------------
# Category discovery
# ---------------------------------------------------------------------------
[scan]
skip_dirs = [
    ".git", "assets", "static", "vendor", "node_modules", "keywords",
    "selected_keywords", "keywords_enriched", "generator", "images",
    "logs", "tools",
]
"##
}

// =============================================================================
// config.json
// =============================================================================

/// Site identity from `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub domain: Option<String>,
    pub site_name: Option<String>,
}

impl SiteConfig {
    /// Domain without trailing `/`, `None` when blank.
    pub fn domain(&self) -> Option<&str> {
        self.domain
            .as_deref()
            .map(|d| d.trim().trim_end_matches('/'))
            .filter(|d| !d.is_empty())
    }

    pub fn site_name(&self) -> Option<&str> {
        self.site_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Load `config.json` from the site root; defaults when absent.
pub fn load_site_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let path = root.join(SITE_CONFIG_FILE);
    if !path.exists() {
        return Ok(SiteConfig::default());
    }
    let content = fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&content)?)
}

// =============================================================================
// Site root and brand
// =============================================================================

/// Walk upward from `start` looking for a site-root marker.
///
/// Falls back to `start` when nothing within reach qualifies.
pub fn detect_root(start: &Path) -> PathBuf {
    start
        .ancestors()
        .take(ROOT_SEARCH_DEPTH)
        .find(|dir| ROOT_MARKERS.iter().any(|m| dir.join(m).exists()))
        .unwrap_or(start)
        .to_path_buf()
}

/// Brand shown in titles: explicit flag, then `site_name`, then the root
/// directory's name.
pub fn resolve_brand(explicit: Option<&str>, site: &SiteConfig, root: &Path) -> String {
    explicit
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .or_else(|| site.site_name())
        .map(String::from)
        .or_else(|| {
            root.file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // =========================================================================
    // Defaults
    // =========================================================================

    #[test]
    fn default_config_values() {
        let config = FarmConfig::default();
        assert_eq!(config.pages.page_size, 20);
        assert_eq!(config.content.title, [45, 60]);
        assert_eq!(config.content.description, [130, 155]);
        assert_eq!(config.content.paragraph_min, 200);
        assert_eq!(config.quality.min_title, 30);
        assert_eq!(config.keywords.on_exhausted, ExhaustionPolicy::Derive);
        assert!(config.scan.skip_dirs.contains(&"keywords".to_string()));
    }

    #[test]
    fn validate_default_config_passes() {
        assert!(FarmConfig::default().validate().is_ok());
    }

    // =========================================================================
    // load_config
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config, FarmConfig::default());
    }

    #[test]
    fn load_config_reads_partial_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(FARM_CONFIG_FILE),
            r#"
[pages]
page_size = 12

[keywords]
on_exhausted = "reuse"
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.pages.page_size, 12);
        assert_eq!(config.keywords.on_exhausted, ExhaustionPolicy::Reuse);
        // untouched values keep their defaults
        assert_eq!(config.keywords.dir, "keywords");
        assert_eq!(config.content.title, [45, 60]);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(FARM_CONFIG_FILE), "not valid toml [[[").unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_key_rejected() {
        let result: Result<FarmConfig, _> = toml::from_str("[pages]\npagesize = 3\n");
        assert!(result.unwrap_err().to_string().contains("unknown field"));
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<FarmConfig, _> = toml::from_str("[pagez]\npage_size = 3\n");
        assert!(result.is_err());
    }

    // =========================================================================
    // Validation
    // =========================================================================

    fn resolve_overlay(src: &str) -> Result<FarmConfig, ConfigError> {
        let overlay: toml::Value = toml::from_str(src).unwrap();
        resolve_config(stock_defaults_value().unwrap(), Some(overlay))
    }

    #[test]
    fn validate_zero_page_size() {
        let result = resolve_overlay("[pages]\npage_size = 0\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_inverted_bounds() {
        let result = resolve_overlay("[content]\ntitle = [70, 60]\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_zero_minimum() {
        let result = resolve_overlay("[content]\ndescription = [0, 155]\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_gate_above_synth_minimum() {
        let result = resolve_overlay("[quality]\nmin_title = 50\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));

        let result = resolve_overlay("[quality]\nmin_body = 250\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn gate_may_be_raised_with_bounds() {
        let config = resolve_overlay(
            "[content]\ntitle = [50, 70]\n[quality]\nmin_title = 50\n",
        )
        .unwrap();
        assert_eq!(config.quality.min_title, 50);
    }

    // =========================================================================
    // merge_toml
    // =========================================================================

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str("[content]\ntitle = [45, 60]\nparagraph_min = 200\n").unwrap();
        let overlay: toml::Value = toml::from_str("[content]\nparagraph_min = 250\n").unwrap();
        let merged = merge_toml(base, overlay);
        let content = merged.get("content").unwrap();
        assert_eq!(content.get("paragraph_min").unwrap().as_integer(), Some(250));
        assert_eq!(content.get("title").unwrap().as_array().unwrap().len(), 2);
    }

    #[test]
    fn merge_toml_arrays_replace() {
        let base: toml::Value = toml::from_str("skip = [\"a\", \"b\"]").unwrap();
        let overlay: toml::Value = toml::from_str("skip = [\"c\"]").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("skip").unwrap().as_array().unwrap().len(), 1);
    }

    // =========================================================================
    // Stock config
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: FarmConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, FarmConfig::default());
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value().unwrap();
        for section in ["pages", "content", "quality", "keywords", "scan"] {
            assert!(val.get(section).is_some(), "missing [{section}]");
        }
    }

    // =========================================================================
    // Keyword paths
    // =========================================================================

    #[test]
    fn consumed_path_prefers_shared() {
        let root = Path::new("/site");
        let mut kw = KeywordsConfig::default();
        assert_eq!(
            kw.consumed_path(root),
            PathBuf::from("/site/keywords/used_keywords.txt")
        );
        kw.shared_consumed = Some("/srv/global.txt".into());
        assert_eq!(kw.consumed_path(root), PathBuf::from("/srv/global.txt"));
    }

    // =========================================================================
    // config.json
    // =========================================================================

    #[test]
    fn site_config_absent_is_default() {
        let tmp = TempDir::new().unwrap();
        let site = load_site_config(tmp.path()).unwrap();
        assert!(site.domain().is_none());
    }

    #[test]
    fn site_config_trims_domain_and_ignores_other_keys() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(SITE_CONFIG_FILE),
            r#"{"domain": " https://x.test/ ", "site_name": "X Pics", "ads": {"slot": 1}}"#,
        )
        .unwrap();
        let site = load_site_config(tmp.path()).unwrap();
        assert_eq!(site.domain(), Some("https://x.test"));
        assert_eq!(site.site_name(), Some("X Pics"));
    }

    #[test]
    fn site_config_blank_domain_is_none() {
        let site = SiteConfig {
            domain: Some("  / ".into()),
            site_name: None,
        };
        assert!(site.domain().is_none());
    }

    #[test]
    fn site_config_malformed_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(SITE_CONFIG_FILE), "{ nope").unwrap();
        assert!(matches!(
            load_site_config(tmp.path()),
            Err(ConfigError::Json(_))
        ));
    }

    // =========================================================================
    // Root detection and brand
    // =========================================================================

    #[test]
    fn detect_root_walks_up_to_marker() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("keywords")).unwrap();
        let deep = tmp.path().join("cats").join("sub");
        fs::create_dir_all(&deep).unwrap();

        assert_eq!(detect_root(&deep), tmp.path());
    }

    #[test]
    fn detect_root_falls_back_to_start() {
        let tmp = TempDir::new().unwrap();
        let deep = tmp.path().join("a").join("b").join("c").join("d").join("e");
        fs::create_dir_all(&deep).unwrap();
        fs::write(tmp.path().join(FARM_CONFIG_FILE), "").unwrap();

        // marker is five levels up, beyond reach
        assert_eq!(detect_root(&deep), deep);
    }

    #[test]
    fn brand_resolution_order() {
        let root = Path::new("/srv/catsite");
        let named = SiteConfig {
            domain: None,
            site_name: Some("Cat Pics".into()),
        };
        assert_eq!(resolve_brand(Some("Flag"), &named, root), "Flag");
        assert_eq!(resolve_brand(None, &named, root), "Cat Pics");
        assert_eq!(resolve_brand(Some("  "), &SiteConfig::default(), root), "catsite");
    }
}
