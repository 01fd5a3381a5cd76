//! Text synthesis for titles, meta descriptions and body paragraphs.
//!
//! Every piece of text is a fixed sentence template filled with the page's
//! keyword and a [`FacetBundle`] of stylistic choices. Template and facets
//! come from a [`SeededRng`] keyed by the page id and the field
//! (`facet:<page>:title`, `facet:<page>:desc`, `facet:<page>:para`), so the
//! same page always gets the same text and the three fields vary
//! independently.
//!
//! ## Length bounds
//!
//! Each field has a `[min, max]` character range. Text is fitted in two
//! steps:
//!
//! 1. **Pad** while shorter than `min`: clauses are taken from the front of
//!    a per-call padding list (rotated by the same seeded generator), then a
//!    fixed filler if the list runs dry.
//! 2. **Clamp** when longer than `max`: cut at the last whitespace at or
//!    before `max` and drop trailing separators. If that leaves less than
//!    the floor (80% of `max`, raised to `min`), hard-cut at `max` instead.
//!
//! Truncation may cut a clause short. That is accepted; the bounds are not
//! negotiable.

use crate::config::ContentConfig;
use crate::rng::SeededRng;
use crate::types::PageKind;

const STYLES: &[&str] = &[
    "modern", "vintage", "minimal", "urban", "cinematic", "natural", "studio", "retro",
];
const MOODS: &[&str] = &[
    "elegant", "playful", "moody", "romantic", "calm", "bold", "warm", "cool",
];
const LIGHTING: &[&str] = &[
    "soft lighting",
    "golden-hour glow",
    "window light",
    "neon lights",
    "backlight",
    "overcast light",
];
const COMPOSITIONS: &[&str] = &[
    "close-up",
    "rule-of-thirds",
    "symmetry",
    "leading lines",
    "wide shot",
];
const WARDROBE: &[&str] = &[
    "casual", "streetwear", "office", "evening dress", "sporty", "retro",
];
const BACKDROPS: &[&str] = &[
    "urban backdrop",
    "nature scene",
    "indoor studio",
    "minimal set",
    "bedroom scene",
];

/// Characters stripped from the end of word-boundary cuts.
const TRAILING_SEPARATORS: &[char] = &['-', '|', ',', ':', ';', '\u{2014}'];

/// Stylistic choices for one field of one page. Never stored; regenerated
/// from the seed whenever needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacetBundle {
    pub style: &'static str,
    pub mood: &'static str,
    pub lighting: &'static str,
    pub composition: &'static str,
    pub wardrobe: &'static str,
    pub backdrop: &'static str,
}

impl FacetBundle {
    pub fn draw(rng: &mut SeededRng) -> Self {
        let mut pick = |list: &[&'static str]| list[rng.below(list.len())];
        Self {
            style: pick(STYLES),
            mood: pick(MOODS),
            lighting: pick(LIGHTING),
            composition: pick(COMPOSITIONS),
            wardrobe: pick(WARDROBE),
            backdrop: pick(BACKDROPS),
        }
    }
}

/// Synthesized text for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub title: String,
    pub description: String,
    pub paragraph: String,
}

#[derive(Debug, Clone)]
pub struct ContentSynthesizer {
    title: [usize; 2],
    description: [usize; 2],
    paragraph: [usize; 2],
    brand: String,
}

impl ContentSynthesizer {
    pub fn new(config: &ContentConfig, brand: &str) -> Self {
        Self {
            title: config.title,
            description: config.description,
            paragraph: [config.paragraph_min, config.paragraph_max],
            brand: brand.trim().to_string(),
        }
    }

    pub fn synthesize(&self, keyword: &str, seed: &str, kind: PageKind) -> PageText {
        PageText {
            title: self.title(keyword, seed),
            description: self.description(keyword, seed),
            paragraph: self.paragraph(keyword, seed, kind),
        }
    }

    /// Title within the title bounds, brand appended as ` | brand`.
    pub fn title(&self, keyword: &str, seed: &str) -> String {
        let mut rng = SeededRng::for_seed(&format!("facet:{seed}:title"));
        let f = FacetBundle::draw(&mut rng);
        let k = keyword;
        let templates = [
            format!("{k} {} portraits", f.style),
            format!("{k} gallery - {} tone", f.mood),
            format!("{k} photos, {}", f.lighting),
            format!("High-quality {k} images - {}", f.composition),
            format!("{k} {} lookbook", f.mood),
        ];
        let core = pick_template(&mut rng, templates);
        let pads = vec![
            format!("{} {}", f.mood, f.style),
            f.lighting.to_string(),
            format!("{} framing", f.composition),
            format!("{} looks", f.wardrobe),
            f.backdrop.to_string(),
        ];
        let suffix = if self.brand.is_empty() {
            String::new()
        } else {
            format!(" | {}", self.brand)
        };
        let [min, max] = self.title;
        let core = pad(
            core,
            min.saturating_sub(char_len(&suffix)),
            " - ",
            &mut rng,
            pads,
            "photo gallery",
        );
        clamp(core + &suffix, min, max)
    }

    /// Meta description within the description bounds.
    pub fn description(&self, keyword: &str, seed: &str) -> String {
        let mut rng = SeededRng::for_seed(&format!("facet:{seed}:desc"));
        let f = FacetBundle::draw(&mut rng);
        let k = keyword;
        let templates = [
            format!(
                "Explore {k} in {} style with a {} vibe, {}, and {} framing. Curated images on a fast, clean page.",
                f.style, f.mood, f.lighting, f.composition
            ),
            format!(
                "Browse {k} photos shot with {} and {} framing, {} styling and a {} mood throughout the set.",
                f.lighting, f.composition, f.style, f.mood
            ),
            format!(
                "{} gallery: {} looks, {} outfits and {} under {}. Fresh sets added regularly.",
                capitalize(k),
                f.style,
                f.wardrobe,
                f.backdrop,
                f.lighting
            ),
        ];
        let base = pick_template(&mut rng, templates);
        let pads = vec![
            format!("{} looks and {} round out the set.", capitalize(f.wardrobe), f.backdrop),
            "Simple navigation helps discovery.".to_string(),
            "Mobile-friendly layout for smooth viewing.".to_string(),
            "Short notes keep context clear.".to_string(),
            "Clean typography keeps focus on the visuals.".to_string(),
        ];
        let [min, max] = self.description;
        let text = pad(base, min, " ", &mut rng, pads, "Browse the full gallery.");
        clamp(text, min, max)
    }

    /// Body paragraph of at least the paragraph minimum. Listing and detail
    /// pages draw from different templates.
    pub fn paragraph(&self, keyword: &str, seed: &str, kind: PageKind) -> String {
        let mut rng = SeededRng::for_seed(&format!("facet:{seed}:para"));
        let f = FacetBundle::draw(&mut rng);
        let k = keyword;
        let base = match kind {
            PageKind::Detail => pick_template(
                &mut rng,
                [
                    format!(
                        "This photo explores {k} through {} aesthetics and a {} tone under {}. \
                         The composition uses {} with {}, keeping the subject clear and tidy. \
                         Details like {} styling and balanced colors make it easy to linger on the frame.",
                        f.style, f.mood, f.lighting, f.composition, f.backdrop, f.wardrobe
                    ),
                    format!(
                        "A {} take on {k}, shot with {} and framed as a {}. \
                         The {} and {} styling set a {} mood without distracting from the subject.",
                        f.style, f.lighting, f.composition, f.backdrop, f.wardrobe, f.mood
                    ),
                ],
            ),
            PageKind::Listing => pick_template(
                &mut rng,
                [
                    format!(
                        "This set collects {k} images with {} aesthetics and a {} tone under {}. \
                         Compositions lean on {} with {}, keeping each thumbnail clear. \
                         Details like {} styling and balanced colors make browsing the collection easy.",
                        f.style, f.mood, f.lighting, f.composition, f.backdrop, f.wardrobe
                    ),
                    format!(
                        "Browse {k} in a {} mood: {} frames under {}, {} and {} styling across the page. \
                         Each thumbnail opens a larger view with its own notes.",
                        f.mood, f.style, f.lighting, f.backdrop, f.wardrobe
                    ),
                ],
            ),
        };
        let pads = vec![
            "Pages load quickly and related links help deeper viewing.".to_string(),
            "Use the previous and next links to move through the series.".to_string(),
            "Every image is sized for comfortable viewing on phones and desktops.".to_string(),
            "New sets are added regularly, so check back for more.".to_string(),
        ];
        let [min, max] = self.paragraph;
        let text = pad(base, min, " ", &mut rng, pads, "Browse the full gallery for more.");
        clamp(text, min, max)
    }
}

fn pick_template<const N: usize>(rng: &mut SeededRng, templates: [String; N]) -> String {
    let i = rng.below(N);
    templates.into_iter().nth(i).unwrap_or_default()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Append clauses until `text` reaches `min` characters.
///
/// The padding list is rotated by one seeded draw and then consumed from
/// the front; `filler` repeats once it is empty.
fn pad(
    mut text: String,
    min: usize,
    joiner: &str,
    rng: &mut SeededRng,
    mut pads: Vec<String>,
    filler: &str,
) -> String {
    if char_len(&text) >= min {
        return text;
    }
    let shift = rng.below(pads.len());
    pads.rotate_left(shift);
    let mut pads = pads.into_iter();
    while char_len(&text) < min {
        let clause = pads.next().unwrap_or_else(|| filler.to_string());
        text.push_str(joiner);
        text.push_str(&clause);
    }
    text
}

/// Fit `text` under `max` characters without dropping below `min`.
pub fn clamp(text: String, min: usize, max: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max {
        return text;
    }
    let floor = (max * 4).div_ceil(5).max(min).min(max);

    if let Some(cut) = (0..=max).rev().find(|&i| chars[i].is_whitespace()) {
        let head: String = chars[..cut].iter().collect();
        let head = head
            .trim_end_matches(|c: char| c.is_whitespace() || TRAILING_SEPARATORS.contains(&c));
        if char_len(head) >= floor {
            return head.to_string();
        }
    }
    chars[..max].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synth(brand: &str) -> ContentSynthesizer {
        ContentSynthesizer::new(&ContentConfig::default(), brand)
    }

    const KEYWORDS: &[&str] = &[
        "a",
        "red dress",
        "sunny beach 02",
        "golden retriever puppies playing in autumn leaves at the park",
        "supercalifragilisticexpialidociousphotographyofcatsinwindowlightwithoutanyspaces",
        "café crème brûlée",
    ];

    // =========================================================================
    // Bounds
    // =========================================================================

    #[test]
    fn titles_within_bounds() {
        for brand in ["", "Cats", "An Unreasonably Long Brand Name For A Tiny Site"] {
            let s = synth(brand);
            for kw in KEYWORDS {
                for i in 0..40 {
                    let t = s.title(kw, &format!("cats/{i}.html"));
                    let n = t.chars().count();
                    assert!((45..=60).contains(&n), "title {n} chars: {t:?}");
                }
            }
        }
    }

    #[test]
    fn descriptions_within_bounds() {
        let s = synth("Cats");
        for kw in KEYWORDS {
            for i in 0..40 {
                let d = s.description(kw, &format!("cats/{i}.html"));
                let n = d.chars().count();
                assert!((130..=155).contains(&n), "description {n} chars: {d:?}");
            }
        }
    }

    #[test]
    fn paragraphs_within_bounds() {
        let s = synth("Cats");
        for kind in [PageKind::Detail, PageKind::Listing] {
            for kw in KEYWORDS {
                for i in 0..40 {
                    let p = s.paragraph(kw, &format!("cats/{i}.html"), kind);
                    let n = p.chars().count();
                    assert!((200..=400).contains(&n), "paragraph {n} chars: {p:?}");
                }
            }
        }
    }

    #[test]
    fn custom_bounds_respected() {
        let config = ContentConfig {
            title: [20, 30],
            description: [50, 70],
            paragraph_min: 500,
            paragraph_max: 600,
        };
        let s = ContentSynthesizer::new(&config, "Brand");
        for i in 0..20 {
            let text = s.synthesize("red dress", &format!("p{i}"), PageKind::Detail);
            assert!((20..=30).contains(&text.title.chars().count()));
            assert!((50..=70).contains(&text.description.chars().count()));
            assert!((500..=600).contains(&text.paragraph.chars().count()));
        }
    }

    // =========================================================================
    // Determinism
    // =========================================================================

    #[test]
    fn same_inputs_same_text() {
        let s = synth("Cats");
        let a = s.synthesize("red dress", "cats/001.html", PageKind::Detail);
        let b = s.synthesize("red dress", "cats/001.html", PageKind::Detail);
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_vary_text() {
        let s = synth("Cats");
        let titles: std::collections::HashSet<String> = (0..20)
            .map(|i| s.title("red dress", &format!("cats/{i}.html")))
            .collect();
        assert!(titles.len() > 1);
    }

    #[test]
    fn listing_and_detail_paragraphs_differ() {
        let s = synth("Cats");
        let detail = s.paragraph("red dress", "cats/page1.html", PageKind::Detail);
        let listing = s.paragraph("red dress", "cats/page1.html", PageKind::Listing);
        assert_ne!(detail, listing);
    }

    // =========================================================================
    // Content
    // =========================================================================

    #[test]
    fn title_carries_keyword_and_brand() {
        let t = synth("Cats").title("red dress", "cats/001.html");
        assert!(t.contains("red dress"));
        assert!(t.ends_with("| Cats"), "{t:?}");
    }

    #[test]
    fn title_without_brand_has_no_separator() {
        let t = synth("").title("red dress", "cats/001.html");
        assert!(!t.contains(" | "));
    }

    #[test]
    fn facets_drawn_from_vocabularies() {
        let mut rng = SeededRng::for_seed("facet");
        for _ in 0..50 {
            let f = FacetBundle::draw(&mut rng);
            assert!(STYLES.contains(&f.style));
            assert!(MOODS.contains(&f.mood));
            assert!(LIGHTING.contains(&f.lighting));
            assert!(COMPOSITIONS.contains(&f.composition));
            assert!(WARDROBE.contains(&f.wardrobe));
            assert!(BACKDROPS.contains(&f.backdrop));
        }
    }

    // =========================================================================
    // clamp
    // =========================================================================

    #[test]
    fn clamp_leaves_short_text() {
        assert_eq!(clamp("short".into(), 1, 10), "short");
    }

    #[test]
    fn clamp_cuts_at_word_boundary() {
        let text = "alpha beta gamma delta".to_string();
        // "alpha beta g|": last space at 10, floor 10
        assert_eq!(clamp(text, 5, 12), "alpha beta");
    }

    #[test]
    fn clamp_space_at_limit_keeps_whole_words() {
        let text = "alpha beta gamma".to_string();
        assert_eq!(clamp(text, 5, 10), "alpha beta");
    }

    #[test]
    fn clamp_hard_cuts_without_nearby_boundary() {
        let text = "ab cdefghijklmnopqrstuvwxyz".to_string();
        // only boundary is at 2, below 80% of 10
        assert_eq!(clamp(text, 1, 10), "ab cdefghi");
    }

    #[test]
    fn clamp_floor_raised_to_min() {
        // boundary at 8 is >= 80% of 10 but below min 9
        let text = "abcdefgh ijklmnop".to_string();
        assert_eq!(clamp(text, 9, 10), "abcdefgh i");
    }

    #[test]
    fn clamp_strips_trailing_separators() {
        let text = "red dress photos - soft light".to_string();
        assert_eq!(clamp(text, 10, 19), "red dress photos");
    }
}
