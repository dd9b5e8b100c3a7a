//! Text normalization for source tracks and catalog candidates.
//!
//! Everything here is pure: no I/O, no shared mutable state, and identical
//! input always produces identical output. Both the query generator and the
//! scorer depend on that, so any change here shifts both. Run tests after
//! changes.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use unicode_normalization::UnicodeNormalization;

use crate::models::{NormalizedTrack, RemixInfo};

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Bracketed annotation: "(Original Mix)", "[Eric Prydz Remix]", "(feat. X)"
pub static BRACKETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*[\(\[]([^\)\]]*)[\)\]]").unwrap());

/// Keywords that mark an annotation as a version of the track rather than
/// part of its name. "(Part 2)" stays in the title, "(Club Mix)" does not.
pub static VERSION_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:remix(?:ed)?|mix|edit|version|dub|rework(?:ed)?|bootleg|vip|flip|refix|remaster(?:ed)?|extended|instrumental|acapella|radio|club|live|acoustic)\b",
    )
    .unwrap()
});

/// Featured credit inside an annotation: "feat. Kaskade"
pub static FEAT_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:feat\.?|ft\.?|featuring)\s+(.+)$").unwrap());

/// Dash-suffixed version: "Opus - Four Tet Remix", "Strobe – Radio Edit"
pub static DASH_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\s+[-–—]\s+([^-–—]*\b(?:remix(?:ed)?|mix|edit|version|dub|rework(?:ed)?|bootleg|vip|flip|refix|remaster(?:ed)?)\b[^-–—]*)$",
    )
    .unwrap()
});

/// Unbracketed featured credit at the end of a title: "Song feat. Artist"
pub static TITLE_FEAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+(?:feat\.?|ft\.?|featuring)\s+(.+)$").unwrap());

/// Featured marker inside an artist credit
pub static FEAT_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+(?:feat\.?|ft\.?|featuring)\s+").unwrap());

/// Co-artist separators: , & / ; + vs. x
pub static ARTIST_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*(?:[,&/;+]|\s(?:vs\.?|x)\s)\s*").unwrap());

/// Trailing words naming the kind of rework ("remix" in "Eric Prydz Remix")
const REWORK_WORDS: &[&str] = &[
    "remix", "remixed", "mix", "edit", "rework", "reworked", "bootleg", "vip", "flip", "refix",
    "dub", "version",
];

/// Qualifiers that describe a cut of the track without crediting anyone
const GENERIC_QUALIFIERS: &[&str] = &[
    "original", "extended", "radio", "club", "album", "single", "vocal", "instrumental", "main",
    "short", "long", "clean", "dirty", "explicit", "remaster", "remastered", "mix", "edit",
    "version", "dub", "live", "acoustic", "digital", "mono", "stereo", "12", "7", "inch",
];

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is a Unicode combining mark (diacritical mark).
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF | 0xFE20..=0xFE2F)
}

/// Fold Unicode text to lowercase ASCII by applying NFKD decomposition,
/// removing combining marks, then transliterating what is left.
/// e.g., "Röyksopp" → "royksopp", "Beyoncé" → "beyonce"
pub fn fold_to_ascii(s: &str) -> String {
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    any_ascii(&stripped).to_lowercase()
}

/// Straighten curly quotes and unify dash variants.
pub fn normalize_punctuation(s: &str) -> String {
    s.replace(['\u{2018}', '\u{2019}', '\u{00B4}', '\u{0060}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2010}', '\u{2011}', '\u{2212}'], "-")
}

/// Split text into lowercase ASCII word tokens.
/// Apostrophes are dropped inside words ("don't" → "dont"), "&" reads as "and",
/// every other non-alphanumeric character separates tokens.
pub fn tokenize(s: &str) -> Vec<String> {
    let folded = fold_to_ascii(&normalize_punctuation(s));
    let cleaned: String = folded
        .replace('\'', "")
        .replace('&', " and ")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().map(str::to_string).collect()
}

/// Tokens joined by single spaces.
pub fn normalize_text(s: &str) -> String {
    tokenize(s).join(" ")
}

/// Normalize one artist name: folded tokens, leading "the" dropped
/// ("The Chemical Brothers" → "chemical brothers").
pub fn normalize_artist(name: &str) -> String {
    let mut tokens = tokenize(name);
    if tokens.len() > 1 && tokens[0] == "the" {
        tokens.remove(0);
    }
    tokens.join(" ")
}

/// Split a credit on co-artist separators into normalized names.
fn split_credit(credit: &str) -> Vec<String> {
    ARTIST_SEPARATOR
        .split(credit)
        .map(normalize_artist)
        .filter(|a| !a.is_empty())
        .collect()
}

fn push_unique(target: &mut Vec<String>, names: impl IntoIterator<Item = String>) {
    for name in names {
        if !target.contains(&name) {
            target.push(name);
        }
    }
}

/// Split an artist field into (main artists, featured artists).
/// The primary artist is the first main artist.
/// e.g., "Above & Beyond feat. Zoë Johnston" → (["above", "beyond"], ["zoe johnston"])
pub fn split_artists(artist: &str) -> (Vec<String>, Vec<String>) {
    // "Artist (feat. X)" reads the same as "Artist feat. X"
    let flat = normalize_punctuation(artist).replace(['(', ')', '[', ']'], " ");

    let mut parts = FEAT_SEPARATOR.splitn(&flat, 2);
    let main_credit = parts.next().unwrap_or("");
    let featured_credit = parts.next().unwrap_or("");

    let mut main = Vec::new();
    push_unique(&mut main, split_credit(main_credit));
    let mut featured = Vec::new();
    push_unique(
        &mut featured,
        split_credit(featured_credit)
            .into_iter()
            .filter(|f| !main.contains(f))
            .collect::<Vec<_>>(),
    );
    (main, featured)
}

/// Remixer credited by a normalized annotation, if any.
/// "eric prydz remix" → Some("eric prydz"), "original mix" → None
pub fn extract_remixer(annotation: &str) -> Option<String> {
    let mut tokens: Vec<&str> = annotation.split_whitespace().collect();
    match tokens.last() {
        Some(last) if REWORK_WORDS.contains(last) => {}
        _ => return None,
    }
    while let Some(last) = tokens.last() {
        let is_generic = GENERIC_QUALIFIERS.contains(last)
            || REWORK_WORDS.contains(last)
            || last.chars().all(|c| c.is_ascii_digit());
        if is_generic {
            tokens.pop();
        } else {
            break;
        }
    }
    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" "))
    }
}

/// True when the annotation only names a cut of the track ("extended mix").
pub fn is_generic_annotation(annotation: &str) -> bool {
    annotation.split_whitespace().all(|t| {
        GENERIC_QUALIFIERS.contains(&t) || REWORK_WORDS.contains(&t) || t.chars().all(|c| c.is_ascii_digit())
    })
}

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// A title split into its base name and annotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleParts {
    pub tokens: Vec<String>,
    pub remix: Option<RemixInfo>,
    pub featured: Vec<String>,
}

/// Split a raw title into base tokens, remix annotation and featured artists.
/// e.g., "Strobe (Original Mix)" → tokens ["strobe"], remix "original mix"
pub fn split_title(title: &str) -> TitleParts {
    let mut annotations: Vec<String> = Vec::new();
    let mut featured: Vec<String> = Vec::new();

    let punctuated = normalize_punctuation(title.trim());
    let mut base = BRACKETED
        .replace_all(&punctuated, |caps: &Captures| {
            let inner = caps[1].trim();
            if let Some(feat) = FEAT_PREFIX.captures(inner) {
                push_unique(&mut featured, split_credit(&feat[1]));
                " ".to_string()
            } else if VERSION_KEYWORDS.is_match(inner) {
                annotations.push(inner.to_string());
                " ".to_string()
            } else {
                // Part of the name, e.g. "(Part 2)"
                format!(" {}", inner)
            }
        })
        .to_string();

    if let Some(caps) = DASH_VERSION.captures(&base) {
        annotations.push(caps[1].trim().to_string());
        let start = caps.get(0).map_or(base.len(), |m| m.start());
        base.truncate(start);
    }

    if let Some(caps) = TITLE_FEAT.captures(&base) {
        push_unique(&mut featured, split_credit(&caps[1]));
        let start = caps.get(0).map_or(base.len(), |m| m.start());
        base.truncate(start);
    }

    let mut tokens = tokenize(&base);

    // A title made only of an annotation keeps it as its name
    if tokens.is_empty() && !annotations.is_empty() {
        tokens = tokenize(&annotations.join(" "));
        annotations.clear();
    }

    let remix = if annotations.is_empty() {
        None
    } else {
        let display = annotations.join(" ");
        let text = normalize_text(&display);
        let remixer = annotations
            .iter()
            .find_map(|a| extract_remixer(&normalize_text(a)));
        Some(RemixInfo {
            display,
            text,
            remixer,
        })
    };

    TitleParts {
        tokens,
        remix,
        featured,
    }
}

/// Normalize a source track.
///
/// Never fails: empty strings produce empty token sets.
pub fn normalize(title: &str, artist: &str) -> NormalizedTrack {
    let title_parts = split_title(title);
    let (main, mut featured) = split_artists(artist);

    // Featured credits in the title count as featured artists too
    push_unique(
        &mut featured,
        title_parts
            .featured
            .into_iter()
            .filter(|f| !main.contains(f))
            .collect::<Vec<_>>(),
    );

    let mut artists = main;
    push_unique(&mut artists, featured.iter().cloned());

    let artist_tokens = artists
        .iter()
        .flat_map(|a| a.split_whitespace().map(str::to_string))
        .collect();

    NormalizedTrack {
        display_title: title.trim().to_string(),
        display_artist: artist.trim().to_string(),
        title_tokens: title_parts.tokens,
        artists,
        artist_tokens,
        featured_artists: featured,
        remix_info: title_parts.remix,
    }
}

// ============================================================================
// TESTS
// ============================================================================
