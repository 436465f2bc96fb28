// src/ingest/normalize.rs
//! Normalizer: raw feed records → canonical `Candidate`s.
//!
//! Pure transforms only. A record missing `name` or `url` still yields a
//! `Candidate`; `Candidate::is_admissible` is what later stages check.

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::ingest::types::{Candidate, RawRecord};

/// Word count under which a candidate is flagged `low_quality`.
pub const LOW_QUALITY_WORDS: usize = 10;

fn re(cell: &'static OnceCell<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

fn collapse_ws(s: &str) -> String {
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    re(&RE_WS, r"\s+").replace_all(s, " ").trim().to_string()
}

/// Collapse "Name - Name" echoes produced by some feeds and squeeze whitespace.
pub fn clean_description(name: &str, text: &str) -> String {
    let mut cleaned = text.trim().to_string();
    if cleaned.is_empty() {
        return cleaned;
    }
    if !name.trim().is_empty() {
        let name = name.trim();
        let dup = format!("{name} - {name}");
        cleaned = cleaned.replace(&dup, name);
    }
    collapse_ws(&cleaned)
}

/// Strip metadata noise so the oracle (and the report) sees only product text:
/// relative times, "Source:"/"Discussion" labels, markdown links and images,
/// badge markup, star counts and HTML tags.
pub fn strip_noise(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    static RE_AGO: OnceCell<Regex> = OnceCell::new();
    static RE_META: OnceCell<Regex> = OnceCell::new();
    static RE_MD_IMAGE: OnceCell<Regex> = OnceCell::new();
    static RE_MD_LINK: OnceCell<Regex> = OnceCell::new();
    static RE_IMG: OnceCell<Regex> = OnceCell::new();
    static RE_STAR_ICON: OnceCell<Regex> = OnceCell::new();
    static RE_STAR_COUNT: OnceCell<Regex> = OnceCell::new();
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    static RE_TRAILING_SEP: OnceCell<Regex> = OnceCell::new();

    let mut out = html_escape::decode_html_entities(text).to_string();

    out = re(&RE_AGO, r"(?i)\d+\s*(?:days?|hours?|minutes?|mins?|hrs?)\s*ago")
        .replace_all(&out, "")
        .to_string();
    out = re(
        &RE_META,
        r"(?i)(?:\b(?:discussion|comments?|link)\b|\b(?:source|updated|created):)[^\n]*",
    )
    .replace_all(&out, "")
    .to_string();
    // Images before links: `![alt](src)` would otherwise collapse to `!alt`.
    out = re(&RE_MD_IMAGE, r"!\[[^\]]*\]\([^)]*\)")
        .replace_all(&out, "")
        .to_string();
    out = re(&RE_MD_LINK, r"\[([^\]]+)\]\([^)]+\)")
        .replace_all(&out, "$1")
        .to_string();
    out = re(&RE_IMG, r"(?i)<img[^>]*>")
        .replace_all(&out, "")
        .to_string();
    out = re(&RE_STAR_ICON, r"[⭐★☆]\s*\d+[kK]?")
        .replace_all(&out, "")
        .to_string();
    out = re(&RE_STAR_COUNT, r"(?i)\b\d+\s*(?:stars?|forks?|watchers?)\b")
        .replace_all(&out, "")
        .to_string();
    out = re(&RE_TAGS, r"(?is)</?[^>]+>")
        .replace_all(&out, "")
        .to_string();
    out = collapse_ws(&out);
    out = re(&RE_TRAILING_SEP, r"\s*[|\-–—]\s*$")
        .replace_all(&out, "")
        .to_string();

    out.trim().to_string()
}

/// Turn one raw record into a `Candidate`.
pub fn normalize(raw: &RawRecord) -> Candidate {
    let name = raw.name.as_deref().map(collapse_ws).unwrap_or_default();
    let url = raw.url.as_deref().map(str::trim).unwrap_or_default().to_string();
    let tagline = strip_noise(&clean_description(&name, raw.blurb()));
    let desc = raw
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .map(|d| strip_noise(&clean_description(&name, d)))
        .unwrap_or_else(|| tagline.clone());
    let tags: Vec<String> = raw
        .tags
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    let context = collapse_ws(&format!("{name} {desc} {}", tags.join(" ")));
    let low_quality = context.split_whitespace().count() < LOW_QUALITY_WORDS;

    Candidate {
        name,
        url,
        tagline,
        description: desc,
        context,
        tags,
        source: raw.source,
        published_at: raw.published_at,
        low_quality,
        enrichment: String::new(),
    }
}

/// Normalize a batch, dropping records that lack a name or URL. Input order is kept.
pub fn normalize_all<'a, I>(raws: I) -> Vec<Candidate>
where
    I: IntoIterator<Item = &'a RawRecord>,
{
    let mut out = Vec::new();
    for raw in raws {
        let c = normalize(raw);
        if c.is_admissible() {
            out.push(c);
        } else {
            tracing::debug!(source = %raw.source, "dropping record without name/url");
        }
    }
    out
}
