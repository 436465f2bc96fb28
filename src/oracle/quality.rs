// src/oracle/quality.rs
//! Language-quality gate for summaries.
//!
//! A summary is clean when it contains Han script at a ratio of at least 0.4
//! over its effective characters and carries no metadata noise. Failing
//! summaries are marked with a visible prefix, never silently passed off.

/// Minimum Han ratio for a clean summary.
pub const MIN_HAN_RATIO: f32 = 0.4;

const GARBAGE_PHRASES: &[&str] = &["text to video generator", "ai writer free"];

const METADATA_NOISE: &[&str] = &[
    "days ago", "day ago", "hours ago", "source:", "updated:", "created:", "stars", "⭐",
    "discussion", "comments", "| link", "read more", "click here",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degradation {
    /// Nothing usable; the marker replaces the text.
    Missing,
    /// No Han script at all.
    Untranslated,
    /// Some Han script, below the ratio.
    PartialTranslation,
    /// Enough Han script, but metadata noise or garbage phrases remain.
    Noisy,
}

impl Degradation {
    pub fn marker(self) -> &'static str {
        match self {
            Degradation::Missing => "(自动翻译失败) 暂无中文介绍",
            Degradation::Untranslated => "(自动翻译失败) ",
            Degradation::PartialTranslation => "(翻译不完整) ",
            Degradation::Noisy => "(待润色) ",
        }
    }

    /// Visible rendering of a degraded summary.
    pub fn apply(self, text: &str) -> String {
        match self {
            Degradation::Missing => self.marker().to_string(),
            _ => format!("{}{}", self.marker(), text.trim()),
        }
    }
}

pub fn is_han(c: char) -> bool {
    ('\u{4e00}'..='\u{9fa5}').contains(&c)
}

pub fn contains_han(text: &str) -> bool {
    text.chars().any(is_han)
}

/// Han characters over non-whitespace, non-ASCII-punctuation characters.
pub fn han_ratio(text: &str) -> f32 {
    let mut han = 0usize;
    let mut effective = 0usize;
    for c in text.chars() {
        if c.is_whitespace() || c.is_ascii_punctuation() {
            continue;
        }
        effective += 1;
        if is_han(c) {
            han += 1;
        }
    }
    if effective == 0 {
        0.0
    } else {
        han as f32 / effective as f32
    }
}

/// `None` when the summary is clean.
pub fn assess(text: &str) -> Option<Degradation> {
    let t = text.trim();
    if t.is_empty() {
        return Some(Degradation::Missing);
    }
    if !contains_han(t) {
        return Some(Degradation::Untranslated);
    }
    if han_ratio(t) < MIN_HAN_RATIO {
        return Some(Degradation::PartialTranslation);
    }
    let lowered = t.to_lowercase();
    if GARBAGE_PHRASES.iter().chain(METADATA_NOISE).any(|p| lowered.contains(p)) {
        return Some(Degradation::Noisy);
    }
    None
}

/// Summary text ready for display, plus its degradation (if any).
pub fn mark(text: &str) -> (String, Option<Degradation>) {
    match assess(text) {
        None => (text.trim().to_string(), None),
        Some(d) => (d.apply(text), Some(d)),
    }
}
