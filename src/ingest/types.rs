// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Feed a record came from. Serialized as its display label ("Product Hunt", ...).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(into = "String", from = "String")]
pub enum Source {
    ProductHunt,
    Toolify,
    GitHub,
    HackerNews,
    Taaft,
    Futurepedia,
    #[default]
    Other,
}

impl Source {
    pub const ALL: [Source; 7] = [
        Source::ProductHunt,
        Source::Toolify,
        Source::GitHub,
        Source::HackerNews,
        Source::Taaft,
        Source::Futurepedia,
        Source::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Source::ProductHunt => "Product Hunt",
            Source::Toolify => "Toolify",
            Source::GitHub => "GitHub",
            Source::HackerNews => "Hacker News",
            Source::Taaft => "TAAFT",
            Source::Futurepedia => "Futurepedia",
            Source::Other => "Other",
        }
    }

    /// Lenient parse: case-insensitive, ignores spaces/dashes/underscores.
    /// Unknown labels map to `Other`.
    pub fn parse(label: &str) -> Self {
        let squashed: String = label
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .to_ascii_lowercase();
        match squashed.as_str() {
            "producthunt" | "ph" => Source::ProductHunt,
            "toolify" => Source::Toolify,
            "github" => Source::GitHub,
            "hackernews" | "hn" => Source::HackerNews,
            "taaft" | "theresanaiforthat" => Source::Taaft,
            "futurepedia" => Source::Futurepedia,
            _ => Source::Other,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for Source {
    fn from(s: String) -> Self {
        Source::parse(&s)
    }
}

impl From<Source> for String {
    fn from(s: Source) -> Self {
        s.label().to_string()
    }
}

/// Loosely-shaped record as produced by a feed collaborator.
/// Every field is optional at this boundary; `normalize` decides admissibility.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawRecord {
    pub name: Option<String>,
    pub url: Option<String>,
    pub tagline: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub source: Source,
    pub published_at: Option<DateTime<Utc>>,
    pub stars: Option<u32>,
    pub homepage: Option<String>,
}

impl RawRecord {
    pub fn new(name: impl Into<String>, url: impl Into<String>, source: Source) -> Self {
        Self {
            name: Some(name.into()),
            url: Some(url.into()),
            source,
            ..Default::default()
        }
    }

    /// Tagline, falling back to description.
    pub fn blurb(&self) -> &str {
        self.tagline
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or(self.description.as_deref())
            .unwrap_or_default()
    }
}

/// Canonical, run-scoped product record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub name: String,
    pub url: String,
    pub tagline: String,
    pub description: String,
    /// name + cleaned description + tags; used for scoring.
    pub context: String,
    pub tags: Vec<String>,
    pub source: Source,
    pub published_at: Option<DateTime<Utc>>,
    /// Fewer than 10 words in `context`.
    pub low_quality: bool,
    /// Supplementary search text appended during enrichment (empty when none).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub enrichment: String,
}

impl Candidate {
    /// Name and URL are both present; anything else is dropped after normalization.
    pub fn is_admissible(&self) -> bool {
        !self.name.is_empty() && !self.url.is_empty()
    }

    /// Description with the enrichment text appended, as shown to the oracle.
    pub fn enriched_description(&self) -> String {
        let base = if self.description.is_empty() {
            self.tagline.as_str()
        } else {
            self.description.as_str()
        };
        if self.enrichment.is_empty() {
            base.to_string()
        } else {
            format!("{base} | Search: {}", self.enrichment)
        }
    }

    /// Lowercased text searched for provenance evidence.
    pub fn evidence_text(&self) -> String {
        format!("{} {} {}", self.tagline, self.description, self.enrichment).to_lowercase()
    }
}

#[async_trait::async_trait]
pub trait FeedProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<RawRecord>>;
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_labels_round_trip_leniently() {
        for s in Source::ALL {
            assert_eq!(Source::parse(s.label()), s);
        }
        assert_eq!(Source::parse("hacker-news"), Source::HackerNews);
        assert_eq!(Source::parse("PRODUCT_HUNT"), Source::ProductHunt);
        assert_eq!(Source::parse("AIBase"), Source::Other);
    }

    #[test]
    fn raw_record_deserializes_with_missing_fields() {
        let r: RawRecord =
            serde_json::from_str(r#"{"name":"Gamma","source":"Product Hunt"}"#).unwrap();
        assert_eq!(r.name.as_deref(), Some("Gamma"));
        assert!(r.url.is_none());
        assert_eq!(r.source, Source::ProductHunt);
        assert!(r.tags.is_empty());
    }

    #[test]
    fn enriched_description_appends_search_text() {
        let mut c = Candidate {
            description: "Slides from an outline".into(),
            ..Default::default()
        };
        assert_eq!(c.enriched_description(), "Slides from an outline");
        c.enrichment = "HQ in San Francisco".into();
        assert_eq!(
            c.enriched_description(),
            "Slides from an outline | Search: HQ in San Francisco"
        );
    }
}
