// src/enrich.rs
//! Enrichment collaborator: external search text appended to a candidate.
//!
//! `enrich` never fails; any problem degrades to an empty string.

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::EnrichmentConfig;
use crate::history::write_atomic;
use crate::ingest::normalize::strip_noise;

const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";
const MAX_CHARS: usize = 800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnrichHint {
    Repository,
    Generic,
}

impl EnrichHint {
    pub fn query(self, name: &str) -> String {
        match self {
            EnrichHint::Repository => {
                format!("{name} GitHub readme features company headquarters founders location")
            }
            EnrichHint::Generic => {
                format!("{name} AI tool features review company headquarters founders Chinese")
            }
        }
    }
}

#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, name: &str, hint: EnrichHint) -> String;
    fn name(&self) -> &'static str;
}

/// Used when no search key is configured.
pub struct DisabledEnricher;

#[async_trait]
impl Enricher for DisabledEnricher {
    async fn enrich(&self, _name: &str, _hint: EnrichHint) -> String {
        String::new()
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Fixed answers by product name (case-insensitive); unknown names get "".
#[derive(Default)]
pub struct StaticEnricher {
    answers: HashMap<String, String>,
}

impl StaticEnricher {
    pub fn new<I, K, V>(answers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            answers: answers
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_lowercase(), v.into()))
                .collect(),
        }
    }
}

#[async_trait]
impl Enricher for StaticEnricher {
    async fn enrich(&self, name: &str, _hint: EnrichHint) -> String {
        self.answers
            .get(&name.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }
    fn name(&self) -> &'static str {
        "static"
    }
}

pub struct TavilyEnricher {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
}

#[derive(Serialize)]
struct SearchReq<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'a str,
    include_answer: bool,
    max_results: u32,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct SearchResp {
    answer: Option<String>,
    results: Vec<SearchHit>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct SearchHit {
    content: String,
}

impl TavilyEnricher {
    pub fn new(cfg: &EnrichmentConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("ai-product-curator/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("building search http client")?;
        Ok(Self {
            http,
            api_key: cfg.api_key.clone(),
            endpoint: TAVILY_ENDPOINT.to_string(),
        })
    }

    async fn search(&self, query: &str) -> Result<String> {
        let req = SearchReq {
            api_key: &self.api_key,
            query,
            search_depth: "advanced",
            include_answer: true,
            max_results: 3,
        };
        let resp = self
            .http
            .post(&self.endpoint)
            .json(&req)
            .send()
            .await
            .context("search request")?
            .error_for_status()
            .context("search status")?;
        let body: SearchResp = resp.json().await.context("search body")?;
        Ok(summarize(body))
    }
}

/// Prefer a substantive answer; otherwise join the longer result snippets.
fn summarize(body: SearchResp) -> String {
    let answer = body.answer.unwrap_or_default();
    let raw = if answer.trim().chars().count() > 50 {
        answer
    } else {
        body.results
            .iter()
            .map(|h| h.content.trim())
            .filter(|c| c.chars().count() > 20)
            .collect::<Vec<_>>()
            .join(" ")
    };
    let capped: String = raw.chars().take(MAX_CHARS).collect();
    strip_noise(&capped)
}

#[async_trait]
impl Enricher for TavilyEnricher {
    async fn enrich(&self, name: &str, hint: EnrichHint) -> String {
        if self.api_key.is_empty() || name.trim().is_empty() {
            return String::new();
        }
        match self.search(&hint.query(name)).await {
            Ok(s) => s,
            Err(e) => {
                counter!("enrich_failures_total").increment(1);
                tracing::warn!(error = ?e, name, "enrichment failed");
                String::new()
            }
        }
    }
    fn name(&self) -> &'static str {
        "tavily"
    }
}

/// On-disk cache keyed by SHA-256 of the search query. Cache I/O errors are ignored.
pub struct CachedEnricher<E> {
    inner: E,
    dir: PathBuf,
}

impl<E: Enricher> CachedEnricher<E> {
    pub fn new(inner: E, dir: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            dir: dir.into(),
        }
    }

    fn path_for(&self, query: &str) -> PathBuf {
        let digest = Sha256::digest(query.as_bytes());
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        self.dir.join(format!("{hex}.txt"))
    }
}

fn read_cached(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().filter(|s| !s.is_empty())
}

#[async_trait]
impl<E: Enricher> Enricher for CachedEnricher<E> {
    async fn enrich(&self, name: &str, hint: EnrichHint) -> String {
        let path = self.path_for(&hint.query(name));
        if let Some(hit) = read_cached(&path) {
            tracing::debug!(name, "enrichment cache hit");
            return hit;
        }
        let fresh = self.inner.enrich(name, hint).await;
        if !fresh.is_empty() {
            if let Err(e) = write_atomic(&path, fresh.as_bytes()) {
                tracing::debug!(error = %e, "enrichment cache write failed");
            }
        }
        fresh
    }
    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
