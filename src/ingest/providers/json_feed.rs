// src/ingest/providers/json_feed.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use std::path::PathBuf;

use crate::ingest::types::{FeedProvider, RawRecord, Source};

/// Reads a JSON array of raw records, either from a file (re-read on every fetch)
/// or from an in-memory fixture. Records without an explicit source get `source`.
pub struct JsonFeedProvider {
    source: Source,
    limit: usize,
    mode: Mode,
}

enum Mode {
    File(PathBuf),
    Fixture(String),
}

impl JsonFeedProvider {
    pub fn from_path(source: Source, path: impl Into<PathBuf>) -> Self {
        Self {
            source,
            limit: usize::MAX,
            mode: Mode::File(path.into()),
        }
    }

    pub fn from_fixture(source: Source, json: &str) -> Self {
        Self {
            source,
            limit: usize::MAX,
            mode: Mode::Fixture(json.to_string()),
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    fn parse(&self, s: &str) -> Result<Vec<RawRecord>> {
        let mut records: Vec<serde_json::Value> =
            serde_json::from_str(s).context("parsing json feed")?;
        records.truncate(self.limit);

        let mut out = Vec::with_capacity(records.len());
        for mut v in records {
            if let Some(obj) = v.as_object_mut() {
                obj.entry("source")
                    .or_insert_with(|| serde_json::Value::String(self.source.label().into()));
            }
            match serde_json::from_value::<RawRecord>(v) {
                Ok(r) => out.push(r),
                Err(e) => tracing::debug!(error = %e, feed = self.source.label(), "skipping malformed record"),
            }
        }
        counter!("curator_raw_records_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl FeedProvider for JsonFeedProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawRecord>> {
        match &self.mode {
            Mode::Fixture(s) => self.parse(s),
            Mode::File(p) => {
                let s = tokio::fs::read_to_string(p)
                    .await
                    .with_context(|| format!("reading json feed {}", p.display()))?;
                self.parse(&s)
            }
        }
    }

    fn name(&self) -> &'static str {
        self.source.label()
    }
}
