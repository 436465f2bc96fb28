// src/ingest/providers/rss.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Duration;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::ingest::types::{FeedProvider, RawRecord, Source};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    #[serde(rename = "category", default)]
    categories: Vec<String>,
}

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    let odt = OffsetDateTime::parse(ts.trim(), &Rfc2822).ok()?;
    DateTime::<Utc>::from_timestamp(odt.unix_timestamp(), 0)
}

/// Product Hunt style "Name - tagline" titles: split into (name, tagline).
fn split_title(title: &str) -> (String, Option<String>) {
    let title = title.trim();
    for sep in [" - ", " – ", " — ", ": "] {
        if let Some((name, rest)) = title.split_once(sep) {
            let rest = rest.trim();
            return (
                name.trim().to_string(),
                (!rest.is_empty()).then(|| rest.to_string()),
            );
        }
    }
    (title.to_string(), None)
}

/// Generic RSS 2.0 feed provider.
pub struct RssFeedProvider {
    source: Source,
    limit: usize,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl RssFeedProvider {
    pub fn from_fixture(source: Source, xml: &str) -> Self {
        Self {
            source,
            limit: usize::MAX,
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    pub fn from_url(source: Source, url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("ai-product-curator/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .build()
            .context("building rss http client")?;
        Ok(Self {
            source,
            limit: usize::MAX,
            mode: Mode::Http {
                url: url.into(),
                client,
            },
        })
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    fn parse_items_from_str(&self, s: &str) -> Result<Vec<RawRecord>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;

        let mut out = Vec::with_capacity(rss.channel.item.len().min(self.limit));
        for it in rss.channel.item.into_iter().take(self.limit) {
            let Some(title) = it.title.as_deref().filter(|t| !t.trim().is_empty()) else {
                continue;
            };
            let (name, title_tagline) = split_title(title);
            let description = it
                .description
                .as_deref()
                .map(crate::ingest::normalize::strip_noise)
                .filter(|d| !d.is_empty());

            out.push(RawRecord {
                name: Some(name),
                url: it.link.map(|l| l.trim().to_string()),
                tagline: title_tagline.or_else(|| description.clone()),
                description,
                tags: it.categories,
                source: self.source,
                published_at: it.pub_date.as_deref().and_then(parse_rfc2822),
                stars: None,
                homepage: None,
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        counter!("curator_raw_records_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl FeedProvider for RssFeedProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawRecord>> {
        match &self.mode {
            Mode::Fixture(s) => self.parse_items_from_str(s),
            Mode::Http { url, client } => {
                let body = client
                    .get(url.as_str())
                    .send()
                    .await
                    .with_context(|| format!("rss GET {url}"))?
                    .error_for_status()
                    .context("rss non-2xx")?
                    .text()
                    .await
                    .context("rss body")?;
                self.parse_items_from_str(&body)
            }
        }
    }

    fn name(&self) -> &'static str {
        self.source.label()
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
