// src/config/app.rs
//! Application configuration: TOML file, then environment overrides.
//! Precedence is env > file > built-in defaults.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::balance::SlotPlan;
use crate::ingest::providers::{JsonFeedProvider, RssFeedProvider};
use crate::ingest::types::{FeedProvider, Source};
use crate::ingest::window::WindowPolicy;
use crate::oracle::RetryPolicy;

const ENV_PATH: &str = "CURATOR_CONFIG_PATH";
const DEFAULT_PATH: &str = "config/curator.toml";

/// Oracle key variables, first non-empty wins.
pub const ORACLE_KEY_VARS: [&str; 4] = [
    "DEEPSEEK_API_KEY",
    "LLM_API_KEY",
    "OPENAI_API_KEY",
    "OPENROUTER_API_KEY",
];
pub const WEBHOOK_VARS: [&str; 3] = ["REPORT_WEBHOOK_URL", "FEISHU_WEBHOOK", "SLACK_WEBHOOK"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub max_rate_limit_waits: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.deepseek.com".into(),
            model: "deepseek-chat".into(),
            temperature: 0.5,
            timeout_secs: 90,
            max_retries: 3,
            max_rate_limit_waits: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Empty disables enrichment (not fatal).
    pub api_key: String,
    pub cache_dir: PathBuf,
    pub timeout_secs: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            cache_dir: PathBuf::from("cache/enrichment"),
            timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub history_path: PathBuf,
    pub recent_path: PathBuf,
    pub recent_days: i64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            history_path: PathBuf::from("data/history.json"),
            recent_path: PathBuf::from("data/recommendations.json"),
            recent_days: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurationConfig {
    pub batch_cap: usize,
    pub min_picks: usize,
    pub max_picks: usize,
    pub weekly_days: i64,
    pub today_limit: usize,
    pub github_min_stars: u32,
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            batch_cap: 6,
            min_picks: 3,
            max_picks: 4,
            weekly_days: 7,
            today_limit: 30,
            github_min_stars: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
    pub webhook_urls: Vec<String>,
    pub metrics_path: Option<PathBuf>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("reports"),
            webhook_urls: Vec::new(),
            metrics_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    Rss,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub kind: FeedKind,
    pub source: Source,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl FeedConfig {
    pub fn build(&self) -> Result<Box<dyn FeedProvider>> {
        let limit = self.limit.unwrap_or(usize::MAX);
        match self.kind {
            FeedKind::Rss => {
                let url = self
                    .url
                    .as_deref()
                    .ok_or_else(|| anyhow!("rss feed for {} needs a url", self.source))?;
                Ok(Box::new(
                    RssFeedProvider::from_url(self.source, url)?.with_limit(limit),
                ))
            }
            FeedKind::Json => {
                let path = self
                    .path
                    .as_ref()
                    .ok_or_else(|| anyhow!("json feed for {} needs a path", self.source))?;
                Ok(Box::new(
                    JsonFeedProvider::from_path(self.source, path).with_limit(limit),
                ))
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub oracle: OracleConfig,
    pub enrichment: EnrichmentConfig,
    pub storage: StorageConfig,
    pub curation: CurationConfig,
    pub report: ReportConfig,
    /// Optional `RulePolicy` file (TOML/JSON).
    pub policy_path: Option<PathBuf>,
    pub feeds: Vec<FeedConfig>,
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing curator config")
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&s)
    }

    /// File lookup:
    /// 1) explicit `path`
    /// 2) $CURATOR_CONFIG_PATH
    /// 3) config/curator.toml
    /// 4) defaults
    ///
    /// Environment overrides are applied on top in every case.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = if let Some(p) = path {
            Self::load_from(p)?
        } else if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("CURATOR_CONFIG_PATH points to non-existent path");
            }
            Self::load_from(&pb)?
        } else if Path::new(DEFAULT_PATH).exists() {
            Self::load_from(Path::new(DEFAULT_PATH))?
        } else {
            Self::default()
        };
        cfg.apply_env(|k| std::env::var(k).ok());
        Ok(cfg)
    }

    /// Apply overrides from a variable lookup (the process env in production).
    pub fn apply_env<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = ORACLE_KEY_VARS.iter().find_map(|&k| get(k)) {
            self.oracle.api_key = key;
        }
        if let Some(v) = get("LLM_BASE_URL") {
            self.oracle.base_url = v;
        }
        if let Some(v) = get("LLM_MODEL") {
            self.oracle.model = v;
        }
        if let Some(v) = get("TAVILY_API_KEY") {
            self.enrichment.api_key = v;
        }
        let hooks: Vec<String> = WEBHOOK_VARS.iter().filter_map(|&k| get(k)).collect();
        if !hooks.is_empty() {
            self.report.webhook_urls = hooks;
        }
        if let Some(v) = get("CURATOR_METRICS_PATH") {
            self.report.metrics_path = Some(PathBuf::from(v));
        }
    }

    /// A missing oracle key is fatal: the run must not start.
    pub fn validate(&self) -> Result<()> {
        if self.oracle.api_key.trim().is_empty() {
            bail!(
                "oracle API key missing: set one of {} or [oracle].api_key",
                ORACLE_KEY_VARS.join(", ")
            );
        }
        let c = &self.curation;
        if c.min_picks == 0 || c.min_picks > c.max_picks {
            bail!("curation: need 0 < min_picks <= max_picks (got {}..{})", c.min_picks, c.max_picks);
        }
        if c.batch_cap == 0 {
            bail!("curation: batch_cap must be positive");
        }
        if self.oracle.max_retries == 0 {
            bail!("oracle: max_retries must be positive");
        }
        Ok(())
    }

    pub fn window_policy(&self) -> WindowPolicy {
        WindowPolicy::weekly(self.curation.weekly_days, self.curation.github_min_stars)
    }

    pub fn slot_plan(&self) -> SlotPlan {
        SlotPlan::with_cap(self.curation.batch_cap)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.oracle.max_retries,
            max_rate_limit_waits: self.oracle.max_rate_limit_waits,
            ..RetryPolicy::default()
        }
    }

    /// Build every configured feed; a misconfigured feed is logged and skipped.
    pub fn build_providers(&self) -> Vec<Box<dyn FeedProvider>> {
        self.feeds
            .iter()
            .filter_map(|f| match f.build() {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!(error = ?e, source = %f.source, "skipping feed");
                    None
                }
            })
            .collect()
    }
}
