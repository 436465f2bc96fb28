// src/curator.rs
//! Orchestrator for one curation run.
//!
//! fetch → window/normalize/session-dedup → value filter → balance → enrich →
//! `select_top_n` → origin downgrade → backfill → truncate → persist.
//!
//! Every external call is awaited in sequence. Source, enrichment, oracle and
//! persistence failures are isolated; a run always yields a (possibly short)
//! shortlist.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use metrics::{counter, gauge};
use std::collections::HashSet;
use std::sync::Arc;

use crate::balance::{balance, group_by_source, SlotPlan};
use crate::config::AppConfig;
use crate::enrich::{CachedEnricher, DisabledEnricher, EnrichHint, Enricher, TavilyEnricher};
use crate::filter::{RuleFilter, RulePolicy};
use crate::history::{HistoryStore, RecentStore};
use crate::ingest::dedup::{candidate_key, dedup_session, identity_key, normalize_name};
use crate::ingest::normalize::{normalize_all, strip_noise};
use crate::ingest::types::{Candidate, FeedProvider, RawRecord, Source};
use crate::ingest::window::{is_today, WindowPolicy};
use crate::ingest::{fetch_all, prepare_candidates};
use crate::oracle::prompt::{exclusion_note, DEFAULT_BLURB};
use crate::oracle::{
    HttpOracleClient, OracleDecision, Origin, Outcome, SelectionOracle,
};

/// Name similarity at or above which a pick is matched to a candidate.
const NAME_MATCH_THRESHOLD: f64 = 0.85;

#[derive(Debug, Clone)]
pub struct CuratorSettings {
    pub min_picks: usize,
    pub max_picks: usize,
    pub today_limit: usize,
    pub recent_days: i64,
    pub windows: WindowPolicy,
    pub slots: SlotPlan,
}

impl Default for CuratorSettings {
    fn default() -> Self {
        Self {
            min_picks: 3,
            max_picks: 4,
            today_limit: 30,
            recent_days: 30,
            windows: WindowPolicy::default(),
            slots: SlotPlan::default(),
        }
    }
}

impl CuratorSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            min_picks: cfg.curation.min_picks,
            max_picks: cfg.curation.max_picks,
            today_limit: cfg.curation.today_limit,
            recent_days: cfg.storage.recent_days,
            windows: cfg.window_policy(),
            slots: cfg.slot_plan(),
        }
    }
}

/// Output of [`Curator::run_daily`].
#[derive(Debug, Clone)]
pub struct RunReport {
    pub date: NaiveDate,
    pub today: Vec<Candidate>,
    pub shortlist: Vec<OracleDecision>,
}

pub struct Curator {
    providers: Vec<Box<dyn FeedProvider>>,
    oracle: SelectionOracle,
    enricher: Arc<dyn Enricher>,
    filter: RuleFilter,
    history: HistoryStore,
    recent: RecentStore,
    settings: CuratorSettings,
}

impl Curator {
    pub fn new(
        providers: Vec<Box<dyn FeedProvider>>,
        oracle: SelectionOracle,
        enricher: Arc<dyn Enricher>,
        filter: RuleFilter,
        history: HistoryStore,
        recent: RecentStore,
        settings: CuratorSettings,
    ) -> Self {
        Self {
            providers,
            oracle,
            enricher,
            filter,
            history,
            recent,
            settings,
        }
    }

    /// Production wiring. Refuses to build without an oracle key.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        cfg.validate()?;
        let client = HttpOracleClient::new(&cfg.oracle).context("building oracle client")?;
        let oracle = SelectionOracle::new(Arc::new(client), cfg.retry_policy());

        let enricher: Arc<dyn Enricher> = if cfg.enrichment.api_key.is_empty() {
            tracing::info!("no search key; enrichment disabled");
            Arc::new(DisabledEnricher)
        } else {
            let tavily = TavilyEnricher::new(&cfg.enrichment)?;
            Arc::new(CachedEnricher::new(tavily, cfg.enrichment.cache_dir.clone()))
        };

        let policy = RulePolicy::load_default(cfg.policy_path.as_deref())
            .context("loading rule policy")?;

        Ok(Self::new(
            cfg.build_providers(),
            oracle,
            enricher,
            RuleFilter::new(Arc::new(policy)),
            HistoryStore::load(cfg.storage.history_path.clone()),
            RecentStore::load(cfg.storage.recent_path.clone()),
            CuratorSettings::from_config(cfg),
        ))
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn recent(&self) -> &RecentStore {
        &self.recent
    }

    pub fn settings(&self) -> &CuratorSettings {
        &self.settings
    }

    pub async fn fetch_raw(&self) -> Vec<RawRecord> {
        fetch_all(&self.providers).await
    }

    /// Records published today (UTC) that pass the news gate, newest first.
    pub fn today_news(&self, raw: &[RawRecord], now: DateTime<Utc>) -> Vec<Candidate> {
        let fresh = raw
            .iter()
            .filter(|r| is_today(r.published_at, now) && self.filter.admits_news(r));
        let (mut items, _) = dedup_session(normalize_all(fresh), None);
        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        items.truncate(self.settings.today_limit);
        items
    }

    /// Windowed, normalized, session-deduped pool (recent-seen excluded),
    /// minus anything in `exclude`.
    pub fn weekly_pool(
        &self,
        raw: &[RawRecord],
        now: DateTime<Utc>,
        exclude: &HashSet<String>,
    ) -> Vec<Candidate> {
        let recent = self.recent.recent_keys(self.settings.recent_days, now);
        let (pool, removed) = prepare_candidates(raw, &self.settings.windows, now, Some(&recent));
        tracing::info!(pool = pool.len(), deduped = removed, "weekly pool prepared");
        pool.into_iter()
            .filter(|c| !exclude.contains(&candidate_key(c)))
            .collect()
    }

    /// Fetch and curate in one go.
    pub async fn curate(&mut self, now: DateTime<Utc>) -> Vec<OracleDecision> {
        let raw = self.fetch_raw().await;
        let pool = self.weekly_pool(&raw, now, &HashSet::new());
        self.curate_pool(pool, now).await
    }

    /// Today's radar plus the shortlist, fetching each source once.
    pub async fn run_daily(&mut self, now: DateTime<Utc>) -> RunReport {
        let raw = self.fetch_raw().await;
        let today = self.today_news(&raw, now);
        let today_keys: HashSet<String> = today.iter().map(candidate_key).collect();
        let pool = self.weekly_pool(&raw, now, &today_keys);
        let shortlist = self.curate_pool(pool, now).await;
        tracing::info!(today = today.len(), picks = shortlist.len(), "daily run finished");
        RunReport {
            date: now.date_naive(),
            today,
            shortlist,
        }
    }

    /// Curate a prepared pool: filter, balance, enrich, select, backfill, persist.
    pub async fn curate_pool(
        &mut self,
        pool: Vec<Candidate>,
        now: DateTime<Utc>,
    ) -> Vec<OracleDecision> {
        let filtered = self.filter.filter_value(pool, &self.history);
        let mut batch = balance(&group_by_source(filtered), &self.settings.slots);
        tracing::info!(batch = batch.len(), sources = ?batch_sources(&batch), "balanced batch");

        for c in batch.iter_mut() {
            let hint = if c.source == Source::GitHub {
                EnrichHint::Repository
            } else {
                EnrichHint::Generic
            };
            c.enrichment = self.enricher.enrich(&c.name, hint).await;
        }

        let picks = match self
            .oracle
            .select_top_n(&batch, self.settings.min_picks, self.settings.max_picks)
            .await
        {
            Outcome::Valid(v) => v,
            Outcome::Degraded(v) => {
                tracing::warn!(picks = v.len(), "oracle shortlist degraded");
                v
            }
            Outcome::Failed => {
                tracing::warn!("oracle shortlist failed; falling back to local summaries");
                Vec::new()
            }
        };

        let mut shortlist = self.screen_picks(picks, &batch);
        for d in shortlist.iter_mut() {
            apply_origin_policy(d, &batch, self.filter.policy());
        }

        self.backfill(&mut shortlist, &batch).await;
        shortlist.truncate(self.settings.max_picks);
        self.persist(&shortlist, now);
        shortlist
    }

    /// Keep picks that resolve to a batch candidate, appear once, and are not
    /// already in the ledger. A kept pick takes the candidate's identity.
    fn screen_picks(
        &self,
        picks: Vec<OracleDecision>,
        batch: &[Candidate],
    ) -> Vec<OracleDecision> {
        let mut taken: HashSet<String> = HashSet::new();
        let mut kept = Vec::with_capacity(picks.len());
        for mut d in picks {
            let Some(c) = match_candidate(&d, batch) else {
                counter!("curator_pick_dropped_total", "reason" => "unknown").increment(1);
                tracing::info!(name = %d.name, "pick not in batch; dropped");
                continue;
            };
            let key = candidate_key(c);
            let name = normalize_name(&c.name);
            if taken.contains(&key) || taken.contains(&name) {
                counter!("curator_pick_dropped_total", "reason" => "repeat").increment(1);
                tracing::info!(name = %d.name, matched = %c.name, "repeated pick; dropped");
                continue;
            }
            if self.history.is_duplicate(&d.name, &d.url)
                || self.history.is_duplicate(&c.name, &c.url)
            {
                counter!("curator_pick_dropped_total", "reason" => "history").increment(1);
                tracing::info!(name = %d.name, "pick already recommended; dropped");
                continue;
            }
            taken.insert(key);
            taken.insert(name);
            d.name = c.name.clone();
            d.url = c.url.clone();
            d.source = c.source;
            kept.push(d);
        }
        kept
    }

    async fn backfill(&self, shortlist: &mut Vec<OracleDecision>, batch: &[Candidate]) {
        for c in batch {
            if shortlist.len() >= self.settings.min_picks {
                break;
            }
            let key = candidate_key(c);
            let name = normalize_name(&c.name);
            let present = shortlist
                .iter()
                .any(|d| identity_key(&d.name, &d.url) == key || normalize_name(&d.name) == name);
            if present {
                continue;
            }
            let intro = self.fallback_reason(c).await;
            counter!("curator_backfill_total").increment(1);
            tracing::info!(name = %c.name, source = %c.source, "backfilled pick");
            shortlist.push(OracleDecision {
                name: c.name.clone(),
                url: c.url.clone(),
                intro,
                origin: Origin::Global,
                source: c.source,
                degradation: None,
            });
        }
    }

    /// Local summary for a candidate the oracle did not (or could not) cover:
    /// Chinese description as-is, else a single-item oracle summary, else a
    /// template chosen by name category.
    pub async fn fallback_reason(&self, c: &Candidate) -> String {
        let desc = strip_noise(&c.description);
        if crate::oracle::quality::contains_han(&desc) {
            return desc.chars().take(100).collect();
        }

        let basis = if c.enrichment.is_empty() { &desc } else { &c.enrichment };
        let basis: String = basis.chars().take(200).collect();
        if !basis.trim().is_empty() {
            if let Outcome::Valid(s) = self.oracle.one_line_summary(&c.name, &basis).await {
                return s;
            }
        }
        template_reason(&c.name)
    }

    /// Single pick for one source: up to two oracle rounds skipping recently
    /// seen names, then the first unseen candidate, then the first candidate.
    pub async fn pick_from_source(
        &mut self,
        candidates: &[Candidate],
        source: Source,
        now: DateTime<Utc>,
    ) -> Option<OracleDecision> {
        let seen = self.recent.recent_keys(self.settings.recent_days, now);
        let is_seen = |name: &str, url: &str| {
            seen.contains(&normalize_name(name)) || seen.contains(&identity_key(name, url))
        };
        let mut remaining = self.filter.filter(candidates.to_vec());
        let mut excluded: Vec<String> = remaining
            .iter()
            .filter(|c| is_seen(&c.name, &c.url))
            .map(|c| c.name.clone())
            .collect();

        for _ in 0..2 {
            let note = exclusion_note(&excluded);
            let Some(d) = self
                .oracle
                .select_best_with(&remaining, source.label(), &note)
                .await
                .into_option()
            else {
                break;
            };
            if !d.name.trim().is_empty() && !is_seen(&d.name, &d.url) {
                self.remember(&d, now);
                return Some(d);
            }
            let dropped = normalize_name(&d.name);
            remaining.retain(|c| normalize_name(&c.name) != dropped);
            if !excluded.iter().any(|n| normalize_name(n) == dropped) {
                excluded.push(d.name.clone());
            }
        }

        if let Some(c) = remaining
            .iter()
            .find(|c| !c.name.trim().is_empty() && !is_seen(&c.name, &c.url))
        {
            let d = plain_decision(c);
            self.remember(&d, now);
            return Some(d);
        }
        candidates.first().map(plain_decision)
    }

    fn remember(&mut self, d: &OracleDecision, now: DateTime<Utc>) {
        self.recent.append([(d.name.as_str(), d.url.as_str())], now);
        self.recent.prune(self.settings.recent_days, now);
        if let Err(e) = self.recent.save() {
            tracing::warn!(error = ?e, "recent-seen write failed");
        }
    }

    /// Write failures are logged; the in-memory shortlist stands.
    fn persist(&mut self, shortlist: &[OracleDecision], now: DateTime<Utc>) {
        let date = now.date_naive().format("%Y-%m-%d").to_string();
        if let Err(e) = self.history.save_recommendations(shortlist, &date) {
            tracing::warn!(error = ?e, "history write failed");
        }
        self.recent.append(
            shortlist.iter().map(|d| (d.name.as_str(), d.url.as_str())),
            now,
        );
        self.recent.prune(self.settings.recent_days, now);
        if let Err(e) = self.recent.save() {
            tracing::warn!(error = ?e, "recent-seen write failed");
        }
        gauge!("curator_last_run_ts").set(now.timestamp() as f64);
    }
}

fn batch_sources(batch: &[Candidate]) -> Vec<&'static str> {
    batch.iter().map(|c| c.source.label()).collect()
}

fn plain_decision(c: &Candidate) -> OracleDecision {
    let intro = [&c.tagline, &c.description]
        .into_iter()
        .find(|s| !s.trim().is_empty())
        .cloned()
        .unwrap_or_else(|| DEFAULT_BLURB.to_string());
    OracleDecision {
        name: c.name.clone(),
        url: c.url.clone(),
        intro,
        origin: Origin::Global,
        source: c.source,
        degradation: None,
    }
}

/// Template summary keyed by what the product name suggests.
pub fn template_reason(name: &str) -> String {
    let lowered = name.to_lowercase();
    let has = |keys: &[&str]| keys.iter().any(|k| lowered.contains(k));
    if has(&["doc", "note", "pdf", "知识", "文档"]) {
        format!("{name} 是一款智能文档处理工具，可提升知识管理效率。")
    } else if has(&["video", "image", "art", "design", "视频", "图片"]) {
        format!("{name} 是一款 AI 创作工具，可快速生成专业视觉内容。")
    } else if has(&["meet", "team", "project", "会议", "协作"]) {
        format!("{name} 是一款办公协作工具，可提升团队工作效率。")
    } else if has(&["write", "copy", "text", "写作", "文案"]) {
        format!("{name} 是一款 AI 写作助手，可快速生成高质量文案。")
    } else {
        format!("{name} 是一款专注于办公效率的 AI 工具。")
    }
}

/// Find the batch candidate a pick refers to: exact lowercase name, then URL
/// identity, then the closest name at or above the similarity threshold.
pub fn match_candidate<'a>(d: &OracleDecision, batch: &'a [Candidate]) -> Option<&'a Candidate> {
    let name = normalize_name(&d.name);
    if let Some(c) = batch.iter().find(|c| normalize_name(&c.name) == name) {
        return Some(c);
    }
    if !d.url.trim().is_empty() {
        let key = identity_key("", &d.url);
        if let Some(c) = batch.iter().find(|c| candidate_key(c) == key) {
            return Some(c);
        }
    }
    batch
        .iter()
        .map(|c| (c, strsim::normalized_levenshtein(&normalize_name(&c.name), &name)))
        .filter(|(_, score)| *score >= NAME_MATCH_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(c, _)| c)
}

/// Domestic requires a registration or HQ-city token in the matched
/// candidate's own text (tagline, description, enrichment). Otherwise Global.
pub fn apply_origin_policy(d: &mut OracleDecision, batch: &[Candidate], policy: &RulePolicy) {
    if d.origin != Origin::Domestic {
        return;
    }
    let evidence = match_candidate(d, batch)
        .map(|c| policy.has_domestic_evidence(&c.evidence_text()))
        .unwrap_or(false);
    if !evidence {
        tracing::info!(name = %d.name, "origin downgraded to Global (no evidence)");
        d.origin = Origin::Global;
    }
}
