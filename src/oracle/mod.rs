// src/oracle/mod.rs
//! Selection oracle adapter.
//!
//! Per call: `Requesting → {ParsedValid, ParsedDegraded, ParseFailed}`, retrying
//! up to `max_retries` content attempts. HTTP 429 is handled below that budget:
//! an attempt-scaled wait, then the same attempt is re-issued (bounded by
//! `max_rate_limit_waits`). Calls never raise to the caller; exhaustion yields
//! `Outcome::Failed`.

pub mod client;
pub mod parse;
pub mod prompt;
pub mod quality;

use metrics::counter;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::ingest::dedup::normalize_name;
use crate::ingest::types::{Candidate, Source};
pub use client::{ChatMessage, HttpOracleClient, OracleClient, OracleError, ScriptedClient};
pub use parse::{Intro, RawPick};
pub use quality::Degradation;

/// Result of a stage that may degrade instead of failing.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Valid(T),
    Degraded(T),
    Failed,
}

impl<T> Outcome<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Outcome::Valid(v) | Outcome::Degraded(v) => Some(v),
            Outcome::Failed => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Outcome::Valid(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    #[serde(rename = "CN")]
    Domestic,
    #[default]
    Global,
}

impl Origin {
    /// Anything other than an explicit domestic label is Global.
    pub fn parse(label: Option<&str>) -> Self {
        match label.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("cn") | Some("china") | Some("domestic") => Origin::Domestic,
            _ => Origin::Global,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Origin::Domestic => "[🇨🇳 中国]",
            Origin::Global => "[🌍 海外]",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Origin::Domestic => "CN",
            Origin::Global => "Global",
        })
    }
}

/// One selected product with its display-ready summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleDecision {
    pub name: String,
    pub url: String,
    pub intro: String,
    pub origin: Origin,
    pub source: Source,
    /// Set when `intro` carries a visible degradation marker.
    #[serde(skip)]
    pub degradation: Option<Degradation>,
}

impl OracleDecision {
    pub fn is_clean(&self) -> bool {
        self.degradation.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Content attempts per call (oracle round-trips, not counting 429 re-issues).
    pub max_retries: u32,
    pub max_rate_limit_waits: u32,
    /// Multiplier on every wait; 0.0 disables sleeping.
    pub time_scale: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_rate_limit_waits: 3,
            time_scale: 1.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Same bounds, no sleeping.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            time_scale: 0.0,
            jitter: false,
            ..Self::default()
        }
    }

    /// `min(2^attempt, 6)` s plus U[0,1) s jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = 2f64.powi(attempt.min(16) as i32).min(6.0);
        let jitter = if self.jitter {
            rand::rng().random::<f64>()
        } else {
            0.0
        };
        Duration::from_secs_f64((base + jitter) * self.time_scale)
    }

    /// `min(30·n, 120)` s for the n-th consecutive 429.
    pub fn rate_limit_wait(&self, n: u32) -> Duration {
        let secs = (30 * u64::from(n)).min(120) as f64;
        Duration::from_secs_f64(secs * self.time_scale)
    }
}

pub struct SelectionOracle {
    client: Arc<dyn OracleClient>,
    retry: RetryPolicy,
}

impl SelectionOracle {
    pub fn new(client: Arc<dyn OracleClient>, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// One round-trip, re-issued after rate-limit waits.
    async fn request(&self, messages: &[ChatMessage]) -> Result<String, OracleError> {
        let mut waits = 0u32;
        loop {
            match self.client.complete(messages).await {
                Err(OracleError::RateLimited) if waits < self.retry.max_rate_limit_waits => {
                    waits += 1;
                    counter!("oracle_rate_limited_total").increment(1);
                    let wait = self.retry.rate_limit_wait(waits);
                    tracing::warn!(wait_s = wait.as_secs_f64(), waits, "oracle rate limited; waiting");
                    tokio::time::sleep(wait).await;
                }
                other => return other,
            }
        }
    }

    async fn fail_attempt(&self, attempt: u32, kind: &'static str, detail: &(dyn fmt::Display + Sync)) {
        counter!("oracle_attempt_failures_total", "kind" => kind).increment(1);
        tracing::warn!(attempt, kind, error = %detail, client = self.client.name(), "oracle attempt failed");
        if attempt < self.retry.max_retries {
            tokio::time::sleep(self.retry.backoff(attempt)).await;
        }
    }

    pub async fn select_best(
        &self,
        candidates: &[Candidate],
        source_label: &str,
    ) -> Outcome<OracleDecision> {
        self.select_best_with(candidates, source_label, "").await
    }

    /// Exactly one pick with a one-sentence summary.
    pub async fn select_best_with(
        &self,
        candidates: &[Candidate],
        source_label: &str,
        extra_instruction: &str,
    ) -> Outcome<OracleDecision> {
        if candidates.is_empty() {
            return Outcome::Failed;
        }
        crate::telemetry::ensure_metrics_described();
        let messages = [
            ChatMessage::system(prompt::SYSTEM_PROMPT),
            ChatMessage::user(prompt::select_best_prompt(
                candidates,
                source_label,
                extra_instruction,
            )),
        ];
        let fallback_source = Source::parse(source_label);

        let mut best: Option<(RawPick, String)> = None;
        for attempt in 1..=self.retry.max_retries {
            let text = match self.request(&messages).await {
                Ok(t) => t,
                Err(e) => {
                    self.fail_attempt(attempt, e.kind(), &e).await;
                    continue;
                }
            };
            let Some(pick) = parse::parse_single(&text) else {
                self.fail_attempt(attempt, "malformed", &"no JSON pick in response").await;
                continue;
            };
            let intro = match Intro::parse(&pick.one_sentence_intro_cn) {
                Intro::Rejected => {
                    tracing::info!(name = %pick.name, source = source_label, "oracle rejected pick");
                    continue;
                }
                Intro::Accepted(t) => t,
            };
            if quality::assess(&intro).is_none() {
                return Outcome::Valid(decision(&pick, intro, None, candidates, fallback_source));
            }
            if best.is_none() {
                best = Some((pick, intro));
            }
        }

        match best {
            Some((pick, intro)) => {
                let (text, degradation) = quality::mark(&intro);
                tracing::warn!(name = %pick.name, source = source_label, "returning degraded pick");
                Outcome::Degraded(decision(&pick, text, degradation, candidates, fallback_source))
            }
            None => Outcome::Failed,
        }
    }

    /// A shortlist of `min..=max` picks. Sentinel items are dropped; weak
    /// summaries are marked, not dropped.
    pub async fn select_top_n(
        &self,
        candidates: &[Candidate],
        min: usize,
        max: usize,
    ) -> Outcome<Vec<OracleDecision>> {
        if candidates.is_empty() {
            return Outcome::Failed;
        }
        crate::telemetry::ensure_metrics_described();
        let messages = [
            ChatMessage::system(prompt::SYSTEM_PROMPT),
            ChatMessage::user(prompt::select_top_n_prompt(candidates, min, max)),
        ];

        let mut best: Vec<OracleDecision> = Vec::new();
        for attempt in 1..=self.retry.max_retries {
            let text = match self.request(&messages).await {
                Ok(t) => t,
                Err(e) => {
                    self.fail_attempt(attempt, e.kind(), &e).await;
                    continue;
                }
            };
            let Some(picks) = parse::parse_list(&text) else {
                self.fail_attempt(attempt, "malformed", &"no JSON list in response").await;
                continue;
            };

            let mut valid = Vec::with_capacity(picks.len());
            for pick in picks {
                match Intro::parse(&pick.one_sentence_intro_cn) {
                    Intro::Rejected => {
                        tracing::info!(name = %pick.name, "oracle rejected item");
                    }
                    Intro::Accepted(t) => {
                        let (text, degradation) = quality::mark(&t);
                        let src = pick.source.as_deref().map(Source::parse).unwrap_or_default();
                        valid.push(decision(&pick, text, degradation, candidates, src));
                    }
                }
            }

            let clean = valid.iter().filter(|d| d.is_clean()).count();
            if clean >= min {
                return Outcome::Valid(valid);
            }
            tracing::info!(attempt, clean, valid = valid.len(), min, "shortlist below minimum");
            if valid.len() > best.len() {
                best = valid;
            }
            if attempt < self.retry.max_retries {
                tokio::time::sleep(self.retry.backoff(attempt)).await;
            }
        }

        if best.is_empty() {
            Outcome::Failed
        } else {
            Outcome::Degraded(best)
        }
    }

    /// Single-item summary. `Valid` only for a Chinese line longer than 15
    /// characters; otherwise a visibly marked placeholder.
    pub async fn one_line_summary(&self, name: &str, text: &str) -> Outcome<String> {
        let messages = [
            ChatMessage::system(prompt::SUMMARY_SYSTEM_PROMPT),
            ChatMessage::user(prompt::summary_prompt(name, text)),
        ];
        match self.request(&messages).await {
            Ok(resp) => {
                let cleaned = parse::clean_response(&resp);
                let line = cleaned
                    .lines()
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .trim_matches(|c: char| c == '"' || c == '\'')
                    .trim();
                if quality::contains_han(line) && line.chars().count() > 15 {
                    return Outcome::Valid(line.to_string());
                }
            }
            Err(e) => {
                counter!("oracle_attempt_failures_total", "kind" => e.kind()).increment(1);
                tracing::warn!(error = %e, name, "one-line summary failed");
            }
        }
        let placeholder = if text.trim().is_empty() {
            format!("{name} - AI 工具")
        } else {
            format!("(待翻译) {}", text.trim().chars().take(60).collect::<String>())
        };
        Outcome::Degraded(placeholder)
    }
}

/// Build a decision, filling `url`/`source` from the matching candidate when
/// the oracle left them out.
fn decision(
    pick: &RawPick,
    intro: String,
    degradation: Option<Degradation>,
    candidates: &[Candidate],
    fallback_source: Source,
) -> OracleDecision {
    let wanted = normalize_name(&pick.name);
    let matched = candidates.iter().find(|c| normalize_name(&c.name) == wanted);
    let url = if pick.url.trim().is_empty() {
        matched.map(|c| c.url.clone()).unwrap_or_default()
    } else {
        pick.url.trim().to_string()
    };
    let source = match (matched, fallback_source) {
        (Some(c), _) => c.source,
        (None, s) => s,
    };
    OracleDecision {
        name: pick.name.trim().to_string(),
        url,
        intro,
        origin: Origin::parse(pick.origin.as_deref()),
        source,
        degradation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cands() -> Vec<Candidate> {
        vec![Candidate {
            name: "Gamma".into(),
            url: "https://gamma.app".into(),
            source: Source::ProductHunt,
            ..Default::default()
        }]
    }

    fn oracle(client: ScriptedClient) -> (SelectionOracle, Arc<ScriptedClient>) {
        let c = Arc::new(client);
        (SelectionOracle::new(c.clone(), RetryPolicy::immediate(3)), c)
    }

    #[tokio::test]
    async fn best_valid_on_first_clean_answer() {
        let (o, c) = oracle(ScriptedClient::always(
            r#"{"name":"Gamma","one_sentence_intro_cn":"做演示文稿太耗时，这工具输入大纲即可自动生成排版精美的幻灯片。"}"#,
        ));
        let out = o.select_best(&cands(), "Product Hunt").await;
        let d = out.clone().into_option().unwrap();
        assert!(out.is_valid());
        assert_eq!(d.url, "https://gamma.app");
        assert_eq!(d.source, Source::ProductHunt);
        assert_eq!(c.calls(), 1);
    }

    #[tokio::test]
    async fn best_degrades_after_exhausting_retries() {
        let (o, c) = oracle(ScriptedClient::always(
            r#"{"name":"Gamma","one_sentence_intro_cn":"AI slides from an outline"}"#,
        ));
        match o.select_best(&cands(), "Product Hunt").await {
            Outcome::Degraded(d) => {
                assert_eq!(d.intro, "(自动翻译失败) AI slides from an outline");
                assert_eq!(d.degradation, Some(Degradation::Untranslated));
            }
            other => panic!("expected degraded, got {other:?}"),
        }
        assert_eq!(c.calls(), 3);
    }

    #[tokio::test]
    async fn rate_limit_is_reissued_without_spending_attempts() {
        let (o, c) = oracle(ScriptedClient::new([
            Err(OracleError::RateLimited),
            Err(OracleError::RateLimited),
            Ok(r#"[{"name":"Gamma","one_sentence_intro_cn":"做演示文稿太耗时，这工具输入大纲即可自动生成排版精美的幻灯片。"}]"#.to_string()),
        ]));
        let out = o.select_top_n(&cands(), 1, 4).await;
        assert!(out.is_valid());
        assert_eq!(c.calls(), 3);
    }

    #[tokio::test]
    async fn persistent_rate_limit_terminates() {
        let (o, c) = oracle(ScriptedClient::new(Vec::new()).with_fallback(Err(OracleError::RateLimited)));
        assert!(o.select_top_n(&cands(), 1, 4).await.is_failed());
        // (1 + max_rate_limit_waits) round-trips per content attempt.
        assert_eq!(c.calls(), 3 * 4);
    }

    #[tokio::test]
    async fn empty_batch_makes_no_calls() {
        let (o, c) = oracle(ScriptedClient::always("[]"));
        assert!(o.select_top_n(&[], 3, 4).await.is_failed());
        assert_eq!(c.calls(), 0);
    }

    #[tokio::test]
    async fn one_line_summary_takes_first_chinese_line() {
        let (o, _) = oracle(ScriptedClient::always(
            "\"会议纪要整理费时，这工具自动转写并提炼行动项，让团队会后立刻跟进。\"\n（注：以上为翻译）",
        ));
        let out = o.one_line_summary("Otter", "Meeting notes").await;
        assert_eq!(
            out,
            Outcome::Valid("会议纪要整理费时，这工具自动转写并提炼行动项，让团队会后立刻跟进。".into())
        );

        let (o, _) = oracle(ScriptedClient::always("Sorry"));
        assert_eq!(
            o.one_line_summary("Otter", "Meeting notes").await,
            Outcome::Degraded("(待翻译) Meeting notes".into())
        );
    }

    #[test]
    fn origin_parsing_defaults_to_global() {
        assert_eq!(Origin::parse(Some("CN")), Origin::Domestic);
        assert_eq!(Origin::parse(Some("Mars")), Origin::Global);
        assert_eq!(Origin::parse(None), Origin::Global);
    }

    #[test]
    fn waits_follow_schedule() {
        let r = RetryPolicy {
            jitter: false,
            ..RetryPolicy::default()
        };
        assert_eq!(r.backoff(1), Duration::from_secs(2));
        assert_eq!(r.backoff(5), Duration::from_secs(6));
        assert_eq!(r.rate_limit_wait(2), Duration::from_secs(60));
        assert_eq!(r.rate_limit_wait(9), Duration::from_secs(120));
    }
}
