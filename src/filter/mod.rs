// src/filter/mod.rs
//! Rule filter: an ordered chain of deterministic keyword predicates.
//!
//! Order only decides which [`Rejection`] is reported; acceptance is the AND-NOT
//! of every predicate. The filter never mutates its inputs.

pub mod policy;

use metrics::counter;
use std::fmt;
use std::sync::Arc;

use crate::history::DuplicateLookup;
use crate::ingest::types::{Candidate, RawRecord};
pub use policy::{contains_term, RulePolicy, TermSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GiantKind {
    Companion,
    Vertical,
    Vendor,
    DevTool,
    Infra,
}

impl GiantKind {
    pub fn as_str(self) -> &'static str {
        match self {
            GiantKind::Companion => "companion",
            GiantKind::Vertical => "vertical",
            GiantKind::Vendor => "vendor",
            GiantKind::DevTool => "devtool",
            GiantKind::Infra => "infra",
        }
    }
}

/// Why a candidate was rejected (first failing predicate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Blocklisted(String),
    GenericName,
    Giant { kind: GiantKind, term: String },
    DevTool(String),
    LowQuality(i32),
    Duplicate,
}

impl Rejection {
    /// Stable metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::Blocklisted(_) => "blocklist",
            Rejection::GenericName => "generic_name",
            Rejection::Giant { .. } => "giant",
            Rejection::DevTool(_) => "dev_tool",
            Rejection::LowQuality(_) => "low_quality",
            Rejection::Duplicate => "duplicate",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Blocklisted(t) => write!(f, "blocklisted term '{t}'"),
            Rejection::GenericName => f.write_str("generic name"),
            Rejection::Giant { kind, term } => write!(f, "{} term '{term}'", kind.as_str()),
            Rejection::DevTool(t) => write!(f, "developer tool ('{t}')"),
            Rejection::LowQuality(s) => write!(f, "quality score {s}"),
            Rejection::Duplicate => f.write_str("already recommended"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Admit,
    Reject(Rejection),
}

impl Verdict {
    pub fn is_admit(&self) -> bool {
        matches!(self, Verdict::Admit)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleFilter {
    policy: Arc<RulePolicy>,
}

impl RuleFilter {
    pub fn new(policy: Arc<RulePolicy>) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RulePolicy {
        &self.policy
    }

    /// Keyword-penalty score over name + tagline.
    pub fn quality_score(&self, name: &str, tagline: &str) -> i32 {
        let text = format!("{name} {tagline}").to_lowercase();
        let mut score = 0;
        if self.policy.quality_phrases.matches(&text) {
            score -= self.policy.quality_penalty;
        }
        score
    }

    pub fn is_generic_name(&self, name: &str) -> bool {
        let lowered = name.trim().to_lowercase();
        if lowered.is_empty() {
            return false;
        }
        if self.policy.generic_names.contains(&lowered) {
            return true;
        }
        let words: Vec<&str> = lowered.split_whitespace().collect();
        words.len() <= self.policy.generic_max_tokens
            && words.iter().all(|w| self.policy.generic_words.contains(w))
    }

    /// Giant / doesn't-need-promotion detector. The allowlist wins over every
    /// other group.
    pub fn giant_match(&self, name: &str, description: &str) -> Option<(GiantKind, String)> {
        let p = &*self.policy;
        let haystack = format!("{name} {description}").to_lowercase();
        if p.giant_allowlist.matches(&haystack) {
            return None;
        }
        let groups = [
            (GiantKind::Companion, &p.companion_terms),
            (GiantKind::Vertical, &p.vertical_terms),
            (GiantKind::Vendor, &p.vendor_terms),
            (GiantKind::DevTool, &p.devtool_terms),
            (GiantKind::Infra, &p.infra_terms),
        ];
        groups
            .into_iter()
            .find_map(|(kind, set)| set.find_in(&haystack).map(|t| (kind, t.to_string())))
    }

    pub fn is_giant(&self, name: &str, description: &str) -> bool {
        self.giant_match(name, description).is_some()
    }

    /// Value-path developer-tool detector. Returns the deciding term.
    pub fn dev_tool_match(&self, name: &str, tagline: &str, description: &str) -> Option<String> {
        let p = &*self.policy;
        let haystack = format!("{name} {tagline} {description}").to_lowercase();

        if let Some(t) = p.dev_killers.find_in(&haystack) {
            return Some(t.to_string());
        }
        if let Some(t) = p.builder_terms.find_in(&haystack) {
            if !p.user_scenarios.matches(&haystack) {
                return Some(t.to_string());
            }
        }
        if haystack.contains("github.com") && !p.app_indicators.matches(&haystack) {
            return Some("github.com".to_string());
        }
        None
    }

    fn blocklisted(&self, c: &Candidate) -> Option<String> {
        let haystack = format!("{} {} {}", c.name, c.tagline, c.description).to_lowercase();
        self.policy.blocklist.find_in(&haystack).map(str::to_string)
    }

    fn giant_rejection(&self, c: &Candidate) -> Option<Rejection> {
        let desc = format!("{} {}", c.tagline, c.description);
        self.giant_match(&c.name, &desc)
            .map(|(kind, term)| Rejection::Giant { kind, term })
    }

    fn quality_rejection(&self, c: &Candidate) -> Option<Rejection> {
        let score = self.quality_score(&c.name, &c.tagline);
        (score <= self.policy.quality_reject_threshold).then_some(Rejection::LowQuality(score))
    }

    /// Base chain: blocklist → generic name → giant → quality.
    pub fn evaluate(&self, c: &Candidate) -> Verdict {
        if let Some(t) = self.blocklisted(c) {
            return Verdict::Reject(Rejection::Blocklisted(t));
        }
        if self.is_generic_name(&c.name) {
            return Verdict::Reject(Rejection::GenericName);
        }
        if let Some(r) = self.giant_rejection(c) {
            return Verdict::Reject(r);
        }
        if let Some(r) = self.quality_rejection(c) {
            return Verdict::Reject(r);
        }
        Verdict::Admit
    }

    /// Value path: the base chain with the dev-tool detector after the giant
    /// check, then permanent-history lookup.
    pub fn evaluate_value(&self, c: &Candidate, history: &dyn DuplicateLookup) -> Verdict {
        if let Some(t) = self.blocklisted(c) {
            return Verdict::Reject(Rejection::Blocklisted(t));
        }
        if self.is_generic_name(&c.name) {
            return Verdict::Reject(Rejection::GenericName);
        }
        if let Some(r) = self.giant_rejection(c) {
            return Verdict::Reject(r);
        }
        if let Some(t) = self.dev_tool_match(&c.name, &c.tagline, &c.description) {
            return Verdict::Reject(Rejection::DevTool(t));
        }
        if let Some(r) = self.quality_rejection(c) {
            return Verdict::Reject(r);
        }
        if history.is_duplicate(&c.name, &c.url) {
            return Verdict::Reject(Rejection::Duplicate);
        }
        Verdict::Admit
    }

    /// Today's-news gate over name + tagline + url.
    pub fn admits_news(&self, raw: &RawRecord) -> bool {
        let name = raw.name.as_deref().unwrap_or_default();
        let url = raw.url.as_deref().unwrap_or_default();
        let tagline = raw.tagline.as_deref().unwrap_or_default();
        if url.trim().is_empty() || self.is_giant(name, tagline) {
            return false;
        }
        let haystack = format!("{name} {tagline} {url}").to_lowercase();
        let p = &*self.policy;
        !(p.blocklist.matches(&haystack)
            || p.devtool_terms.matches(&haystack)
            || p.vendor_terms.matches(&haystack))
    }

    pub fn filter(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        self.retain_with(candidates, |c| self.evaluate(c))
    }

    pub fn filter_value(
        &self,
        candidates: Vec<Candidate>,
        history: &dyn DuplicateLookup,
    ) -> Vec<Candidate> {
        self.retain_with(candidates, |c| self.evaluate_value(c, history))
    }

    fn retain_with<F>(&self, candidates: Vec<Candidate>, verdict: F) -> Vec<Candidate>
    where
        F: Fn(&Candidate) -> Verdict,
    {
        crate::telemetry::ensure_metrics_described();
        candidates
            .into_iter()
            .filter(|c| match verdict(c) {
                Verdict::Admit => true,
                Verdict::Reject(r) => {
                    tracing::debug!(name = %c.name, source = %c.source, reason = %r, "rejected");
                    counter!("curator_rejected_total", "reason" => r.reason()).increment(1);
                    false
                }
            })
            .collect()
    }
}
