// src/filter/policy.rs
//! `RulePolicy`: the immutable keyword configuration behind the rule filter.
//!
//! Built once at startup (defaults, or a TOML/JSON file whose groups override
//! the defaults) and shared read-only as `Arc<RulePolicy>`.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PATH: &str = "RULE_POLICY_PATH";

/// Normalized (lowercase, trimmed, deduplicated) list of terms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct TermSet {
    terms: Vec<String>,
}

impl TermSet {
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut terms = Vec::new();
        for it in items {
            let t = it.as_ref().trim().to_lowercase();
            if !t.is_empty() && seen.insert(t.clone()) {
                terms.push(t);
            }
        }
        Self { terms }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(String::as_str)
    }

    /// Exact membership of an already-lowercased value.
    pub fn contains(&self, value: &str) -> bool {
        self.terms.iter().any(|t| t == value)
    }

    /// First term occurring in the lowercased `haystack` (see [`contains_term`]).
    pub fn find_in(&self, haystack: &str) -> Option<&str> {
        self.iter().find(|t| contains_term(haystack, t))
    }

    pub fn matches(&self, haystack: &str) -> bool {
        self.find_in(haystack).is_some()
    }
}

impl From<Vec<String>> for TermSet {
    fn from(v: Vec<String>) -> Self {
        TermSet::new(v)
    }
}

impl From<TermSet> for Vec<String> {
    fn from(t: TermSet) -> Self {
        t.terms
    }
}

/// Term-boundary containment over lowercased text.
///
/// ASCII terms must not be embedded in a longer ASCII alphanumeric run, except
/// that a plural trailing `s` is tolerated ("game" matches "games", not "gameplay").
/// Terms with non-ASCII characters match as plain substrings.
pub fn contains_term(haystack: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    if !term.is_ascii() {
        return haystack.contains(term);
    }

    let word = |c: char| c.is_ascii_alphanumeric();
    let check_start = term.chars().next().is_some_and(word);
    let check_end = term.chars().last().is_some_and(word);

    for (i, _) in haystack.match_indices(term) {
        if check_start && haystack[..i].chars().next_back().is_some_and(word) {
            continue;
        }
        if check_end {
            let mut rest = haystack[i + term.len()..].chars();
            match rest.next() {
                None => {}
                Some('s') if !rest.next().is_some_and(word) => {}
                Some(c) if word(c) => continue,
                Some(_) => {}
            }
        }
        return true;
    }
    false
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulePolicy {
    /// Domain blocklist (dev tooling, infra, social/dating, lifestyle/health, gaming...).
    pub blocklist: TermSet,
    /// Names that are nothing but a category ("ai chat", "translator").
    pub generic_names: TermSet,
    /// Words a name may not consist solely of (≤ `generic_max_tokens` tokens).
    pub generic_words: TermSet,
    pub generic_max_tokens: usize,
    /// Productivity giants that always pass the giant detector.
    pub giant_allowlist: TermSet,
    pub companion_terms: TermSet,
    pub vertical_terms: TermSet,
    pub vendor_terms: TermSet,
    pub devtool_terms: TermSet,
    pub infra_terms: TermSet,
    /// Generic marketing phrases; each hit subtracts `quality_penalty` once.
    pub quality_phrases: TermSet,
    pub quality_penalty: i32,
    /// Score at or below this rejects.
    pub quality_reject_threshold: i32,
    /// Value-path dev-tool detector.
    pub dev_killers: TermSet,
    pub builder_terms: TermSet,
    pub user_scenarios: TermSet,
    pub app_indicators: TermSet,
    /// Evidence required to keep a Domestic origin claim.
    pub origin_registration_tokens: TermSet,
    pub origin_city_tokens: TermSet,
}

impl Default for RulePolicy {
    fn default() -> Self {
        Self {
            blocklist: TermSet::new([
                // developer tooling
                "sdk", "api", "cli", "boilerplate", "template", "starter kit", "starter-kit",
                "library", "framework", "database", "backend", "frontend", "deploy",
                "kubernetes", "k8s", "docker", "container", "serverless", "lambda",
                "agent core", "agentcore", "open source", "open-source", "self-hosted",
                "devops", "devtool", "developer tool", "infrastructure", "terraform",
                "npm", "pip", "cargo", "maven", "gradle", "package manager",
                "python library", "node module", "react component", "vue component",
                "microservice", "orchestration", "ci/cd", "pipeline",
                "mcp", "server", "python", "fastmcp", "client", "repo",
                // social / community
                "network", "community", "social", "connect", "dating", "meet",
                "club", "forum", "social media", "social network", "art network",
                // home / living
                "home design", "interior", "decor", "furniture", "reimagine home",
                "wallpaper", "room design", "house", "garden", "kitchen design",
                "smart home", "home automation", "iot", "appliance",
                // habits / journaling
                "habit", "habitz", "habit tracker", "goal tracker", "streak",
                "journaling", "diary", "mood tracker", "mood",
                "gratitude", "reflection", "self-care", "mindfulness",
                "daily routine", "morning routine", "routine",
                // resumes
                "resume", "cv builder", "resume builder",
                // parenting / health
                "baby", "parenting", "infant", "toddler", "pregnancy", "mother", "父母",
                "health", "fitness", "workout", "exercise", "sleep", "meditation", "wellness",
                "caffeine", "calorie", "diet", "weight", "nutrition", "yoga", "breathing",
                // dating
                "girlfriend", "boyfriend", "romance", "love", "match", "relationship",
                "nsfw", "adult",
                // gaming / entertainment
                "game", "gaming", "puzzle", "arcade", "casino", "trivia", "quiz game",
                "tarot", "horoscope", "astrology", "fortune", "zodiac",
                // shopping / fashion / finance
                "shopping", "fashion", "clothing", "beauty", "cosmetic", "skincare",
                "crypto", "bitcoin", "trading", "stock", "forex", "nft",
                // misc lifestyle
                "face swap", "protocol",
                "k12", "k-12", "tutor", "tutoring", "flashcard", "study",
                "food", "recipe", "cooking", "restaurant", "meal", "grocery",
                "pet", "dog", "cat", "travel", "vacation", "hotel", "flight",
                "weather", "calendar", "reminder", "alarm", "timer",
                // model vendors
                "chatgpt", "claude", "gemini", "copilot", "dall", "openai", "quillbot",
            ]),
            generic_names: TermSet::new([
                "translator", "3d viewer", "ai chat", "chatbot", "assistant",
                "converter", "downloader", "editor", "generator", "maker",
                "ai writer", "text to video", "video generator", "image generator",
            ]),
            generic_words: TermSet::new([
                "ai", "tool", "app", "bot", "assistant", "helper", "generator", "maker",
                "viewer", "editor",
            ]),
            generic_max_tokens: 3,
            giant_allowlist: TermSet::new([
                "notion", "raycast", "obsidian", "canva", "figma", "miro",
                "wps", "feishu", "飞书", "arc", "arc browser",
                "perplexity", "genspark", "anygen", "linear",
                "airtable", "coda", "clickup", "monday", "asana",
                "midjourney", "runway", "pika", "luma", "kling",
            ]),
            companion_terms: TermSet::new([
                "companion", "waifu", "live2d", "virtual friend",
                "girlfriend", "boyfriend", "dating", "roleplay",
                "anime", "character ai", "soulmate", "vtuber",
                "virtual pet", "ai friend", "ai girlfriend", "ai boyfriend",
                "emotional support", "chat companion", "ai companion",
                "facetime", "video call",
            ]),
            vertical_terms: TermSet::new([
                "trading", "trader", "crypto", "bitcoin", "stock", "forex",
                "investment", "portfolio", "hedge fund", "quantitative",
                "medical", "diagnosis", "healthcare", "clinical", "patient",
                "hospital", "doctor", "pharmacy", "drug", "symptom",
                "legal advice", "lawyer", "attorney", "litigation", "lawsuit",
                "real estate", "property", "mortgage", "rental",
                "insurance", "agriculture", "farming", "mining",
            ]),
            vendor_terms: TermSet::new([
                "netlify", "vercel", "aws", "amazon web services",
                "azure", "google cloud", "gcp", "cloudflare",
                "supabase", "docker", "kubernetes", "gitlab",
                "heroku", "digitalocean", "linode", "fly.io", "railway",
                "render", "planetscale", "neon", "upstash",
            ]),
            devtool_terms: TermSet::new([
                "deploy", "deployment", "backend", "devops", "infrastructure",
                "server", "hosting", "kubernetes", "docker", "container",
                "ci/cd", "monitoring", "observability",
                "serverless", "runtime", "capsule",
                "sdk", "api", "webhook", "endpoint", "rest api", "graphql",
                "mcp", "fastmcp",
                "ide", "code editor", "debugger", "compiler", "terminal",
                "database", "sql", "nosql", "postgres", "mongodb", "redis",
                "open source", "open-source", "github repo", "npm package",
                "firmware", "hardware", "embedded", "iot", "raspberry",
                "agent builder", "agent platform", "agent framework",
                "app builder", "workflow builder", "automation builder",
                "low-code platform", "no-code platform",
            ]),
            infra_terms: TermSet::new([
                "chatgpt", "claude", "gemini", "gpt-4", "gpt-5",
                "openai", "anthropic", "google ai", "meta ai",
                "azure", "aws", "gcp", "lambda",
            ]),
            quality_phrases: TermSet::new([
                "text to video generator", "ai writer free", "ai writer", "text to video",
                "video generator", "image generator", "ai chatbot", "ai tool",
            ]),
            quality_penalty: 100,
            quality_reject_threshold: -50,
            dev_killers: TermSet::new([
                "deploy", "deployment", "backend", "devops", "infrastructure",
                "serverless", "hosting", "ci/cd", "cicd",
                "kubernetes", "k8s", "docker", "container", "terraform",
                "aws", "azure", "gcp", "lambda", "monitoring", "observability",
                "sdk", "api", "cli", "boilerplate", "starter kit",
                "library", "framework", "database", "npm", "pip install",
                "python library", "node module", "open source", "open-source",
                "git", "gitlab", "repository", "debugger",
                "terminal", "shell", "code editor",
                "agent builder", "agent platform", "agent framework", "agent core",
                "app builder", "code generator", "code generation", "mcp",
                "low-code platform", "no-code platform", "developer tool",
            ]),
            builder_terms: TermSet::new(["builder", "no-code", "low-code"]),
            user_scenarios: TermSet::new([
                "document", "design", "presentation", "meeting",
                "writing", "note", "collaboration", "team", "video", "image",
            ]),
            app_indicators: TermSet::new(["app", "gui", "desktop", "web app", "chrome extension"]),
            origin_registration_tokens: TermSet::new(["icp", "备案"]),
            origin_city_tokens: TermSet::new([
                "beijing", "shanghai", "shenzhen", "hangzhou", "guangzhou",
                "北京", "上海", "深圳", "杭州", "广州",
            ]),
        }
    }
}

impl RulePolicy {
    /// Load from an explicit path. Supports TOML or JSON; groups absent from the
    /// file keep their defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading rule policy from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_policy(&content, ext.as_str())
    }

    /// Load using env var + fallbacks:
    /// 1) explicit `path` (config `policy_path`)
    /// 2) $RULE_POLICY_PATH
    /// 3) config/rule_policy.toml
    /// 4) built-in defaults
    pub fn load_default(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            return Self::load_from(p);
        }
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("RULE_POLICY_PATH points to non-existent path"));
        }
        let toml_p = PathBuf::from("config/rule_policy.toml");
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        Ok(Self::default())
    }

    /// Text carries a registration ID or headquarters-city token.
    pub fn has_domestic_evidence(&self, text_lower: &str) -> bool {
        self.origin_registration_tokens.matches(text_lower)
            || self.origin_city_tokens.matches(text_lower)
    }
}

fn parse_policy(s: &str, hint_ext: &str) -> Result<RulePolicy> {
    if hint_ext == "json" {
        return serde_json::from_str(s).context("parsing rule policy json");
    }
    match toml::from_str::<RulePolicy>(s) {
        Ok(p) => Ok(p),
        Err(toml_err) => serde_json::from_str(s)
            .map_err(|_| anyhow!("unsupported rule policy format: {toml_err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_boundaries_are_respected() {
        assert!(contains_term("a cat app", "cat"));
        assert!(!contains_term("education platform", "cat"));
        assert!(contains_term("retro games hub", "game"));
        assert!(!contains_term("gameplay capture", "game"));
        assert!(contains_term("deploy via ci/cd fast", "ci/cd"));
        assert!(contains_term("京icp备12345号", "icp"));
        assert!(contains_term("照顾父母的助手", "父母"));
        assert!(!contains_term("", "x"));
    }

    #[test]
    fn termset_normalizes_and_dedups() {
        let t = TermSet::new([" API ", "api", "", "Sdk"]);
        assert_eq!(t.iter().collect::<Vec<_>>(), vec!["api", "sdk"]);
        assert!(t.contains("sdk"));
    }

    #[test]
    fn partial_toml_overrides_only_named_groups() {
        let p = parse_policy(
            r#"
blocklist = ["Casino"]
quality_reject_threshold = -10
"#,
            "toml",
        )
        .unwrap();
        assert_eq!(p.blocklist.len(), 1);
        assert!(p.blocklist.contains("casino"));
        assert_eq!(p.quality_reject_threshold, -10);
        assert_eq!(p.giant_allowlist, RulePolicy::default().giant_allowlist);
    }

    #[test]
    fn json_policy_is_accepted() {
        let p = parse_policy(r#"{"generic_names": ["ai chat"]}"#, "json").unwrap();
        assert_eq!(p.generic_names.len(), 1);
    }

    #[test]
    fn domestic_evidence_requires_registration_or_city() {
        let p = RulePolicy::default();
        assert!(p.has_domestic_evidence("company hq: hangzhou, zhejiang"));
        assert!(p.has_domestic_evidence("粤icp备2020号"));
        assert!(!p.has_domestic_evidence("chinese-sounding name, asian market focus"));
    }
}
