// src/oracle/parse.rs
//! Turning free oracle text into typed picks.
//!
//! Tolerates `<think>` blocks, markdown code fences and prose around the JSON.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

/// Rejection sentinel for summaries.
pub const SENTINEL: &str = "NULL";
const INVALID_MARKER: &str = "error: 无效数据";

/// A summary after sentinel parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intro {
    Accepted(String),
    Rejected,
}

impl Intro {
    pub fn parse(raw: &str) -> Self {
        let t = raw.trim();
        if t.eq_ignore_ascii_case(SENTINEL) || t.to_lowercase().contains(INVALID_MARKER) {
            Intro::Rejected
        } else {
            Intro::Accepted(t.to_string())
        }
    }
}

/// One pick as the oracle returns it. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawPick {
    pub name: String,
    pub url: String,
    #[serde(alias = "intro", alias = "summary")]
    pub one_sentence_intro_cn: String,
    pub origin: Option<String>,
    pub source: Option<String>,
}

fn think_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").expect("static regex"))
}

fn fence_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"```[A-Za-z]*").expect("static regex"))
}

/// Remove reasoning blocks and code-fence markers.
pub fn clean_response(text: &str) -> String {
    let no_think = think_re().replace_all(text, "");
    fence_re().replace_all(&no_think, "").trim().to_string()
}

/// First JSON value (object or array) found in `text`.
pub fn extract_json(text: &str) -> Option<Value> {
    let cleaned = clean_response(text);
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(v) = serde_json::from_str::<Value>(&cleaned) {
        if v.is_object() || v.is_array() {
            return Some(v);
        }
    }
    // Stream-parse from each opening bracket; trailing prose is ignored.
    for (i, _) in cleaned.match_indices(['{', '[']) {
        let mut stream = serde_json::Deserializer::from_str(&cleaned[i..]).into_iter::<Value>();
        if let Some(Ok(v)) = stream.next() {
            return Some(v);
        }
    }
    None
}

/// A single pick: a JSON object with a non-empty `name`.
pub fn parse_single(text: &str) -> Option<RawPick> {
    let t = clean_response(text);
    if matches!(t.to_lowercase().as_str(), "none" | "null" | "no" | "n/a") {
        return None;
    }
    let v = extract_json(&t)?;
    let v = match v {
        Value::Array(mut items) if !items.is_empty() => items.remove(0),
        other => other,
    };
    serde_json::from_value::<RawPick>(v)
        .ok()
        .filter(|p| !p.name.trim().is_empty())
}

/// A pick list: a JSON array, or an object wrapping one (`{"items": [...]}`).
/// Entries that are not objects or lack a name are skipped. `None` if no list.
pub fn parse_list(text: &str) -> Option<Vec<RawPick>> {
    let items = match extract_json(text)? {
        Value::Array(items) => items,
        Value::Object(map) => map.into_iter().find_map(|(_, v)| match v {
            Value::Array(items) => Some(items),
            _ => None,
        })?,
        _ => return None,
    };
    Some(
        items
            .into_iter()
            .filter_map(|v| serde_json::from_value::<RawPick>(v).ok())
            .filter(|p| !p.name.trim().is_empty())
            .collect(),
    )
}
