// src/ingest/dedup.rs
//! Identity keys and the session deduplicator.
//!
//! Names normalize to lowercase+trim. URLs additionally drop the query string
//! and trailing slashes, so `https://gamma.app/?ref=x` and `https://Gamma.app`
//! are the same identity.

use std::collections::HashSet;

use crate::ingest::types::Candidate;

/// Lowercase + trim.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Lowercase + trim, drop `?query` (and any `#fragment`), strip trailing `/`.
pub fn normalize_url(url: &str) -> String {
    let lowered = url.trim().to_lowercase();
    let cut = lowered
        .find(['?', '#'])
        .map(|i| &lowered[..i])
        .unwrap_or(lowered.as_str());
    cut.trim_end_matches('/').to_string()
}

/// Session identity: the normalized URL when present, otherwise the normalized name.
/// Empty means "no identity".
pub fn identity_key(name: &str, url: &str) -> String {
    let u = normalize_url(url);
    if !u.is_empty() {
        return u;
    }
    normalize_name(name)
}

pub fn candidate_key(c: &Candidate) -> String {
    identity_key(&c.name, &c.url)
}

/// Stable first-occurrence dedup by identity key.
///
/// Candidates without an identity, or whose key is in `recent` (rolling-window
/// membership), are dropped as well. Returns the survivors and how many were removed.
pub fn dedup_session(
    candidates: Vec<Candidate>,
    recent: Option<&HashSet<String>>,
) -> (Vec<Candidate>, usize) {
    let mut seen: HashSet<String> = HashSet::with_capacity(candidates.len());
    let mut keep = Vec::with_capacity(candidates.len());
    let mut removed = 0usize;

    for c in candidates {
        let key = candidate_key(&c);
        let in_recent = recent.is_some_and(|r| r.contains(&key));
        if key.is_empty() || in_recent || !seen.insert(key) {
            removed += 1;
            continue;
        }
        keep.push(c);
    }

    (keep, removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(name: &str, url: &str) -> Candidate {
        Candidate {
            name: name.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    #[test]
    fn url_normalization_strips_query_case_and_slash() {
        assert_eq!(normalize_url(" https://Gamma.app/?ref=x "), "https://gamma.app");
        assert_eq!(normalize_url("https://x.io/a/#top"), "https://x.io/a");
        assert_eq!(normalize_url(""), "");
    }

    #[test]
    fn first_occurrence_wins_and_order_is_kept() {
        let input = vec![
            cand("A", "https://a.io"),
            cand("B", "https://b.io"),
            cand("a again", "https://A.io/"),
            cand("C", ""),
            cand("c", ""),
        ];
        let (out, removed) = dedup_session(input, None);
        let names: Vec<_> = out.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(removed, 2);
    }

    #[test]
    fn recent_keys_are_excluded() {
        let recent: HashSet<String> = ["https://b.io".to_string()].into_iter().collect();
        let (out, removed) =
            dedup_session(vec![cand("A", "https://a.io"), cand("B", "https://b.io")], Some(&recent));
        assert_eq!(out.len(), 1);
        assert_eq!(removed, 1);
    }

    #[test]
    fn records_without_identity_are_dropped() {
        let (out, removed) = dedup_session(vec![cand("  ", "")], None);
        assert!(out.is_empty());
        assert_eq!(removed, 1);
    }
}
