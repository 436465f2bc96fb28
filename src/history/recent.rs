// src/history/recent.rs
//! Recent-seen records (`{name, url, ts}`), used for rolling-window membership.
//! Distinct from the permanent ledger: entries older than the window stop counting.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::{quarantine, write_atomic};
use crate::ingest::dedup::{identity_key, normalize_name};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct RecentStore {
    path: PathBuf,
    records: Vec<RecentRecord>,
}

impl RecentStore {
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: Vec::new(),
        }
    }

    /// An unreadable file is moved aside and the store starts empty.
    /// Individual records with an unparseable timestamp are skipped.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let mut store = Self::empty(path);
        if !store.path.exists() {
            return store;
        }
        match read_records(&store.path) {
            Ok(records) => store.records = records,
            Err(e) => {
                let moved = quarantine(&store.path);
                tracing::warn!(error = ?e, moved = ?moved, "recent-seen file unreadable; starting empty");
            }
        }
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[RecentRecord] {
        &self.records
    }

    /// Identity keys (and normalized names) seen within the last `days`.
    pub fn recent_keys(&self, days: i64, now: DateTime<Utc>) -> HashSet<String> {
        let cutoff = now - Duration::days(days);
        let mut keys = HashSet::new();
        for r in self.records.iter().filter(|r| r.ts >= cutoff) {
            let key = identity_key(&r.name, &r.url);
            if !key.is_empty() {
                keys.insert(key);
            }
            let name = normalize_name(&r.name);
            if !name.is_empty() {
                keys.insert(name);
            }
        }
        keys
    }

    /// Record selections; entries without any identity are skipped.
    pub fn append<'a, I>(&mut self, picks: I, now: DateTime<Utc>)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, url) in picks {
            if identity_key(name, url).is_empty() {
                continue;
            }
            self.records.push(RecentRecord {
                name: name.to_string(),
                url: url.to_string(),
                ts: now,
            });
        }
    }

    /// Drop records older than `days`. Returns how many were removed.
    pub fn prune(&mut self, days: i64, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::days(days);
        let before = self.records.len();
        self.records.retain(|r| r.ts >= cutoff);
        let pruned = before - self.records.len();
        if pruned > 0 {
            counter!("curator_recent_pruned_total").increment(pruned as u64);
            tracing::debug!(pruned, kept = self.records.len(), "recent-seen pruned");
        }
        pruned
    }

    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.records).context("serializing recent-seen")?;
        write_atomic(&self.path, &json)
            .with_context(|| format!("writing recent-seen {}", self.path.display()))
    }
}

fn read_records(path: &Path) -> Result<Vec<RecentRecord>> {
    let s = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    let values: Vec<serde_json::Value> =
        serde_json::from_str(&s).with_context(|| format!("parsing {}", path.display()))?;
    Ok(values
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn window_excludes_old_records() {
        let now = Utc.with_ymd_and_hms(2025, 9, 30, 0, 0, 0).unwrap();
        let mut s = RecentStore::empty("unused.json");
        s.append([("Old", "https://old.io")], now - Duration::days(31));
        s.append([("New", "https://new.io/"), ("", "")], now - Duration::days(2));

        let keys = s.recent_keys(30, now);
        assert!(keys.contains("https://new.io"));
        assert!(keys.contains("new"));
        assert!(!keys.contains("https://old.io"));
        assert_eq!(s.records().len(), 2);
    }

    #[test]
    fn prune_drops_records_outside_the_window() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("recs.json");
        let now = Utc.with_ymd_and_hms(2025, 9, 30, 0, 0, 0).unwrap();
        let mut s = RecentStore::empty(&p);
        s.append([("Old", "https://old.io")], now - Duration::days(45));
        s.append([("Edge", "https://edge.io")], now - Duration::days(30));
        s.append([("New", "https://new.io")], now);

        assert_eq!(s.prune(30, now), 1);
        s.save().unwrap();

        let names: Vec<_> = RecentStore::load(&p)
            .records()
            .iter()
            .map(|r| r.name.clone())
            .collect();
        assert_eq!(names, vec!["Edge", "New"]);
        assert_eq!(s.prune(30, now), 0);
    }

    #[test]
    fn unreadable_file_is_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("recs.json");
        fs::write(&p, "not json").unwrap();

        let s = RecentStore::load(&p);
        assert!(s.records().is_empty());
        assert!(!p.exists());
        let aside: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("recs.json.corrupt-"))
            .collect();
        assert_eq!(aside.len(), 1);
        assert_eq!(fs::read_to_string(aside[0].path()).unwrap(), "not json");
    }

    #[test]
    fn bad_timestamps_are_skipped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("recs.json");
        fs::write(
            &p,
            r#"[{"name":"A","url":"https://a.io","ts":"2025-09-01T00:00:00+00:00"},
                {"name":"B","url":"https://b.io","ts":"yesterday"}]"#,
        )
        .unwrap();
        let s = RecentStore::load(&p);
        assert_eq!(s.records().len(), 1);
        assert_eq!(s.records()[0].name, "A");
    }
}
