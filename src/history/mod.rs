// src/history/mod.rs
//! Permanent recommendation ledger ("never recommend twice").
//!
//! The whole ledger is read into memory at start and rewritten in one atomic
//! replace on save. Single writer, single process: the in-memory index is not
//! safe for concurrent writers, and two overlapping runs against the same file
//! must be serialized externally (one process or an external lock).

pub mod recent;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::ingest::dedup::{normalize_name, normalize_url};
use crate::oracle::OracleDecision;

pub use recent::{RecentRecord, RecentStore};

/// Anything that can answer "was this product already recommended?".
pub trait DuplicateLookup {
    fn is_duplicate(&self, name: &str, url: &str) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub source: String,
    /// YYYY-MM-DD
    #[serde(default)]
    pub date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistoryStats {
    pub total: usize,
    pub by_source: BTreeMap<String, usize>,
}

#[derive(Debug, Default)]
pub struct HistoryStore {
    path: PathBuf,
    entries: Vec<HistoryEntry>,
    names: HashSet<String>,
    urls: HashSet<String>,
    /// Set when an unreadable file could not be moved aside; `save` refuses.
    locked: bool,
}

impl HistoryStore {
    /// In-memory store persisting to `path`, ignoring whatever is on disk.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Load the ledger. A missing file is a fresh start. An unreadable or
    /// corrupt file is moved to `<path>.corrupt-<ts>` and the store starts
    /// empty; if it cannot be moved, the store is read-only.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let mut store = Self::empty(path);
        if !store.path.exists() {
            tracing::info!(path = %store.path.display(), "no history file, starting fresh");
            return store;
        }
        match read_entries(&store.path) {
            Ok(entries) => {
                for e in &entries {
                    store.index(e);
                }
                store.entries = entries;
                tracing::info!(entries = store.entries.len(), "history loaded");
            }
            Err(e) => match quarantine(&store.path) {
                Ok(moved) => {
                    tracing::warn!(error = ?e, moved_to = %moved.display(), "history unreadable; kept aside, using empty ledger");
                }
                Err(mv) => {
                    tracing::error!(error = ?e, rename_error = %mv, path = %store.path.display(), "history unreadable and could not be kept aside; writes disabled");
                    store.locked = true;
                }
            },
        }
        store
    }

    /// True when the on-disk ledger is unreadable and must not be replaced.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn index(&mut self, e: &HistoryEntry) {
        let n = normalize_name(&e.name);
        if !n.is_empty() {
            self.names.insert(n);
        }
        let u = normalize_url(&e.url);
        if !u.is_empty() {
            self.urls.insert(u);
        }
    }

    /// True when either the normalized name or the normalized URL was recorded.
    /// Empty fields never match.
    pub fn is_duplicate(&self, name: &str, url: &str) -> bool {
        let n = normalize_name(name);
        if !n.is_empty() && self.names.contains(&n) {
            return true;
        }
        let u = normalize_url(url);
        !u.is_empty() && self.urls.contains(&u)
    }

    /// Append unless already known. Returns whether an entry was added.
    pub fn add(&mut self, name: &str, url: &str, source: &str, date: &str) -> bool {
        if self.is_duplicate(name, url) || (name.trim().is_empty() && url.trim().is_empty()) {
            return false;
        }
        let entry = HistoryEntry {
            name: name.to_string(),
            url: url.to_string(),
            source: source.to_string(),
            date: date.to_string(),
        };
        self.index(&entry);
        self.entries.push(entry);
        true
    }

    /// Bulk add + persist. Returns how many new entries were recorded.
    pub fn save_recommendations(&mut self, picks: &[OracleDecision], date: &str) -> Result<usize> {
        let added = picks
            .iter()
            .filter(|d| self.add(&d.name, &d.url, d.source.label(), date))
            .count();
        self.save()?;
        tracing::info!(added, total = self.entries.len(), "history updated");
        Ok(added)
    }

    /// Serialize the full ledger, then replace the file in one rename.
    pub fn save(&self) -> Result<()> {
        if self.locked {
            anyhow::bail!(
                "history {} is unreadable and was not kept aside; refusing to overwrite",
                self.path.display()
            );
        }
        let json = serde_json::to_vec_pretty(&self.entries).context("serializing history")?;
        write_atomic(&self.path, &json)
            .with_context(|| format!("writing history {}", self.path.display()))
    }

    pub fn stats(&self) -> HistoryStats {
        let mut by_source = BTreeMap::new();
        for e in &self.entries {
            let key = if e.source.is_empty() { "Unknown" } else { e.source.as_str() };
            *by_source.entry(key.to_string()).or_insert(0) += 1;
        }
        HistoryStats {
            total: self.entries.len(),
            by_source,
        }
    }

    /// Drop every entry and persist the empty ledger.
    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.names.clear();
        self.urls.clear();
        tracing::warn!(path = %self.path.display(), "history cleared");
        self.save()
    }
}

impl DuplicateLookup for HistoryStore {
    fn is_duplicate(&self, name: &str, url: &str) -> bool {
        HistoryStore::is_duplicate(self, name, url)
    }
}

fn read_entries(path: &Path) -> Result<Vec<HistoryEntry>> {
    let s = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&s).with_context(|| format!("parsing {}", path.display()))
}

/// Move an unreadable state file to `<path>.corrupt-<unix ts>` so the next
/// save cannot destroy it. Returns the new location.
pub fn quarantine(path: &Path) -> io::Result<PathBuf> {
    let mut aside = path.as_os_str().to_owned();
    aside.push(format!(".corrupt-{}", chrono::Utc::now().timestamp()));
    let aside = PathBuf::from(aside);
    fs::rename(path, &aside)?;
    Ok(aside)
}

/// Write `bytes` to a sibling temp file, then rename over `path`.
/// Readers see either the old file or the complete new one.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    let mut f = fs::File::create(&tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    fs::rename(tmp, path)?;
    Ok(())
}
