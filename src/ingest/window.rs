// src/ingest/window.rs
//! Source-specific recency windows applied to raw records before normalization.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;

use crate::ingest::types::{RawRecord, Source};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// Accept regardless of (or without) a timestamp.
    Unbounded,
    /// Accept records published within the last N days. Undated records are "not recent".
    Days(i64),
}

impl Window {
    pub fn admits(self, published_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match self {
            Window::Unbounded => true,
            Window::Days(days) => match published_at {
                Some(ts) => ts >= now - ChronoDuration::days(days.max(0)),
                None => false,
            },
        }
    }
}

/// Per-source windows with a default. Toolify's sitemap dates are unreliable,
/// so its window is unbounded by default.
#[derive(Debug, Clone)]
pub struct WindowPolicy {
    pub default: Window,
    pub overrides: HashMap<Source, Window>,
    /// GitHub repos with no homepage need at least this many stars.
    pub github_min_stars: u32,
}

impl WindowPolicy {
    pub fn weekly(days: i64, github_min_stars: u32) -> Self {
        let mut overrides = HashMap::new();
        overrides.insert(Source::Toolify, Window::Unbounded);
        Self {
            default: Window::Days(days),
            overrides,
            github_min_stars,
        }
    }

    pub fn window_for(&self, source: Source) -> Window {
        self.overrides.get(&source).copied().unwrap_or(self.default)
    }

    pub fn admits(&self, raw: &RawRecord, now: DateTime<Utc>) -> bool {
        if !self.window_for(raw.source).admits(raw.published_at, now) {
            return false;
        }
        if raw.source == Source::GitHub {
            let has_homepage = raw
                .homepage
                .as_deref()
                .is_some_and(|h| !h.trim().is_empty());
            if !has_homepage && raw.stars.unwrap_or(0) < self.github_min_stars {
                return false;
            }
        }
        true
    }
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self::weekly(7, 200)
    }
}

/// Published since UTC midnight of `now`'s day and not in the future.
pub fn is_today(published_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    let Some(ts) = published_at else {
        return false;
    };
    let start_of_day = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|d| d.and_utc())
        .unwrap_or(now);
    ts >= start_of_day && ts <= now
}
