// src/ingest/mod.rs
pub mod dedup;
pub mod normalize;
pub mod providers;
pub mod types;
pub mod window;

use chrono::{DateTime, Utc};
use metrics::counter;
use std::collections::HashSet;

use crate::ingest::types::{Candidate, FeedProvider, RawRecord};
use crate::ingest::window::WindowPolicy;

pub use dedup::{candidate_key, dedup_session, identity_key, normalize_name, normalize_url};
pub use normalize::{normalize, normalize_all, strip_noise};

/// Pull from every provider in order. A failing provider is logged and skipped;
/// the others still contribute.
pub async fn fetch_all(providers: &[Box<dyn FeedProvider>]) -> Vec<RawRecord> {
    crate::telemetry::ensure_metrics_described();

    let mut raw = Vec::new();
    for p in providers {
        match p.fetch_latest().await {
            Ok(mut v) => {
                tracing::debug!(provider = p.name(), records = v.len(), "provider fetched");
                raw.append(&mut v);
            }
            Err(e) => {
                tracing::warn!(error = ?e, provider = p.name(), "provider error");
                counter!("curator_provider_errors_total").increment(1);
            }
        }
    }
    raw
}

/// Window → normalize → session dedup. Stable: survivors keep provider order.
/// Returns the candidates and how many were removed by dedup.
pub fn prepare_candidates(
    raw: &[RawRecord],
    windows: &WindowPolicy,
    now: DateTime<Utc>,
    recent: Option<&HashSet<String>>,
) -> (Vec<Candidate>, usize) {
    let in_window = raw.iter().filter(|r| windows.admits(r, now));
    let normalized = normalize_all(in_window);
    counter!("curator_candidates_total").increment(normalized.len() as u64);

    let (kept, removed) = dedup_session(normalized, recent);
    counter!("curator_session_dedup_total").increment(removed as u64);
    (kept, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Source;
    use anyhow::Result;
    use chrono::TimeZone;

    struct Failing;

    #[async_trait::async_trait]
    impl FeedProvider for Failing {
        async fn fetch_latest(&self) -> Result<Vec<RawRecord>> {
            anyhow::bail!("boom")
        }
        fn name(&self) -> &'static str {
            "failing"
        }
    }

    struct Fixed(Vec<RawRecord>);

    #[async_trait::async_trait]
    impl FeedProvider for Fixed {
        async fn fetch_latest(&self) -> Result<Vec<RawRecord>> {
            Ok(self.0.clone())
        }
        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn failing_provider_is_isolated() {
        let providers: Vec<Box<dyn FeedProvider>> = vec![
            Box::new(Failing),
            Box::new(Fixed(vec![RawRecord::new("A", "https://a.io", Source::Toolify)])),
        ];
        let raw = fetch_all(&providers).await;
        assert_eq!(raw.len(), 1);
    }

    #[test]
    fn prepare_applies_window_and_dedup() {
        let now = Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap();
        let mut fresh = RawRecord::new("A", "https://a.io", Source::ProductHunt);
        fresh.published_at = Some(now);
        let mut stale = RawRecord::new("B", "https://b.io", Source::ProductHunt);
        stale.published_at = Some(now - chrono::Duration::days(30));
        let mut dup = RawRecord::new("a", "https://a.io/?ref=ph", Source::ProductHunt);
        dup.published_at = Some(now);

        let (kept, removed) =
            prepare_candidates(&[fresh, stale, dup], &WindowPolicy::default(), now, None);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "A");
        assert_eq!(removed, 1);
    }
}
