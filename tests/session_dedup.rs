// tests/session_dedup.rs
use ai_product_curator::ingest::{dedup_session, normalize_all, prepare_candidates};
use ai_product_curator::ingest::window::WindowPolicy;
use ai_product_curator::{RawRecord, Source};
use chrono::{TimeZone, Utc};
use std::collections::HashSet;

#[test]
fn same_product_from_two_feeds_is_kept_once() {
    let now = Utc.with_ymd_and_hms(2025, 9, 6, 12, 0, 0).unwrap();
    let mut first = RawRecord::new("Gamma", "https://gamma.app", Source::ProductHunt);
    first.published_at = Some(now);
    let mut second = RawRecord::new("gamma ", "https://Gamma.app/?ref=toolify", Source::Toolify);
    second.published_at = Some(now);
    let mut other = RawRecord::new("Framecut", "https://framecut.io", Source::HackerNews);
    other.published_at = Some(now);

    let (kept, removed) =
        prepare_candidates(&[first, second, other], &WindowPolicy::default(), now, None);

    assert_eq!(removed, 1);
    assert_eq!(kept.len(), 2);
    assert_eq!(kept[0].name, "Gamma");
    assert_eq!(kept[0].source, Source::ProductHunt);
    assert_eq!(kept[1].name, "Framecut");
}

#[test]
fn dedup_is_idempotent() {
    let raw = vec![
        RawRecord::new("A", "https://a.io", Source::ProductHunt),
        RawRecord::new("a", "https://a.io/", Source::Toolify),
        RawRecord::new("B", "https://b.io", Source::Toolify),
    ];
    let (once, _) = dedup_session(normalize_all(raw.iter()), None);
    let (twice, removed) = dedup_session(once.clone(), None);
    assert_eq!(removed, 0);
    assert_eq!(once, twice);
}

#[test]
fn recently_seen_keys_are_dropped() {
    let raw = vec![
        RawRecord::new("A", "https://a.io", Source::ProductHunt),
        RawRecord::new("B", "https://b.io", Source::ProductHunt),
    ];
    let recent: HashSet<String> = ["https://a.io".to_string()].into();
    let (kept, removed) = dedup_session(normalize_all(raw.iter()), Some(&recent));
    assert_eq!(removed, 1);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].name, "B");
}
