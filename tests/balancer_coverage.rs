// tests/balancer_coverage.rs
use ai_product_curator::balance::{balance, group_by_source, SlotPlan};
use ai_product_curator::{Candidate, Source};

fn many(source: Source, prefix: &str, n: usize) -> Vec<Candidate> {
    (0..n)
        .map(|i| Candidate {
            name: format!("{prefix}{i}"),
            url: format!("https://{prefix}{i}.example"),
            source,
            ..Default::default()
        })
        .collect()
}

#[test]
fn every_populated_group_gets_a_slot() {
    let mut pool = many(Source::ProductHunt, "ph", 10);
    pool.extend(many(Source::Toolify, "tf", 10));
    pool.extend(many(Source::Futurepedia, "fp", 1));
    pool.extend(many(Source::HackerNews, "hn", 1));
    pool.extend(many(Source::GitHub, "gh", 1));

    let batch = balance(&group_by_source(pool), &SlotPlan::default());

    assert_eq!(batch.len(), 6);
    let sources: Vec<Source> = batch.iter().map(|c| c.source).collect();
    assert_eq!(
        sources,
        vec![
            Source::ProductHunt,
            Source::Toolify,
            Source::Futurepedia,
            Source::HackerNews,
            Source::GitHub,
            Source::ProductHunt,
        ]
    );
}

#[test]
fn single_heavy_source_fills_remaining_slots() {
    let mut pool = many(Source::Toolify, "tf", 8);
    pool.extend(many(Source::GitHub, "gh", 1));

    let batch = balance(&group_by_source(pool), &SlotPlan::with_cap(4));
    let names: Vec<&str> = batch.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["tf0", "gh0", "tf1", "tf2"]);
}

#[test]
fn small_pool_is_returned_whole() {
    let pool = many(Source::HackerNews, "hn", 2);
    let batch = balance(&group_by_source(pool), &SlotPlan::default());
    assert_eq!(batch.len(), 2);
}

#[test]
fn unslotted_sources_are_ignored() {
    let pool = many(Source::Other, "x", 3);
    assert!(balance(&group_by_source(pool), &SlotPlan::default()).is_empty());
}
