// tests/feeds_rss.rs
use ai_product_curator::ingest::fetch_all;
use ai_product_curator::ingest::providers::{JsonFeedProvider, RssFeedProvider};
use ai_product_curator::{FeedProvider, Source};

const PH_RSS: &str = include_str!("fixtures/producthunt_rss.xml");

#[tokio::test]
async fn product_hunt_titles_split_into_name_and_tagline() {
    let p = RssFeedProvider::from_fixture(Source::ProductHunt, PH_RSS);
    let items = p.fetch_latest().await.unwrap();

    assert_eq!(items.len(), 3, "blank title is skipped");

    let gamma = &items[0];
    assert_eq!(gamma.name.as_deref(), Some("Gamma"));
    assert_eq!(gamma.tagline.as_deref(), Some("Turn outlines into polished slide decks"));
    assert_eq!(gamma.source, Source::ProductHunt);
    assert_eq!(gamma.tags, vec!["Productivity".to_string()]);
    let desc = gamma.description.as_deref().unwrap();
    assert!(desc.contains("Write an outline"));
    assert!(!desc.contains("<p>"));
    assert_eq!(
        gamma.published_at.unwrap().to_rfc3339(),
        "2025-09-06T09:00:00+00:00"
    );

    assert_eq!(items[1].name.as_deref(), Some("Framecut"));

    let notably = &items[2];
    assert_eq!(notably.tagline.as_deref(), Some("Summarize long PDFs"));
    assert!(notably.published_at.is_none());
}

#[tokio::test]
async fn limit_caps_items() {
    let p = RssFeedProvider::from_fixture(Source::ProductHunt, PH_RSS).with_limit(1);
    assert_eq!(p.fetch_latest().await.unwrap().len(), 1);
}

#[tokio::test]
async fn broken_provider_does_not_sink_the_others() {
    let providers: Vec<Box<dyn FeedProvider>> = vec![
        Box::new(RssFeedProvider::from_fixture(Source::ProductHunt, "<rss><channel>")),
        Box::new(JsonFeedProvider::from_path(Source::Toolify, "/definitely/missing.json")),
        Box::new(JsonFeedProvider::from_fixture(
            Source::Toolify,
            r#"[{"name": "Sheetwise", "url": "https://sheetwise.ai"}, 42]"#,
        )),
    ];
    let raw = fetch_all(&providers).await;
    assert_eq!(raw.len(), 1);
    assert_eq!(raw[0].source, Source::Toolify);
}
