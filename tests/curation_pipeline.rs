// tests/curation_pipeline.rs
use ai_product_curator::curator::{Curator, CuratorSettings};
use ai_product_curator::enrich::StaticEnricher;
use ai_product_curator::history::{HistoryStore, RecentStore};
use ai_product_curator::ingest::providers::JsonFeedProvider;
use ai_product_curator::oracle::{OracleError, RetryPolicy, ScriptedClient, SelectionOracle};
use ai_product_curator::report::render_markdown;
use ai_product_curator::{FeedProvider, Origin, RuleFilter, Source};
use chrono::{DateTime, TimeZone, Utc};
use std::path::Path;
use std::sync::Arc;

const FEED: &str = include_str!("fixtures/feed.json");

const THREE_PICKS: &str = r#"```json
[
  {"name": "Gamma", "url": "https://gamma.app", "one_sentence_intro_cn": "输入大纲即可自动生成排版精美的演示文稿", "origin": "CN"},
  {"name": "Notably", "url": "https://notably.ai", "one_sentence_intro_cn": "把冗长的文档压缩成一页要点摘要", "origin": "CN"},
  {"name": "Tabby Docs", "url": "https://tabbydocs.com", "one_sentence_intro_cn": "多人实时协作撰写和审阅文档", "origin": "Global"}
]
```"#;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 6, 12, 0, 0).unwrap()
}

fn curator(client: Arc<ScriptedClient>, dir: &Path) -> Curator {
    let providers: Vec<Box<dyn FeedProvider>> =
        vec![Box::new(JsonFeedProvider::from_fixture(Source::Other, FEED))];
    let enricher = StaticEnricher::new([("Notably", "Notably Labs is based in Hangzhou.")]);
    Curator::new(
        providers,
        SelectionOracle::new(client, RetryPolicy::immediate(3)),
        Arc::new(enricher),
        RuleFilter::default(),
        HistoryStore::load(dir.join("history.json")),
        RecentStore::load(dir.join("recent.json")),
        CuratorSettings::default(),
    )
}

fn names(picks: &[ai_product_curator::OracleDecision]) -> Vec<&str> {
    picks.iter().map(|d| d.name.as_str()).collect()
}

#[tokio::test]
async fn daily_run_splits_today_from_shortlist() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(ScriptedClient::new([Ok(THREE_PICKS.to_string())]));
    let mut c = curator(client.clone(), dir.path());

    let report = c.run_daily(now()).await;

    assert_eq!(report.date.to_string(), "2025-09-06");
    assert_eq!(report.today.len(), 1);
    assert_eq!(report.today[0].name, "Brieflet");

    assert_eq!(names(&report.shortlist), vec!["Gamma", "Notably", "Tabby Docs"]);
    assert_eq!(client.calls(), 1);

    // Origin needs evidence in the candidate's own text.
    assert_eq!(report.shortlist[0].origin, Origin::Global);
    assert_eq!(report.shortlist[1].origin, Origin::Domestic);
    assert_eq!(report.shortlist[2].source, Source::HackerNews);

    // The batch shown to the oracle excludes today's item and the giant.
    let prompt = &client.requests()[0][1].content;
    assert!(prompt.contains("Sheetwise"));
    assert!(!prompt.contains("Brieflet"));
    assert!(!prompt.contains("Character Pal"));
    assert!(!prompt.contains("Oldie"));

    let md = render_markdown(report.date, &report.today, &report.shortlist);
    assert!(md.contains("**1. Gamma** [🌍 海外]"));
    assert!(md.contains("**2. Notably** [🇨🇳 中国]"));
}

#[tokio::test]
async fn picks_persist_and_are_not_recommended_again() {
    let dir = tempfile::tempdir().unwrap();
    {
        let client = Arc::new(ScriptedClient::new([Ok(THREE_PICKS.to_string())]));
        let mut c = curator(client, dir.path());
        c.run_daily(now()).await;
        assert_eq!(c.history().len(), 3);
        assert_eq!(c.recent().records().len(), 3);
    }

    // Fresh process, same feed: nothing from the first run may come back.
    let client = Arc::new(
        ScriptedClient::new(Vec::new()).with_fallback(Err(OracleError::Transport("down".into()))),
    );
    let mut c = curator(client.clone(), dir.path());
    assert_eq!(c.history().len(), 3);
    let report = c.run_daily(now()).await;

    let picked = names(&report.shortlist);
    assert_eq!(picked.len(), 3);
    for old in ["Gamma", "Notably", "Tabby Docs"] {
        assert!(!picked.contains(&old), "{old} recommended twice");
    }
    assert_eq!(c.history().len(), 6);
}

#[tokio::test]
async fn oracle_outage_falls_back_locally_in_pool_order() {
    let dir = tempfile::tempdir().unwrap();
    let client = Arc::new(
        ScriptedClient::new(Vec::new()).with_fallback(Err(OracleError::Transport("down".into()))),
    );
    let mut c = curator(client.clone(), dir.path());

    let picks = c.curate(now()).await;

    // Balanced order: one per lane first.
    assert_eq!(names(&picks), vec!["Gamma", "Sheetwise", "Notably"]);
    assert!(picks.iter().all(|d| d.intro.contains("是一款")));
    assert!(picks.iter().all(|d| d.origin == Origin::Global));
    // 3 shortlist attempts plus one summary call per backfilled item.
    assert_eq!(client.calls(), 3 + 3);
}

#[tokio::test]
async fn short_oracle_answer_is_backfilled_without_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let partial = r#"[
        {"name": "Notably", "one_sentence_intro_cn": "把冗长的文档压缩成一页要点摘要"},
        {"name": "Framecut", "one_sentence_intro_cn": "NULL"}
    ]"#;
    let client = Arc::new(
        ScriptedClient::new([
            Ok(partial.to_string()),
            Ok(partial.to_string()),
            Ok(partial.to_string()),
        ])
        .with_fallback(Err(OracleError::Transport("down".into()))),
    );
    let mut c = curator(client, dir.path());

    let picks = c.curate(now()).await;

    assert_eq!(names(&picks), vec!["Notably", "Gamma", "Sheetwise"]);
    assert_eq!(picks[0].url, "https://notably.ai");
    assert_eq!(picks[0].source, Source::Taaft);
    assert!(!names(&picks).contains(&"Framecut"));
}

#[tokio::test]
async fn pick_from_source_skips_recently_seen() {
    let dir = tempfile::tempdir().unwrap();
    let mut recent = RecentStore::empty(dir.path().join("recent.json"));
    recent.append([("Gamma", "https://gamma.app")], now());
    recent.save().unwrap();

    let client = Arc::new(
        ScriptedClient::new([Ok(
            r#"{"name": "Gamma", "one_sentence_intro_cn": "输入大纲即可自动生成排版精美的演示文稿"}"#.to_string(),
        )])
        .with_fallback(Ok(
            r#"{"name": "Framecut", "one_sentence_intro_cn": "像改文档一样剪辑播客和视频"}"#.to_string(),
        )),
    );
    let mut c = curator(client, dir.path());

    let raw = c.fetch_raw().await;
    let ph: Vec<_> = c
        .weekly_pool(&raw, now(), &Default::default())
        .into_iter()
        .filter(|x| x.source == Source::ProductHunt)
        .collect();
    // Gamma is already excluded from the pool by the recent window.
    assert!(ph.iter().all(|x| x.name != "Gamma"));

    let with_gamma: Vec<_> = std::iter::once(ai_product_curator::Candidate {
        name: "Gamma".into(),
        url: "https://gamma.app".into(),
        tagline: "Slides".into(),
        source: Source::ProductHunt,
        ..Default::default()
    })
    .chain(ph)
    .collect();

    let pick = c
        .pick_from_source(&with_gamma, Source::ProductHunt, now())
        .await
        .unwrap();
    assert_eq!(pick.name, "Framecut");
    assert!(c.recent().records().iter().any(|r| r.name == "Framecut"));
}

#[tokio::test]
async fn repeated_and_already_recommended_picks_are_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let mut ledger = HistoryStore::empty(dir.path().join("history.json"));
    ledger.add("Raycast", "https://raycast.com", "Product Hunt", "2025-08-01");
    ledger.add("Tabby Doc", "https://tabbydoc.io", "Product Hunt", "2025-08-02");
    ledger.save().unwrap();

    let answer = r#"[
        {"name": "Gamma", "url": "https://gamma.app", "one_sentence_intro_cn": "输入大纲即可自动生成排版精美的演示文稿"},
        {"name": "gamma", "url": "https://gamma.app/?ref=launch", "one_sentence_intro_cn": "输入大纲即可自动生成排版精美的演示文稿"},
        {"name": "Raycast", "url": "https://raycast.com", "one_sentence_intro_cn": "用键盘快速启动应用和执行常用操作"},
        {"name": "Tabby Doc", "url": "https://tabbydoc.io", "one_sentence_intro_cn": "多人实时协作撰写和审阅文档"},
        {"name": "Notably", "url": "https://notably.ai", "one_sentence_intro_cn": "把冗长的文档压缩成一页要点摘要"}
    ]"#;
    let client = Arc::new(
        ScriptedClient::new([Ok(answer.to_string())])
            .with_fallback(Err(OracleError::Transport("down".into()))),
    );
    let mut c = curator(client, dir.path());

    let picks = c.curate(now()).await;

    // Two screened picks survive; the third slot comes from the batch.
    assert_eq!(names(&picks), vec!["Gamma", "Notably", "Sheetwise"]);
    assert_eq!(picks[0].url, "https://gamma.app");
    assert!(!names(&picks).contains(&"Tabby Docs"));
    assert_eq!(c.history().len(), 5);
    let raycast = c
        .history()
        .entries()
        .iter()
        .filter(|e| e.name == "Raycast")
        .count();
    assert_eq!(raycast, 1);
}

#[tokio::test]
async fn pick_from_source_tells_the_oracle_what_to_avoid() {
    let dir = tempfile::tempdir().unwrap();
    let mut recent = RecentStore::empty(dir.path().join("recent.json"));
    recent.append([("Gamma", "https://gamma.app")], now());
    recent.save().unwrap();

    let client = Arc::new(ScriptedClient::always(
        r#"{"name": "Framecut", "one_sentence_intro_cn": "像改文档一样剪辑播客和视频"}"#,
    ));
    let mut c = curator(client.clone(), dir.path());

    let pool = vec![
        ai_product_curator::Candidate {
            name: "Gamma".into(),
            url: "https://gamma.app".into(),
            tagline: "Slides".into(),
            source: Source::ProductHunt,
            ..Default::default()
        },
        ai_product_curator::Candidate {
            name: "Framecut".into(),
            url: "https://framecut.io".into(),
            tagline: "Edit podcasts by editing the transcript".into(),
            source: Source::ProductHunt,
            ..Default::default()
        },
    ];
    let pick = c
        .pick_from_source(&pool, Source::ProductHunt, now())
        .await
        .unwrap();

    assert_eq!(pick.name, "Framecut");
    assert_eq!(client.calls(), 1);
    let prompt = &client.requests()[0][1].content;
    assert!(prompt.contains("请不要选择：Gamma"));
    assert!(!prompt.contains("请不要选择：Gamma、Framecut"));
}

#[tokio::test]
async fn old_recent_records_are_pruned_on_persist() {
    let dir = tempfile::tempdir().unwrap();
    let mut recent = RecentStore::empty(dir.path().join("recent.json"));
    recent.append([("Stale", "https://stale.io")], now() - chrono::Duration::days(90));
    recent.save().unwrap();

    let client = Arc::new(ScriptedClient::new([Ok(THREE_PICKS.to_string())]));
    let mut c = curator(client, dir.path());
    c.curate(now()).await;

    let reloaded = RecentStore::load(dir.path().join("recent.json"));
    let kept: Vec<_> = reloaded.records().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(kept, vec!["Gamma", "Notably", "Tabby Docs"]);
}
