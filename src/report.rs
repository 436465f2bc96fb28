// src/report.rs
//! Markdown rendering of a run: today's radar plus the curated shortlist.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::curator::RunReport;
use crate::history::write_atomic;
use crate::ingest::normalize::strip_noise;
use crate::ingest::types::Candidate;
use crate::notify::Notifier;
use crate::oracle::OracleDecision;

pub fn render_markdown(date: NaiveDate, today: &[Candidate], curated: &[OracleDecision]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "**📅 [{}] AI 效率日报**\n", date.format("%Y-%m-%d"));

    out.push_str("**🚀 Part 1: 今日新品雷达**\n");
    if today.is_empty() {
        out.push_str("> 📉 今日暂无重大新品\n");
    }
    for item in today {
        let summary = strip_noise(&item.tagline);
        if summary.is_empty() {
            let _ = writeln!(out, "- **{}** [🔗]({})", item.name.trim(), item.url);
        } else {
            let _ = writeln!(out, "- **{}** - {} [🔗]({})", item.name.trim(), summary, item.url);
        }
    }

    out.push_str("\n---\n\n**💼 Part 2: AI 产品精选每日推荐**\n\n");
    if curated.is_empty() {
        out.push_str("今日暂无精选推荐\n");
    }
    for (idx, d) in curated.iter().enumerate() {
        let _ = writeln!(out, "**{}. {}** {}", idx + 1, d.name.trim(), d.origin.tag());
        let _ = writeln!(out, "*来源: {}*", d.source);
        let reason = strip_noise(&d.intro);
        if !reason.is_empty() {
            let _ = writeln!(out, "💡 推荐理由: {reason}");
        }
        if !d.url.is_empty() {
            let _ = writeln!(out, "🔗 [直达链接]({})", d.url);
        }
        out.push('\n');
    }
    out
}

pub fn report_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("{}_ai_report.md", date.format("%Y-%m-%d")))
}

/// Write `<dir>/<YYYY-MM-DD>_ai_report.md` atomically.
pub fn write_report(dir: &Path, date: NaiveDate, markdown: &str) -> Result<PathBuf> {
    let path = report_path(dir, date);
    write_atomic(&path, markdown.as_bytes())
        .with_context(|| format!("writing report {}", path.display()))?;
    Ok(path)
}

/// Render, write, then hand the document to `notifier`. Delivery problems are
/// logged; only a failed report write is an error.
pub async fn publish(dir: &Path, run: &RunReport, notifier: &dyn Notifier) -> Result<PathBuf> {
    let markdown = render_markdown(run.date, &run.today, &run.shortlist);
    let path = write_report(dir, run.date, &markdown)?;
    tracing::info!(path = %path.display(), picks = run.shortlist.len(), "report written");

    match notifier.send(&markdown).await {
        Ok(true) => tracing::info!(notifier = notifier.name(), "report delivered"),
        Ok(false) => tracing::warn!(notifier = notifier.name(), "report not delivered"),
        Err(e) => tracing::warn!(error = ?e, notifier = notifier.name(), "notifier error"),
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Source;
    use crate::oracle::Origin;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 6).unwrap()
    }

    #[test]
    fn empty_run_renders_placeholders() {
        let md = render_markdown(date(), &[], &[]);
        assert!(md.starts_with("**📅 [2025-09-06] AI 效率日报**"));
        assert!(md.contains("今日暂无重大新品"));
        assert!(md.contains("今日暂无精选推荐"));
    }

    #[test]
    fn curated_items_are_numbered_with_origin_tag() {
        let picks = vec![
            OracleDecision {
                name: "Gamma".into(),
                url: "https://gamma.app".into(),
                intro: "输入大纲即可生成演示文稿。".into(),
                origin: Origin::Global,
                source: Source::ProductHunt,
                degradation: None,
            },
            OracleDecision {
                name: "Kimi".into(),
                url: String::new(),
                intro: "长文档一键摘要。".into(),
                origin: Origin::Domestic,
                source: Source::Toolify,
                degradation: None,
            },
        ];
        let today = vec![Candidate {
            name: "Tome".into(),
            url: "https://tome.app".into(),
            tagline: "Decks 3 days ago".into(),
            ..Default::default()
        }];
        let md = render_markdown(date(), &today, &picks);
        assert!(md.contains("- **Tome** - Decks [🔗](https://tome.app)"));
        assert!(md.contains("**1. Gamma** [🌍 海外]"));
        assert!(md.contains("*来源: Product Hunt*"));
        assert!(md.contains("🔗 [直达链接](https://gamma.app)"));
        assert!(md.contains("**2. Kimi** [🇨🇳 中国]"));
    }

    #[test]
    fn report_lands_under_dated_name() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_report(dir.path(), date(), "# hi").unwrap();
        assert!(p.ends_with("2025-09-06_ai_report.md"));
        assert_eq!(std::fs::read_to_string(p).unwrap(), "# hi");
    }

    #[tokio::test]
    async fn publish_writes_then_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let run = RunReport {
            date: date(),
            today: Vec::new(),
            shortlist: Vec::new(),
        };
        let mock = crate::notify::MockNotifier::default();
        let path = publish(dir.path(), &run, &mock).await.unwrap();
        assert!(path.exists());
        let sent = mock.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("今日暂无精选推荐"));
    }
}
