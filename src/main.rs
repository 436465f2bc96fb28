//! Curator binary entrypoint.
//! Runs one daily curation: fetch, shortlist, write the report, notify.
//!
//! Configuration comes from `config/curator.toml` (or $CURATOR_CONFIG_PATH)
//! with environment overrides; see `README.md`.

use ai_product_curator::config::AppConfig;
use ai_product_curator::notify::WebhookNotifier;
use ai_product_curator::report::publish;
use ai_product_curator::telemetry::Telemetry;
use ai_product_curator::Curator;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// LOG_FORMAT=json switches to structured output; compact otherwise.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ai_product_curator=info,warn"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

async fn run(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let cfg = AppConfig::load(config_path.as_deref())?;
    let mut curator = Curator::from_config(&cfg)?;

    let telemetry = match Telemetry::install() {
        Ok(t) => Some(t),
        Err(e) => {
            tracing::warn!(error = ?e, "metrics recorder not installed");
            None
        }
    };

    let report = curator.run_daily(chrono::Utc::now()).await;
    let notifier = WebhookNotifier::new(cfg.report.webhook_urls.iter().cloned(), 15)?;
    publish(&cfg.report.output_dir, &report, &notifier).await?;

    if let (Some(t), Some(p)) = (telemetry.as_ref(), cfg.report.metrics_path.as_deref()) {
        if let Err(e) = t.write_snapshot(p) {
            tracing::warn!(error = ?e, "metrics snapshot failed");
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(config_path)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "curation run aborted");
            ExitCode::FAILURE
        }
    }
}
