// src/notify/webhook.rs
use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use super::Notifier;

/// Plain-text fallback is truncated to this many characters.
const TEXT_FALLBACK_CHARS: usize = 1500;

/// Posts a markdown message to every configured webhook (Feishu/DingTalk-style
/// `msgtype` payloads). A failed endpoint gets one plain-text retry.
pub struct WebhookNotifier {
    urls: Vec<String>,
    client: Client,
    retry_pause: Duration,
}

impl WebhookNotifier {
    pub fn new<I, S>(urls: I, timeout_secs: u64) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("building webhook http client")?;
        Ok(Self {
            urls: urls
                .into_iter()
                .map(Into::into)
                .filter(|u: &String| !u.trim().is_empty())
                .collect(),
            client,
            retry_pause: Duration::from_secs(1),
        })
    }

    pub fn with_retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause = pause;
        self
    }

    pub fn is_configured(&self) -> bool {
        !self.urls.is_empty()
    }

    async fn post(&self, url: &str, body: &Value) -> Result<()> {
        self.client
            .post(url)
            .json(body)
            .send()
            .await
            .context("webhook post")?
            .error_for_status()
            .context("webhook non-2xx")?;
        Ok(())
    }

    async fn deliver(&self, url: &str, markdown: &str) -> bool {
        let short: String = url.chars().take(50).collect();
        match self.post(url, &markdown_payload(markdown)).await {
            Ok(()) => return true,
            Err(e) => tracing::warn!(error = ?e, url = %short, "webhook send failed; retrying as text"),
        }
        tokio::time::sleep(self.retry_pause).await;
        match self.post(url, &text_payload(markdown)).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = ?e, url = %short, "webhook text fallback failed");
                false
            }
        }
    }
}

pub fn markdown_payload(markdown: &str) -> Value {
    json!({ "msgtype": "markdown", "markdown": { "text": markdown } })
}

pub fn text_payload(markdown: &str) -> Value {
    let content: String = markdown.chars().take(TEXT_FALLBACK_CHARS).collect();
    json!({ "msgtype": "text", "text": { "content": content } })
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, document: &str) -> Result<bool> {
        if self.urls.is_empty() {
            tracing::warn!("no webhook URLs configured");
            return Ok(false);
        }
        let mut delivered = 0usize;
        for url in &self.urls {
            if self.deliver(url, document).await {
                delivered += 1;
            }
        }
        tracing::info!(delivered, endpoints = self.urls.len(), "webhook delivery done");
        Ok(delivered > 0)
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}
