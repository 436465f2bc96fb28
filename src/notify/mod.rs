// src/notify/mod.rs
//! Delivery collaborator: hands a finished document to outbound channels.

pub mod webhook;

use anyhow::Result;
use std::sync::Mutex;

pub use webhook::WebhookNotifier;

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `document`. `Ok(true)` when at least one endpoint accepted it.
    async fn send(&self, document: &str) -> Result<bool>;
    fn name(&self) -> &'static str;
}

/// Records every document instead of delivering it.
#[derive(Default)]
pub struct MockNotifier {
    sent: Mutex<Vec<String>>,
}

impl MockNotifier {
    pub fn sent(&self) -> Vec<String> {
        self.sent
            .lock()
            .map(|v| v.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }
}

#[async_trait::async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, document: &str) -> Result<bool> {
        if let Ok(mut v) = self.sent.lock() {
            v.push(document.to_string());
        }
        Ok(true)
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}
