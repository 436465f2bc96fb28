// src/oracle/client.rs
//! Oracle transport: role-tagged messages in, free text out.
//!
//! `HttpOracleClient` speaks the OpenAI-compatible `/chat/completions` shape.
//! `ScriptedClient` replays canned responses for tests and offline runs.

use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::OracleConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("rate limited (HTTP 429)")]
    RateLimited,
    #[error("oracle returned HTTP {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("oracle API key is not configured")]
    MissingCredential,
}

impl OracleError {
    /// Metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            OracleError::RateLimited => "rate_limited",
            OracleError::Status(_) => "status",
            OracleError::Transport(_) => "transport",
            OracleError::Malformed(_) => "malformed",
            OracleError::MissingCredential => "credential",
        }
    }
}

#[async_trait]
pub trait OracleClient: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, OracleError>;
    fn name(&self) -> &'static str;
}

pub struct HttpOracleClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl HttpOracleClient {
    pub fn new(cfg: &OracleConfig) -> Result<Self, OracleError> {
        if cfg.api_key.trim().is_empty() {
            return Err(OracleError::MissingCredential);
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("ai-product-curator/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| OracleError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", cfg.base_url.trim_end_matches('/')),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
        })
    }
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl OracleClient for HttpOracleClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, OracleError> {
        let req = Req {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };
        let started = Instant::now();
        counter!("oracle_requests_total").increment(1);

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;
        histogram!("oracle_request_ms").record(started.elapsed().as_secs_f64() * 1000.0);

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(OracleError::RateLimited);
        }
        if !status.is_success() {
            return Err(OracleError::Status(status.as_u16()));
        }
        let body: Resp = resp
            .json()
            .await
            .map_err(|e| OracleError::Malformed(e.to_string()))?;
        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| OracleError::Malformed("no choices".into()))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Replays queued responses in order; once drained, repeats `fallback`.
pub struct ScriptedClient {
    queue: Mutex<VecDeque<Result<String, OracleError>>>,
    fallback: Result<String, OracleError>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedClient {
    pub fn new<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = Result<String, OracleError>>,
    {
        Self {
            queue: Mutex::new(responses.into_iter().collect()),
            fallback: Err(OracleError::Transport("script exhausted".into())),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Every call answers with `text`.
    pub fn always(text: impl Into<String>) -> Self {
        Self::new(Vec::new()).with_fallback(Ok(text.into()))
    }

    pub fn with_fallback(mut self, fallback: Result<String, OracleError>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Number of `complete` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Messages of every request, in call order.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.seen
            .lock()
            .map(|v| v.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }
}

#[async_trait]
impl OracleClient for ScriptedClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(messages.to_vec());
        }
        let next = match self.queue.lock() {
            Ok(mut q) => q.pop_front(),
            Err(e) => e.into_inner().pop_front(),
        };
        next.unwrap_or_else(|| self.fallback.clone())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
