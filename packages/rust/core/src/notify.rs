//! Job notifications sent to chat webhooks.
//!
//! Each sink is enabled by a webhook URL in the environment. An unset
//! variable disables that sink. Delivery is best-effort: failures are
//! logged and never change a job's result.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use sheetload_shared::{NotifyConfig, Result, SheetloadError, env_value};
use tracing::{debug, info, warn};
use url::Url;

/// Timeout for a single webhook delivery.
const WEBHOOK_TIMEOUT_SECS: u64 = 10;

/// What happened to a job, as reported to sinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    Succeeded {
        job_key: String,
        table: String,
        rows: u64,
    },
    Failed {
        job_key: String,
        table: String,
        error: String,
    },
}

/// Supported webhook flavours. They differ only in payload shape and wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookKind {
    /// `{"text": ...}`
    Slack,
    /// `{"body": ...}`, with the row count on its own line.
    Jandi,
}

impl WebhookKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slack => "slack",
            Self::Jandi => "jandi",
        }
    }

    /// Plain-text message for `event`.
    pub fn message(&self, event: &JobEvent) -> String {
        match (self, event) {
            (Self::Slack, JobEvent::Succeeded { job_key, table, rows }) => {
                format!("✅ [{job_key}] success: loaded {rows} rows into {table}.")
            }
            (Self::Jandi, JobEvent::Succeeded { job_key, table, rows }) => {
                format!("✅ [{job_key}] success:\n- table: {table}\n- rows loaded: {rows}")
            }
            (Self::Slack, JobEvent::Failed { job_key, table, error }) => {
                format!("❌ [{job_key}] failed: error while loading table {table}.\nError: {error}")
            }
            (Self::Jandi, JobEvent::Failed { job_key, table, error }) => {
                format!("❌ [{job_key}] failed: error while loading table {table}.\nDetails: {error}")
            }
        }
    }

    /// JSON payload carrying `message`.
    pub fn payload(&self, message: &str) -> serde_json::Value {
        match self {
            Self::Slack => json!({ "text": message }),
            Self::Jandi => json!({ "body": message }),
        }
    }
}

/// A notification sink.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, event: &JobEvent) -> Result<()>;
}

/// Posts JSON to an incoming-webhook URL.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    kind: WebhookKind,
    url: Url,
    client: Client,
}

impl WebhookSink {
    pub fn new(kind: WebhookKind, url: Url) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
            .build()
            .map_err(|e| SheetloadError::Notify(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { kind, url, client })
    }
}

#[async_trait]
impl Notifier for WebhookSink {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    async fn send(&self, event: &JobEvent) -> Result<()> {
        let payload = self.kind.payload(&self.kind.message(event));
        let response = self
            .client
            .post(self.url.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|e| SheetloadError::Notify(format!("{}: {e}", self.kind.as_str())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SheetloadError::Notify(format!(
                "{}: HTTP {status}",
                self.kind.as_str()
            )));
        }
        Ok(())
    }
}

/// The set of enabled sinks.
#[derive(Default)]
pub struct Notifiers {
    sinks: Vec<Box<dyn Notifier>>,
}

impl Notifiers {
    /// No sinks at all.
    pub fn none() -> Self {
        Self::default()
    }

    /// Enable each sink whose webhook variable is set to a valid URL.
    pub fn from_env(config: &NotifyConfig) -> Self {
        let mut notifiers = Self::none();
        for (kind, var) in [
            (WebhookKind::Slack, &config.slack_webhook_env),
            (WebhookKind::Jandi, &config.jandi_webhook_env),
        ] {
            let Some(raw) = env_value(var) else {
                debug!(sink = kind.as_str(), var = %var, "webhook not configured, skipping");
                continue;
            };
            match Url::parse(&raw).map_err(|e| SheetloadError::Notify(e.to_string())) {
                Ok(url) => match WebhookSink::new(kind, url) {
                    Ok(sink) => notifiers.push(sink),
                    Err(e) => warn!(sink = kind.as_str(), error = %e, "webhook disabled"),
                },
                Err(e) => {
                    warn!(sink = kind.as_str(), var = %var, error = %e, "invalid webhook URL, skipping")
                }
            }
        }
        notifiers
    }

    pub fn push(&mut self, sink: impl Notifier + 'static) {
        self.sinks.push(Box::new(sink));
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Deliver `event` to every sink. Returns how many deliveries succeeded.
    pub async fn notify(&self, event: &JobEvent) -> usize {
        let mut delivered = 0;
        for sink in &self.sinks {
            match sink.send(event).await {
                Ok(()) => {
                    info!(sink = sink.name(), "notification sent");
                    delivered += 1;
                }
                Err(e) => warn!(sink = sink.name(), error = %e, "notification failed"),
            }
        }
        delivered
    }
}
