//! Operator alerts for timed-out or failed runs
//!
//! Alerting is fire-and-forget: delivery problems are logged and never
//! change the outcome of a run.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::AlertConfig;

#[async_trait]
pub trait Alerter: Send + Sync {
    async fn warn(&self, message: &str);
}

/// Writes alerts to the log only
#[derive(Debug, Default)]
pub struct LogAlerter;

#[async_trait]
impl Alerter for LogAlerter {
    async fn warn(&self, message: &str) {
        warn!(alert = %message, "Alert");
    }
}

#[derive(Debug, Serialize)]
struct WebhookBody<'a> {
    text: &'a str,
}

/// Posts `{"text": message}` to a webhook
pub struct WebhookAlerter {
    http: Client,
    url: String,
}

impl WebhookAlerter {
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let url = url.into();
        debug!(%url, "WebhookAlerter::new: called");
        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { http, url })
    }
}

#[async_trait]
impl Alerter for WebhookAlerter {
    async fn warn(&self, message: &str) {
        debug!(%message, "WebhookAlerter::warn: called");
        let result = self
            .http
            .post(&self.url)
            .json(&WebhookBody { text: message })
            .send()
            .await
            .and_then(|r| r.error_for_status());
        match result {
            Ok(_) => info!(url = %self.url, "Alert delivered"),
            Err(e) => warn!(url = %self.url, error = %e, alert = %message, "Alert delivery failed"),
        }
    }
}

/// Webhook alerter when a URL is configured, log alerter otherwise
pub fn from_config(config: &AlertConfig) -> Box<dyn Alerter> {
    match &config.webhook_url {
        Some(url) => match WebhookAlerter::new(url) {
            Ok(alerter) => Box::new(alerter),
            Err(e) => {
                warn!(error = %e, "Failed to build webhook client, alerts go to the log");
                Box::new(LogAlerter)
            }
        },
        None => Box::new(LogAlerter),
    }
}
