//! Notification delivery transport
//!
//! The worker talks to the external dispatcher through this seam; tests plug
//! in a recording stub.

use async_trait::async_trait;
use std::time::Duration;

use super::NotificationIntent;
use crate::utils::{AppError, AppResult};

/// One delivery attempt against the external dispatcher
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn deliver(&self, intent: &NotificationIntent) -> AppResult<()>;
}

/// HTTP transport posting intents to the dispatcher service
#[derive(Clone)]
pub struct HttpNotifyTransport {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpNotifyTransport {
    pub fn new(endpoint: String, timeout: Duration) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, endpoint })
    }
}

#[async_trait]
impl NotificationTransport for HttpNotifyTransport {
    async fn deliver(&self, intent: &NotificationIntent) -> AppResult<()> {
        let resp = self
            .http
            .post(&self.endpoint)
            .json(intent)
            .send()
            .await
            .map_err(|e| AppError::external(format!("Notification dispatch failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::external(format!(
                "Notification dispatcher returned {}",
                resp.status()
            )));
        }
        Ok(())
    }
}
