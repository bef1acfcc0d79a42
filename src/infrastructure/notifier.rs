use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::errors::NotifyError;
use crate::domain::notification::{CancellationNotice, ConfirmationNotice};
use crate::domain::ports::Notifier;

/// Posts notices as JSON to the mail service: `{base}/confirmed` and `{base}/cancelled`.
pub struct WebhookNotifier {
    client: reqwest::Client,
    base_url: String,
}

impl WebhookNotifier {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Delivery(format!(
                "{} answered HTTP {}",
                path,
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify_confirmed(&self, notice: &ConfirmationNotice) -> Result<(), NotifyError> {
        self.post("confirmed", notice).await
    }

    async fn notify_cancelled(&self, notice: &CancellationNotice) -> Result<(), NotifyError> {
        self.post("cancelled", notice).await
    }
}

/// Used when no mail service is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_confirmed(&self, notice: &ConfirmationNotice) -> Result<(), NotifyError> {
        log::info!(
            "order {} confirmed for user {}: {} line(s), fee {}, total {}",
            notice.order_id,
            notice.user_id,
            notice.lines.len(),
            notice.transport_fee,
            notice.total_cost
        );
        Ok(())
    }

    async fn notify_cancelled(&self, notice: &CancellationNotice) -> Result<(), NotifyError> {
        log::info!(
            "order {} cancelled for user {}",
            notice.order_id,
            notice.user_id
        );
        Ok(())
    }
}
