//! Pushover push notifications.
//!
//! Without both credentials the notifier reports itself disabled and
//! `notify_best_effort` drops the message silently.

use std::time::Duration;

use async_trait::async_trait;
use persona_core::config::NotifyConfig;
use persona_core::error::{PersonaError, Result};
use persona_core::traits::Notifier;

pub const PUSHOVER_URL: &str = "https://api.pushover.net/1/messages.json";

pub struct PushoverNotifier {
    token: String,
    user: String,
    endpoint: String,
    client: reqwest::Client,
}

impl PushoverNotifier {
    pub fn new(token: &str, user: &str) -> Self {
        Self {
            token: token.to_string(),
            user: user.to_string(),
            endpoint: PUSHOVER_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &NotifyConfig) -> Self {
        Self::new(&config.pushover_token, &config.pushover_user)
    }

    /// Point at another messages endpoint (self-hosted relay, tests).
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }
}

#[async_trait]
impl Notifier for PushoverNotifier {
    fn name(&self) -> &str {
        "pushover"
    }

    fn is_enabled(&self) -> bool {
        !self.token.is_empty() && !self.user.is_empty()
    }

    async fn send(&self, text: &str) -> Result<()> {
        let resp = self
            .client
            .post(&self.endpoint)
            .form(&[
                ("token", self.token.as_str()),
                ("user", self.user.as_str()),
                ("message", text),
            ])
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| PersonaError::Http(format!("Pushover send failed: {e}")))?;

        if resp.status().is_success() {
            tracing::info!("✅ Pushover notification sent");
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(PersonaError::Http(format!("Pushover API error {status}: {body}")))
        }
    }
}
