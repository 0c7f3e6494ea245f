//! Push notification channel trait.

use async_trait::async_trait;

use crate::error::Result;

/// Optional side channel for telling the profile owner about visitors.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// False when credentials are absent; `send` is then a silent no-op.
    fn is_enabled(&self) -> bool;

    async fn send(&self, text: &str) -> Result<()>;
}

/// Send and swallow the outcome. Failures are logged, never returned.
pub async fn notify_best_effort(notifier: &dyn Notifier, text: &str) {
    if !notifier.is_enabled() {
        tracing::debug!("{} disabled, dropping notification", notifier.name());
        return;
    }
    if let Err(e) = notifier.send(text).await {
        tracing::warn!("{} notification failed: {e}", notifier.name());
    }
}
