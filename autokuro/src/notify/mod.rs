//! Best-effort notifications.
//!
//! Delivery failures are logged and never affect the run.

mod messages;
#[cfg(feature = "telegram")]
mod telegram;

pub use messages::{alert_message, failed_message, finished_message, started_message};
#[cfg(feature = "telegram")]
pub use telegram::TelegramNotifier;

use async_trait::async_trait;
use thiserror::Error;

/// Error raised when a notification cannot be delivered.
#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Delivers short text messages to an operator.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends `message`.
    async fn send(&self, message: &str) -> Result<(), NotifyError>;
}

/// A notifier that drops every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpNotifier;

#[async_trait]
impl Notifier for NoOpNotifier {
    async fn send(&self, _message: &str) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Sends `message`, logging instead of failing.
pub async fn notify_best_effort(notifier: &dyn Notifier, message: &str) {
    if let Err(e) = notifier.send(message).await {
        tracing::warn!(error = %e, "Notification dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    #[async_trait]
    impl Notifier for Failing {
        async fn send(&self, _message: &str) -> Result<(), NotifyError> {
            Err(NotifyError("offline".into()))
        }
    }

    #[tokio::test]
    async fn test_best_effort_swallows_errors() {
        notify_best_effort(&Failing, "hello").await;
        notify_best_effort(&NoOpNotifier, "hello").await;
    }
}
