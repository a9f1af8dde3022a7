//! Notifier that only writes the notification to the log.

use crate::traits::{Notification, Notifier, NotifyError};

/// Logs notifications at `info`. Used for services without a configured
/// channel, and as an explicit `kind = "log"` channel.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            service = %notification.service,
            title = %notification.title,
            message = %notification.message,
            "notification"
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}
