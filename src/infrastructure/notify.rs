use crate::domain::ports::{Notification, Notifier};
use async_trait::async_trait;
use tracing::info;

/// Writes every notification to the log instead of delivering it.
///
/// Stands in for the email collaborator when none is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(
        &self,
        notification: Notification,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(
            recipient = %notification.recipient,
            amount = %notification.amount,
            kind = %notification.kind,
            "notification"
        );
        Ok(())
    }
}

/// Drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(
        &self,
        _notification: Notification,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}
