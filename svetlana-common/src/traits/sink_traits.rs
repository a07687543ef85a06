use async_trait::async_trait;

use crate::error::Error;
use crate::models::NotificationMessage;

/// Where rendered notifications end up (a Discord channel in production).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &NotificationMessage) -> Result<(), Error>;
}
