use crate::error::Result;
use crate::models::WebhookJob;
use async_trait::async_trait;
use std::time::Duration;

pub mod memory;
pub mod redis;

pub use self::memory::MemoryWebhookQueue;
pub use self::redis::RedisWebhookQueue;

/// At-least-once FIFO of pending webhook deliveries.
///
/// A dequeued job belongs to the caller; nothing puts it back on failure.
#[async_trait]
pub trait WebhookQueue: Send + Sync {
    async fn enqueue(&self, job: &WebhookJob) -> Result<()>;

    /// Waits at most `timeout` for a job, then returns `None`.
    async fn dequeue(&self, timeout: Duration) -> Result<Option<WebhookJob>>;
}
