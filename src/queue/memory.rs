use super::WebhookQueue;
use crate::error::Result;
use crate::models::WebhookJob;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

#[derive(Default)]
pub struct MemoryWebhookQueue {
    jobs: Mutex<VecDeque<WebhookJob>>,
    notify: Notify,
}

impl MemoryWebhookQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }

    /// Pending jobs, oldest first.
    pub async fn snapshot(&self) -> Vec<WebhookJob> {
        self.jobs.lock().await.iter().cloned().collect()
    }
}

#[async_trait]
impl WebhookQueue for MemoryWebhookQueue {
    async fn enqueue(&self, job: &WebhookJob) -> Result<()> {
        self.jobs.lock().await.push_back(job.clone());
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<WebhookJob>> {
        let deadline = Instant::now() + timeout;
        loop {
            // Registered before the check so a push in between is not missed.
            let notified = self.notify.notified();
            if let Some(job) = self.jobs.lock().await.pop_front() {
                return Ok(Some(job));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }
}
