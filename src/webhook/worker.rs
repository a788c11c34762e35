//! Background delivery loop for queued webhook jobs.
//!
//! The worker pops one job at a time and hands it to the sender. A failed
//! job is pushed back by a tracked retry task after `retry_delay * attempt`,
//! so the loop keeps draining the queue meanwhile. Once `attempt` exceeds
//! `retry_attempts` the job is dropped and only a log line remains.
//!
//! Shutdown is cooperative: the cancellation token is checked between
//! iterations, and the dequeue timeout bounds how long that check can be
//! delayed. Retry tasks still sleeping at shutdown push their job back
//! immediately, and `run` returns only after all of them have finished.

use super::sender::WebhookSender;
use crate::models::WebhookJob;
use crate::queue::WebhookQueue;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Retries allowed after the first failed delivery.
    pub retry_attempts: u32,
    /// Base delay, multiplied by the attempt number.
    pub retry_delay: Duration,
    pub pop_timeout: Duration,
    /// Pause after a queue error before polling again.
    pub error_backoff: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_delay: Duration::from_secs(5),
            pop_timeout: Duration::from_secs(2),
            error_backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Retrying { attempt: u32, delay: Duration },
    Dropped { attempts: u32 },
}

pub struct WebhookWorker {
    queue: Arc<dyn WebhookQueue>,
    sender: Arc<dyn WebhookSender>,
    settings: WorkerSettings,
    retries: TaskTracker,
}

impl WebhookWorker {
    pub fn new(
        queue: Arc<dyn WebhookQueue>,
        sender: Arc<dyn WebhookSender>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            queue,
            sender,
            settings,
            retries: TaskTracker::new(),
        }
    }

    /// Runs until `shutdown` is cancelled. Queue errors never end the loop.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            "Webhook worker started (retry_attempts={}, retry_delay={:?})",
            self.settings.retry_attempts, self.settings.retry_delay
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            // Not raced against the token: a job popped by BRPOP must not be
            // dropped on the floor.
            let job = match self.queue.dequeue(self.settings.pop_timeout).await {
                Ok(Some(job)) => job,
                Ok(None) => continue,
                Err(e) => {
                    if e.is_transient() {
                        warn!("Webhook queue error: {}", e);
                    } else {
                        // Already off the list, nothing left to retry.
                        error!("Discarding unreadable webhook job: {}", e);
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(self.settings.error_backoff) => {}
                        _ = shutdown.cancelled() => {}
                    }
                    continue;
                }
            };

            self.deliver(job, &shutdown).await;
        }

        self.retries.close();
        if !self.retries.is_empty() {
            info!("Flushing {} pending webhook retries", self.retries.len());
        }
        self.retries.wait().await;
        info!("Webhook worker stopped");
    }

    pub async fn deliver(&self, mut job: WebhookJob, shutdown: &CancellationToken) -> DeliveryOutcome {
        let check_id = job.payload.check_id;
        let err = match self.sender.send(&job.payload).await {
            Ok(()) => {
                debug!("Webhook for check {} delivered on attempt {}", check_id, job.attempt);
                return DeliveryOutcome::Delivered;
            }
            Err(e) => e,
        };

        let attempt = job.attempt.saturating_add(1);
        if attempt > self.settings.retry_attempts {
            error!(
                "Webhook for check {} permanently failed after {} retries: {}",
                check_id, self.settings.retry_attempts, err
            );
            return DeliveryOutcome::Dropped { attempts: attempt };
        }

        job.attempt = attempt;
        let delay = self.settings.retry_delay.saturating_mul(attempt);
        warn!(
            "Webhook for check {} failed (attempt {}/{}), retrying in {:?}: {}",
            check_id, attempt, self.settings.retry_attempts, delay, err
        );

        let queue = self.queue.clone();
        let shutdown = shutdown.clone();
        let backoff = self.settings.error_backoff;
        self.retries.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => {
                    debug!("Shutting down, requeueing webhook for check {} early", check_id);
                }
            }
            let mut requeued = queue.enqueue(&job).await;
            if let Err(e) = &requeued {
                if e.is_transient() {
                    warn!("Requeue of webhook for check {} failed, trying once more: {}", check_id, e);
                    tokio::time::sleep(backoff).await;
                    requeued = queue.enqueue(&job).await;
                }
            }
            if let Err(e) = requeued {
                error!("Failed to requeue webhook for check {}: {}", check_id, e);
            }
        });

        DeliveryOutcome::Retrying { attempt, delay }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::models::WebhookPayload;
    use crate::queue::MemoryWebhookQueue;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;
    use tokio::time::Instant;
    use uuid::Uuid;

    /// Fails the first `failures` sends, then succeeds.
    struct ScriptedSender {
        failures: usize,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedSender {
        fn failing(failures: usize) -> Arc<Self> {
            Arc::new(Self {
                failures,
                calls: Mutex::new(Vec::new()),
            })
        }

        async fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl WebhookSender for ScriptedSender {
        async fn send(&self, _payload: &WebhookPayload) -> Result<()> {
            let mut calls = self.calls.lock().await;
            calls.push(Instant::now());
            if calls.len() <= self.failures {
                return Err(Error::Delivery("status 500".to_string()));
            }
            Ok(())
        }
    }

    /// Memory queue whose first few dequeues and enqueues error out.
    struct FlakyQueue {
        inner: MemoryWebhookQueue,
        dequeue_failures: usize,
        dequeues: AtomicUsize,
        enqueue_failures: usize,
        enqueues: AtomicUsize,
    }

    impl FlakyQueue {
        fn new(dequeue_failures: usize, enqueue_failures: usize) -> Arc<Self> {
            Arc::new(Self {
                inner: MemoryWebhookQueue::new(),
                dequeue_failures,
                dequeues: AtomicUsize::new(0),
                enqueue_failures,
                enqueues: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl WebhookQueue for FlakyQueue {
        async fn enqueue(&self, job: &WebhookJob) -> Result<()> {
            if self.enqueues.fetch_add(1, Ordering::SeqCst) < self.enqueue_failures {
                return Err(Error::Unavailable("connection reset".to_string()));
            }
            self.inner.enqueue(job).await
        }

        async fn dequeue(&self, timeout: Duration) -> Result<Option<WebhookJob>> {
            if self.dequeues.fetch_add(1, Ordering::SeqCst) < self.dequeue_failures {
                return Err(Error::Unavailable("connection refused".to_string()));
            }
            self.inner.dequeue(timeout).await
        }
    }

    fn job() -> WebhookJob {
        WebhookJob::new(
            WebhookPayload {
                check_id: Uuid::new_v4(),
                user_id: "user-1".to_string(),
                latitude: 0.0,
                longitude: 0.0,
                is_in_danger_zone: true,
                checked_at: Utc::now(),
                incidents: Vec::new(),
            },
            Utc::now(),
        )
    }

    fn settings(retry_attempts: u32) -> WorkerSettings {
        WorkerSettings {
            retry_attempts,
            retry_delay: Duration::from_secs(5),
            pop_timeout: Duration::from_secs(2),
            error_backoff: Duration::from_millis(500),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_delivery_discards_job() {
        let queue = Arc::new(MemoryWebhookQueue::new());
        let sender = ScriptedSender::failing(0);
        let worker = WebhookWorker::new(queue.clone(), sender.clone(), settings(3));

        let outcome = worker.deliver(job(), &CancellationToken::new()).await;
        assert_eq!(outcome, DeliveryOutcome::Delivered);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(queue.is_empty().await);
        assert_eq!(sender.call_times().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_delivery_requeues_with_next_attempt() {
        let queue = Arc::new(MemoryWebhookQueue::new());
        let worker = WebhookWorker::new(queue.clone(), ScriptedSender::failing(1), settings(3));

        let mut second_try = job();
        second_try.attempt = 1;
        let outcome = worker.deliver(second_try.clone(), &CancellationToken::new()).await;
        assert_eq!(
            outcome,
            DeliveryOutcome::Retrying {
                attempt: 2,
                delay: Duration::from_secs(10)
            }
        );

        // Not visible before the delay elapses.
        tokio::time::sleep(Duration::from_secs(9)).await;
        assert!(queue.is_empty().await);

        tokio::time::sleep(Duration::from_secs(2)).await;
        let pending = queue.snapshot().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempt, 2);
        assert_eq!(pending[0].payload, second_try.payload);
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_past_ceiling_is_dropped() {
        let queue = Arc::new(MemoryWebhookQueue::new());
        let worker = WebhookWorker::new(queue.clone(), ScriptedSender::failing(1), settings(3));

        let mut last_try = job();
        last_try.attempt = 3;
        let outcome = worker.deliver(last_try, &CancellationToken::new()).await;
        assert_eq!(outcome, DeliveryOutcome::Dropped { attempts: 4 });

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert!(queue.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_endpoint_failing_every_time_gets_three_retries() {
        let queue = Arc::new(MemoryWebhookQueue::new());
        let sender = ScriptedSender::failing(usize::MAX);
        let worker = WebhookWorker::new(queue.clone(), sender.clone(), settings(3));
        let shutdown = CancellationToken::new();

        queue.enqueue(&job()).await.unwrap();
        let handle = tokio::spawn(worker.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(300)).await;
        shutdown.cancel();
        handle.await.unwrap();

        let calls = sender.call_times().await;
        assert_eq!(calls.len(), 4, "initial attempt plus three retries");
        for (i, pair) in calls.windows(2).enumerate() {
            let gap = pair[1] - pair[0];
            let expected = Duration::from_secs(5) * (i as u32 + 1);
            assert!(gap >= expected, "retry {} came after {:?}", i + 1, gap);
        }
        assert!(queue.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let queue = Arc::new(MemoryWebhookQueue::new());
        let sender = ScriptedSender::failing(2);
        let worker = WebhookWorker::new(queue.clone(), sender.clone(), settings(3));
        let shutdown = CancellationToken::new();

        queue.enqueue(&job()).await.unwrap();
        let handle = tokio::spawn(worker.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(120)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(sender.call_times().await.len(), 3);
        assert!(queue.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_errors_do_not_stop_worker() {
        let queue = FlakyQueue::new(5, 0);
        let sender = ScriptedSender::failing(0);
        let worker = WebhookWorker::new(queue.clone(), sender.clone(), settings(3));
        let shutdown = CancellationToken::new();

        queue.enqueue(&job()).await.unwrap();
        let started = Instant::now();
        let handle = tokio::spawn(worker.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(10)).await;
        shutdown.cancel();
        handle.await.unwrap();

        let calls = sender.call_times().await;
        assert_eq!(calls.len(), 1);
        // Five failed polls, each followed by the fixed backoff.
        assert!(calls[0] - started >= Duration::from_millis(2500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_pending_retries() {
        let queue = Arc::new(MemoryWebhookQueue::new());
        let sender = ScriptedSender::failing(usize::MAX);
        let mut slow = settings(3);
        slow.retry_delay = Duration::from_secs(3600);
        let worker = WebhookWorker::new(queue.clone(), sender.clone(), slow);
        let shutdown = CancellationToken::new();

        queue.enqueue(&job()).await.unwrap();
        let handle = tokio::spawn(worker.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(queue.is_empty().await);

        let stopped_at = Instant::now();
        shutdown.cancel();
        handle.await.unwrap();
        assert!(stopped_at.elapsed() < Duration::from_secs(60));

        // The job went back to the queue instead of being lost.
        let pending = queue.snapshot().await;
        assert_eq!(pending.len(), 1);
        assert!(pending[0].attempt >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requeue_survives_one_transient_queue_failure() {
        let queue = FlakyQueue::new(0, 1);
        let worker = WebhookWorker::new(queue.clone(), ScriptedSender::failing(1), settings(3));

        let outcome = worker.deliver(job(), &CancellationToken::new()).await;
        assert!(matches!(outcome, DeliveryOutcome::Retrying { attempt: 1, .. }));

        // Retry delay, failed push, backoff, second push.
        tokio::time::sleep(Duration::from_secs(6)).await;
        let pending = queue.inner.snapshot().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempt, 1);
        assert_eq!(queue.enqueues.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requeue_gives_up_after_second_failure() {
        let queue = FlakyQueue::new(0, 2);
        let worker = WebhookWorker::new(queue.clone(), ScriptedSender::failing(1), settings(3));

        worker.deliver(job(), &CancellationToken::new()).await;
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert!(queue.inner.is_empty().await);
        assert_eq!(queue.enqueues.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_retry_delay_saturates() {
        let queue = Arc::new(MemoryWebhookQueue::new());
        let mut huge = settings(3);
        huge.retry_delay = Duration::MAX;
        let worker = WebhookWorker::new(queue.clone(), ScriptedSender::failing(1), huge);
        let shutdown = CancellationToken::new();

        let mut second_try = job();
        second_try.attempt = 1;
        let outcome = worker.deliver(second_try, &shutdown).await;
        assert_eq!(
            outcome,
            DeliveryOutcome::Retrying {
                attempt: 2,
                delay: Duration::MAX
            }
        );

        shutdown.cancel();
        worker.retries.close();
        worker.retries.wait().await;
        assert_eq!(queue.len().await, 1);
    }
}
