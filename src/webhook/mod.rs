pub mod sender;
pub mod worker;

pub use sender::{HttpWebhookSender, WebhookSender};
pub use worker::{DeliveryOutcome, WebhookWorker, WorkerSettings};
