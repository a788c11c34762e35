use crate::error::{Error, Result};
use crate::models::WebhookPayload;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// One delivery attempt. Retrying is the worker's job.
#[async_trait]
pub trait WebhookSender: Send + Sync {
    /// Network errors and non-2xx answers both come back as `Error::Delivery`.
    async fn send(&self, payload: &WebhookPayload) -> Result<()>;
}

pub struct HttpWebhookSender {
    url: String,
    client: Client,
}

impl HttpWebhookSender {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl WebhookSender for HttpWebhookSender {
    async fn send(&self, payload: &WebhookPayload) -> Result<()> {
        // `.json()` sets Content-Type: application/json.
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::Delivery(format!("request to {} failed: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Delivery(format!(
                "{} responded with status {}",
                self.url, status
            )));
        }

        debug!("Webhook delivered for check {}", payload.check_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::{header, HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use chrono::Utc;
    use serde_json::Value;
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    #[derive(Clone)]
    struct Endpoint {
        status: StatusCode,
        delay: Duration,
        received: Arc<Mutex<Vec<(String, Value)>>>,
    }

    async fn hook(
        State(endpoint): State<Endpoint>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> StatusCode {
        tokio::time::sleep(endpoint.delay).await;
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        endpoint.received.lock().unwrap().push((content_type, body));
        endpoint.status
    }

    async fn spawn_endpoint(status: StatusCode, delay: Duration) -> (String, Endpoint) {
        let endpoint = Endpoint {
            status,
            delay,
            received: Arc::new(Mutex::new(Vec::new())),
        };
        let app = Router::new()
            .route("/webhook", post(hook))
            .with_state(endpoint.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}/webhook", addr), endpoint)
    }

    fn payload() -> WebhookPayload {
        WebhookPayload {
            check_id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            latitude: 0.0,
            longitude: 0.0,
            is_in_danger_zone: true,
            checked_at: Utc::now(),
            incidents: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_posts_json_payload() {
        let (url, endpoint) = spawn_endpoint(StatusCode::NO_CONTENT, Duration::ZERO).await;
        let sender = HttpWebhookSender::new(url, Duration::from_secs(5)).unwrap();
        let payload = payload();

        sender.send(&payload).await.unwrap();

        let received = endpoint.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, "application/json");
        assert_eq!(received[0].1["check_id"], payload.check_id.to_string());
        assert_eq!(received[0].1["user_id"], "user-1");
    }

    #[tokio::test]
    async fn test_non_success_status_is_delivery_failure() {
        let (url, endpoint) =
            spawn_endpoint(StatusCode::INTERNAL_SERVER_ERROR, Duration::ZERO).await;
        let sender = HttpWebhookSender::new(url, Duration::from_secs(5)).unwrap();

        let err = sender.send(&payload()).await.unwrap_err();
        assert!(matches!(err, Error::Delivery(_)), "{err}");
        assert!(err.to_string().contains("500"));
        // Exactly one attempt, no internal retry.
        assert_eq!(endpoint.received.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_delivery_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let sender =
            HttpWebhookSender::new(format!("http://{}/webhook", addr), Duration::from_secs(1))
                .unwrap();
        assert!(matches!(
            sender.send(&payload()).await,
            Err(Error::Delivery(_))
        ));
    }

    #[tokio::test]
    async fn test_slow_endpoint_times_out() {
        let (url, _endpoint) = spawn_endpoint(StatusCode::OK, Duration::from_secs(3)).await;
        let sender = HttpWebhookSender::new(url, Duration::from_millis(200)).unwrap();
        assert!(matches!(
            sender.send(&payload()).await,
            Err(Error::Delivery(_))
        ));
    }
}
