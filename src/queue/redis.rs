use super::WebhookQueue;
use crate::error::Result;
use crate::models::WebhookJob;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

pub const WEBHOOK_QUEUE_KEY: &str = "geoalerts:webhook_queue";

/// Redis list used as a queue: `LPUSH` on one end, `BRPOP` on the other.
pub struct RedisWebhookQueue {
    push_conn: ConnectionManager,
    // BRPOP parks its connection; pushes must not queue up behind it.
    pop_conn: ConnectionManager,
}

impl RedisWebhookQueue {
    pub fn new(push_conn: ConnectionManager, pop_conn: ConnectionManager) -> Self {
        Self {
            push_conn,
            pop_conn,
        }
    }
}

fn encode_job(job: &WebhookJob) -> Result<String> {
    Ok(serde_json::to_string(job)?)
}

fn decode_job(raw: &str) -> Result<WebhookJob> {
    Ok(serde_json::from_str(raw)?)
}

#[async_trait]
impl WebhookQueue for RedisWebhookQueue {
    async fn enqueue(&self, job: &WebhookJob) -> Result<()> {
        let raw = encode_job(job)?;
        let mut conn = self.push_conn.clone();
        conn.lpush::<_, _, ()>(WEBHOOK_QUEUE_KEY, raw).await?;
        Ok(())
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<WebhookJob>> {
        let mut conn = self.pop_conn.clone();
        // A zero timeout would block forever.
        let timeout_secs = timeout.as_secs_f64().max(0.1);
        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(WEBHOOK_QUEUE_KEY)
            .arg(timeout_secs)
            .query_async(&mut conn)
            .await?;

        match popped {
            Some((_, raw)) => Ok(Some(decode_job(&raw)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::{NearbyIncident, Severity, WebhookPayload};
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    #[test]
    fn test_job_survives_the_list_encoding() {
        let checked_at = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        let mut job = WebhookJob::new(
            WebhookPayload {
                check_id: Uuid::new_v4(),
                user_id: "courier-12".to_string(),
                latitude: 40.5,
                longitude: -3.75,
                is_in_danger_zone: true,
                checked_at,
                incidents: vec![NearbyIncident {
                    id: Uuid::new_v4(),
                    title: "Road collapse".to_string(),
                    severity: Severity::Medium,
                    latitude: 40.5,
                    longitude: -3.7490234375,
                    radius_meters: 300,
                    distance_meters: 23.5,
                }],
            },
            checked_at,
        );
        job.attempt = 2;

        let decoded = decode_job(&encode_job(&job).unwrap()).unwrap();
        assert_eq!(decoded, job);
        assert_eq!(decoded.attempt, 2);
    }

    #[test]
    fn test_garbled_job_is_a_serialization_error() {
        let err = decode_job(r#"{"attempt": "two"}"#).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
        assert!(!err.is_transient());
    }
}
