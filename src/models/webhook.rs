use super::location::{LocationCheckRecord, NearbyIncident};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body POSTed to the webhook endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub check_id: Uuid,
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub is_in_danger_zone: bool,
    pub checked_at: DateTime<Utc>,
    pub incidents: Vec<NearbyIncident>,
}

impl WebhookPayload {
    pub fn new(record: &LocationCheckRecord, incidents: Vec<NearbyIncident>) -> Self {
        Self {
            check_id: record.id,
            user_id: record.user_id.clone(),
            latitude: record.latitude,
            longitude: record.longitude,
            is_in_danger_zone: record.is_in_danger_zone,
            checked_at: record.checked_at,
            incidents,
        }
    }
}

/// Queue entry. `attempt` only ever grows, one step per failed delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookJob {
    pub payload: WebhookPayload,
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
}

impl WebhookJob {
    pub fn new(payload: WebhookPayload, created_at: DateTime<Utc>) -> Self {
        Self {
            payload,
            attempt: 0,
            created_at,
        }
    }
}
