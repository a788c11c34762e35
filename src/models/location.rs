use super::incident::{validate_coordinates, IncidentZone, Severity};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct LocationCheckRequest {
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl LocationCheckRequest {
    pub fn validate(&self) -> Result<()> {
        let len = self.user_id.chars().count();
        if self.user_id.trim().is_empty() || len > 100 {
            return Err(Error::validation("user_id must be 1 to 100 characters"));
        }
        validate_coordinates(self.latitude, self.longitude)
    }
}

/// Matched zone together with its distance from the checked point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyIncident {
    pub id: Uuid,
    pub title: String,
    pub severity: Severity,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: i32,
    pub distance_meters: f64,
}

impl NearbyIncident {
    pub fn from_zone(zone: &IncidentZone, distance_meters: f64) -> Self {
        Self {
            id: zone.id,
            title: zone.title.clone(),
            severity: zone.severity,
            latitude: zone.latitude,
            longitude: zone.longitude,
            radius_meters: zone.radius_meters,
            distance_meters,
        }
    }
}

/// Durable trace of one check. Never modified after it is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationCheckRecord {
    pub id: Uuid,
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub is_in_danger_zone: bool,
    pub checked_at: DateTime<Utc>,
    pub matched_incident_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationCheckResponse {
    pub check_id: Uuid,
    pub is_in_danger_zone: bool,
    pub checked_at: DateTime<Utc>,
    pub incidents: Vec<NearbyIncident>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct IncidentStats {
    pub incident_id: Uuid,
    pub title: String,
    pub user_count: i64,
}
