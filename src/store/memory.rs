use super::{CheckLogStore, IncidentStore};
use crate::error::{Error, Result};
use crate::models::{IncidentPatch, IncidentStats, IncidentZone, LocationCheckRecord, NewIncident};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Zones kept in creation order.
#[derive(Default)]
pub struct MemoryIncidentStore {
    zones: Mutex<Vec<IncidentZone>>,
}

impl MemoryIncidentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with ready-made zones, oldest first.
    pub fn with_zones(zones: Vec<IncidentZone>) -> Self {
        Self {
            zones: Mutex::new(zones),
        }
    }
}

#[async_trait]
impl IncidentStore for MemoryIncidentStore {
    async fn create(&self, incident: NewIncident) -> Result<IncidentZone> {
        let now = Utc::now();
        let zone = IncidentZone {
            id: Uuid::new_v4(),
            title: incident.title,
            description: incident.description,
            severity: incident.severity,
            latitude: incident.latitude,
            longitude: incident.longitude,
            radius_meters: incident.radius_meters,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.zones.lock().await.push(zone.clone());
        Ok(zone)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<IncidentZone> {
        self.zones
            .lock()
            .await
            .iter()
            .find(|z| z.id == id)
            .cloned()
            .ok_or_else(|| Error::not_found("incident", id))
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<IncidentZone>, i64)> {
        let zones = self.zones.lock().await;
        let page = zones
            .iter()
            .rev()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((page, zones.len() as i64))
    }

    async fn update(&self, id: Uuid, patch: IncidentPatch) -> Result<IncidentZone> {
        let mut zones = self.zones.lock().await;
        let zone = zones
            .iter_mut()
            .find(|z| z.id == id)
            .ok_or_else(|| Error::not_found("incident", id))?;
        patch.apply(zone);
        zone.updated_at = Utc::now();
        Ok(zone.clone())
    }

    async fn deactivate(&self, id: Uuid) -> Result<()> {
        let mut zones = self.zones.lock().await;
        let zone = zones
            .iter_mut()
            .find(|z| z.id == id && z.is_active)
            .ok_or_else(|| Error::not_found("incident", id))?;
        zone.is_active = false;
        zone.updated_at = Utc::now();
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<IncidentZone>> {
        Ok(self
            .zones
            .lock()
            .await
            .iter()
            .rev()
            .filter(|z| z.is_active)
            .cloned()
            .collect())
    }
}

/// Check log that answers stats queries against a sibling incident store.
pub struct MemoryCheckLogStore {
    incidents: Arc<MemoryIncidentStore>,
    records: Mutex<Vec<LocationCheckRecord>>,
}

impl MemoryCheckLogStore {
    pub fn new(incidents: Arc<MemoryIncidentStore>) -> Self {
        Self {
            incidents,
            records: Mutex::new(Vec::new()),
        }
    }

    pub async fn records(&self) -> Vec<LocationCheckRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl CheckLogStore for MemoryCheckLogStore {
    async fn create(&self, record: &LocationCheckRecord) -> Result<()> {
        let mut records = self.records.lock().await;
        if records.iter().any(|r| r.id == record.id) {
            return Err(Error::Conflict(format!(
                "duplicate location check id {}",
                record.id
            )));
        }
        records.push(record.clone());
        Ok(())
    }

    async fn stats_by_incident(&self, since: DateTime<Utc>) -> Result<Vec<IncidentStats>> {
        let active = self.incidents.list_active().await?;
        let records = self.records.lock().await;

        Ok(active
            .into_iter()
            .map(|zone| {
                let users: HashSet<&str> = records
                    .iter()
                    .filter(|r| r.checked_at >= since && r.matched_incident_ids.contains(&zone.id))
                    .map(|r| r.user_id.as_str())
                    .collect();
                IncidentStats {
                    incident_id: zone.id,
                    title: zone.title,
                    user_count: users.len() as i64,
                }
            })
            .collect())
    }
}
