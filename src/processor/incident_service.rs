use crate::cache::IncidentCache;
use crate::error::Result;
use crate::models::{IncidentPatch, IncidentStats, IncidentZone, NewIncident};
use crate::store::{CheckLogStore, IncidentStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

pub const MAX_PAGE_SIZE: i64 = 100;

/// Incident administration. Every successful mutation drops the cached
/// active-zone snapshot.
pub struct IncidentService {
    incidents: Arc<dyn IncidentStore>,
    cache: Arc<dyn IncidentCache>,
    checks: Arc<dyn CheckLogStore>,
    stats_window: Duration,
}

impl IncidentService {
    pub fn new(
        incidents: Arc<dyn IncidentStore>,
        cache: Arc<dyn IncidentCache>,
        checks: Arc<dyn CheckLogStore>,
        stats_window: Duration,
    ) -> Self {
        Self {
            incidents,
            cache,
            checks,
            stats_window,
        }
    }

    pub async fn create(&self, incident: NewIncident) -> Result<IncidentZone> {
        incident.validate()?;
        let zone = self.incidents.create(incident).await?;
        info!("Created incident {} ({})", zone.id, zone.title);
        self.invalidate_cache().await;
        Ok(zone)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<IncidentZone> {
        self.incidents.get_by_id(id).await
    }

    /// `limit` is clamped to `1..=MAX_PAGE_SIZE`, `offset` to zero or more.
    pub async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<IncidentZone>, i64)> {
        self.incidents
            .list(limit.clamp(1, MAX_PAGE_SIZE), offset.max(0))
            .await
    }

    pub async fn update(&self, id: Uuid, patch: IncidentPatch) -> Result<IncidentZone> {
        patch.validate()?;
        let zone = self.incidents.update(id, patch).await?;
        info!("Updated incident {}", zone.id);
        self.invalidate_cache().await;
        Ok(zone)
    }

    pub async fn deactivate(&self, id: Uuid) -> Result<()> {
        self.incidents.deactivate(id).await?;
        info!("Deactivated incident {}", id);
        self.invalidate_cache().await;
        Ok(())
    }

    /// Distinct users seen in each active zone over the configured window.
    pub async fn stats(&self) -> Result<Vec<IncidentStats>> {
        // A window reaching past the representable range covers everything.
        let since = chrono::Duration::from_std(self.stats_window)
            .ok()
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.checks.stats_by_incident(since).await
    }

    // A stale snapshot expires with its TTL anyway.
    async fn invalidate_cache(&self) {
        if let Err(e) = self.cache.invalidate().await {
            warn!("Failed to invalidate incident cache: {}", e);
        }
    }
}
