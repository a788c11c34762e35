use crate::cache::IncidentCache;
use crate::error::Result;
use crate::geo;
use crate::models::{
    IncidentZone, LocationCheckRecord, LocationCheckRequest, LocationCheckResponse,
    NearbyIncident, WebhookJob, WebhookPayload,
};
use crate::queue::WebhookQueue;
use crate::store::{CheckLogStore, IncidentStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Matches a reported position against the active incident zones.
///
/// Holds no mutable state of its own, so one instance serves any number of
/// concurrent checks.
pub struct LocationService {
    incidents: Arc<dyn IncidentStore>,
    cache: Arc<dyn IncidentCache>,
    checks: Arc<dyn CheckLogStore>,
    queue: Arc<dyn WebhookQueue>,
}

impl LocationService {
    pub fn new(
        incidents: Arc<dyn IncidentStore>,
        cache: Arc<dyn IncidentCache>,
        checks: Arc<dyn CheckLogStore>,
        queue: Arc<dyn WebhookQueue>,
    ) -> Self {
        Self {
            incidents,
            cache,
            checks,
            queue,
        }
    }

    pub async fn check_location(&self, request: &LocationCheckRequest) -> Result<LocationCheckResponse> {
        let zones = self.active_zones().await?;
        let matched = match_zones(request.latitude, request.longitude, &zones);

        let now = Utc::now();
        let record = LocationCheckRecord {
            id: Uuid::new_v4(),
            user_id: request.user_id.clone(),
            latitude: request.latitude,
            longitude: request.longitude,
            is_in_danger_zone: !matched.is_empty(),
            checked_at: now,
            matched_incident_ids: matched.iter().map(|m| m.id).collect(),
        };

        // The record must be durable before anyone can be notified about it.
        self.checks.create(&record).await?;

        if record.is_in_danger_zone {
            let job = WebhookJob::new(WebhookPayload::new(&record, matched.clone()), now);
            self.queue.enqueue(&job).await?;
            info!(
                "User {} is inside {} incident zone(s), check {} queued for webhook",
                record.user_id,
                matched.len(),
                record.id
            );
        } else {
            debug!("User {} is clear, check {}", record.user_id, record.id);
        }

        Ok(LocationCheckResponse {
            check_id: record.id,
            is_in_danger_zone: record.is_in_danger_zone,
            checked_at: record.checked_at,
            incidents: matched,
        })
    }

    /// Cache first; on a miss read the store and refill the cache.
    async fn active_zones(&self) -> Result<Vec<IncidentZone>> {
        match self.cache.get_active().await {
            Ok(Some(zones)) => return Ok(zones),
            Ok(None) => {}
            Err(e) => warn!("Incident cache unavailable, reading from store: {}", e),
        }

        let zones = self.incidents.list_active().await?;
        // An invalidation landing between the read and this write leaves the
        // older snapshot cached until its TTL runs out.
        if let Err(e) = self.cache.set_active(&zones).await {
            warn!("Failed to populate incident cache: {}", e);
        }
        Ok(zones)
    }
}

/// Zones containing the point, nearest first. Equal distances keep the
/// order of `zones`.
pub fn match_zones(latitude: f64, longitude: f64, zones: &[IncidentZone]) -> Vec<NearbyIncident> {
    let mut matched: Vec<NearbyIncident> = zones
        .iter()
        .filter_map(|zone| {
            let distance = geo::distance_meters(latitude, longitude, zone.latitude, zone.longitude);
            geo::is_within(distance, f64::from(zone.radius_meters))
                .then(|| NearbyIncident::from_zone(zone, distance))
        })
        .collect();

    matched.sort_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters));
    matched
}
