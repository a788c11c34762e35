use super::{CheckLogStore, IncidentStore};
use crate::db::{queries, DbPool};
use crate::error::{Error, Result};
use crate::models::incident::IncidentRow;
use crate::models::{IncidentPatch, IncidentStats, IncidentZone, LocationCheckRecord, NewIncident};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

pub struct PgIncidentStore {
    pool: DbPool,
}

impl PgIncidentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn into_zones(rows: Vec<IncidentRow>) -> Result<Vec<IncidentZone>> {
    rows.into_iter().map(IncidentZone::try_from).collect()
}

#[async_trait]
impl IncidentStore for PgIncidentStore {
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

        sqlx::query(queries::INSERT_INCIDENT)
            .bind(zone.id)
            .bind(&zone.title)
            .bind(&zone.description)
            .bind(zone.severity.as_str())
            .bind(zone.latitude)
            .bind(zone.longitude)
            .bind(zone.radius_meters)
            .bind(zone.is_active)
            .bind(zone.created_at)
            .bind(zone.updated_at)
            .execute(&self.pool)
            .await?;

        Ok(zone)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<IncidentZone> {
        sqlx::query_as::<_, IncidentRow>(queries::SELECT_INCIDENT_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("incident", id))?
            .try_into()
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<IncidentZone>, i64)> {
        let (total,): (i64,) = sqlx::query_as(queries::COUNT_INCIDENTS)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, IncidentRow>(queries::SELECT_INCIDENTS_PAGE)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok((into_zones(rows)?, total))
    }

    async fn update(&self, id: Uuid, patch: IncidentPatch) -> Result<IncidentZone> {
        let mut tx = self.pool.begin().await?;

        // Row lock keeps concurrent patches from overwriting each other.
        let mut zone: IncidentZone = sqlx::query_as::<_, IncidentRow>(queries::SELECT_INCIDENT_FOR_UPDATE)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::not_found("incident", id))?
            .try_into()?;

        patch.apply(&mut zone);
        zone.updated_at = Utc::now();

        sqlx::query(queries::UPDATE_INCIDENT)
            .bind(zone.id)
            .bind(&zone.title)
            .bind(&zone.description)
            .bind(zone.severity.as_str())
            .bind(zone.latitude)
            .bind(zone.longitude)
            .bind(zone.radius_meters)
            .bind(zone.updated_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(zone)
    }

    async fn deactivate(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(queries::DEACTIVATE_INCIDENT)
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("incident", id));
        }
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<IncidentZone>> {
        let rows = sqlx::query_as::<_, IncidentRow>(queries::SELECT_ACTIVE_INCIDENTS)
            .fetch_all(&self.pool)
            .await?;
        into_zones(rows)
    }
}

pub struct PgCheckLogStore {
    pool: DbPool,
}

impl PgCheckLogStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckLogStore for PgCheckLogStore {
    async fn create(&self, record: &LocationCheckRecord) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(queries::INSERT_LOCATION_CHECK)
            .bind(record.id)
            .bind(&record.user_id)
            .bind(record.latitude)
            .bind(record.longitude)
            .bind(record.is_in_danger_zone)
            .bind(record.checked_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    Error::Conflict(format!("duplicate location check id {}", record.id))
                }
                other => Error::Database(other),
            })?;

        if !record.matched_incident_ids.is_empty() {
            sqlx::query(queries::INSERT_LOCATION_CHECK_INCIDENTS)
                .bind(record.id)
                .bind(record.matched_incident_ids.as_slice())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!("Stored location check {} for user {}", record.id, record.user_id);
        Ok(())
    }

    async fn stats_by_incident(&self, since: DateTime<Utc>) -> Result<Vec<IncidentStats>> {
        let stats = sqlx::query_as::<_, IncidentStats>(queries::SELECT_STATS_BY_INCIDENT)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;
        Ok(stats)
    }
}
