//! Durable collaborators of the location check pipeline.
//!
//! Each store is a trait with a Postgres implementation for production and
//! an in-memory one for tests and local runs.

use crate::error::Result;
use crate::models::{IncidentPatch, IncidentStats, IncidentZone, LocationCheckRecord, NewIncident};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::{MemoryCheckLogStore, MemoryIncidentStore};
pub use postgres::{PgCheckLogStore, PgIncidentStore};

/// Source of truth for incident zones.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    async fn create(&self, incident: NewIncident) -> Result<IncidentZone>;

    /// Fails with `Error::NotFound` for unknown ids.
    async fn get_by_id(&self, id: Uuid) -> Result<IncidentZone>;

    /// One page of all zones, newest first, plus the total count.
    async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<IncidentZone>, i64)>;

    async fn update(&self, id: Uuid, patch: IncidentPatch) -> Result<IncidentZone>;

    /// Soft delete. Deactivating an inactive zone is `Error::NotFound`.
    async fn deactivate(&self, id: Uuid) -> Result<()>;

    async fn list_active(&self) -> Result<Vec<IncidentZone>>;
}

/// Append-only log of location checks.
#[async_trait]
pub trait CheckLogStore: Send + Sync {
    /// Persists the record and its matched incident ids atomically.
    async fn create(&self, record: &LocationCheckRecord) -> Result<()>;

    /// Distinct users per active incident over checks made since `since`.
    async fn stats_by_incident(&self, since: DateTime<Utc>) -> Result<Vec<IncidentStats>>;
}
