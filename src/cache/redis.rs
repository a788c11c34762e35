use super::IncidentCache;
use crate::error::Result;
use crate::models::IncidentZone;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::warn;

pub const ACTIVE_INCIDENTS_KEY: &str = "geoalerts:active_incidents";

pub struct RedisIncidentCache {
    conn: ConnectionManager,
    ttl: Duration,
}

impl RedisIncidentCache {
    pub fn new(conn: ConnectionManager, ttl: Duration) -> Self {
        Self { conn, ttl }
    }
}

/// An entry that no longer parses counts as a miss.
fn decode_snapshot(raw: &str) -> Option<Vec<IncidentZone>> {
    match serde_json::from_str(raw) {
        Ok(zones) => Some(zones),
        Err(e) => {
            warn!("Discarding unreadable incident cache entry: {}", e);
            None
        }
    }
}

#[async_trait]
impl IncidentCache for RedisIncidentCache {
    async fn get_active(&self) -> Result<Option<Vec<IncidentZone>>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(ACTIVE_INCIDENTS_KEY).await?;

        Ok(raw.as_deref().and_then(decode_snapshot))
    }

    async fn set_active(&self, zones: &[IncidentZone]) -> Result<()> {
        let raw = serde_json::to_string(zones)?;
        let mut conn = self.conn.clone();
        // Redis rejects EX 0.
        let ttl_secs = self.ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(ACTIVE_INCIDENTS_KEY, raw, ttl_secs)
            .await?;
        Ok(())
    }

    async fn invalidate(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(ACTIVE_INCIDENTS_KEY).await?;
        Ok(())
    }
}
