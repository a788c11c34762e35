use super::IncidentCache;
use crate::error::Result;
use crate::models::IncidentZone;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

struct Entry {
    zones: Vec<IncidentZone>,
    expires_at: Instant,
}

pub struct MemoryIncidentCache {
    ttl: Duration,
    entry: Mutex<Option<Entry>>,
}

impl MemoryIncidentCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }
}

#[async_trait]
impl IncidentCache for MemoryIncidentCache {
    async fn get_active(&self) -> Result<Option<Vec<IncidentZone>>> {
        let mut entry = self.entry.lock().await;
        match entry.as_ref() {
            Some(e) if Instant::now() < e.expires_at => Ok(Some(e.zones.clone())),
            Some(_) => {
                *entry = None;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_active(&self, zones: &[IncidentZone]) -> Result<()> {
        *self.entry.lock().await = Some(Entry {
            zones: zones.to_vec(),
            expires_at: Instant::now() + self.ttl,
        });
        Ok(())
    }

    async fn invalidate(&self) -> Result<()> {
        *self.entry.lock().await = None;
        Ok(())
    }
}
