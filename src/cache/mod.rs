use crate::error::Result;
use crate::models::IncidentZone;
use async_trait::async_trait;

pub mod memory;
pub mod redis;

pub use self::memory::MemoryIncidentCache;
pub use self::redis::RedisIncidentCache;

/// Snapshot of the active incident set with a fixed time to live.
///
/// Cache-aside: callers fill the cache after a miss, and whoever mutates
/// incidents calls [`IncidentCache::invalidate`].
#[async_trait]
pub trait IncidentCache: Send + Sync {
    /// `None` on a miss. Expired and unreadable snapshots are misses too.
    async fn get_active(&self) -> Result<Option<Vec<IncidentZone>>>;

    /// Replaces the snapshot and restarts its TTL.
    async fn set_active(&self, zones: &[IncidentZone]) -> Result<()>;

    async fn invalidate(&self) -> Result<()>;
}
