use geo_alerts::cache::RedisIncidentCache;
use geo_alerts::config::AppConfig;
use geo_alerts::processor::{IncidentService, LocationService};
use geo_alerts::queue::RedisWebhookQueue;
use geo_alerts::store::{PgCheckLogStore, PgIncidentStore};
use geo_alerts::webhook::{HttpWebhookSender, WebhookWorker, WorkerSettings};
use geo_alerts::{db, kafka};
use redis::aio::ConnectionManager;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = AppConfig::load()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    info!("Starting Geo Alerts Service...");

    // Init DB
    let pool = db::init_pool(&config.database_url, config.db_max_connections).await?;
    db::init_schema(&pool).await?;
    info!("Connected to database");

    // Init Redis. BRPOP gets a connection of its own.
    let redis = redis::Client::open(config.redis_url.as_str())?;
    let conn = ConnectionManager::new(redis.clone()).await?;
    let pop_conn = ConnectionManager::new(redis).await?;
    info!("Connected to Redis");

    let incidents = Arc::new(PgIncidentStore::new(pool.clone()));
    let checks = Arc::new(PgCheckLogStore::new(pool));
    let cache = Arc::new(RedisIncidentCache::new(conn.clone(), config.cache_ttl()));
    let queue = Arc::new(RedisWebhookQueue::new(conn, pop_conn));

    let admin = IncidentService::new(
        incidents.clone(),
        cache.clone(),
        checks.clone(),
        config.stats_window(),
    );
    match admin.stats().await {
        Ok(stats) => info!(
            "Tracking {} active incident zones over the last {} minutes",
            stats.len(),
            config.stats_time_window_minutes
        ),
        Err(e) => error!("Failed to load incident stats: {}", e),
    }

    let service = Arc::new(LocationService::new(incidents, cache, checks, queue.clone()));

    // Start webhook worker
    let sender = HttpWebhookSender::new(config.webhook_url.clone(), config.webhook_timeout())?;
    info!("Delivering webhooks to {}", sender.url());
    let worker = WebhookWorker::new(
        queue,
        Arc::new(sender),
        WorkerSettings {
            retry_attempts: config.webhook_retry_attempts,
            retry_delay: config.webhook_retry_delay(),
            pop_timeout: config.webhook_pop_timeout(),
            ..Default::default()
        },
    );

    let shutdown = CancellationToken::new();
    let worker_handle = tokio::spawn(worker.run(shutdown.clone()));

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                signal.cancel();
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    // Start Kafka
    let consumed = kafka::start_kafka_consumer(&config, service, shutdown.clone()).await;

    shutdown.cancel();
    if let Err(e) = worker_handle.await {
        error!("Webhook worker task failed: {}", e);
    }
    info!("Geo Alerts Service stopped");

    consumed
}
