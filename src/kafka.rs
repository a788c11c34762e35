use crate::config::AppConfig;
use crate::processor::{message_processor, LocationService};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

/// Consumes location reports with SASL authentication and a circuit breaker
/// until `shutdown` fires, then waits for in-flight checks.
pub async fn start_kafka_consumer(
    config: &AppConfig,
    service: Arc<LocationService>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    info!("Initializing Kafka consumer for topic: {}", config.kafka_topic);

    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", &config.kafka_bootstrap_servers)
        .set("group.id", &config.kafka_group_id)
        .set("auto.offset.reset", &config.kafka_auto_offset_reset)
        // SASL Configuration
        .set("security.protocol", &config.kafka_security_protocol)
        .set("sasl.mechanism", &config.kafka_sasl_mechanism)
        .set("sasl.username", &config.kafka_username)
        .set("sasl.password", &config.kafka_password);

    let consumer: StreamConsumer = client_config.create()?;

    consumer.subscribe(&[&config.kafka_topic])?;
    info!("Subscribed to topic: {}", config.kafka_topic);

    let in_flight = TaskTracker::new();
    let mut consecutive_failures = 0;
    let max_retries = config.kafka_max_retries;
    let cooldown_duration = Duration::from_secs(config.kafka_circuit_breaker_cooldown);

    loop {
        if consecutive_failures >= max_retries {
            warn!(
                "Circuit breaker tripped ({} consecutive failures)! Sleeping for {} seconds...",
                consecutive_failures, config.kafka_circuit_breaker_cooldown
            );
            tokio::select! {
                _ = tokio::time::sleep(cooldown_duration) => {}
                _ = shutdown.cancelled() => break,
            }
            consecutive_failures = 0;
            info!("Circuit breaker reset. Resuming consumption.");
        }

        let received = tokio::select! {
            _ = shutdown.cancelled() => break,
            received = consumer.recv() => received,
        };

        match received {
            Ok(m) => {
                consecutive_failures = 0;

                let payload = match m.payload() {
                    None => {
                        warn!("Received empty payload from Kafka");
                        continue;
                    }
                    Some(p) => p.to_vec(),
                };

                let service = service.clone();
                // Checks run off the consumer loop; the tracker lets shutdown
                // wait for them.
                in_flight.spawn(async move {
                    if let Err(e) = message_processor::process_message(&service, &payload).await {
                        error!("Error processing message: {}", e);
                    }
                });
            }
            Err(e) => {
                consecutive_failures += 1;
                error!(
                    "Kafka error: {}. Incrementing failure count ({} / {})",
                    e, consecutive_failures, max_retries
                );

                // Avoid a tight loop on transient network glitches.
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }

    in_flight.close();
    info!("Kafka consumer stopping, waiting for {} in-flight checks", in_flight.len());
    in_flight.wait().await;
    Ok(())
}
