use crate::error::Error;
use crate::models::message::LocationMessage;
use crate::processor::location_service::LocationService;
use tracing::{debug, warn};

/// Handles one raw Kafka payload. Malformed or invalid reports are logged
/// and skipped; only storage and queue failures surface as errors.
pub async fn process_message(service: &LocationService, payload: &[u8]) -> anyhow::Result<()> {
    let message: LocationMessage = match serde_json::from_slice(payload) {
        Ok(m) => m,
        Err(e) => {
            warn!("Failed to parse message: {}", e);
            return Ok(());
        }
    };

    let request = match message.into_request() {
        Ok(r) => r,
        Err(Error::Validation(reason)) => {
            warn!("Skipping invalid location report: {}", reason);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    debug!("Processing location report for user {}", request.user_id);
    service.check_location(&request).await?;

    Ok(())
}
