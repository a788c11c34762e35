pub mod incident;
pub mod location;
pub mod message;
pub mod webhook;

pub use incident::{IncidentPatch, IncidentZone, NewIncident, Severity};
pub use location::{
    IncidentStats, LocationCheckRecord, LocationCheckRequest, LocationCheckResponse,
    NearbyIncident,
};
pub use webhook::{WebhookJob, WebhookPayload};
