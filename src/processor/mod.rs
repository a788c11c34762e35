pub mod incident_service;
pub mod location_service;
pub mod message_processor;

pub use incident_service::IncidentService;
pub use location_service::LocationService;
