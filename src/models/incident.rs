use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const MIN_RADIUS_METERS: i32 = 10;
pub const MAX_RADIUS_METERS: i32 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(Error::validation(format!("unknown severity '{}'", other))),
        }
    }
}

/// Circular danger zone. Only active zones take part in location checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentZone {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row shape of the `incidents` table.
#[derive(Debug, FromRow)]
pub struct IncidentRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub severity: String, // TEXT with a CHECK constraint
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<IncidentRow> for IncidentZone {
    type Error = Error;

    fn try_from(row: IncidentRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            title: row.title,
            description: row.description,
            severity: row.severity.parse()?,
            latitude: row.latitude,
            longitude: row.longitude,
            radius_meters: row.radius_meters,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewIncident {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub severity: Severity,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: i32,
}

impl NewIncident {
    pub fn validate(&self) -> Result<()> {
        validate_title(&self.title)?;
        validate_description(&self.description)?;
        validate_coordinates(self.latitude, self.longitude)?;
        validate_radius(self.radius_meters)
    }
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncidentPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub severity: Option<Severity>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_meters: Option<i32>,
}

impl IncidentPatch {
    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        if let Some(lat) = self.latitude {
            validate_latitude(lat)?;
        }
        if let Some(lon) = self.longitude {
            validate_longitude(lon)?;
        }
        if let Some(radius) = self.radius_meters {
            validate_radius(radius)?;
        }
        Ok(())
    }

    pub fn apply(self, zone: &mut IncidentZone) {
        if let Some(title) = self.title {
            zone.title = title;
        }
        if let Some(description) = self.description {
            zone.description = description;
        }
        if let Some(severity) = self.severity {
            zone.severity = severity;
        }
        if let Some(lat) = self.latitude {
            zone.latitude = lat;
        }
        if let Some(lon) = self.longitude {
            zone.longitude = lon;
        }
        if let Some(radius) = self.radius_meters {
            zone.radius_meters = radius;
        }
    }
}

fn validate_title(title: &str) -> Result<()> {
    let len = title.chars().count();
    if !(3..=200).contains(&len) {
        return Err(Error::validation("title must be between 3 and 200 characters"));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<()> {
    if description.chars().count() > 1000 {
        return Err(Error::validation("description must be at most 1000 characters"));
    }
    Ok(())
}

fn validate_radius(radius: i32) -> Result<()> {
    if !(MIN_RADIUS_METERS..=MAX_RADIUS_METERS).contains(&radius) {
        return Err(Error::validation(format!(
            "radius_meters must be between {} and {}",
            MIN_RADIUS_METERS, MAX_RADIUS_METERS
        )));
    }
    Ok(())
}

pub fn validate_latitude(lat: f64) -> Result<()> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(Error::validation(format!("latitude {} out of range", lat)));
    }
    Ok(())
}

pub fn validate_longitude(lon: f64) -> Result<()> {
    if !(-180.0..=180.0).contains(&lon) {
        return Err(Error::validation(format!("longitude {} out of range", lon)));
    }
    Ok(())
}

pub fn validate_coordinates(lat: f64, lon: f64) -> Result<()> {
    validate_latitude(lat)?;
    validate_longitude(lon)
}
