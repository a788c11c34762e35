use super::location::LocationCheckRequest;
use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer};

/// Location report as published on the Kafka topic.
#[derive(Debug, Deserialize)]
pub struct LocationMessage {
    #[serde(alias = "USER_ID")]
    pub user_id: Option<String>,
    #[serde(alias = "LATITUDE", alias = "LATITUD", default, deserialize_with = "parse_f64_option")]
    pub latitude: Option<f64>,
    #[serde(alias = "LONGITUDE", alias = "LONGITUD", default, deserialize_with = "parse_f64_option")]
    pub longitude: Option<f64>,
}

impl LocationMessage {
    pub fn into_request(self) -> Result<LocationCheckRequest> {
        let user_id = self
            .user_id
            .ok_or_else(|| Error::validation("message missing user_id"))?;
        let latitude = self
            .latitude
            .ok_or_else(|| Error::validation("message missing latitude"))?;
        let longitude = self
            .longitude
            .ok_or_else(|| Error::validation("message missing longitude"))?;

        let request = LocationCheckRequest {
            user_id,
            latitude,
            longitude,
        };
        request.validate()?;
        Ok(request)
    }
}

fn parse_f64_option<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrFloat {
        String(String),
        Float(f64),
    }

    let v: Option<StringOrFloat> = Option::deserialize(deserializer)?;
    match v {
        Some(StringOrFloat::Float(f)) => Ok(Some(f)),
        Some(StringOrFloat::String(s)) => {
            if s.trim().is_empty() {
                Ok(None)
            } else {
                s.trim().parse::<f64>().map(Some).map_err(serde::de::Error::custom)
            }
        }
        None => Ok(None),
    }
}
