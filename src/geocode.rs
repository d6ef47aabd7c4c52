//! Reverse geocoding through the GISTDA Sphere address service.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::config::GeocoderConfig;

#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("service responded with status {0}")]
    Status(u16),
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// Return the service's JSON for the point, unchanged.
    async fn reverse(&self, lat: f64, lng: f64) -> Result<Value, GeocodeError>;
}

pub struct GistdaGeocoder {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl GistdaGeocoder {
    pub fn new(config: &GeocoderConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    fn address_url(&self) -> String {
        format!("{}/services/geo/address", self.base_url)
    }

    fn query(&self, lat: f64, lng: f64) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("lon", format!("{lng:.6}")),
            ("lat", format!("{lat:.6}")),
            ("local", "t".to_string()),
        ];
        if let Some(key) = &self.api_key {
            query.push(("key", key.clone()));
        }
        query
    }
}

#[async_trait]
impl ReverseGeocoder for GistdaGeocoder {
    async fn reverse(&self, lat: f64, lng: f64) -> Result<Value, GeocodeError> {
        let response = self
            .client
            .get(self.address_url())
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&self.query(lat, lng))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status.as_u16()));
        }

        Ok(response.json::<Value>().await?)
    }
}

/// The address fields the document form needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Address {
    pub geocode: i64,
    pub province: String,
    pub district: String,
    pub subdistrict: String,
}

impl Address {
    /// Pick the address out of a service response. `None` when the point
    /// has no province (sea, outside Thailand).
    pub fn from_value(value: &Value) -> Option<Self> {
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let province = text("province");
        if province.is_empty() {
            return None;
        }

        let geocode = match value.get("geocode") {
            Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
            Some(Value::String(s)) => s.parse().unwrap_or(0),
            _ => 0,
        };

        Some(Address {
            geocode,
            province,
            district: text("district"),
            subdistrict: text("subdistrict"),
        })
    }
}

/// Parse a coordinate query parameter.
pub fn parse_coordinate(raw: Option<&str>) -> Option<f64> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}
