//! Reverse geocoding of EXIF GPS coordinates.

use std::collections::BTreeMap;

use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;

use crate::config::GeocoderConfig;
use crate::error::GeocodeError;

/// Address fields joined into the location caption, most specific first.
pub const LOCATION_FIELDS: &[&str] = &[
    "road", "suburb", "village", "town", "city", "county", "state", "country",
];

/// Structured reverse-geocoding result.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GeocodeResponse {
    #[serde(default)]
    pub address: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl GeocodeResponse {
    /// Join every present [`LOCATION_FIELDS`] entry with `", "`; fall back to
    /// the provider's display name when none is present.
    ///
    /// A response without an `address` object has no location at all.
    pub fn location(&self) -> Option<String> {
        let address = self.address.as_ref()?;
        let parts: Vec<&str> = LOCATION_FIELDS
            .iter()
            .filter_map(|field| address.get(*field))
            .filter_map(Value::as_str)
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            self.display_name.clone().filter(|s| !s.is_empty())
        } else {
            Some(parts.join(", "))
        }
    }
}

/// Resolves coordinates to an address.
pub trait Geocoder: Send + Sync {
    fn reverse<'a>(
        &'a self,
        latitude: f64,
        longitude: f64,
        language: &'a str,
    ) -> BoxFuture<'a, Result<GeocodeResponse, GeocodeError>>;
}

/// Nominatim-compatible `/reverse` client.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    endpoint: String,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self, GeocodeError> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }
}

impl Geocoder for NominatimGeocoder {
    fn reverse<'a>(
        &'a self,
        latitude: f64,
        longitude: f64,
        language: &'a str,
    ) -> BoxFuture<'a, Result<GeocodeResponse, GeocodeError>> {
        Box::pin(async move {
            let body = self
                .client
                .get(format!("{}/reverse", self.endpoint))
                .query(&[
                    ("format", "jsonv2".to_string()),
                    ("lat", latitude.to_string()),
                    ("lon", longitude.to_string()),
                    ("accept-language", language.to_string()),
                ])
                .send()
                .await?
                .text()
                .await?;
            parse_response(&body)
        })
    }
}

/// Decode a provider payload, surfacing an explicit `error` field as failure.
pub fn parse_response(body: &str) -> Result<GeocodeResponse, GeocodeError> {
    let raw: Value = serde_json::from_str(body)?;
    if let Some(err) = raw.get("error") {
        let message = err
            .as_str()
            .map_or_else(|| err.to_string(), str::to_string);
        return Err(GeocodeError::Provider(message));
    }
    Ok(serde_json::from_value(raw)?)
}
