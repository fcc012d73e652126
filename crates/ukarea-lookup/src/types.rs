//! Wire types for the postcodes.io endpoints.

use serde::{Deserialize, Serialize};

/// One entry of a bulk reverse-geocode request.
#[derive(Debug, Clone, Serialize)]
pub struct GeolocationQuery {
    pub latitude: f64,
    pub longitude: f64,
    /// Search radius in metres.
    pub radius: u32,
    /// Maximum postcodes returned for this point, closest first.
    pub limit: u32,
}

#[derive(Debug, Serialize)]
pub struct BulkReverseRequest {
    pub geolocations: Vec<GeolocationQuery>,
}

/// Response of `POST /postcodes`; `result` is positionally aligned with the
/// request's `geolocations`.
#[derive(Debug, Deserialize)]
pub struct BulkReverseResponse {
    #[serde(default)]
    pub result: Vec<BulkReverseItem>,
}

#[derive(Debug, Deserialize)]
pub struct BulkReverseItem {
    #[serde(default)]
    pub query: serde_json::Value,
    /// `null` when no postcode lies within the radius.
    #[serde(default)]
    pub result: Option<Vec<PostcodeRecord>>,
}

/// The subset of a postcode record this crate reads.
#[derive(Debug, Clone, Deserialize)]
pub struct PostcodeRecord {
    pub postcode: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// Response of `GET /postcodes?q=...`.
#[derive(Debug, Deserialize)]
pub struct PostcodeQueryResponse {
    #[serde(default)]
    pub result: Option<Vec<PostcodeRecord>>,
}
