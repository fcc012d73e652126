//! HTTP client for the postcodes.io REST API.
//!
//! Wraps `reqwest` with typed status handling and response decoding. Only
//! two endpoints are used: bulk reverse geocoding (`POST /postcodes`) and
//! free-text postcode search (`GET /postcodes?q=`).

use std::time::Duration;

use reqwest::{Client, Response, Url};
use ukarea_core::{AppConfig, GeoPoint, PostalCode, MAX_BATCH_SIZE};

use crate::error::LookupError;
use crate::lookup::GeoLookup;
use crate::rate_limit::retry_with_backoff;
use crate::types::{
    BulkReverseItem, BulkReverseRequest, BulkReverseResponse, GeolocationQuery,
    PostcodeQueryResponse,
};

const DEFAULT_BASE_URL: &str = "https://api.postcodes.io/";

/// Client for the postcodes.io API.
///
/// Use [`PostcodesClient::new`] for production or
/// [`PostcodesClient::with_base_url`] to point at a mock server in tests.
/// Transient errors are retried up to `max_retries` times; zero disables
/// retrying.
pub struct PostcodesClient {
    client: Client,
    postcodes_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl PostcodesClient {
    /// Creates a client pointed at the public postcodes.io API.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, LookupError> {
        Self::with_base_url(
            DEFAULT_BASE_URL,
            timeout_secs,
            user_agent,
            max_retries,
            backoff_base_ms,
        )
    }

    /// Creates a client from application configuration.
    ///
    /// # Errors
    ///
    /// Same as [`PostcodesClient::with_base_url`].
    pub fn from_config(config: &AppConfig) -> Result<Self, LookupError> {
        Self::with_base_url(
            &config.postcodes_api_url,
            config.request_timeout_secs,
            &config.user_agent,
            config.max_retries,
            config.retry_backoff_base_ms,
        )
    }

    /// Creates a client with a custom base URL.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::Http`] if the `reqwest::Client` cannot be
    /// constructed, or [`LookupError::InvalidBaseUrl`] if `base_url` does not
    /// parse.
    pub fn with_base_url(
        base_url: &str,
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, LookupError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        let postcodes_url = postcodes_endpoint(base_url)?;

        Ok(Self {
            client,
            postcodes_url,
            max_retries,
            backoff_base_ms,
        })
    }

    /// Reverse-geocodes up to 100 points in one `POST /postcodes` call.
    ///
    /// Returns one slot per input point. A response shorter than the request
    /// leaves the trailing slots empty; surplus entries are ignored.
    ///
    /// # Errors
    ///
    /// - [`LookupError::BatchTooLarge`] if `points` exceeds the API cap (no request is sent).
    /// - [`LookupError::RateLimited`] on HTTP 429.
    /// - [`LookupError::UnexpectedStatus`] on any other non-2xx status.
    /// - [`LookupError::Http`] on network failure.
    /// - [`LookupError::Deserialize`] if the body does not match the expected shape.
    pub async fn reverse_geocode_batch(
        &self,
        points: &[GeoPoint],
        radius_m: u32,
        limit_per_point: u32,
    ) -> Result<Vec<Option<PostalCode>>, LookupError> {
        if points.len() > MAX_BATCH_SIZE {
            return Err(LookupError::BatchTooLarge {
                size: points.len(),
                max: MAX_BATCH_SIZE,
            });
        }
        if points.is_empty() {
            return Ok(Vec::new());
        }

        let request = BulkReverseRequest {
            geolocations: points
                .iter()
                .map(|p| GeolocationQuery {
                    latitude: p.latitude,
                    longitude: p.longitude,
                    radius: radius_m,
                    limit: limit_per_point,
                })
                .collect(),
        };
        let payload = &request;
        let batch_len = points.len();

        let parsed = retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let url = self.postcodes_url.clone();
            async move {
                let response = self.client.post(url.clone()).json(payload).send().await?;
                let body = read_success_body(response, &url).await?;
                serde_json::from_str::<BulkReverseResponse>(&body).map_err(|e| {
                    LookupError::Deserialize {
                        context: format!("bulk reverse geocode of {batch_len} points"),
                        source: e,
                    }
                })
            }
        })
        .await?;

        Ok(align_results(parsed.result, batch_len))
    }

    /// Looks up a place name with `GET /postcodes?q=<name>&limit=1`.
    ///
    /// Returns the coordinates of the first match, or `None` when the API
    /// reports no match.
    ///
    /// # Errors
    ///
    /// Same status and decoding errors as [`Self::reverse_geocode_batch`].
    pub async fn search_by_name(&self, name: &str) -> Result<Option<GeoPoint>, LookupError> {
        let url = self.query_url(name);

        let parsed = retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let url = url.clone();
            async move {
                let response = self.client.get(url.clone()).send().await?;
                let body = read_success_body(response, &url).await?;
                serde_json::from_str::<PostcodeQueryResponse>(&body).map_err(|e| {
                    LookupError::Deserialize {
                        context: format!("postcode search for {name}"),
                        source: e,
                    }
                })
            }
        })
        .await?;

        Ok(parsed
            .result
            .and_then(|records| records.into_iter().next())
            .and_then(|record| match (record.latitude, record.longitude) {
                (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
                _ => None,
            }))
    }

    fn query_url(&self, name: &str) -> Url {
        let mut url = self.postcodes_url.clone();
        url.query_pairs_mut()
            .append_pair("q", name)
            .append_pair("limit", "1");
        url
    }
}

impl GeoLookup for PostcodesClient {
    async fn lookup_batch(
        &self,
        points: &[GeoPoint],
        radius_m: u32,
        limit_per_point: u32,
    ) -> Result<Vec<Option<PostalCode>>, LookupError> {
        self.reverse_geocode_batch(points, radius_m, limit_per_point)
            .await
    }

    async fn lookup_by_name(&self, name: &str) -> Result<Option<GeoPoint>, LookupError> {
        self.search_by_name(name).await
    }
}

/// Resolves `<base>/postcodes`, tolerating a base URL with or without a
/// trailing slash.
fn postcodes_endpoint(base_url: &str) -> Result<Url, LookupError> {
    let normalised = format!("{}/", base_url.trim_end_matches('/'));
    Url::parse(&normalised)
        .and_then(|base| base.join("postcodes"))
        .map_err(|e| LookupError::InvalidBaseUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })
}

/// Maps 429 and other non-2xx statuses to typed errors, returning the body
/// text on success.
async fn read_success_body(response: Response, url: &Url) -> Result<String, LookupError> {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);
        return Err(LookupError::RateLimited { retry_after_secs });
    }

    if !status.is_success() {
        return Err(LookupError::UnexpectedStatus {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    Ok(response.text().await?)
}

/// Lines the API's per-point results up with the request, one slot per point.
fn align_results(items: Vec<BulkReverseItem>, expected: usize) -> Vec<Option<PostalCode>> {
    if items.len() > expected {
        tracing::warn!(
            expected,
            received = items.len(),
            "bulk reverse geocode returned more entries than requested; ignoring surplus"
        );
    }

    let mut slots: Vec<Option<PostalCode>> = items
        .into_iter()
        .take(expected)
        .map(|item| {
            item.result
                .and_then(|records| records.into_iter().next())
                .and_then(|record| PostalCode::new(&record.postcode).ok())
        })
        .collect();
    slots.resize(expected, None);
    slots
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
