mod cities;
mod export;
mod postcodes;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use ukarea_core::{CityRecord, ContainmentMode, CoreError, Shape};
use ukarea_lookup::{PostcodeSearch, PostcodesClient, QueryState, SearchOptions, SessionController};

use crate::directory::{CityDirectory, ResolutionProgress};
use crate::middleware::{enforce_rate_limit, request_id, RateLimitState, RequestId};

#[derive(Clone)]
pub struct AppState {
    pub lookup: Arc<PostcodesClient>,
    pub search_options: Arc<SearchOptions>,
    /// Containment used for city searches that do not name a mode.
    pub containment_mode: ContainmentMode,
    pub cities: Arc<CityDirectory>,
    pub postcode_session: Arc<SessionController<PostcodeSearch>>,
    pub city_session: Arc<SessionController<Vec<CityRecord>>>,
}

impl AppState {
    #[must_use]
    pub fn new(
        lookup: Arc<PostcodesClient>,
        search_options: SearchOptions,
        cities: Arc<CityDirectory>,
    ) -> Self {
        Self {
            lookup,
            containment_mode: search_options.containment_mode,
            search_options: Arc::new(search_options),
            cities,
            postcode_session: Arc::new(SessionController::new()),
            city_session: Arc::new(SessionController::new()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    cities: ResolutionProgress,
}

#[derive(Debug, Serialize)]
struct ResetData {
    postcodes: QueryState<()>,
    cities: QueryState<()>,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "upstream_error" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Unwraps a JSON body, turning axum's rejection into the error envelope.
pub(super) fn json_body<T>(
    request_id: &str,
    payload: Result<Json<T>, JsonRejection>,
) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::new(request_id, "validation_error", e.body_text()))
}

pub(super) fn validate_shape(request_id: &str, shape: &Shape) -> Result<(), ApiError> {
    shape
        .validate()
        .map_err(|e: CoreError| ApiError::new(request_id, "validation_error", e.to_string()))
}

pub(super) fn superseded(request_id: String) -> ApiError {
    ApiError::new(request_id, "conflict", "query superseded by a newer search")
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-request-id")])
        .expose_headers([
            header::CONTENT_DISPOSITION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn session_router(rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/postcodes", get(postcodes::current_postcodes))
        .route(
            "/api/v1/postcodes/search",
            post(postcodes::search_postcodes),
        )
        .route(
            "/api/v1/postcodes/export",
            get(postcodes::export_postcodes),
        )
        .route("/api/v1/cities", get(cities::current_cities))
        .route("/api/v1/cities/search", post(cities::search_cities))
        .route("/api/v1/cities/export", get(cities::export_cities))
        .route("/api/v1/reset", post(reset))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit,
            enforce_rate_limit,
        ))
}

pub fn build_app(state: AppState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(session_router(rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-store"),
                ))
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    Json(ApiResponse {
        data: HealthData {
            status: "ok",
            cities: state.cities.progress().await,
        },
        meta: ResponseMeta::new(req_id.0),
    })
}

/// Drops both sessions back to idle and invalidates in-flight searches.
async fn reset(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<ResetData>> {
    state.postcode_session.reset().await;
    state.city_session.reset().await;
    tracing::info!(request_id = %req_id.0, "sessions reset");
    Json(ApiResponse {
        data: ResetData {
            postcodes: QueryState::Idle,
            cities: QueryState::Idle,
        },
        meta: ResponseMeta::new(req_id.0),
    })
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
