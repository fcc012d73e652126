use axum::{
    extract::{rejection::JsonRejection, Query, State},
    response::Response,
    Extension, Json,
};
use serde::Deserialize;
use ukarea_core::{export, CityRecord, ContainmentMode, Shape};
use ukarea_lookup::{filter_cities, QueryState};

use crate::directory::ResolutionState;
use crate::middleware::RequestId;

use super::export::{attachment, requested_format, ExportQuery};
use super::{json_body, superseded, validate_shape, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct CitySearchRequest {
    shapes: Vec<Shape>,
    #[serde(default)]
    min_population: u64,
    /// Overrides the server's configured containment mode.
    #[serde(default)]
    mode: Option<ContainmentMode>,
}

/// Filters the resolved city list by the union of the drawn shapes.
pub(super) async fn search_cities(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    payload: Result<Json<CitySearchRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<QueryState<Vec<CityRecord>>>>, ApiError> {
    let request = json_body(&req_id.0, payload)?;
    for shape in &request.shapes {
        validate_shape(&req_id.0, shape)?;
    }

    let session = &state.city_session;
    let ticket = session.begin().await;

    let progress = state.cities.progress().await;
    if progress.state == ResolutionState::Pending {
        tracing::warn!(
            total = progress.total,
            resolved = progress.resolved,
            "city search before resolution finished; using cities resolved so far"
        );
    }

    let cities = state.cities.snapshot().await;
    let mode = request.mode.unwrap_or(state.containment_mode);
    let matched = filter_cities(&cities, &request.shapes, request.min_population, mode);
    tracing::info!(
        request_id = %req_id.0,
        shapes = request.shapes.len(),
        min_population = request.min_population,
        matched = matched.len(),
        "city search complete"
    );

    let stored = if matched.is_empty() {
        session
            .complete_empty(&ticket)
            .await
            .then_some(QueryState::Empty)
    } else {
        session
            .complete(&ticket, matched.clone())
            .await
            .then_some(QueryState::Ready(matched))
    };

    let data = stored.ok_or_else(|| superseded(req_id.0.clone()))?;
    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn current_cities(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<QueryState<Vec<CityRecord>>>> {
    Json(ApiResponse {
        data: state.city_session.snapshot().await,
        meta: ResponseMeta::new(req_id.0),
    })
}

pub(super) async fn export_cities(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let format = requested_format(&req_id.0, &query)?;
    let cities = state
        .city_session
        .current()
        .await
        .ok_or_else(|| ApiError::new(req_id.0.clone(), "not_found", "no cities to export"))?;

    let body = export::render_cities(format, &cities);
    Ok(attachment("cities", format, body))
}
