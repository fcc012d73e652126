use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    response::Response,
    Extension, Json,
};
use serde::Deserialize;
use ukarea_core::{export, Shape};
use ukarea_lookup::{LookupError, PostcodeSearch, QueryState, QueryTicket, FETCH_FAILED_MESSAGE};

use crate::middleware::RequestId;

use super::export::{attachment, requested_format, ExportQuery};
use super::{json_body, superseded, validate_shape, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct PostcodeSearchRequest {
    shape: Shape,
}

/// Runs a postcode search for one shape and makes it the current result.
///
/// Starting a search supersedes any search still running; the older one
/// answers `409 conflict` and never touches the session. The search runs on
/// its own task, so a client that disconnects mid-search still leaves the
/// session settled.
pub(super) async fn search_postcodes(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    payload: Result<Json<PostcodeSearchRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<QueryState<PostcodeSearch>>>, ApiError> {
    let request = json_body(&req_id.0, payload)?;
    validate_shape(&req_id.0, &request.shape)?;

    let ticket = state.postcode_session.begin().await;
    tracing::info!(
        request_id = %req_id.0,
        generation = ticket.generation(),
        "postcode search started"
    );

    let session = Arc::clone(&state.postcode_session);
    let task = tokio::spawn(run_search(
        state,
        request.shape,
        ticket.clone(),
        req_id.0.clone(),
    ));

    let outcome = match task.await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(request_id = %req_id.0, error = %e, "postcode search task failed");
            session.fail(&ticket, FETCH_FAILED_MESSAGE).await;
            return Err(ApiError::new(req_id.0, "internal_error", FETCH_FAILED_MESSAGE));
        }
    };

    match outcome {
        Ok(data) => Ok(Json(ApiResponse {
            data,
            meta: ResponseMeta::new(req_id.0),
        })),
        Err(LookupError::Superseded) => Err(superseded(req_id.0)),
        Err(e) => {
            let code = if e.is_upstream() {
                "upstream_error"
            } else {
                "internal_error"
            };
            Err(ApiError::new(req_id.0, code, FETCH_FAILED_MESSAGE))
        }
    }
}

/// Runs the pipeline and settles `ticket` with whatever it produced.
///
/// Returns the state that was stored, or `Superseded` when a newer search
/// owned the session by the time this one finished, whether it succeeded or
/// failed.
async fn run_search(
    state: AppState,
    shape: Shape,
    ticket: QueryTicket,
    request_id: String,
) -> Result<QueryState<PostcodeSearch>, LookupError> {
    let session = &state.postcode_session;
    let outcome = ukarea_lookup::search_postcodes(
        state.lookup.as_ref(),
        &shape,
        &state.search_options,
        Some(&ticket),
    )
    .await;

    let stored = match outcome {
        Ok(search) if search.is_empty() => session
            .complete_empty(&ticket)
            .await
            .then_some(QueryState::Empty),
        Ok(search) => session
            .complete(&ticket, search.clone())
            .await
            .then_some(QueryState::Ready(search)),
        Err(LookupError::Superseded) => None,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "postcode search failed");
            if session.fail(&ticket, FETCH_FAILED_MESSAGE).await {
                return Err(e);
            }
            None
        }
    };
    stored.ok_or(LookupError::Superseded)
}

pub(super) async fn current_postcodes(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<QueryState<PostcodeSearch>>> {
    Json(ApiResponse {
        data: state.postcode_session.snapshot().await,
        meta: ResponseMeta::new(req_id.0),
    })
}

pub(super) async fn export_postcodes(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let format = requested_format(&req_id.0, &query)?;
    let search = state
        .postcode_session
        .current()
        .await
        .ok_or_else(|| ApiError::new(req_id.0.clone(), "not_found", "no postcodes to export"))?;

    let body = export::render_postcodes(format, &search.outward_codes);
    Ok(attachment("postcodes", format, body))
}
