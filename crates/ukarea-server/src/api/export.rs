use axum::{
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use ukarea_core::{export::file_name, CoreError, ExportFormat};

use super::ApiError;

#[derive(Debug, Deserialize)]
pub(super) struct ExportQuery {
    pub format: Option<String>,
}

/// Requested format; CSV when the query omits it.
pub(super) fn requested_format(
    request_id: &str,
    query: &ExportQuery,
) -> Result<ExportFormat, ApiError> {
    query
        .format
        .as_deref()
        .map_or(Ok(ExportFormat::default()), str::parse)
        .map_err(|e: CoreError| ApiError::new(request_id, "validation_error", e.to_string()))
}

/// Download response with a dated `uk_<subject>_YYYY-MM-DD.<ext>` file name.
pub(super) fn attachment(subject: &str, format: ExportFormat, body: String) -> Response {
    let name = file_name(subject, format, Utc::now().date_naive());
    (
        [
            (header::CONTENT_TYPE, format.mime_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{name}\""),
            ),
        ],
        body,
    )
        .into_response()
}
