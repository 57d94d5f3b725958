//! Request handlers for the metadata and data endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DataError, ExtractError, ParseError};
use crate::tile::DataService;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DataService>,

    /// Cache-Control max-age for data responses, in seconds
    pub cache_max_age: u32,
}

impl AppState {
    pub fn new(service: Arc<DataService>) -> Self {
        Self {
            service,
            cache_max_age: 3600,
        }
    }

    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }
}

// =============================================================================
// Request / Response Types
// =============================================================================

/// Query parameters for the metadata endpoint.
#[derive(Debug, Deserialize)]
pub struct MetadataQueryParams {
    /// Metadata type: `specimens` or `regions`
    #[serde(rename = "type")]
    pub kind: String,

    /// Specimen id, required when `type=regions`
    #[serde(default)]
    pub specimen: Option<String>,
}

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g. "not_found", "malformed_identifier")
    pub error: String,

    /// Human-readable error message
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// `GET /health`
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /metadata?type={specimens|regions}[&specimen={id}]`
pub async fn metadata_handler(
    State(state): State<AppState>,
    Query(params): Query<MetadataQueryParams>,
) -> Response {
    let snapshot = state.service.registry().snapshot();

    match params.kind.as_str() {
        "specimens" => Json(snapshot.listing()).into_response(),
        "regions" => {
            let Some(specimen) = params.specimen else {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse::new(
                        "missing_parameter",
                        "specimen query parameter is required for regions metadata",
                    )),
                )
                    .into_response();
            };
            match snapshot.hierarchy(&specimen) {
                Some(hierarchy) => Json(hierarchy.as_ref()).into_response(),
                None => (
                    StatusCode::NOT_FOUND,
                    Json(ErrorResponse::new(
                        "not_found",
                        format!("no region hierarchy for specimen {}", specimen),
                    )),
                )
                    .into_response(),
            }
        }
        other => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "unsupported_metadata_type",
                format!("unsupported metadata type '{}'", other),
            )),
        )
            .into_response(),
    }
}

/// `GET /data/{data_id}`
///
/// The raw path segment is passed unmodified into the identifier parser;
/// the engine's `(bytes, content-type)` result is relayed as the body.
pub async fn data_handler(
    State(state): State<AppState>,
    Path(data_id): Path<String>,
) -> Response {
    match state.service.get_data(&data_id).await {
        Ok(response) => {
            debug!(
                %data_id,
                bytes = response.bytes.len(),
                cache_hit = response.cache_hit,
                "served data"
            );
            (
                [
                    (header::CONTENT_TYPE, response.content_type),
                    (
                        header::CACHE_CONTROL,
                        format!("public, max-age={}", state.cache_max_age),
                    ),
                    (
                        header::HeaderName::from_static("x-cache"),
                        if response.cache_hit { "hit" } else { "miss" }.to_string(),
                    ),
                ],
                response.bytes,
            )
                .into_response()
        }
        Err(err) => error_to_response(&data_id, err),
    }
}

/// Map an engine error to the HTTP status contract:
/// malformed / missing-field / unsupported-combination are client errors
/// (400), unknown specimen and not-found-class results are 404, storage
/// failures and internal invariant violations are 500.
fn error_to_response(data_id: &str, err: DataError) -> Response {
    let (status, code) = match &err {
        DataError::Parse(parse) => match parse {
            ParseError::Malformed { .. } => (StatusCode::BAD_REQUEST, "malformed_identifier"),
            ParseError::MissingField { .. } => (StatusCode::BAD_REQUEST, "missing_field"),
            ParseError::UnknownSpecimen { .. } => (StatusCode::NOT_FOUND, "unknown_specimen"),
            ParseError::UnsupportedCombination { .. } => {
                (StatusCode::BAD_REQUEST, "unsupported_combination")
            }
        },
        DataError::Extract(extract) => match extract {
            ExtractError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            ExtractError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_failure"),
            ExtractError::Encode(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        },
    };

    // Storage failures were already logged at error severity by the service
    debug!(%data_id, %err, status = %status, "request failed");

    (status, Json(ErrorResponse::new(code, err.to_string()))).into_response()
}
