//! HTTP handlers and wire DTOs for the Plinko PIR server.
//!
//! Indices are typed `i64` on the wire (not `u64`) so a negative index
//! fails JSON *validation* with a normal `BadRequest`, rather than failing
//! JSON *parsing* with axum's generic rejection body.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use plinko::engine::{QueryEngine, QueryError};
use plinko::prf::PrfKey128;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<QueryEngine>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("internal server error")]
    Internal,
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            // A PRSet-expanded index out of bounds is a server-side
            // parameter bug, not a caller mistake (spec §4.E, §7): it must
            // not be surfaced to the client, only logged.
            QueryError::Internal { .. } => {
                // Do not log `index`: it is derived from the caller's PRF
                // key and the hard no-index-in-logs rule applies here too.
                tracing::error!("full-set expansion produced an out-of-bounds index");
                ApiError::Internal
            }
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database_loaded: bool,
    pub database_size: u64,
    pub chunk_size: u64,
    pub set_size: u64,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.engine.health();
    Json(HealthResponse {
        status: status.status,
        database_loaded: status.database_loaded,
        database_size: status.database_size,
        chunk_size: status.chunk_size,
        set_size: status.set_size,
    })
}

#[derive(Debug, Deserialize)]
pub struct PlaintextQueryRequest {
    pub index: i64,
}

#[derive(Debug, Serialize)]
pub struct PlaintextQueryResponse {
    pub value: u64,
    pub server_time_nanos: u128,
}

pub async fn plaintext_query(
    State(state): State<AppState>,
    Json(req): Json<PlaintextQueryRequest>,
) -> Result<Json<PlaintextQueryResponse>, ApiError> {
    let (value, elapsed) = state.engine.plaintext(req.index)?;
    Ok(Json(PlaintextQueryResponse {
        value,
        server_time_nanos: elapsed.as_nanos(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct SetParityQueryRequest {
    pub indices: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct SetParityQueryResponse {
    pub parity: u64,
    pub server_time_nanos: u128,
}

pub async fn set_parity_query(
    State(state): State<AppState>,
    Json(req): Json<SetParityQueryRequest>,
) -> Result<Json<SetParityQueryResponse>, ApiError> {
    let (parity, elapsed) = state.engine.set_parity(&req.indices)?;
    Ok(Json(SetParityQueryResponse {
        parity,
        server_time_nanos: elapsed.as_nanos(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct FullSetQueryRequest {
    pub prf_key: String,
}

#[derive(Debug, Serialize)]
pub struct FullSetQueryResponse {
    pub value: u64,
    pub server_time_nanos: u128,
}

/// `prf_key` must be exactly 32 lowercase hex characters (spec §7): reject
/// uppercase/mixed-case input explicitly rather than relying on `hex::decode`,
/// which accepts both cases.
fn validate_prf_key_hex(s: &str) -> Result<(), ApiError> {
    if s.len() != 32 || !s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
        return Err(ApiError::BadRequest(
            "prf_key must be a 32-character lowercase hex string".to_string(),
        ));
    }
    Ok(())
}

pub async fn full_set_query(
    State(state): State<AppState>,
    Json(req): Json<FullSetQueryRequest>,
) -> Result<Json<FullSetQueryResponse>, ApiError> {
    validate_prf_key_hex(&req.prf_key)?;
    let key_bytes = hex::decode(&req.prf_key)
        .map_err(|_| ApiError::BadRequest("invalid hex string for prf_key".to_string()))?;
    let key = PrfKey128::from_slice(&key_bytes).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "PRF key must be 16 bytes, got {}",
            key_bytes.len()
        ))
    })?;

    let (value, elapsed) = state.engine.full_set(&key)?;
    Ok(Json(FullSetQueryResponse {
        value,
        server_time_nanos: elapsed.as_nanos(),
    }))
}
