use crate::{
    error::Result,
    models::{request::*, response::ApiResponse},
    state::AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, patch, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct ListRequestsQuery {
    pub pending: Option<bool>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_requests).post(submit_request))
        .route("/:id", get(get_request))
        .route("/:id/resolve", patch(resolve_request))
        .route("/:id/reveal-code", post(reveal_code))
}

/// Submit a blood request and notify compatible donors
/// POST /api/requests
async fn submit_request(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SubmitRequestPayload>,
) -> Result<Json<ApiResponse<SubmitOutcome>>> {
    debug!(
        "Submitting blood request for group: {}",
        payload.blood_group
    );

    let outcome = state.request_service.submit(payload).await?;

    Ok(Json(ApiResponse::success_with_message(
        outcome,
        "Blood request submitted successfully".to_string(),
    )))
}

/// List blood requests, optionally only the pending ones
/// GET /api/requests?pending=true
async fn list_requests(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListRequestsQuery>,
) -> Result<Json<ApiResponse<Vec<BloodRequest>>>> {
    let requests = state
        .request_service
        .list(query.pending.unwrap_or(false))
        .await?;
    Ok(Json(ApiResponse::success(requests)))
}

/// Fetch one blood request (used by the client poller)
/// GET /api/requests/:id
async fn get_request(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
) -> Result<Json<ApiResponse<BloodRequest>>> {
    let request = state.request_service.get(&request_id).await?;
    Ok(Json(ApiResponse::success(request)))
}

/// Mark a request as accepted via management code or matching contact
/// PATCH /api/requests/:id/resolve
async fn resolve_request(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
    Json(payload): Json<ResolveRequestPayload>,
) -> Result<Json<ApiResponse<BloodRequest>>> {
    debug!("Resolving blood request: {}", request_id);

    let request = state.request_service.resolve(&request_id, payload).await?;

    Ok(Json(ApiResponse::success_with_message(
        request,
        "Blood request resolved".to_string(),
    )))
}

/// Return the management code to the original requester
/// POST /api/requests/:id/reveal-code
async fn reveal_code(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
    Json(payload): Json<RevealCodePayload>,
) -> Result<Json<ApiResponse<Value>>> {
    let code = state
        .request_service
        .reveal_code(&request_id, payload)
        .await?;

    Ok(Json(ApiResponse::success(json!({ "manageCode": code }))))
}
