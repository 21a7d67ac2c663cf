use crate::{
    error::Result,
    models::{donor::*, response::ApiResponse},
    state::AppState,
};
use axum::{extract::State, response::Json, routing::get, Router};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(list_donors).post(register_donor))
}

/// Register or update a donor
/// POST /api/donors
async fn register_donor(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterDonorPayload>,
) -> Result<Json<ApiResponse<Donor>>> {
    debug!("Registering donor: {}", payload.name);

    let donor = state.donor_service.register_or_update(payload).await?;

    Ok(Json(ApiResponse::success_with_message(
        donor,
        "Donor registered successfully".to_string(),
    )))
}

/// List all donors
/// GET /api/donors
async fn list_donors(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<Donor>>>> {
    let donors = state.donor_service.list().await?;
    Ok(Json(ApiResponse::success(donors)))
}
