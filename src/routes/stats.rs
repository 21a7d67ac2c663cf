use crate::{error::Result, models::response::ApiResponse, state::AppState};
use axum::{extract::State, response::Json, routing::get, Router};
use serde::Serialize;
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(get_stats))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub donors_count: usize,
    pub open_requests_count: usize,
}

/// Dashboard counters for the blood-bank back office
/// GET /api/stats
async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<ApiResponse<Stats>>> {
    let donors_count = state.donor_service.count().await?;
    let open_requests_count = state.request_service.count_open().await?;

    Ok(Json(ApiResponse::success(Stats {
        donors_count,
        open_requests_count,
    })))
}
