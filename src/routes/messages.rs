use crate::{
    error::Result,
    models::{message::Message, response::ApiResponse},
    state::AppState,
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/:receiver_id", get(list_messages))
}

/// In-app message feed for one receiver (the requester's email)
/// GET /api/messages/:receiver_id
async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(receiver_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<Message>>>> {
    let messages = state.message_service.list_for_receiver(&receiver_id).await?;
    Ok(Json(ApiResponse::success(messages)))
}
