pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

use std::sync::Arc;

use axum::{
    http::{HeaderValue, Method},
    routing::{get, Router},
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// 组装完整的应用路由，测试和 main 共用
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(
            app_state
                .config
                .cors_allowed_origins
                .split(',')
                .filter_map(|origin| origin.trim().parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        );

    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .nest("/api/donors", routes::donors::router())
        .nest("/api/requests", routes::requests::router())
        .nest("/api/messages", routes::messages::router())
        .nest("/api/stats", routes::stats::router())
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn health_check() -> &'static str {
    "LifeLink is running!"
}
