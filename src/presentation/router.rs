// Route table
use std::sync::Arc;

use axum::{
    routing::{get, patch, post, put},
    Router,
};
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use crate::presentation::app_state::AppState;
use crate::presentation::handlers::*;

pub fn build_router(state: Arc<AppState>) -> Router {
    // Downloads compress themselves and the feed must flush per line,
    // so only the JSON API goes through CompressionLayer.
    let api = Router::new()
        .route("/view", get(view_config))
        .route("/profile", get(get_profile).post(configure_profile))
        .route("/profile/points/:index", put(edit_profile_point))
        .route("/session", get(get_session))
        .route("/session/start", post(start_session))
        .route("/session/stop", post(stop_session))
        .route("/series", get(get_series))
        .route("/series/clear", post(clear_series))
        .route("/stats", get(get_stats))
        .route("/link", get(link_status))
        .route("/link/connect", post(connect_link))
        .route("/reports", get(list_reports).post(create_report))
        .route("/reports/:id", patch(rename_report).delete(delete_report))
        .layer(CompressionLayer::new());

    Router::new()
        .route("/healthz", get(health_check))
        .route("/feed", get(stream_feed))
        .route("/reports/:id/download", get(download_report))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
