// libs/series-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::services::manager::SeriesManager;

pub fn series_routes(manager: Arc<SeriesManager>) -> Router {
    Router::new()
        .route("/", post(handlers::create_series))
        .route("/{series_id}", get(handlers::get_series))
        .route("/{series_id}/edit", post(handlers::edit_series))
        .route("/{series_id}/cancel", post(handlers::cancel_series))
        .route("/{series_id}/pause", post(handlers::pause_series))
        .route("/{series_id}/resume", post(handlers::resume_series))
        .route(
            "/{series_id}/sessions/{sequence_number}/complete",
            post(handlers::complete_session),
        )
        .route(
            "/{series_id}/sessions/{sequence_number}/no-show",
            post(handlers::mark_no_show),
        )
        .with_state(manager)
}
