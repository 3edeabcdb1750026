use std::sync::Arc;

use axum::{routing::get, Router};

use series_cell::router::series_routes;
use series_cell::SeriesManager;
use waitlist_cell::router::waitlist_routes;
use waitlist_cell::OfferCoordinator;

pub fn create_router(
    manager: Arc<SeriesManager>,
    coordinator: Arc<OfferCoordinator>,
) -> Router {
    Router::new()
        .route("/", get(|| async { "Booking API is running!" }))
        .nest("/series", series_routes(manager))
        .nest("/waitlist", waitlist_routes(coordinator))
}
