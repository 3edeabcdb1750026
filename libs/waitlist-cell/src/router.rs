// libs/waitlist-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::handlers;
use crate::services::offers::OfferCoordinator;

pub fn waitlist_routes(coordinator: Arc<OfferCoordinator>) -> Router {
    Router::new()
        .route("/", post(handlers::add_waitlist_entry).get(handlers::list_waitlist))
        .route("/{entry_id}", delete(handlers::remove_waitlist_entry))
        .route("/{entry_id}/offer", post(handlers::create_offer))
        .route("/{entry_id}/offers", get(handlers::get_offer_history))
        .route("/offers/{offer_id}", get(handlers::get_offer))
        .route("/offers/accept", post(handlers::accept_offer))
        .route("/offers/decline", post(handlers::decline_offer))
        .with_state(coordinator)
}
