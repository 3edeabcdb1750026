// libs/waitlist-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;

use crate::models::{
    AddWaitlistRequest, CreateOfferRequest, OfferError, ResolveOfferRequest, WaitlistStatus,
};
use crate::services::offers::OfferCoordinator;

fn map_offer_error(e: OfferError) -> AppError {
    match e {
        OfferError::DuplicateOffer => {
            AppError::Conflict("A pending offer already exists for this slot".to_string())
        }
        // Another actor won the race; normal outcome under demand.
        OfferError::AlreadyResolved => {
            AppError::Conflict("This offer is no longer available".to_string())
        }
        OfferError::Expired => AppError::Gone("This offer has expired".to_string()),
        OfferError::Superseded => {
            AppError::Conflict("Someone else just booked this slot".to_string())
        }
        OfferError::OfferNotFound => AppError::NotFound("Offer not found".to_string()),
        OfferError::EntryNotFound(id) => {
            AppError::NotFound(format!("Waitlist entry {id} not found"))
        }
        OfferError::EntryNotWaiting(id) => {
            AppError::Conflict(format!("Waitlist entry {id} is not waiting"))
        }
        OfferError::SlotOccupied => AppError::Conflict("Slot is not free".to_string()),
        OfferError::Validation(msg) => AppError::ValidationError(msg),
    }
}

#[axum::debug_handler]
pub async fn add_waitlist_entry(
    State(coordinator): State<Arc<OfferCoordinator>>,
    Json(request): Json<AddWaitlistRequest>,
) -> Result<Json<Value>, AppError> {
    let entry = coordinator.add_entry(request).await;

    Ok(Json(json!({
        "success": true,
        "entry": entry,
    })))
}

#[derive(Debug, Deserialize)]
pub struct WaitlistQueryParams {
    pub status: Option<WaitlistStatus>,
}

#[axum::debug_handler]
pub async fn list_waitlist(
    State(coordinator): State<Arc<OfferCoordinator>>,
    Query(params): Query<WaitlistQueryParams>,
) -> Result<Json<Value>, AppError> {
    let entries = coordinator.list_entries(params.status).await;
    let count = entries.len();

    Ok(Json(json!({
        "success": true,
        "entries": entries,
        "count": count,
    })))
}

#[axum::debug_handler]
pub async fn remove_waitlist_entry(
    State(coordinator): State<Arc<OfferCoordinator>>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let entry = coordinator
        .remove_entry(entry_id)
        .await
        .map_err(map_offer_error)?;

    Ok(Json(json!({
        "success": true,
        "entry": entry,
    })))
}

#[axum::debug_handler]
pub async fn get_offer_history(
    State(coordinator): State<Arc<OfferCoordinator>>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let offers = coordinator
        .offer_history(entry_id)
        .await
        .map_err(map_offer_error)?;

    Ok(Json(json!({
        "success": true,
        "offers": offers,
    })))
}

#[axum::debug_handler]
pub async fn create_offer(
    State(coordinator): State<Arc<OfferCoordinator>>,
    Path(entry_id): Path<Uuid>,
    Json(request): Json<CreateOfferRequest>,
) -> Result<Json<Value>, AppError> {
    let offer = coordinator
        .create_offer(entry_id, request.slot, request.ttl_minutes, Utc::now())
        .await
        .map_err(map_offer_error)?;

    Ok(Json(json!({
        "success": true,
        "offer": offer,
    })))
}

#[axum::debug_handler]
pub async fn get_offer(
    State(coordinator): State<Arc<OfferCoordinator>>,
    Path(offer_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let offer = coordinator
        .get_offer(offer_id, Utc::now())
        .await
        .map_err(map_offer_error)?;

    Ok(Json(json!({
        "success": true,
        "offer": offer,
    })))
}

#[axum::debug_handler]
pub async fn accept_offer(
    State(coordinator): State<Arc<OfferCoordinator>>,
    Json(request): Json<ResolveOfferRequest>,
) -> Result<Json<Value>, AppError> {
    let session = coordinator
        .accept(&request.token, Utc::now())
        .await
        .map_err(map_offer_error)?;

    Ok(Json(json!({
        "success": true,
        "session": session,
        "message": "Your appointment is booked",
    })))
}

#[axum::debug_handler]
pub async fn decline_offer(
    State(coordinator): State<Arc<OfferCoordinator>>,
    Json(request): Json<ResolveOfferRequest>,
) -> Result<Json<Value>, AppError> {
    let offer = coordinator
        .decline(&request.token, Utc::now())
        .await
        .map_err(map_offer_error)?;

    Ok(Json(json!({
        "success": true,
        "offer": offer,
        "message": "Offer declined, you stay on the waitlist",
    })))
}
