// libs/series-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;

use crate::models::{
    CancelSeriesRequest, CreateSeriesRequest, EditSeriesRequest, SeriesError,
};
use crate::services::manager::SeriesManager;

fn map_series_error(e: SeriesError) -> AppError {
    match e {
        SeriesError::SlotUnavailable { index } => AppError::Conflict(format!(
            "Someone else just booked the slot for session {index}"
        )),
        SeriesError::InvalidSeriesEdit(msg) => AppError::BadRequest(msg),
        SeriesError::Validation(msg) => AppError::ValidationError(msg),
        SeriesError::SeriesNotFound(id) => AppError::NotFound(format!("Series {id} not found")),
        SeriesError::SessionNotFound {
            series_id,
            sequence_number,
        } => AppError::NotFound(format!(
            "Session {sequence_number} not found in series {series_id}"
        )),
        SeriesError::InvalidStatusTransition { from } => {
            AppError::Conflict(format!("Operation not allowed from status {from}"))
        }
        SeriesError::ProrationInput(msg) => AppError::Internal(msg),
    }
}

#[axum::debug_handler]
pub async fn create_series(
    State(manager): State<Arc<SeriesManager>>,
    Json(request): Json<CreateSeriesRequest>,
) -> Result<Json<Value>, AppError> {
    let series = manager
        .create_series(request)
        .await
        .map_err(map_series_error)?;

    Ok(Json(json!({
        "success": true,
        "series": series,
    })))
}

#[axum::debug_handler]
pub async fn get_series(
    State(manager): State<Arc<SeriesManager>>,
    Path(series_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let (series, sessions) = manager
        .get_series(series_id)
        .await
        .map_err(map_series_error)?;

    Ok(Json(json!({
        "success": true,
        "series": series,
        "sessions": sessions,
    })))
}

#[axum::debug_handler]
pub async fn edit_series(
    State(manager): State<Arc<SeriesManager>>,
    Path(series_id): Path<Uuid>,
    Json(request): Json<EditSeriesRequest>,
) -> Result<Json<Value>, AppError> {
    let outcome = manager
        .edit_series(series_id, request)
        .await
        .map_err(map_series_error)?;

    Ok(Json(json!({
        "success": true,
        "updated_sessions": outcome.updated_sessions,
        "excluded_sessions": outcome.excluded_sessions,
    })))
}

#[axum::debug_handler]
pub async fn cancel_series(
    State(manager): State<Arc<SeriesManager>>,
    Path(series_id): Path<Uuid>,
    Json(request): Json<CancelSeriesRequest>,
) -> Result<Json<Value>, AppError> {
    let result = manager
        .cancel_series(series_id, request.scope, Utc::now())
        .await
        .map_err(map_series_error)?;

    Ok(Json(json!({
        "success": true,
        "cancellation": result,
    })))
}

#[axum::debug_handler]
pub async fn pause_series(
    State(manager): State<Arc<SeriesManager>>,
    Path(series_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let series = manager
        .pause_series(series_id)
        .await
        .map_err(map_series_error)?;

    Ok(Json(json!({
        "success": true,
        "series": series,
    })))
}

#[axum::debug_handler]
pub async fn resume_series(
    State(manager): State<Arc<SeriesManager>>,
    Path(series_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let series = manager
        .resume_series(series_id)
        .await
        .map_err(map_series_error)?;

    Ok(Json(json!({
        "success": true,
        "series": series,
    })))
}

#[axum::debug_handler]
pub async fn complete_session(
    State(manager): State<Arc<SeriesManager>>,
    Path((series_id, sequence_number)): Path<(Uuid, u32)>,
) -> Result<Json<Value>, AppError> {
    let outcome = manager
        .complete_session(series_id, sequence_number)
        .await
        .map_err(map_series_error)?;

    Ok(Json(json!({
        "success": true,
        "session": outcome.session,
        "next_session": outcome.next_session,
        "next_slot_unavailable": outcome.next_slot_unavailable,
        "series_status": outcome.series_status,
    })))
}

#[axum::debug_handler]
pub async fn mark_no_show(
    State(manager): State<Arc<SeriesManager>>,
    Path((series_id, sequence_number)): Path<(Uuid, u32)>,
) -> Result<Json<Value>, AppError> {
    let outcome = manager
        .mark_no_show(series_id, sequence_number)
        .await
        .map_err(map_series_error)?;

    Ok(Json(json!({
        "success": true,
        "session": outcome.session,
        "next_session": outcome.next_session,
        "next_slot_unavailable": outcome.next_slot_unavailable,
        "series_status": outcome.series_status,
    })))
}
