// libs/series-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use slot_ledger_cell::{ReservationId, Slot};

// ==============================================================================
// CORE SERIES MODELS
// ==============================================================================

/// A planned sequence of treatments for one patient and service, either
/// open-ended (maintenance) or fixed-count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub service_id: Uuid,
    pub provider_id: Uuid,
    pub mode: SeriesMode,
    pub interval_days: i64,
    /// None for maintenance series (unbounded).
    pub total_sessions: Option<u32>,
    pub booking_mode: BookingMode,
    pub pricing_mode: PricingMode,
    /// Minor currency units. Required when pricing_mode is package.
    pub package_price: Option<i64>,
    pub session_duration_minutes: i64,
    pub status: SeriesStatus,
    pub sessions_booked: u32,
    pub sessions_completed: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeriesMode {
    Maintenance,
    Fixed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingMode {
    BookAll,
    BookAsYouGo,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PricingMode {
    PerSession,
    Package,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeriesStatus {
    Active,
    Paused,
    Cancelled,
    Completed,
}

impl fmt::Display for SeriesStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesStatus::Active => write!(f, "active"),
            SeriesStatus::Paused => write!(f, "paused"),
            SeriesStatus::Cancelled => write!(f, "cancelled"),
            SeriesStatus::Completed => write!(f, "completed"),
        }
    }
}

/// One instance within a Series, or a standalone appointment when
/// `series_id` is None. The owning Series is the only writer of
/// `sequence_number` ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub series_id: Option<Uuid>,
    pub patient_id: Uuid,
    pub sequence_number: u32,
    pub slot: Slot,
    /// Ledger handle while the slot is held. Cleared on release.
    pub reservation_id: Option<ReservationId>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Scheduled => write!(f, "scheduled"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Cancelled => write!(f, "cancelled"),
            SessionStatus::NoShow => write!(f, "no_show"),
        }
    }
}

// ==============================================================================
// REQUEST / RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSeriesRequest {
    pub patient_id: Uuid,
    pub service_id: Uuid,
    pub provider_id: Uuid,
    pub mode: SeriesMode,
    pub interval_days: i64,
    pub total_sessions: Option<u32>,
    pub booking_mode: BookingMode,
    pub pricing_mode: PricingMode,
    pub package_price: Option<i64>,
    pub first_session_start: DateTime<Utc>,
    pub session_duration_minutes: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EditScope {
    ThisOnly,
    ThisAndFuture,
    All,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditSeriesRequest {
    pub scope: EditScope,
    /// Anchor session. Required for this_only and this_and_future.
    pub sequence_number: Option<u32>,
    pub new_start_time: Option<DateTime<Utc>>,
    pub new_provider_id: Option<Uuid>,
    pub new_interval_days: Option<i64>,
    /// Required to edit `all` on a series with completed sessions.
    #[serde(default)]
    pub force: bool,
}

/// Tells the caller exactly which sessions moved and which were left
/// alone (completed or otherwise immutable).
#[derive(Debug, Clone, Serialize)]
pub struct EditOutcome {
    pub updated_sessions: Vec<u32>,
    pub excluded_sessions: Vec<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CancelScope {
    RemainingOnly,
    All,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelSeriesRequest {
    pub scope: CancelScope,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancellationResult {
    /// Minor units. Zero for per-session pricing.
    pub refund_amount: i64,
    /// Sequence numbers whose slots were released.
    pub released_sessions: Vec<u32>,
    /// No-show sessions at cancellation time. Not refunded and not
    /// counted as completed; surfaced so billing can review them.
    pub no_show_sessions: Vec<u32>,
    /// False when the payment gateway rejected the refund. The
    /// cancellation stands either way; the refund becomes a pending
    /// financial exception.
    pub refund_issued: bool,
    /// Slots freed by this cancellation, in sequence order.
    pub released_slots: Vec<Slot>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SeriesError {
    #[error("Slot unavailable at session index {index}")]
    SlotUnavailable { index: usize },

    #[error("Invalid series edit: {0}")]
    InvalidSeriesEdit(String),

    #[error("Proration input error: {0}")]
    ProrationInput(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Series not found: {0}")]
    SeriesNotFound(Uuid),

    #[error("Session {sequence_number} not found in series {series_id}")]
    SessionNotFound {
        series_id: Uuid,
        sequence_number: u32,
    },

    #[error("Invalid status transition from {from}")]
    InvalidStatusTransition { from: String },
}
