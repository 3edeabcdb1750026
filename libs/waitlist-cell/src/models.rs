// libs/waitlist-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use slot_ledger_cell::Slot;

// ==============================================================================
// WAITLIST MODELS
// ==============================================================================

/// When a patient is willing to come in. Empty fields mean "any".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaitlistPreferences {
    #[serde(default)]
    pub preferred_days: Vec<Weekday>,
    pub earliest_time: Option<NaiveTime>,
    pub latest_time: Option<NaiveTime>,
}

impl WaitlistPreferences {
    pub fn matches(&self, slot: &Slot) -> bool {
        if !self.preferred_days.is_empty()
            && !self.preferred_days.contains(&slot.start_time.weekday())
        {
            return false;
        }
        let time = slot.start_time.time();
        if let Some(earliest) = self.earliest_time {
            if time < earliest {
                return false;
            }
        }
        if let Some(latest) = self.latest_time {
            if time > latest {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub service_id: Uuid,
    pub priority: WaitlistPriority,
    pub preferences: WaitlistPreferences,
    pub status: WaitlistStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Matching precedence. Higher weight is offered first; entries of the
/// same weight keep FIFO order by creation time.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WaitlistPriority {
    #[default]
    Normal,
    High,
    Urgent,
}

impl WaitlistPriority {
    pub fn weight(&self) -> u32 {
        match self {
            WaitlistPriority::Urgent => 100,
            WaitlistPriority::High => 50,
            WaitlistPriority::Normal => 10,
        }
    }
}

impl fmt::Display for WaitlistPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitlistPriority::Normal => write!(f, "normal"),
            WaitlistPriority::High => write!(f, "high"),
            WaitlistPriority::Urgent => write!(f, "urgent"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WaitlistStatus {
    Waiting,
    Offered,
    Booked,
    Removed,
}

impl fmt::Display for WaitlistStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitlistStatus::Waiting => write!(f, "waiting"),
            WaitlistStatus::Offered => write!(f, "offered"),
            WaitlistStatus::Booked => write!(f, "booked"),
            WaitlistStatus::Removed => write!(f, "removed"),
        }
    }
}

// ==============================================================================
// OFFER MODELS
// ==============================================================================

/// A time-boxed, single-use grant of a freed slot to one waitlisted
/// patient. Once it leaves `pending` it never changes again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: Uuid,
    pub waitlist_entry_id: Uuid,
    pub patient_id: Uuid,
    pub slot: Slot,
    /// Opaque bearer credential; whoever holds it can consume the offer.
    pub token: String,
    pub state: OfferState,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OfferState {
    Pending,
    Accepted,
    Declined,
    Expired,
    Superseded,
}

impl OfferState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OfferState::Pending)
    }
}

impl fmt::Display for OfferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfferState::Pending => write!(f, "pending"),
            OfferState::Accepted => write!(f, "accepted"),
            OfferState::Declined => write!(f, "declined"),
            OfferState::Expired => write!(f, "expired"),
            OfferState::Superseded => write!(f, "superseded"),
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct AddWaitlistRequest {
    pub patient_id: Uuid,
    pub service_id: Uuid,
    #[serde(default)]
    pub priority: WaitlistPriority,
    #[serde(default)]
    pub preferences: WaitlistPreferences,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOfferRequest {
    pub slot: Slot,
    /// Overrides the configured default countdown.
    pub ttl_minutes: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolveOfferRequest {
    pub token: String,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OfferError {
    #[error("A pending offer already exists for this slot")]
    DuplicateOffer,

    #[error("Offer is no longer available")]
    AlreadyResolved,

    #[error("Offer has expired")]
    Expired,

    #[error("Offer was superseded: the slot was booked through another path")]
    Superseded,

    #[error("Offer not found")]
    OfferNotFound,

    #[error("Waitlist entry not found: {0}")]
    EntryNotFound(Uuid),

    #[error("Waitlist entry {0} is not waiting")]
    EntryNotWaiting(Uuid),

    #[error("Slot is not free")]
    SlotOccupied,

    #[error("Validation error: {0}")]
    Validation(String),
}
