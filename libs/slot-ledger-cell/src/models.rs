// libs/slot-ledger-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ===== SLOT MODELS =====

/// A concrete bookable window in a provider's calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub provider_id: Uuid,
    pub service_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl Slot {
    /// A provider can hold at most one appointment at a given start time,
    /// so (provider, start) identifies a slot.
    pub fn key(&self) -> SlotKey {
        SlotKey {
            provider_id: self.provider_id,
            start_time: self.start_time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub provider_id: Uuid,
    pub start_time: DateTime<Utc>,
}

/// Handle returned by a successful reservation. Releasing requires the
/// handle, so only the party that reserved a slot can free it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationId(pub Uuid);

impl ReservationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ReservationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReservationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ===== ERRORS =====

#[derive(Debug, thiserror::Error)]
pub enum SlotLedgerError {
    #[error("Slot is already reserved: provider {provider_id} at {start_time}")]
    SlotUnavailable {
        provider_id: Uuid,
        start_time: DateTime<Utc>,
    },

    #[error("Invalid slot: {0}")]
    InvalidSlot(String),
}
