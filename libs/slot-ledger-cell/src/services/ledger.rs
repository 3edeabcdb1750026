// libs/slot-ledger-cell/src/services/ledger.rs
use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{ReservationId, Slot, SlotKey, SlotLedgerError};

struct Reservation {
    id: ReservationId,
    holder_id: Uuid,
}

#[derive(Default)]
struct LedgerState {
    /// Reserved slots keyed by (provider, start). Absence means free.
    reserved: HashMap<SlotKey, Reservation>,
    /// Reverse index so release needs only the reservation handle.
    reservations: HashMap<ReservationId, SlotKey>,
}

/// Single source of truth for slot occupancy. Every check-and-set happens
/// inside one mutex critical section, so two callers racing for the same
/// slot can never both win.
pub struct SlotLedger {
    state: Mutex<LedgerState>,
}

impl SlotLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
        }
    }

    /// Atomically reserve a slot on behalf of `holder_id`. Fails with
    /// `SlotUnavailable` if any reservation already holds the
    /// (provider, start) key.
    pub async fn reserve(
        &self,
        slot: &Slot,
        holder_id: Uuid,
    ) -> Result<ReservationId, SlotLedgerError> {
        if slot.end_time <= slot.start_time {
            return Err(SlotLedgerError::InvalidSlot(format!(
                "end time {} is not after start time {}",
                slot.end_time, slot.start_time
            )));
        }

        let key = slot.key();
        let mut state = self.state.lock().await;

        if state.reserved.contains_key(&key) {
            debug!(
                "Reservation rejected for provider {} at {}: slot taken",
                key.provider_id, key.start_time
            );
            return Err(SlotLedgerError::SlotUnavailable {
                provider_id: key.provider_id,
                start_time: key.start_time,
            });
        }

        let reservation_id = ReservationId::new();
        state.reserved.insert(
            key,
            Reservation {
                id: reservation_id,
                holder_id,
            },
        );
        state.reservations.insert(reservation_id, key);

        debug!(
            "Reserved slot for provider {} at {} as {} (holder {})",
            key.provider_id, key.start_time, reservation_id, holder_id
        );
        Ok(reservation_id)
    }

    /// Release a reservation. Idempotent: releasing an unknown or already
    /// released handle is a no-op. Returns whether a slot was freed.
    pub async fn release(&self, reservation_id: ReservationId) -> bool {
        let mut state = self.state.lock().await;

        match state.reservations.remove(&reservation_id) {
            Some(key) => {
                state.reserved.remove(&key);
                debug!(
                    "Released slot for provider {} at {} ({})",
                    key.provider_id, key.start_time, reservation_id
                );
                true
            }
            None => {
                warn!("Release of unknown reservation {} ignored", reservation_id);
                false
            }
        }
    }

    /// Advisory only. A slot reported free can be taken by the time the
    /// caller acts on the answer; only `reserve` decides ownership.
    pub async fn is_free(&self, key: &SlotKey) -> bool {
        let state = self.state.lock().await;
        !state.reserved.contains_key(key)
    }

    /// Reservation currently holding a slot, if any.
    pub async fn holder(&self, key: &SlotKey) -> Option<(ReservationId, Uuid)> {
        let state = self.state.lock().await;
        state.reserved.get(key).map(|r| (r.id, r.holder_id))
    }
}

impl Default for SlotLedger {
    fn default() -> Self {
        Self::new()
    }
}
