// libs/waitlist-cell/src/services/offers.rs
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use series_cell::{Session, SessionStore};
use shared_gateways::{BookingEvent, Notifier};
use slot_ledger_cell::{Slot, SlotKey, SlotLedger};

use crate::models::{
    AddWaitlistRequest, Offer, OfferError, OfferState, WaitlistEntry, WaitlistStatus,
};

#[derive(Default)]
struct CoordinatorState {
    entries: HashMap<Uuid, WaitlistEntry>,
    offers: HashMap<Uuid, Offer>,
    tokens: HashMap<String, Uuid>,
    /// At most one pending offer per slot; this index enforces it.
    pending_by_slot: HashMap<SlotKey, Uuid>,
}

/// Owns the waitlist-offer state machine. Every state transition runs
/// inside one mutex critical section; the ledger reservation on accept
/// happens strictly after the offer has been won, so a slow reserve can
/// never let two callers both consume the same offer.
pub struct OfferCoordinator {
    state: Mutex<CoordinatorState>,
    ledger: Arc<SlotLedger>,
    sessions: Arc<SessionStore>,
    notifier: Arc<dyn Notifier>,
    default_ttl: Duration,
}

impl OfferCoordinator {
    pub fn new(
        ledger: Arc<SlotLedger>,
        sessions: Arc<SessionStore>,
        notifier: Arc<dyn Notifier>,
        default_ttl_minutes: i64,
    ) -> Self {
        Self {
            state: Mutex::new(CoordinatorState::default()),
            ledger,
            sessions,
            notifier,
            default_ttl: Duration::minutes(default_ttl_minutes),
        }
    }

    // ===== WAITLIST ENTRIES =====

    pub async fn add_entry(&self, request: AddWaitlistRequest) -> WaitlistEntry {
        let now = Utc::now();
        let entry = WaitlistEntry {
            id: Uuid::new_v4(),
            patient_id: request.patient_id,
            service_id: request.service_id,
            priority: request.priority,
            preferences: request.preferences,
            status: WaitlistStatus::Waiting,
            created_at: now,
            updated_at: now,
        };
        let mut state = self.state.lock().await;
        state.entries.insert(entry.id, entry.clone());
        info!("Added waitlist entry {} for patient {}", entry.id, entry.patient_id);
        entry
    }

    pub async fn list_entries(&self, status: Option<WaitlistStatus>) -> Vec<WaitlistEntry> {
        let state = self.state.lock().await;
        let mut entries: Vec<WaitlistEntry> = state
            .entries
            .values()
            .filter(|e| status.map_or(true, |s| e.status == s))
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.created_at);
        entries
    }

    /// Every offer ever made to an entry, oldest first. Terminal offers
    /// are retained append-only, so this is a full audit trail.
    pub async fn offer_history(&self, entry_id: Uuid) -> Result<Vec<Offer>, OfferError> {
        let state = self.state.lock().await;
        if !state.entries.contains_key(&entry_id) {
            return Err(OfferError::EntryNotFound(entry_id));
        }
        let mut offers: Vec<Offer> = state
            .offers
            .values()
            .filter(|o| o.waitlist_entry_id == entry_id)
            .cloned()
            .collect();
        offers.sort_by_key(|o| o.created_at);
        Ok(offers)
    }

    pub async fn remove_entry(&self, entry_id: Uuid) -> Result<WaitlistEntry, OfferError> {
        let mut state = self.state.lock().await;
        let entry = state
            .entries
            .get_mut(&entry_id)
            .ok_or(OfferError::EntryNotFound(entry_id))?;
        if entry.status == WaitlistStatus::Booked {
            return Err(OfferError::Validation(
                "a booked entry cannot be removed from the waitlist".to_string(),
            ));
        }
        entry.status = WaitlistStatus::Removed;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    /// Best waiting entry whose service and preferences fit the slot.
    /// Highest priority weight wins; ties fall back to FIFO order.
    pub async fn find_match(&self, slot: &Slot) -> Option<WaitlistEntry> {
        let state = self.state.lock().await;
        let mut candidates: Vec<&WaitlistEntry> = state
            .entries
            .values()
            .filter(|e| {
                e.status == WaitlistStatus::Waiting
                    && e.service_id == slot.service_id
                    && e.preferences.matches(slot)
            })
            .collect();
        candidates.sort_by_key(|e| (Reverse(e.priority.weight()), e.created_at));
        candidates.first().map(|e| (*e).clone())
    }

    // ===== OFFER LIFECYCLE =====

    /// Creates a pending offer for a freed slot. At most one pending
    /// offer may exist per slot; a second attempt gets `DuplicateOffer`.
    pub async fn create_offer(
        &self,
        entry_id: Uuid,
        slot: Slot,
        ttl_minutes: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Offer, OfferError> {
        if let Some(ttl) = ttl_minutes {
            if ttl < 1 {
                return Err(OfferError::Validation(format!(
                    "ttl_minutes must be at least 1, got {ttl}"
                )));
            }
        }
        // Advisory pre-check. The authoritative check is the reserve at
        // accept time; this just avoids offering a slot known to be taken.
        if !self.ledger.is_free(&slot.key()).await {
            return Err(OfferError::SlotOccupied);
        }

        let ttl = ttl_minutes.map(Duration::minutes).unwrap_or(self.default_ttl);
        let offer = {
            let mut state = self.state.lock().await;

            if state.pending_by_slot.contains_key(&slot.key()) {
                return Err(OfferError::DuplicateOffer);
            }
            let entry = state
                .entries
                .get_mut(&entry_id)
                .ok_or(OfferError::EntryNotFound(entry_id))?;
            if entry.status != WaitlistStatus::Waiting {
                return Err(OfferError::EntryNotWaiting(entry_id));
            }
            entry.status = WaitlistStatus::Offered;
            entry.updated_at = now;
            let patient_id = entry.patient_id;

            let offer = Offer {
                id: Uuid::new_v4(),
                waitlist_entry_id: entry_id,
                patient_id,
                slot,
                token: generate_offer_token(),
                state: OfferState::Pending,
                created_at: now,
                expires_at: now + ttl,
                resolved_at: None,
            };
            state.tokens.insert(offer.token.clone(), offer.id);
            state.pending_by_slot.insert(offer.slot.key(), offer.id);
            state.offers.insert(offer.id, offer.clone());
            offer
        };

        info!(
            "Created offer {} for entry {} expiring at {}",
            offer.id, entry_id, offer.expires_at
        );
        self.emit(BookingEvent::OfferCreated {
            offer_id: offer.id,
            patient_id: offer.patient_id,
            token: offer.token.clone(),
            provider_id: offer.slot.provider_id,
            start_time: offer.slot.start_time,
            expires_at: offer.expires_at,
        })
        .await;

        Ok(offer)
    }

    /// Convenience path for slots freed by cancellations: match the
    /// waitlist and offer the slot to the first fitting entry.
    pub async fn offer_released_slot(
        &self,
        slot: Slot,
        now: DateTime<Utc>,
    ) -> Result<Option<Offer>, OfferError> {
        match self.find_match(&slot).await {
            Some(entry) => {
                let offer = self.create_offer(entry.id, slot, None, now).await?;
                Ok(Some(offer))
            }
            None => {
                debug!(
                    "No waitlist match for freed slot at {} with provider {}",
                    slot.start_time, slot.provider_id
                );
                Ok(None)
            }
        }
    }

    /// Read an offer, applying read-time expiry so a caller never sees
    /// `pending` on an offer whose countdown has already run out.
    pub async fn get_offer(&self, offer_id: Uuid, now: DateTime<Utc>) -> Result<Offer, OfferError> {
        let expired = {
            let mut state = self.state.lock().await;
            let offer = state
                .offers
                .get(&offer_id)
                .cloned()
                .ok_or(OfferError::OfferNotFound)?;
            if offer.state == OfferState::Pending && offer.expires_at <= now {
                Self::expire_locked(&mut state, offer_id, now)
            } else {
                return Ok(offer);
            }
        };
        if let Some(event) = expired {
            self.emit(event).await;
        }
        let state = self.state.lock().await;
        state
            .offers
            .get(&offer_id)
            .cloned()
            .ok_or(OfferError::OfferNotFound)
    }

    /// The exactly-once path. The pending check, expiry check and
    /// transition to `accepted` form one critical section; of N racing
    /// callers exactly one gets past it. The ledger reserve then runs
    /// outside the lock, and a reserve failure rewrites the offer to
    /// `superseded` rather than leaving an accepted offer with no
    /// reservation behind it.
    pub async fn accept(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Session, OfferError> {
        let (offer_id, entry_id, patient_id, slot) = {
            let mut state = self.state.lock().await;
            let offer_id = *state.tokens.get(token).ok_or(OfferError::OfferNotFound)?;
            let offer = state
                .offers
                .get(&offer_id)
                .ok_or(OfferError::OfferNotFound)?;

            match offer.state {
                OfferState::Pending => {}
                _ => return Err(OfferError::AlreadyResolved),
            }
            if offer.expires_at <= now {
                let event = Self::expire_locked(&mut state, offer_id, now);
                drop(state);
                if let Some(event) = event {
                    self.emit(event).await;
                }
                return Err(OfferError::Expired);
            }

            let offer = state
                .offers
                .get_mut(&offer_id)
                .ok_or(OfferError::OfferNotFound)?;
            offer.state = OfferState::Accepted;
            offer.resolved_at = Some(now);
            let key = offer.slot.key();
            let result = (
                offer_id,
                offer.waitlist_entry_id,
                offer.patient_id,
                offer.slot.clone(),
            );
            state.pending_by_slot.remove(&key);
            result
        };

        // Lock dropped: confirm ownership with the ledger.
        match self.ledger.reserve(&slot, patient_id).await {
            Ok(reservation_id) => {
                let session = self
                    .sessions
                    .create_standalone(patient_id, slot.clone(), reservation_id)
                    .await;
                {
                    let mut state = self.state.lock().await;
                    if let Some(entry) = state.entries.get_mut(&entry_id) {
                        entry.status = WaitlistStatus::Booked;
                        entry.updated_at = now;
                    }
                }
                info!(
                    "Offer {} accepted by patient {}: session {} scheduled",
                    offer_id, patient_id, session.id
                );
                self.emit(BookingEvent::OfferAccepted {
                    offer_id,
                    patient_id,
                    start_time: slot.start_time,
                })
                .await;
                Ok(session)
            }
            Err(_) => {
                // The slot was booked through another path while the
                // offer was pending. The offer cannot stand.
                warn!(
                    "Offer {} superseded: slot at {} taken through another path",
                    offer_id, slot.start_time
                );
                let mut state = self.state.lock().await;
                if let Some(offer) = state.offers.get_mut(&offer_id) {
                    offer.state = OfferState::Superseded;
                    offer.resolved_at = Some(now);
                }
                if let Some(entry) = state.entries.get_mut(&entry_id) {
                    entry.status = WaitlistStatus::Waiting;
                    entry.updated_at = now;
                }
                Err(OfferError::Superseded)
            }
        }
    }

    /// Declining re-queues the entry so later offers can match it again.
    pub async fn decline(&self, token: &str, now: DateTime<Utc>) -> Result<Offer, OfferError> {
        let offer = {
            let mut state = self.state.lock().await;
            let offer_id = *state.tokens.get(token).ok_or(OfferError::OfferNotFound)?;
            let offer = state
                .offers
                .get(&offer_id)
                .ok_or(OfferError::OfferNotFound)?;

            match offer.state {
                OfferState::Pending => {}
                _ => return Err(OfferError::AlreadyResolved),
            }
            if offer.expires_at <= now {
                let event = Self::expire_locked(&mut state, offer_id, now);
                drop(state);
                if let Some(event) = event {
                    self.emit(event).await;
                }
                return Err(OfferError::Expired);
            }

            let offer = state
                .offers
                .get_mut(&offer_id)
                .ok_or(OfferError::OfferNotFound)?;
            offer.state = OfferState::Declined;
            offer.resolved_at = Some(now);
            let key = offer.slot.key();
            let entry_id = offer.waitlist_entry_id;
            let snapshot = offer.clone();
            state.pending_by_slot.remove(&key);
            if let Some(entry) = state.entries.get_mut(&entry_id) {
                entry.status = WaitlistStatus::Waiting;
                entry.updated_at = now;
            }
            snapshot
        };

        info!("Offer {} declined, entry {} re-queued", offer.id, offer.waitlist_entry_id);
        Ok(offer)
    }

    /// Expires every pending offer whose countdown has run out.
    /// Idempotent: an offer already moved out of pending is skipped, so
    /// a second sweep over the same clock is a no-op.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let events = {
            let mut state = self.state.lock().await;
            let stale: Vec<Uuid> = state
                .offers
                .values()
                .filter(|o| o.state == OfferState::Pending && o.expires_at <= now)
                .map(|o| o.id)
                .collect();
            stale
                .into_iter()
                .filter_map(|offer_id| Self::expire_locked(&mut state, offer_id, now))
                .collect::<Vec<_>>()
        };

        let count = events.len();
        if count > 0 {
            info!("Swept {} expired offers", count);
        }
        for event in events {
            self.emit(event).await;
        }
        count
    }

    // Transition one pending offer to expired and re-queue its entry.
    // Caller holds the state lock.
    fn expire_locked(
        state: &mut CoordinatorState,
        offer_id: Uuid,
        now: DateTime<Utc>,
    ) -> Option<BookingEvent> {
        let offer = state.offers.get_mut(&offer_id)?;
        if offer.state != OfferState::Pending {
            return None;
        }
        offer.state = OfferState::Expired;
        offer.resolved_at = Some(now);
        let key = offer.slot.key();
        let entry_id = offer.waitlist_entry_id;
        let patient_id = offer.patient_id;
        state.pending_by_slot.remove(&key);
        if let Some(entry) = state.entries.get_mut(&entry_id) {
            // Only re-queue the entry this offer moved to offered.
            if entry.status == WaitlistStatus::Offered {
                entry.status = WaitlistStatus::Waiting;
                entry.updated_at = now;
            }
        }
        debug!("Offer {} expired", offer_id);
        Some(BookingEvent::OfferExpired {
            offer_id,
            patient_id,
        })
    }

    async fn emit(&self, event: BookingEvent) {
        if let Err(e) = self.notifier.send_event(&event).await {
            warn!("Offer notification failed: {}", e);
        }
    }
}

/// 32 random bytes from the OS, URL-safe encoded. Well past the 128-bit
/// floor for a bearer credential.
fn generate_offer_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_tokens_are_long_and_unique() {
        let a = generate_offer_token();
        let b = generate_offer_token();
        assert_ne!(a, b);
        // 32 bytes -> 43 chars of unpadded base64.
        assert_eq!(a.len(), 43);
    }
}
