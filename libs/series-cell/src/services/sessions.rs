// libs/series-cell/src/services/sessions.rs
use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use slot_ledger_cell::{ReservationId, Slot};

use crate::models::{Session, SessionStatus};

/// Session records shared between series management and waitlist offer
/// acceptance. Plain keyed storage; all booking invariants live in the
/// slot ledger, not here.
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, session: Session) {
        let mut sessions = self.sessions.lock().await;
        sessions.insert(session.id, session);
    }

    pub async fn insert_many(&self, batch: Vec<Session>) {
        let mut sessions = self.sessions.lock().await;
        for session in batch {
            sessions.insert(session.id, session);
        }
    }

    pub async fn get(&self, id: Uuid) -> Option<Session> {
        let sessions = self.sessions.lock().await;
        sessions.get(&id).cloned()
    }

    /// Overwrites the stored record, bumping `updated_at`.
    pub async fn update(&self, mut session: Session) {
        session.updated_at = Utc::now();
        let mut sessions = self.sessions.lock().await;
        sessions.insert(session.id, session);
    }

    pub async fn list_by_series(&self, series_id: Uuid) -> Vec<Session> {
        let sessions = self.sessions.lock().await;
        let mut found: Vec<Session> = sessions
            .values()
            .filter(|s| s.series_id == Some(series_id))
            .cloned()
            .collect();
        found.sort_by_key(|s| s.sequence_number);
        found
    }

    pub async fn find_in_series(
        &self,
        series_id: Uuid,
        sequence_number: u32,
    ) -> Option<Session> {
        let sessions = self.sessions.lock().await;
        sessions
            .values()
            .find(|s| s.series_id == Some(series_id) && s.sequence_number == sequence_number)
            .cloned()
    }

    /// Builds and stores a standalone scheduled session holding a live
    /// reservation. Used by waitlist offer acceptance.
    pub async fn create_standalone(
        &self,
        patient_id: Uuid,
        slot: Slot,
        reservation_id: ReservationId,
    ) -> Session {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            series_id: None,
            patient_id,
            sequence_number: 0,
            slot,
            reservation_id: Some(reservation_id),
            status: SessionStatus::Scheduled,
            created_at: now,
            updated_at: now,
        };
        self.insert(session.clone()).await;
        session
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
