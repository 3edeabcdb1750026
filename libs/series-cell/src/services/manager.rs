// libs/series-cell/src/services/manager.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_gateways::{BookingEvent, Notifier, PaymentGateway, PaymentRequest};
use slot_ledger_cell::{ReservationId, Slot, SlotLedger};

use crate::models::{
    BookingMode, CancelScope, CancellationResult, CreateSeriesRequest, EditOutcome, EditScope,
    EditSeriesRequest, PricingMode, Series, SeriesError, SeriesMode, SeriesStatus, Session,
    SessionStatus,
};
use crate::services::lifecycle::LifecycleService;
use crate::services::planner::{prorate, SessionSchedule};
use crate::services::sessions::SessionStore;

/// Result of completing one session: the updated session, the next
/// session materialized for book_as_you_go series, and whether the
/// planner could not reserve that next slot.
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub session: Session,
    pub next_session: Option<Session>,
    pub next_slot_unavailable: bool,
    pub series_status: SeriesStatus,
}

/// Owns series lifecycle. The ledger is the only arbiter of slot
/// ownership; this service sequences multi-slot operations and rolls
/// back its own reservations when a step fails midway.
pub struct SeriesManager {
    ledger: Arc<SlotLedger>,
    sessions: Arc<SessionStore>,
    series: Mutex<HashMap<Uuid, Series>>,
    lifecycle: LifecycleService,
    notifier: Arc<dyn Notifier>,
    payments: Arc<dyn PaymentGateway>,
}

impl SeriesManager {
    pub fn new(
        ledger: Arc<SlotLedger>,
        sessions: Arc<SessionStore>,
        notifier: Arc<dyn Notifier>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            ledger,
            sessions,
            series: Mutex::new(HashMap::new()),
            lifecycle: LifecycleService::new(),
            notifier,
            payments,
        }
    }

    // ===== CREATE =====

    /// Creates a series and reserves its sessions. All-or-nothing: if
    /// any reservation fails, every slot reserved by this call is
    /// released and no series or session records are written.
    pub async fn create_series(&self, request: CreateSeriesRequest) -> Result<Series, SeriesError> {
        self.validate_create(&request)?;

        let schedule = SessionSchedule::new(
            request.mode,
            request.interval_days,
            request.total_sessions,
            request.first_session_start,
        )?;

        let planned: Vec<DateTime<Utc>> = match request.booking_mode {
            BookingMode::BookAll => schedule.all_dates()?,
            BookingMode::BookAsYouGo => vec![request.first_session_start],
        };

        let mut reserved: Vec<(Slot, ReservationId)> = Vec::with_capacity(planned.len());
        for (index, start) in planned.iter().enumerate() {
            let slot = Slot {
                provider_id: request.provider_id,
                service_id: request.service_id,
                start_time: *start,
                end_time: *start + Duration::minutes(request.session_duration_minutes),
            };
            match self.ledger.reserve(&slot, request.patient_id).await {
                Ok(reservation_id) => reserved.push((slot, reservation_id)),
                Err(_) => {
                    warn!(
                        "Series creation aborted: slot at index {} taken, rolling back {} reservations",
                        index,
                        reserved.len()
                    );
                    for (_, reservation_id) in reserved {
                        self.ledger.release(reservation_id).await;
                    }
                    return Err(SeriesError::SlotUnavailable { index });
                }
            }
        }

        let now = Utc::now();
        let series = Series {
            id: Uuid::new_v4(),
            patient_id: request.patient_id,
            service_id: request.service_id,
            provider_id: request.provider_id,
            mode: request.mode,
            interval_days: request.interval_days,
            total_sessions: request.total_sessions,
            booking_mode: request.booking_mode,
            pricing_mode: request.pricing_mode,
            package_price: request.package_price,
            session_duration_minutes: request.session_duration_minutes,
            status: SeriesStatus::Active,
            sessions_booked: reserved.len() as u32,
            sessions_completed: 0,
            created_at: now,
            updated_at: now,
        };

        let sessions: Vec<Session> = reserved
            .into_iter()
            .enumerate()
            .map(|(index, (slot, reservation_id))| Session {
                id: Uuid::new_v4(),
                series_id: Some(series.id),
                patient_id: series.patient_id,
                sequence_number: index as u32,
                slot,
                reservation_id: Some(reservation_id),
                status: SessionStatus::Scheduled,
                created_at: now,
                updated_at: now,
            })
            .collect();

        {
            let mut series_map = self.series.lock().await;
            series_map.insert(series.id, series.clone());
        }
        self.sessions.insert_many(sessions.clone()).await;

        info!(
            "Created series {} for patient {} with {} booked sessions",
            series.id, series.patient_id, series.sessions_booked
        );

        // Side effects only after the state is committed.
        if series.pricing_mode == PricingMode::Package {
            if let Some(price) = series.package_price {
                let charge = PaymentRequest {
                    patient_id: series.patient_id,
                    amount: price,
                    reason: format!("Package purchase for series {}", series.id),
                };
                if let Err(e) = self.payments.charge(&charge).await {
                    warn!(
                        "Package charge failed for series {}: {} (recorded as financial exception)",
                        series.id, e
                    );
                }
            }
        }

        for session in &sessions {
            self.emit_scheduled(session).await;
        }

        Ok(series)
    }

    fn validate_create(&self, request: &CreateSeriesRequest) -> Result<(), SeriesError> {
        if request.session_duration_minutes < 1 {
            return Err(SeriesError::Validation(
                "session_duration_minutes must be at least 1".to_string(),
            ));
        }
        if request.booking_mode == BookingMode::BookAll && request.mode == SeriesMode::Maintenance {
            return Err(SeriesError::Validation(
                "book_all requires a fixed-count series".to_string(),
            ));
        }
        match request.pricing_mode {
            PricingMode::Package => {
                if request.mode != SeriesMode::Fixed {
                    return Err(SeriesError::Validation(
                        "package pricing requires a fixed-count series".to_string(),
                    ));
                }
                match request.package_price {
                    Some(price) if price > 0 => {}
                    _ => {
                        return Err(SeriesError::Validation(
                            "package pricing requires package_price > 0".to_string(),
                        ));
                    }
                }
            }
            PricingMode::PerSession => {
                if request.package_price.is_some() {
                    return Err(SeriesError::Validation(
                        "package_price is only valid with package pricing".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    // ===== READ =====

    pub async fn get_series(&self, series_id: Uuid) -> Result<(Series, Vec<Session>), SeriesError> {
        let series = {
            let series_map = self.series.lock().await;
            series_map
                .get(&series_id)
                .cloned()
                .ok_or(SeriesError::SeriesNotFound(series_id))?
        };
        let sessions = self.sessions.list_by_series(series_id).await;
        Ok((series, sessions))
    }

    // ===== SESSION PROGRESSION =====

    /// Marks a session completed and, for book_as_you_go, materializes
    /// the next one unless the series is paused or finished.
    pub async fn complete_session(
        &self,
        series_id: Uuid,
        sequence_number: u32,
    ) -> Result<CompletionOutcome, SeriesError> {
        let mut series_map = self.series.lock().await;
        let series = series_map
            .get_mut(&series_id)
            .ok_or(SeriesError::SeriesNotFound(series_id))?;
        self.require_open(series)?;

        let mut session = self
            .sessions
            .find_in_series(series_id, sequence_number)
            .await
            .ok_or(SeriesError::SessionNotFound {
                series_id,
                sequence_number,
            })?;

        self.lifecycle
            .validate_session_transition(&session.status, &SessionStatus::Completed)?;
        session.status = SessionStatus::Completed;
        self.sessions.update(session.clone()).await;

        series.sessions_completed += 1;
        series.updated_at = Utc::now();

        if series.total_sessions == Some(series.sessions_completed) {
            // Final session done; the series is finished regardless of
            // whether it was paused at the time.
            series.status = SeriesStatus::Completed;
            info!("Series {} completed all sessions", series_id);
            return Ok(CompletionOutcome {
                session,
                next_session: None,
                next_slot_unavailable: false,
                series_status: series.status,
            });
        }

        let (next_session, next_slot_unavailable) =
            self.materialize_next(series, &session).await?;
        let series_status = series.status;
        drop(series_map);

        if let Some(ref created) = next_session {
            self.emit_scheduled(created).await;
        }

        Ok(CompletionOutcome {
            session,
            next_session,
            next_slot_unavailable,
            series_status,
        })
    }

    /// No-show is terminal and does not count toward completed sessions,
    /// so the missed share stays refundable on later cancellation. The
    /// patient still holds the remaining count, so a book_as_you_go
    /// series materializes its next session here just as on completion.
    pub async fn mark_no_show(
        &self,
        series_id: Uuid,
        sequence_number: u32,
    ) -> Result<CompletionOutcome, SeriesError> {
        let mut series_map = self.series.lock().await;
        let series = series_map
            .get_mut(&series_id)
            .ok_or(SeriesError::SeriesNotFound(series_id))?;
        self.require_open(series)?;

        let mut session = self
            .sessions
            .find_in_series(series_id, sequence_number)
            .await
            .ok_or(SeriesError::SessionNotFound {
                series_id,
                sequence_number,
            })?;

        self.lifecycle
            .validate_session_transition(&session.status, &SessionStatus::NoShow)?;
        session.status = SessionStatus::NoShow;
        self.sessions.update(session.clone()).await;
        series.updated_at = Utc::now();

        let (next_session, next_slot_unavailable) =
            self.materialize_next(series, &session).await?;
        let series_status = series.status;
        drop(series_map);

        info!(
            "Marked session {} of series {} as no_show",
            sequence_number, series_id
        );
        if let Some(ref created) = next_session {
            self.emit_scheduled(created).await;
        }

        Ok(CompletionOutcome {
            session,
            next_session,
            next_slot_unavailable,
            series_status,
        })
    }

    /// Reserves and records the next book_as_you_go session, one
    /// interval past `anchor`. Returns the new session, or a flag when
    /// the computed slot was already taken; in that case the caller's
    /// own transition stands and the next session is booked via edit.
    async fn materialize_next(
        &self,
        series: &mut Series,
        anchor: &Session,
    ) -> Result<(Option<Session>, bool), SeriesError> {
        let exhausted = series
            .total_sessions
            .is_some_and(|total| series.sessions_booked >= total);
        if series.booking_mode != BookingMode::BookAsYouGo
            || series.status != SeriesStatus::Active
            || exhausted
        {
            return Ok((None, false));
        }

        let schedule = SessionSchedule::new(
            series.mode,
            series.interval_days,
            series.total_sessions,
            anchor.slot.start_time,
        )?;
        let next_index = series.sessions_booked;
        let Some(start) = schedule.date_at(1) else {
            return Ok((None, false));
        };
        let slot = self.slot_for(series, start);
        match self.ledger.reserve(&slot, series.patient_id).await {
            Ok(reservation_id) => {
                let now = Utc::now();
                let created = Session {
                    id: Uuid::new_v4(),
                    series_id: Some(series.id),
                    patient_id: series.patient_id,
                    sequence_number: next_index,
                    slot,
                    reservation_id: Some(reservation_id),
                    status: SessionStatus::Scheduled,
                    created_at: now,
                    updated_at: now,
                };
                self.sessions.insert(created.clone()).await;
                series.sessions_booked += 1;
                Ok((Some(created), false))
            }
            Err(_) => {
                warn!(
                    "Could not materialize session {} for series {}: slot taken",
                    next_index, series.id
                );
                Ok((None, true))
            }
        }
    }

    // ===== EDIT =====

    pub async fn edit_series(
        &self,
        series_id: Uuid,
        request: EditSeriesRequest,
    ) -> Result<EditOutcome, SeriesError> {
        let mut series_map = self.series.lock().await;
        let series = series_map
            .get_mut(&series_id)
            .ok_or(SeriesError::SeriesNotFound(series_id))?;
        self.require_open(series)?;

        if let Some(interval) = request.new_interval_days {
            if interval < 1 {
                return Err(SeriesError::Validation(format!(
                    "interval_days must be at least 1, got {interval}"
                )));
            }
        }

        match request.scope {
            EditScope::ThisOnly => self.edit_single(series, &request).await,
            EditScope::ThisAndFuture => {
                let anchor = request.sequence_number.ok_or_else(|| {
                    SeriesError::Validation(
                        "this_and_future requires sequence_number".to_string(),
                    )
                })?;
                self.edit_cascade(series, anchor, &request).await
            }
            EditScope::All => {
                let all_sessions = self.sessions.list_by_series(series.id).await;
                let completed: Vec<u32> = all_sessions
                    .iter()
                    .filter(|s| s.status == SessionStatus::Completed)
                    .map(|s| s.sequence_number)
                    .collect();
                if !completed.is_empty() && !request.force {
                    return Err(SeriesError::InvalidSeriesEdit(format!(
                        "series has completed sessions {:?}; pass force to edit the remaining ones",
                        completed
                    )));
                }
                self.edit_cascade(series, 0, &request).await
            }
        }
    }

    async fn edit_single(
        &self,
        series: &mut Series,
        request: &EditSeriesRequest,
    ) -> Result<EditOutcome, SeriesError> {
        let sequence_number = request.sequence_number.ok_or_else(|| {
            SeriesError::Validation("this_only requires sequence_number".to_string())
        })?;
        if request.new_start_time.is_none() && request.new_provider_id.is_none() {
            return Err(SeriesError::Validation(
                "this_only requires new_start_time or new_provider_id".to_string(),
            ));
        }

        let mut session = self
            .sessions
            .find_in_series(series.id, sequence_number)
            .await
            .ok_or(SeriesError::SessionNotFound {
                series_id: series.id,
                sequence_number,
            })?;
        if session.status != SessionStatus::Scheduled {
            return Err(SeriesError::InvalidSeriesEdit(format!(
                "session {} is {} and cannot be rescheduled",
                sequence_number, session.status
            )));
        }

        let duration = session.slot.end_time - session.slot.start_time;
        let start = request.new_start_time.unwrap_or(session.slot.start_time);
        let target = Slot {
            provider_id: request.new_provider_id.unwrap_or(session.slot.provider_id),
            service_id: session.slot.service_id,
            start_time: start,
            end_time: start + duration,
        };

        if target.key() == session.slot.key() {
            return Ok(EditOutcome {
                updated_sessions: vec![],
                excluded_sessions: vec![],
            });
        }

        // Reserve the new slot before letting go of the old one.
        let new_reservation = self
            .ledger
            .reserve(&target, series.patient_id)
            .await
            .map_err(|_| SeriesError::SlotUnavailable {
                index: sequence_number as usize,
            })?;
        if let Some(old) = session.reservation_id.take() {
            self.ledger.release(old).await;
        }

        session.slot = target;
        session.reservation_id = Some(new_reservation);
        self.sessions.update(session.clone()).await;
        series.updated_at = Utc::now();

        self.emit_scheduled(&session).await;

        Ok(EditOutcome {
            updated_sessions: vec![sequence_number],
            excluded_sessions: vec![],
        })
    }

    /// Reschedules every scheduled session from `anchor` onward onto a
    /// recomputed date grid. Completed and otherwise terminal sessions
    /// are never touched; their sequence numbers come back in
    /// `excluded_sessions`.
    async fn edit_cascade(
        &self,
        series: &mut Series,
        anchor: u32,
        request: &EditSeriesRequest,
    ) -> Result<EditOutcome, SeriesError> {
        let all_sessions = self.sessions.list_by_series(series.id).await;

        let mut affected: Vec<Session> = Vec::new();
        let mut excluded: Vec<u32> = Vec::new();
        for session in all_sessions {
            if session.sequence_number < anchor {
                continue;
            }
            if session.status == SessionStatus::Scheduled {
                affected.push(session);
            } else {
                excluded.push(session.sequence_number);
            }
        }

        if affected.is_empty() {
            return Ok(EditOutcome {
                updated_sessions: vec![],
                excluded_sessions: excluded,
            });
        }

        let interval_days = request.new_interval_days.unwrap_or(series.interval_days);
        let provider_id = request.new_provider_id.unwrap_or(series.provider_id);
        let base = request
            .new_start_time
            .unwrap_or(affected[0].slot.start_time);
        let interval = Duration::days(interval_days);

        // Pair each affected session with its target slot; unchanged
        // slots are left alone entirely.
        let mut moves: Vec<(Session, Slot)> = Vec::new();
        for (offset, session) in affected.into_iter().enumerate() {
            let start = base + interval * offset as i32;
            let duration = session.slot.end_time - session.slot.start_time;
            let target = Slot {
                provider_id,
                service_id: session.slot.service_id,
                start_time: start,
                end_time: start + duration,
            };
            if target.key() != session.slot.key() {
                moves.push((session, target));
            }
        }

        if moves.is_empty() {
            series.interval_days = interval_days;
            series.provider_id = provider_id;
            series.updated_at = Utc::now();
            return Ok(EditOutcome {
                updated_sessions: vec![],
                excluded_sessions: excluded,
            });
        }

        // The new grid may land on keys the batch itself still holds
        // (shifting by less than one interval does this), so release
        // the batch's old reservations first. All of them belong to
        // this series, so nothing is lost if a later step fails: the
        // rollback below re-reserves them.
        for (session, _) in &moves {
            if let Some(id) = session.reservation_id {
                self.ledger.release(id).await;
            }
        }

        let mut new_reservations: Vec<ReservationId> = Vec::with_capacity(moves.len());
        for (session, target) in &moves {
            match self.ledger.reserve(target, series.patient_id).await {
                Ok(reservation_id) => new_reservations.push(reservation_id),
                Err(_) => {
                    warn!(
                        "Cascade edit of series {} failed at session {}: slot taken, restoring",
                        series.id, session.sequence_number
                    );
                    for reservation_id in new_reservations {
                        self.ledger.release(reservation_id).await;
                    }
                    self.restore_batch(series, &moves).await;
                    return Err(SeriesError::SlotUnavailable {
                        index: session.sequence_number as usize,
                    });
                }
            }
        }

        let mut updated: Vec<u32> = Vec::with_capacity(moves.len());
        for ((mut session, target), reservation_id) in
            moves.into_iter().zip(new_reservations.into_iter())
        {
            session.slot = target;
            session.reservation_id = Some(reservation_id);
            updated.push(session.sequence_number);
            self.emit_scheduled(&session).await;
            self.sessions.update(session).await;
        }

        series.interval_days = interval_days;
        series.provider_id = provider_id;
        series.updated_at = Utc::now();

        info!(
            "Cascade edit of series {} moved sessions {:?}, excluded {:?}",
            series.id, updated, excluded
        );

        Ok(EditOutcome {
            updated_sessions: updated,
            excluded_sessions: excluded,
        })
    }

    /// Re-reserves the batch's original slots after a failed cascade.
    /// The slots were held by this series an instant ago; an outsider
    /// sniping one in the gap is logged as an integrity error.
    async fn restore_batch(&self, series: &Series, moves: &[(Session, Slot)]) {
        for (session, _) in moves {
            match self.ledger.reserve(&session.slot, series.patient_id).await {
                Ok(reservation_id) => {
                    let mut restored = session.clone();
                    restored.reservation_id = Some(reservation_id);
                    self.sessions.update(restored).await;
                }
                Err(_) => {
                    error!(
                        "Failed to restore slot for session {} of series {} after aborted edit",
                        session.sequence_number, series.id
                    );
                }
            }
        }
    }

    // ===== CANCEL =====

    /// Cancels the series, releasing scheduled slots and prorating the
    /// package refund from sessions completed at this moment. The
    /// refund call is advisory: a gateway failure never blocks the
    /// cancellation.
    pub async fn cancel_series(
        &self,
        series_id: Uuid,
        scope: CancelScope,
        now: DateTime<Utc>,
    ) -> Result<CancellationResult, SeriesError> {
        let (patient_id, refund_amount, released, no_shows, released_slots) = {
            let mut series_map = self.series.lock().await;
            let series = series_map
                .get_mut(&series_id)
                .ok_or(SeriesError::SeriesNotFound(series_id))?;
            self.lifecycle
                .validate_series_transition(&series.status, &SeriesStatus::Cancelled)?;

            let all_sessions = self.sessions.list_by_series(series_id).await;
            let mut released: Vec<u32> = Vec::new();
            let mut released_slots: Vec<Slot> = Vec::new();
            for mut session in all_sessions.iter().cloned() {
                if session.status != SessionStatus::Scheduled {
                    continue;
                }
                if scope == CancelScope::RemainingOnly && session.slot.start_time < now {
                    continue;
                }
                if let Some(reservation_id) = session.reservation_id.take() {
                    self.ledger.release(reservation_id).await;
                }
                session.status = SessionStatus::Cancelled;
                released.push(session.sequence_number);
                released_slots.push(session.slot.clone());
                self.sessions.update(session).await;
            }

            let no_shows: Vec<u32> = all_sessions
                .iter()
                .filter(|s| s.status == SessionStatus::NoShow)
                .map(|s| s.sequence_number)
                .collect();

            let refund_amount = match (series.pricing_mode, series.package_price) {
                (PricingMode::Package, Some(price)) => {
                    let total = series.total_sessions.ok_or_else(|| {
                        SeriesError::ProrationInput(
                            "package series is missing total_sessions".to_string(),
                        )
                    })?;
                    prorate(price, total, series.sessions_completed)?
                }
                _ => 0,
            };

            series.status = SeriesStatus::Cancelled;
            series.updated_at = Utc::now();
            (
                series.patient_id,
                refund_amount,
                released,
                no_shows,
                released_slots,
            )
        };

        info!(
            "Cancelled series {}: released {} sessions, refund {} minor units",
            series_id,
            released.len(),
            refund_amount
        );

        let mut refund_issued = true;
        if refund_amount > 0 {
            let refund = PaymentRequest {
                patient_id,
                amount: refund_amount,
                reason: format!("Prorated refund for cancelled series {series_id}"),
            };
            if let Err(e) = self.payments.refund(&refund).await {
                warn!(
                    "Refund failed for series {}: {} (recorded as financial exception)",
                    series_id, e
                );
                refund_issued = false;
            }
        }

        if let Err(e) = self
            .notifier
            .send_event(&BookingEvent::SeriesCancelled {
                series_id,
                patient_id,
                refund_amount,
            })
            .await
        {
            warn!("Cancellation notification failed for series {}: {}", series_id, e);
        }

        Ok(CancellationResult {
            refund_amount,
            released_sessions: released,
            no_show_sessions: no_shows,
            refund_issued,
            released_slots,
        })
    }

    // ===== PAUSE / RESUME =====

    pub async fn pause_series(&self, series_id: Uuid) -> Result<Series, SeriesError> {
        self.transition_series(series_id, SeriesStatus::Paused).await
    }

    /// Resuming also backfills the next book_as_you_go session if the
    /// pause left the series without a scheduled one.
    pub async fn resume_series(&self, series_id: Uuid) -> Result<Series, SeriesError> {
        let series = self
            .transition_series(series_id, SeriesStatus::Active)
            .await?;

        if series.booking_mode != BookingMode::BookAsYouGo {
            return Ok(series);
        }
        let sessions = self.sessions.list_by_series(series_id).await;
        let has_scheduled = sessions
            .iter()
            .any(|s| s.status == SessionStatus::Scheduled);
        let exhausted = series
            .total_sessions
            .is_some_and(|total| series.sessions_booked >= total);
        if has_scheduled || exhausted {
            return Ok(series);
        }

        // Anchor the backfilled date on the latest session the series has.
        let Some(last) = sessions.iter().max_by_key(|s| s.sequence_number) else {
            return Ok(series);
        };
        let start = last.slot.start_time + Duration::days(series.interval_days);
        let slot = self.slot_for(&series, start);
        let reservation_id = self
            .ledger
            .reserve(&slot, series.patient_id)
            .await
            .map_err(|_| SeriesError::SlotUnavailable {
                index: series.sessions_booked as usize,
            })?;

        let now = Utc::now();
        let created = Session {
            id: Uuid::new_v4(),
            series_id: Some(series_id),
            patient_id: series.patient_id,
            sequence_number: series.sessions_booked,
            slot,
            reservation_id: Some(reservation_id),
            status: SessionStatus::Scheduled,
            created_at: now,
            updated_at: now,
        };
        self.sessions.insert(created.clone()).await;

        let updated = {
            let mut series_map = self.series.lock().await;
            let series = series_map
                .get_mut(&series_id)
                .ok_or(SeriesError::SeriesNotFound(series_id))?;
            series.sessions_booked += 1;
            series.updated_at = now;
            series.clone()
        };

        info!(
            "Backfilled session {} for resumed series {}",
            created.sequence_number, series_id
        );
        self.emit_scheduled(&created).await;
        Ok(updated)
    }

    async fn transition_series(
        &self,
        series_id: Uuid,
        next: SeriesStatus,
    ) -> Result<Series, SeriesError> {
        let mut series_map = self.series.lock().await;
        let series = series_map
            .get_mut(&series_id)
            .ok_or(SeriesError::SeriesNotFound(series_id))?;
        self.lifecycle
            .validate_series_transition(&series.status, &next)?;
        series.status = next;
        series.updated_at = Utc::now();
        info!("Series {} is now {}", series_id, next);
        Ok(series.clone())
    }

    // ===== HELPERS =====

    fn require_open(&self, series: &Series) -> Result<(), SeriesError> {
        match series.status {
            SeriesStatus::Active | SeriesStatus::Paused => Ok(()),
            other => Err(SeriesError::InvalidStatusTransition {
                from: other.to_string(),
            }),
        }
    }

    fn slot_for(&self, series: &Series, start: DateTime<Utc>) -> Slot {
        Slot {
            provider_id: series.provider_id,
            service_id: series.service_id,
            start_time: start,
            end_time: start + Duration::minutes(series.session_duration_minutes),
        }
    }

    async fn emit_scheduled(&self, session: &Session) {
        let Some(series_id) = session.series_id else {
            return;
        };
        let event = BookingEvent::SeriesSessionScheduled {
            series_id,
            patient_id: session.patient_id,
            sequence_number: session.sequence_number,
            start_time: session.slot.start_time,
        };
        if let Err(e) = self.notifier.send_event(&event).await {
            debug!(
                "Schedule notification failed for session {} of series {}: {}",
                session.sequence_number, series_id, e
            );
        }
    }
}
