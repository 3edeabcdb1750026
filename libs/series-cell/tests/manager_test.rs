use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use shared_gateways::{LogNotifier, LogPaymentGateway};
use slot_ledger_cell::{Slot, SlotLedger};

use series_cell::{
    BookingMode, CancelScope, CreateSeriesRequest, EditScope, EditSeriesRequest, PricingMode,
    SeriesError, SeriesManager, SeriesMode, SeriesStatus, SessionStatus, SessionStore,
};

struct Fixture {
    ledger: Arc<SlotLedger>,
    sessions: Arc<SessionStore>,
    manager: SeriesManager,
}

fn fixture() -> Fixture {
    let ledger = Arc::new(SlotLedger::new());
    let sessions = Arc::new(SessionStore::new());
    let manager = SeriesManager::new(
        Arc::clone(&ledger),
        Arc::clone(&sessions),
        Arc::new(LogNotifier),
        Arc::new(LogPaymentGateway),
    );
    Fixture {
        ledger,
        sessions,
        manager,
    }
}

fn first_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2027, 1, 4, 14, 0, 0).unwrap()
}

fn fixed_package_request(provider_id: Uuid, total: u32) -> CreateSeriesRequest {
    CreateSeriesRequest {
        patient_id: Uuid::new_v4(),
        service_id: Uuid::new_v4(),
        provider_id,
        mode: SeriesMode::Fixed,
        interval_days: 7,
        total_sessions: Some(total),
        booking_mode: BookingMode::BookAll,
        pricing_mode: PricingMode::Package,
        package_price: Some(120_000),
        first_session_start: first_start(),
        session_duration_minutes: 50,
    }
}

fn maintenance_request(provider_id: Uuid) -> CreateSeriesRequest {
    CreateSeriesRequest {
        patient_id: Uuid::new_v4(),
        service_id: Uuid::new_v4(),
        provider_id,
        mode: SeriesMode::Maintenance,
        interval_days: 30,
        total_sessions: None,
        booking_mode: BookingMode::BookAsYouGo,
        pricing_mode: PricingMode::PerSession,
        package_price: None,
        first_session_start: first_start(),
        session_duration_minutes: 50,
    }
}

#[tokio::test]
async fn book_all_creates_one_session_per_planned_date() {
    let fx = fixture();
    let provider_id = Uuid::new_v4();

    let series = fx
        .manager
        .create_series(fixed_package_request(provider_id, 6))
        .await
        .unwrap();

    assert_eq!(series.sessions_booked, 6);
    let sessions = fx.sessions.list_by_series(series.id).await;
    assert_eq!(sessions.len(), 6);
    for (i, session) in sessions.iter().enumerate() {
        assert_eq!(session.sequence_number, i as u32);
        assert_eq!(
            session.slot.start_time,
            first_start() + Duration::days(7 * i as i64)
        );
        assert_eq!(session.status, SessionStatus::Scheduled);
        assert!(!fx.ledger.is_free(&session.slot.key()).await);
    }
}

#[tokio::test]
async fn creation_rolls_back_fully_when_one_slot_is_taken() {
    let fx = fixture();
    let provider_id = Uuid::new_v4();
    let request = fixed_package_request(provider_id, 6);

    // Another booking already holds the slot the 4th session needs.
    let blocked_start = first_start() + Duration::days(21);
    let blocker = Slot {
        provider_id,
        service_id: Uuid::new_v4(),
        start_time: blocked_start,
        end_time: blocked_start + Duration::minutes(50),
    };
    fx.ledger.reserve(&blocker, Uuid::new_v4()).await.unwrap();

    let result = fx.manager.create_series(request.clone()).await;
    assert_matches!(result, Err(SeriesError::SlotUnavailable { index: 3 }));

    // Sessions 1-3 were rolled back; every earlier slot is free again.
    for i in 0..3 {
        let start = first_start() + Duration::days(7 * i);
        let probe = Slot {
            provider_id,
            service_id: request.service_id,
            start_time: start,
            end_time: start + Duration::minutes(50),
        };
        assert!(fx.ledger.is_free(&probe.key()).await);
    }
}

#[tokio::test]
async fn book_as_you_go_materializes_next_session_on_completion() {
    let fx = fixture();
    let series = fx
        .manager
        .create_series(maintenance_request(Uuid::new_v4()))
        .await
        .unwrap();

    assert_eq!(fx.sessions.list_by_series(series.id).await.len(), 1);

    let outcome = fx.manager.complete_session(series.id, 0).await.unwrap();
    assert_eq!(outcome.session.status, SessionStatus::Completed);

    let next = outcome.next_session.expect("next session materialized");
    assert_eq!(next.sequence_number, 1);
    assert_eq!(next.slot.start_time, first_start() + Duration::days(30));
    assert!(!fx.ledger.is_free(&next.slot.key()).await);
}

#[tokio::test]
async fn book_as_you_go_materializes_next_session_on_no_show() {
    let fx = fixture();
    let series = fx
        .manager
        .create_series(maintenance_request(Uuid::new_v4()))
        .await
        .unwrap();

    // A missed visit must not strand the series without a scheduled
    // session.
    let outcome = fx.manager.mark_no_show(series.id, 0).await.unwrap();
    assert_eq!(outcome.session.status, SessionStatus::NoShow);

    let next = outcome.next_session.expect("next session materialized");
    assert_eq!(next.sequence_number, 1);
    assert_eq!(next.slot.start_time, first_start() + Duration::days(30));
    assert_eq!(next.status, SessionStatus::Scheduled);
    assert!(!fx.ledger.is_free(&next.slot.key()).await);

    let (stored, _) = fx.manager.get_series(series.id).await.unwrap();
    assert_eq!(stored.sessions_booked, 2);
    assert_eq!(stored.sessions_completed, 0);
}

#[tokio::test]
async fn paused_series_does_not_materialize_next_session() {
    let fx = fixture();
    let series = fx
        .manager
        .create_series(maintenance_request(Uuid::new_v4()))
        .await
        .unwrap();

    fx.manager.pause_series(series.id).await.unwrap();

    let outcome = fx.manager.complete_session(series.id, 0).await.unwrap();
    assert!(outcome.next_session.is_none());
    assert!(!outcome.next_slot_unavailable);
    assert_eq!(outcome.series_status, SeriesStatus::Paused);
    assert_eq!(fx.sessions.list_by_series(series.id).await.len(), 1);

    // Resuming backfills the session the pause skipped.
    let resumed = fx.manager.resume_series(series.id).await.unwrap();
    assert_eq!(resumed.sessions_booked, 2);
    let sessions = fx.sessions.list_by_series(series.id).await;
    assert_eq!(sessions.len(), 2);
    let backfilled = &sessions[1];
    assert_eq!(backfilled.sequence_number, 1);
    assert_eq!(
        backfilled.slot.start_time,
        first_start() + Duration::days(30)
    );
    assert!(!fx.ledger.is_free(&backfilled.slot.key()).await);
}

#[tokio::test]
async fn completing_final_session_finishes_the_series() {
    let fx = fixture();
    let series = fx
        .manager
        .create_series(fixed_package_request(Uuid::new_v4(), 2))
        .await
        .unwrap();

    fx.manager.complete_session(series.id, 0).await.unwrap();
    let outcome = fx.manager.complete_session(series.id, 1).await.unwrap();

    assert_eq!(outcome.series_status, SeriesStatus::Completed);
    let (stored, _) = fx.manager.get_series(series.id).await.unwrap();
    assert_eq!(stored.status, SeriesStatus::Completed);
    assert_eq!(stored.sessions_completed, 2);
}

#[tokio::test]
async fn this_only_edit_swaps_exactly_one_slot() {
    let fx = fixture();
    let series = fx
        .manager
        .create_series(fixed_package_request(Uuid::new_v4(), 3))
        .await
        .unwrap();

    let before = fx.sessions.find_in_series(series.id, 1).await.unwrap();
    let old_key = before.slot.key();
    let new_start = before.slot.start_time + Duration::days(1);

    let outcome = fx
        .manager
        .edit_series(
            series.id,
            EditSeriesRequest {
                scope: EditScope::ThisOnly,
                sequence_number: Some(1),
                new_start_time: Some(new_start),
                new_provider_id: None,
                new_interval_days: None,
                force: false,
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.updated_sessions, vec![1]);
    let after = fx.sessions.find_in_series(series.id, 1).await.unwrap();
    assert_eq!(after.slot.start_time, new_start);
    assert!(fx.ledger.is_free(&old_key).await);
    assert!(!fx.ledger.is_free(&after.slot.key()).await);

    // Neighbours untouched.
    let neighbour = fx.sessions.find_in_series(series.id, 0).await.unwrap();
    assert_eq!(neighbour.slot.start_time, first_start());
}

#[tokio::test]
async fn this_only_edit_fails_without_freeing_the_old_slot() {
    let fx = fixture();
    let provider_id = Uuid::new_v4();
    let series = fx
        .manager
        .create_series(fixed_package_request(provider_id, 2))
        .await
        .unwrap();

    let target_start = first_start() + Duration::days(2);
    let blocker = Slot {
        provider_id,
        service_id: Uuid::new_v4(),
        start_time: target_start,
        end_time: target_start + Duration::minutes(50),
    };
    fx.ledger.reserve(&blocker, Uuid::new_v4()).await.unwrap();

    let result = fx
        .manager
        .edit_series(
            series.id,
            EditSeriesRequest {
                scope: EditScope::ThisOnly,
                sequence_number: Some(0),
                new_start_time: Some(target_start),
                new_provider_id: None,
                new_interval_days: None,
                force: false,
            },
        )
        .await;

    assert_matches!(result, Err(SeriesError::SlotUnavailable { index: 0 }));
    let session = fx.sessions.find_in_series(series.id, 0).await.unwrap();
    assert_eq!(session.slot.start_time, first_start());
    assert!(!fx.ledger.is_free(&session.slot.key()).await);
}

#[tokio::test]
async fn edit_all_requires_force_once_a_session_completed() {
    let fx = fixture();
    let series = fx
        .manager
        .create_series(fixed_package_request(Uuid::new_v4(), 4))
        .await
        .unwrap();

    fx.manager.complete_session(series.id, 0).await.unwrap();
    let completed_before = fx.sessions.find_in_series(series.id, 0).await.unwrap();

    let rejected = fx
        .manager
        .edit_series(
            series.id,
            EditSeriesRequest {
                scope: EditScope::All,
                sequence_number: None,
                new_start_time: Some(first_start() + Duration::days(1)),
                new_provider_id: None,
                new_interval_days: None,
                force: false,
            },
        )
        .await;
    assert_matches!(rejected, Err(SeriesError::InvalidSeriesEdit(_)));

    let outcome = fx
        .manager
        .edit_series(
            series.id,
            EditSeriesRequest {
                scope: EditScope::All,
                sequence_number: None,
                new_start_time: Some(first_start() + Duration::days(1)),
                new_provider_id: None,
                new_interval_days: None,
                force: true,
            },
        )
        .await
        .unwrap();

    // Completed session excluded and byte-for-byte unchanged.
    assert!(outcome.excluded_sessions.contains(&0));
    assert_eq!(outcome.updated_sessions, vec![1, 2, 3]);
    let completed_after = fx.sessions.find_in_series(series.id, 0).await.unwrap();
    assert_eq!(completed_after.slot, completed_before.slot);
    assert_eq!(completed_after.status, SessionStatus::Completed);
    assert_eq!(completed_after.updated_at, completed_before.updated_at);
}

#[tokio::test]
async fn cascade_edit_can_shift_onto_its_own_old_slots() {
    let fx = fixture();
    let series = fx
        .manager
        .create_series(fixed_package_request(Uuid::new_v4(), 3))
        .await
        .unwrap();

    // Shift everything forward by exactly one interval, so session 0
    // lands on session 1's old slot and so on.
    let outcome = fx
        .manager
        .edit_series(
            series.id,
            EditSeriesRequest {
                scope: EditScope::All,
                sequence_number: None,
                new_start_time: Some(first_start() + Duration::days(7)),
                new_provider_id: None,
                new_interval_days: None,
                force: false,
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.updated_sessions, vec![0, 1, 2]);
    for i in 0..3u32 {
        let session = fx.sessions.find_in_series(series.id, i).await.unwrap();
        assert_eq!(
            session.slot.start_time,
            first_start() + Duration::days(7 * (i as i64 + 1))
        );
        assert!(!fx.ledger.is_free(&session.slot.key()).await);
    }
    // The very first original slot is the only one left free.
    let sessions = fx.sessions.list_by_series(series.id).await;
    assert_eq!(sessions.len(), 3);
}

#[tokio::test]
async fn cancellation_prorates_package_and_releases_scheduled_slots() {
    let fx = fixture();
    let series = fx
        .manager
        .create_series(fixed_package_request(Uuid::new_v4(), 6))
        .await
        .unwrap();

    for seq in 0..3 {
        fx.manager.complete_session(series.id, seq).await.unwrap();
    }

    let result = fx
        .manager
        .cancel_series(series.id, CancelScope::All, Utc::now())
        .await
        .unwrap();

    // Half the package consumed, half refunded.
    assert_eq!(result.refund_amount, 60_000);
    assert_eq!(result.released_sessions, vec![3, 4, 5]);
    assert!(result.refund_issued);
    assert_eq!(result.released_slots.len(), 3);
    for slot in &result.released_slots {
        assert!(fx.ledger.is_free(&slot.key()).await);
    }

    let (stored, sessions) = fx.manager.get_series(series.id).await.unwrap();
    assert_eq!(stored.status, SeriesStatus::Cancelled);
    for session in sessions.iter().filter(|s| s.sequence_number >= 3) {
        assert_eq!(session.status, SessionStatus::Cancelled);
    }
}

#[tokio::test]
async fn no_show_is_terminal_and_not_counted_as_completed() {
    let fx = fixture();
    let series = fx
        .manager
        .create_series(fixed_package_request(Uuid::new_v4(), 6))
        .await
        .unwrap();

    fx.manager.complete_session(series.id, 0).await.unwrap();
    let outcome = fx.manager.mark_no_show(series.id, 1).await.unwrap();
    // book_all series have every session on the books already.
    assert!(outcome.next_session.is_none());

    // A no-show session cannot be completed afterwards.
    assert_matches!(
        fx.manager.complete_session(series.id, 1).await,
        Err(SeriesError::InvalidStatusTransition { .. })
    );

    let result = fx
        .manager
        .cancel_series(series.id, CancelScope::All, Utc::now())
        .await
        .unwrap();

    // Only one session counts as completed, so five sixths refund; the
    // no-show is reported separately for billing review.
    assert_eq!(result.refund_amount, 100_000);
    assert_eq!(result.no_show_sessions, vec![1]);
    assert_eq!(result.released_sessions, vec![2, 3, 4, 5]);
}

#[tokio::test]
async fn cancelled_series_rejects_further_operations() {
    let fx = fixture();
    let series = fx
        .manager
        .create_series(fixed_package_request(Uuid::new_v4(), 2))
        .await
        .unwrap();

    fx.manager
        .cancel_series(series.id, CancelScope::All, Utc::now())
        .await
        .unwrap();

    assert_matches!(
        fx.manager
            .cancel_series(series.id, CancelScope::All, Utc::now())
            .await,
        Err(SeriesError::InvalidStatusTransition { .. })
    );
    assert_matches!(
        fx.manager.complete_session(series.id, 0).await,
        Err(SeriesError::InvalidStatusTransition { .. })
    );
    assert_matches!(
        fx.manager.pause_series(series.id).await,
        Err(SeriesError::InvalidStatusTransition { .. })
    );
}

#[tokio::test]
async fn create_rejects_invalid_combinations() {
    let fx = fixture();

    let mut unbounded_book_all = maintenance_request(Uuid::new_v4());
    unbounded_book_all.booking_mode = BookingMode::BookAll;
    assert_matches!(
        fx.manager.create_series(unbounded_book_all).await,
        Err(SeriesError::Validation(_))
    );

    let mut missing_price = fixed_package_request(Uuid::new_v4(), 4);
    missing_price.package_price = None;
    assert_matches!(
        fx.manager.create_series(missing_price).await,
        Err(SeriesError::Validation(_))
    );

    let mut package_maintenance = maintenance_request(Uuid::new_v4());
    package_maintenance.pricing_mode = PricingMode::Package;
    package_maintenance.package_price = Some(50_000);
    assert_matches!(
        fx.manager.create_series(package_maintenance).await,
        Err(SeriesError::Validation(_))
    );
}
