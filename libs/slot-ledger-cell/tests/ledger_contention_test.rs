use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use slot_ledger_cell::{Slot, SlotLedger, SlotLedgerError};

fn slot(provider_id: Uuid) -> Slot {
    let start = Utc::now() + Duration::hours(24);
    Slot {
        provider_id,
        service_id: Uuid::new_v4(),
        start_time: start,
        end_time: start + Duration::minutes(50),
    }
}

#[tokio::test]
async fn concurrent_reserves_admit_exactly_one_winner() {
    let ledger = Arc::new(SlotLedger::new());
    let contested = slot(Uuid::new_v4());

    let mut handles = Vec::new();
    for _ in 0..32 {
        let ledger = Arc::clone(&ledger);
        let slot = contested.clone();
        handles.push(tokio::spawn(async move { ledger.reserve(&slot, Uuid::new_v4()).await }));
    }

    let mut winners = 0;
    let mut losers = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(SlotLedgerError::SlotUnavailable { .. }) => losers += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(losers, 31);
    assert!(!ledger.is_free(&contested.key()).await);
}

#[tokio::test]
async fn release_under_contention_frees_for_next_caller() {
    let ledger = Arc::new(SlotLedger::new());
    let contested = slot(Uuid::new_v4());

    let reservation = ledger.reserve(&contested, Uuid::new_v4()).await.unwrap();

    // Racing releases of the same handle free the slot exactly once.
    let mut handles = Vec::new();
    for _ in 0..8 {
        let ledger = Arc::clone(&ledger);
        handles.push(tokio::spawn(async move { ledger.release(reservation).await }));
    }

    let freed: usize = {
        let mut count = 0;
        for handle in handles {
            if handle.await.unwrap() {
                count += 1;
            }
        }
        count
    };

    assert_eq!(freed, 1);
    assert!(ledger.reserve(&contested, Uuid::new_v4()).await.is_ok());
}
