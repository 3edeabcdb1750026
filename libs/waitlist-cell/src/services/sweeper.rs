// libs/waitlist-cell/src/services/sweeper.rs
use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::debug;

use crate::services::offers::OfferCoordinator;

/// Background counterpart of the read-time expiry check: both paths go
/// through the same transition, so the sweep and a stale read can never
/// disagree about whether an offer is still valid.
pub fn spawn_offer_sweeper(
    coordinator: Arc<OfferCoordinator>,
    interval_seconds: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(interval_seconds));
        loop {
            ticker.tick().await;
            let swept = coordinator.sweep_expired(Utc::now()).await;
            if swept == 0 {
                debug!("Offer sweep found nothing to expire");
            }
        }
    })
}
