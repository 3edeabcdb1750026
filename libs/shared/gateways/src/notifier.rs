// libs/shared/gateways/src/notifier.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Domain events handed to the notification gateway. Each event carries
/// everything the gateway needs to render a message; template and channel
/// choice happen downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BookingEvent {
    SeriesSessionScheduled {
        series_id: Uuid,
        patient_id: Uuid,
        sequence_number: u32,
        start_time: DateTime<Utc>,
    },
    SeriesCancelled {
        series_id: Uuid,
        patient_id: Uuid,
        refund_amount: i64,
    },
    OfferCreated {
        offer_id: Uuid,
        patient_id: Uuid,
        token: String,
        provider_id: Uuid,
        start_time: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    },
    OfferAccepted {
        offer_id: Uuid,
        patient_id: Uuid,
        start_time: DateTime<Utc>,
    },
    OfferExpired {
        offer_id: Uuid,
        patient_id: Uuid,
    },
}

#[derive(Debug, thiserror::Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_event(&self, event: &BookingEvent) -> Result<(), NotifyError>;
}

/// Delivery policy for the retrying wrapper. Delays grow linearly with the
/// attempt number, matching the booking retry loop used elsewhere.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

/// Wraps any notifier with attempt/backoff handling. Delivery failure is
/// never fatal to the calling operation; the last error is logged and
/// swallowed by callers that treat notification as fire-and-forget.
pub struct RetryingNotifier<N> {
    inner: N,
    policy: RetryPolicy,
}

impl<N: Notifier> RetryingNotifier<N> {
    pub fn new(inner: N, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<N: Notifier> Notifier for RetryingNotifier<N> {
    async fn send_event(&self, event: &BookingEvent) -> Result<(), NotifyError> {
        let mut last_err = None;
        for attempt in 1..=self.policy.max_attempts {
            match self.inner.send_event(event).await {
                Ok(()) => {
                    debug!("Notification delivered on attempt {}", attempt);
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "Notification attempt {}/{} failed: {}",
                        attempt, self.policy.max_attempts, e
                    );
                    last_err = Some(e);
                    if attempt < self.policy.max_attempts {
                        tokio::time::sleep(self.policy.base_delay * attempt).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| NotifyError("no attempts made".to_string())))
    }
}

/// Logs events instead of delivering them. Stands in for the SMS/email
/// gateway, which is an external collaborator.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_event(&self, event: &BookingEvent) -> Result<(), NotifyError> {
        info!("Notification event: {:?}", event);
        Ok(())
    }
}
