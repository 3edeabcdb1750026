// libs/shared/gateways/src/payments.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// A charge or refund request in currency minor units. Card data never
/// enters this system; the gateway resolves the patient's stored payment
/// method on its side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub patient_id: Uuid,
    pub amount: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub transaction_id: Uuid,
    pub amount: i64,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("payment declined: {0}")]
    Declined(String),

    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: &PaymentRequest) -> Result<PaymentReceipt, PaymentError>;

    async fn refund(&self, request: &PaymentRequest) -> Result<PaymentReceipt, PaymentError>;
}

/// Logs payment activity without moving money. Stands in for the real
/// payment provider, which is an external collaborator.
pub struct LogPaymentGateway;

#[async_trait]
impl PaymentGateway for LogPaymentGateway {
    async fn charge(&self, request: &PaymentRequest) -> Result<PaymentReceipt, PaymentError> {
        info!(
            "Charge of {} minor units for patient {}: {}",
            request.amount, request.patient_id, request.reason
        );
        Ok(PaymentReceipt {
            transaction_id: Uuid::new_v4(),
            amount: request.amount,
            processed_at: Utc::now(),
        })
    }

    async fn refund(&self, request: &PaymentRequest) -> Result<PaymentReceipt, PaymentError> {
        info!(
            "Refund of {} minor units for patient {}: {}",
            request.amount, request.patient_id, request.reason
        );
        Ok(PaymentReceipt {
            transaction_id: Uuid::new_v4(),
            amount: request.amount,
            processed_at: Utc::now(),
        })
    }
}
