pub mod notifier;
pub mod payments;

pub use notifier::{BookingEvent, LogNotifier, Notifier, RetryPolicy, RetryingNotifier};
pub use payments::{
    LogPaymentGateway, PaymentError, PaymentGateway, PaymentReceipt, PaymentRequest,
};
