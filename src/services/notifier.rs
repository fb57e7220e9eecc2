use async_trait::async_trait;

use crate::models::{Coupon, Customer, Merchant};

#[derive(thiserror::Error, Debug)]
pub enum NotifyError {
    #[error("provider error: {0}")]
    Provider(String),

    #[error("customer has no reachable contact")]
    Unreachable,
}

/// Outbound reminder delivery seam. Message composition and the mail/SMS
/// provider SDKs live behind this trait.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_reminder(
        &self,
        merchant: &Merchant,
        customer: &Customer,
        coupon: &Coupon,
    ) -> Result<(), NotifyError>;
}

/// Logs deliveries instead of sending them. Used until a real provider is
/// configured, and in local development.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_reminder(
        &self,
        merchant: &Merchant,
        customer: &Customer,
        coupon: &Coupon,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            merchant = %merchant.slug,
            customer_id = %customer.id,
            code = %coupon.code,
            "Reminder (log only, no provider configured)"
        );
        Ok(())
    }
}
