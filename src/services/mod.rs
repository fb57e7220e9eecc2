// Services module - Business logic

pub mod coupon_issuer;
pub mod coupon_verifier;
pub mod notifier;
pub mod pin_session;
pub mod redemption;
pub mod reminders;
