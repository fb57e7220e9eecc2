use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::services::notifier::Notifier;
use crate::store::{Store, StoreError};

/// A merchant may trigger at most one bulk reminder campaign per window.
/// Soft rate limit against customer spam, not a security boundary.
pub const COOLDOWN_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownDecision {
    Allowed,
    Blocked { remaining_hours: i64 },
}

/// Pure gate over `last_reminder_sent_at`. Remaining time is reported in
/// whole hours, rounded up, and never below 1 while blocked.
pub fn check_cooldown(last_sent: Option<DateTime<Utc>>, now: DateTime<Utc>) -> CooldownDecision {
    let Some(last) = last_sent else {
        return CooldownDecision::Allowed;
    };

    let window = Duration::hours(COOLDOWN_HOURS);
    let elapsed = now - last;
    if elapsed >= window {
        return CooldownDecision::Allowed;
    }

    let remaining = window - elapsed;
    let remaining_hours = ((remaining.num_minutes() + 59) / 60).max(1);
    CooldownDecision::Blocked { remaining_hours }
}

#[derive(Debug, Clone)]
pub enum CampaignOutcome {
    Dispatched { delivered: usize, failed: usize },
    CooldownActive { remaining_hours: i64 },
    MerchantNotFound,
}

/// Triggers a reminder campaign for every customer holding an active,
/// unexpired coupon of the merchant.
///
/// The cooldown stamp is written only after dispatch was attempted, so a
/// campaign failing before that point does not consume the window. Per-
/// customer provider failures are counted and logged, not retried here.
#[tracing::instrument(skip(store, notifier))]
pub async fn send_campaign(
    store: &dyn Store,
    notifier: &dyn Notifier,
    merchant_id: Uuid,
    now: DateTime<Utc>,
) -> Result<CampaignOutcome, StoreError> {
    let merchant = match store.merchant_by_id(merchant_id).await? {
        Some(m) => m,
        None => return Ok(CampaignOutcome::MerchantNotFound),
    };

    if let CooldownDecision::Blocked { remaining_hours } =
        check_cooldown(merchant.last_reminder_sent_at, now)
    {
        tracing::info!(
            merchant_id = %merchant_id,
            remaining_hours,
            "Reminder campaign blocked by cooldown"
        );
        return Ok(CampaignOutcome::CooldownActive { remaining_hours });
    }

    dispatch_to_holders(store, notifier, &merchant, now).await
}

/// Admin override: dispatches without consulting the cooldown. Callers
/// must gate this behind the separate support-staff authorization path.
#[tracing::instrument(skip(store, notifier))]
pub async fn send_campaign_unguarded(
    store: &dyn Store,
    notifier: &dyn Notifier,
    merchant_id: Uuid,
    now: DateTime<Utc>,
) -> Result<CampaignOutcome, StoreError> {
    let merchant = match store.merchant_by_id(merchant_id).await? {
        Some(m) => m,
        None => return Ok(CampaignOutcome::MerchantNotFound),
    };

    tracing::warn!(merchant_id = %merchant_id, "Cooldown override in use");
    dispatch_to_holders(store, notifier, &merchant, now).await
}

async fn dispatch_to_holders(
    store: &dyn Store,
    notifier: &dyn Notifier,
    merchant: &crate::models::Merchant,
    now: DateTime<Utc>,
) -> Result<CampaignOutcome, StoreError> {
    let merchant_id = merchant.id;
    let coupons = store.active_coupons_for_merchant(merchant_id, now).await?;

    let mut delivered = 0;
    let mut failed = 0;
    for coupon in &coupons {
        let customer = match store.customer_by_id(coupon.customer_id).await? {
            Some(c) => c,
            None => {
                failed += 1;
                continue;
            }
        };

        match notifier.send_reminder(merchant, &customer, coupon).await {
            Ok(()) => delivered += 1,
            Err(e) => {
                tracing::warn!(
                    customer_id = %customer.id,
                    code = %coupon.code,
                    error = %e,
                    "Reminder delivery failed"
                );
                failed += 1;
            }
        }
    }

    store.set_last_reminder_sent_at(merchant_id, now).await?;

    tracing::info!(
        merchant_id = %merchant_id,
        delivered,
        failed,
        "Reminder campaign dispatched"
    );

    Ok(CampaignOutcome::Dispatched { delivered, failed })
}
