use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{coupon::normalize_code, Coupon, CouponStatus, Customer};
use crate::store::{Store, StoreError};

#[derive(Debug, Clone)]
pub enum RedeemOutcome {
    Redeemed { coupon: Coupon, customer: Customer },
    NotFound,
    WrongMerchant,
    AlreadyRedeemed { redeemed_at: Option<DateTime<Utc>> },
    Expired,
}

impl RedeemOutcome {
    /// Wire-level error code, `None` on success.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            RedeemOutcome::Redeemed { .. } => None,
            RedeemOutcome::NotFound => Some("COUPON_NOT_FOUND"),
            RedeemOutcome::WrongMerchant => Some("WRONG_MERCHANT"),
            RedeemOutcome::AlreadyRedeemed { .. } => Some("ALREADY_REDEEMED"),
            RedeemOutcome::Expired => Some("EXPIRED"),
        }
    }
}

/// Marks a coupon redeemed, exactly once.
///
/// Re-runs every ownership/status/expiry check - the earlier verify read
/// may be stale - then commits through the store's conditional write. The
/// write reports whether it changed a row; zero rows after the prechecks
/// passed means another terminal won the race, surfaced as
/// `AlreadyRedeemed`. Safe to retry: a retried call lands on the
/// already-redeemed row and reports the conflict instead of double
/// counting.
#[tracing::instrument(skip(store))]
pub async fn redeem(
    store: &dyn Store,
    code: &str,
    merchant_id: Uuid,
    now: DateTime<Utc>,
) -> Result<RedeemOutcome, StoreError> {
    let code = normalize_code(code);

    let coupon = match store.coupon_by_code(&code).await? {
        Some(c) => c,
        None => return Ok(RedeemOutcome::NotFound),
    };

    if coupon.merchant_id != merchant_id {
        tracing::warn!(code = %code, owner = %coupon.merchant_id, "Redeem attempt from wrong store");
        return Ok(RedeemOutcome::WrongMerchant);
    }

    match coupon.status {
        CouponStatus::Redeemed => {
            return Ok(RedeemOutcome::AlreadyRedeemed {
                redeemed_at: coupon.redeemed_at,
            })
        }
        CouponStatus::Expired => return Ok(RedeemOutcome::Expired),
        CouponStatus::Active if coupon.is_expired(now) => return Ok(RedeemOutcome::Expired),
        CouponStatus::Active => {}
    }

    let updated = match store.redeem_coupon(&code, merchant_id, now).await? {
        Some(c) => c,
        None => {
            // Lost the race between the precheck and the conditional write.
            tracing::info!(code = %code, "Redeem lost a concurrent race");
            let redeemed_at = store
                .coupon_by_code(&code)
                .await?
                .and_then(|c| c.redeemed_at);
            return Ok(RedeemOutcome::AlreadyRedeemed { redeemed_at });
        }
    };

    // Advisory counter: the coupon row is authoritative, a failed
    // statistics update never rolls the redemption back.
    if let Err(e) = store.increment_redemption_count(merchant_id).await {
        tracing::warn!(merchant_id = %merchant_id, error = %e, "Failed to bump redemption counter");
    }

    let customer = store
        .customer_by_id(updated.customer_id)
        .await?
        .ok_or(StoreError::Database(sqlx::Error::RowNotFound))?;

    tracing::info!(code = %code, merchant_id = %merchant_id, "Coupon redeemed");

    Ok(RedeemOutcome::Redeemed {
        coupon: updated,
        customer,
    })
}
