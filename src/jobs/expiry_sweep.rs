use chrono::Utc;

use crate::store::{Store, StoreError};

/// Background job that persists `expired` on coupons whose window has
/// passed while their stored status still says `active`.
///
/// Read paths derive expiry from `expires_at` on their own; this sweep
/// only keeps the status column usable for indexed "active coupons"
/// queries as volume grows.
pub async fn sweep_expired_coupons(store: &dyn Store) -> Result<u64, StoreError> {
    let swept = store.sweep_expired(Utc::now()).await?;

    if swept > 0 {
        tracing::info!(swept, "Expiry sweep marked coupons expired");
    } else {
        tracing::debug!("Expiry sweep found nothing to do");
    }

    Ok(swept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::coupon::CouponStatus;
    use crate::models::{Coupon, Offer};
    use crate::store::MemoryStore;
    use chrono::Duration;
    use sqlx::types::Json;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let store = MemoryStore::new();
        store
            .insert_coupon(&Coupon {
                id: Uuid::new_v4(),
                code: "OLDC-0001".to_string(),
                merchant_id: Uuid::new_v4(),
                customer_id: Uuid::new_v4(),
                offer: Json(Offer::Custom {
                    title: "Expired long ago".to_string(),
                    details: None,
                }),
                status: CouponStatus::Active,
                authentication_token: "tok".to_string(),
                created_at: Utc::now() - Duration::days(60),
                expires_at: Utc::now() - Duration::days(30),
                redeemed_at: None,
            })
            .await
            .unwrap();

        assert_eq!(sweep_expired_coupons(&store).await.unwrap(), 1);
        assert_eq!(sweep_expired_coupons(&store).await.unwrap(), 0);
    }
}
