use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{coupon::normalize_code, Coupon, CouponStatus, Customer};
use crate::store::{Store, StoreError};

/// Outcome of the advisory verification step.
///
/// Everything but `Verified` is an expected business outcome rendered
/// verbatim to staff, not an error.
#[derive(Debug, Clone)]
pub enum VerifyOutcome {
    Verified { coupon: Coupon, customer: Customer },
    NotFound,
    WrongMerchant,
    AlreadyRedeemed { redeemed_at: Option<DateTime<Utc>> },
    Expired,
}

impl VerifyOutcome {
    /// Wire-level error code, `None` on success.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            VerifyOutcome::Verified { .. } => None,
            VerifyOutcome::NotFound => Some("COUPON_NOT_FOUND"),
            VerifyOutcome::WrongMerchant => Some("WRONG_MERCHANT"),
            VerifyOutcome::AlreadyRedeemed { .. } => Some("ALREADY_REDEEMED"),
            VerifyOutcome::Expired => Some("EXPIRED"),
        }
    }
}

/// Read-only lookup and validation of a code against the session's
/// merchant. Performs no writes; a confirmation screen sits between this
/// and the redeem call so staff can abort.
#[tracing::instrument(skip(store))]
pub async fn verify(
    store: &dyn Store,
    code: &str,
    merchant_id: Uuid,
    now: DateTime<Utc>,
) -> Result<VerifyOutcome, StoreError> {
    let code = normalize_code(code);

    let coupon = match store.coupon_by_code(&code).await? {
        Some(c) => c,
        None => {
            tracing::info!(code = %code, "Coupon not found");
            return Ok(VerifyOutcome::NotFound);
        }
    };

    // Ownership check comes first: no customer detail may cross store
    // boundaries, whatever the coupon's state.
    if coupon.merchant_id != merchant_id {
        tracing::warn!(code = %code, owner = %coupon.merchant_id, "Coupon presented at wrong store");
        return Ok(VerifyOutcome::WrongMerchant);
    }

    match coupon.status {
        CouponStatus::Redeemed => {
            tracing::info!(code = %code, redeemed_at = ?coupon.redeemed_at, "Coupon already redeemed");
            Ok(VerifyOutcome::AlreadyRedeemed {
                redeemed_at: coupon.redeemed_at,
            })
        }
        CouponStatus::Expired => Ok(VerifyOutcome::Expired),
        CouponStatus::Active if coupon.is_expired(now) => {
            tracing::info!(code = %code, expires_at = %coupon.expires_at, "Coupon expired");
            Ok(VerifyOutcome::Expired)
        }
        CouponStatus::Active => {
            let customer = store
                .customer_by_id(coupon.customer_id)
                .await?
                .ok_or(StoreError::Database(sqlx::Error::RowNotFound))?;

            tracing::info!(code = %code, "Coupon verified");
            Ok(VerifyOutcome::Verified { coupon, customer })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::coupon::CouponStatus;
    use crate::models::customer::CreateCustomerData;
    use crate::models::merchant::CreateMerchantData;
    use crate::models::Offer;
    use crate::store::MemoryStore;
    use chrono::Duration;
    use sqlx::types::Json;

    struct Fixture {
        store: MemoryStore,
        merchant_id: Uuid,
        other_merchant_id: Uuid,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let merchant = store
            .insert_merchant(CreateMerchantData {
                slug: "bdragon-house".to_string(),
                name: "B. Dragon House".to_string(),
                redeem_pin: "4821".to_string(),
                timezone: "America/New_York".to_string(),
            })
            .await
            .unwrap();
        let other = store
            .insert_merchant(CreateMerchantData {
                slug: "hot-pot-757".to_string(),
                name: "Hot Pot 757".to_string(),
                redeem_pin: "9155".to_string(),
                timezone: "America/New_York".to_string(),
            })
            .await
            .unwrap();
        Fixture {
            store,
            merchant_id: merchant.id,
            other_merchant_id: other.id,
        }
    }

    async fn seed_coupon(
        fixture: &Fixture,
        code: &str,
        status: CouponStatus,
        expires_at: DateTime<Utc>,
        redeemed_at: Option<DateTime<Utc>>,
    ) {
        let customer = fixture
            .store
            .insert_customer(CreateCustomerData {
                name: "Pat Nguyen".to_string(),
                phone: Some("+1-757-555-0142".to_string()),
                email: None,
            })
            .await
            .unwrap();

        fixture
            .store
            .insert_coupon(&Coupon {
                id: Uuid::new_v4(),
                code: code.to_string(),
                merchant_id: fixture.merchant_id,
                customer_id: customer.id,
                offer: Json(Offer::PercentOff {
                    title: "20% off dinner".to_string(),
                    percent: 20,
                }),
                status,
                authentication_token: "tok".to_string(),
                created_at: Utc::now() - Duration::days(1),
                expires_at,
                redeemed_at,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_verify_success_returns_customer_payload() {
        let f = fixture().await;
        let now = Utc::now();
        seed_coupon(&f, "BDRA-A7K9", CouponStatus::Active, now + Duration::days(7), None).await;

        let outcome = verify(&f.store, "bdra-a7k9", f.merchant_id, now).await.unwrap();
        match outcome {
            VerifyOutcome::Verified { coupon, customer } => {
                assert_eq!(coupon.code, "BDRA-A7K9");
                assert_eq!(coupon.offer.title(), "20% off dinner");
                assert_eq!(customer.name, "Pat Nguyen");
                assert_eq!(customer.phone.as_deref(), Some("+1-757-555-0142"));
            }
            other => panic!("expected Verified, got {:?}", other.error_code()),
        }
    }

    #[tokio::test]
    async fn test_verify_is_idempotent() {
        let f = fixture().await;
        let now = Utc::now();
        seed_coupon(&f, "BDRA-A7K9", CouponStatus::Active, now + Duration::days(7), None).await;

        for _ in 0..3 {
            let outcome = verify(&f.store, "BDRA-A7K9", f.merchant_id, now).await.unwrap();
            assert!(outcome.error_code().is_none());
        }

        // No state mutation observable through the store
        let coupon = f.store.coupon_by_code("BDRA-A7K9").await.unwrap().unwrap();
        assert_eq!(coupon.status, CouponStatus::Active);
        assert!(coupon.redeemed_at.is_none());
    }

    #[tokio::test]
    async fn test_unknown_code_is_not_found() {
        let f = fixture().await;
        let outcome = verify(&f.store, "ZZZZ-0000", f.merchant_id, Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome.error_code(), Some("COUPON_NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_cross_merchant_is_rejected_regardless_of_status() {
        let f = fixture().await;
        let now = Utc::now();
        seed_coupon(&f, "BDRA-A7K9", CouponStatus::Active, now + Duration::days(7), None).await;
        seed_coupon(
            &f,
            "BDRA-USED",
            CouponStatus::Redeemed,
            now + Duration::days(7),
            Some(now - Duration::hours(2)),
        )
        .await;
        seed_coupon(&f, "BDRA-GONE", CouponStatus::Active, now - Duration::hours(1), None).await;

        for code in ["BDRA-A7K9", "BDRA-USED", "BDRA-GONE"] {
            let outcome = verify(&f.store, code, f.other_merchant_id, now).await.unwrap();
            assert_eq!(outcome.error_code(), Some("WRONG_MERCHANT"), "code {code}");
        }
    }

    #[tokio::test]
    async fn test_redeemed_coupon_reports_original_timestamp() {
        let f = fixture().await;
        let now = Utc::now();
        let redeemed_at = now - Duration::hours(3);
        seed_coupon(
            &f,
            "BDRA-USED",
            CouponStatus::Redeemed,
            now + Duration::days(7),
            Some(redeemed_at),
        )
        .await;

        let outcome = verify(&f.store, "BDRA-USED", f.merchant_id, now).await.unwrap();
        match outcome {
            VerifyOutcome::AlreadyRedeemed { redeemed_at: at } => {
                assert_eq!(at, Some(redeemed_at));
            }
            other => panic!("expected AlreadyRedeemed, got {:?}", other.error_code()),
        }
    }

    #[tokio::test]
    async fn test_expired_but_still_active_row_reports_expired() {
        let f = fixture().await;
        let now = Utc::now();
        seed_coupon(&f, "BDRA-GONE", CouponStatus::Active, now - Duration::minutes(5), None).await;

        let outcome = verify(&f.store, "BDRA-GONE", f.merchant_id, now).await.unwrap();
        assert_eq!(outcome.error_code(), Some("EXPIRED"));
    }

    #[tokio::test]
    async fn test_swept_expired_status_reports_expired() {
        let f = fixture().await;
        let now = Utc::now();
        seed_coupon(&f, "BDRA-GONE", CouponStatus::Expired, now - Duration::days(2), None).await;

        let outcome = verify(&f.store, "BDRA-GONE", f.merchant_id, now).await.unwrap();
        assert_eq!(outcome.error_code(), Some("EXPIRED"));
    }
}
