use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{Store, StoreError};
use crate::models::{
    coupon::{Coupon, CouponStatus},
    customer::{CreateCustomerData, Customer},
    merchant::{CreateMerchantData, Merchant},
};

/// In-process store used by the test suite and local development.
///
/// The redeem path holds the map lock across check-and-update, giving the
/// same at-most-once guarantee the relational store gets from its
/// conditional UPDATE.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    merchants: HashMap<Uuid, Merchant>,
    customers: HashMap<Uuid, Customer>,
    coupons: HashMap<String, Coupon>, // keyed by canonical code
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn merchant_by_slug(&self, slug: &str) -> Result<Option<Merchant>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.merchants.values().find(|m| m.slug == slug).cloned())
    }

    async fn merchant_by_id(&self, id: Uuid) -> Result<Option<Merchant>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.merchants.get(&id).cloned())
    }

    async fn insert_merchant(&self, data: CreateMerchantData) -> Result<Merchant, StoreError> {
        let now = Utc::now();
        let merchant = Merchant {
            id: Uuid::new_v4(),
            slug: data.slug,
            name: data.name,
            redeem_pin: data.redeem_pin,
            timezone: data.timezone,
            is_active: true,
            redemption_count: 0,
            last_reminder_sent_at: None,
            created_at: now,
            updated_at: now,
        };

        let mut inner = self.inner.lock().unwrap();
        inner.merchants.insert(merchant.id, merchant.clone());
        Ok(merchant)
    }

    async fn increment_redemption_count(&self, merchant_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(merchant) = inner.merchants.get_mut(&merchant_id) {
            merchant.redemption_count += 1;
            merchant.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_last_reminder_sent_at(
        &self,
        merchant_id: Uuid,
        sent_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(merchant) = inner.merchants.get_mut(&merchant_id) {
            merchant.last_reminder_sent_at = Some(sent_at);
            merchant.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn customer_by_id(&self, id: Uuid) -> Result<Option<Customer>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.customers.get(&id).cloned())
    }

    async fn insert_customer(&self, data: CreateCustomerData) -> Result<Customer, StoreError> {
        let customer = Customer {
            id: Uuid::new_v4(),
            name: data.name,
            phone: data.phone,
            email: data.email,
            created_at: Utc::now(),
        };

        let mut inner = self.inner.lock().unwrap();
        inner.customers.insert(customer.id, customer.clone());
        Ok(customer)
    }

    async fn coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.coupons.get(code).cloned())
    }

    async fn insert_coupon(&self, coupon: &Coupon) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.coupons.contains_key(&coupon.code) {
            return Err(StoreError::DuplicateCode);
        }
        inner.coupons.insert(coupon.code.clone(), coupon.clone());
        Ok(())
    }

    async fn redeem_coupon(
        &self,
        code: &str,
        merchant_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Coupon>, StoreError> {
        let mut inner = self.inner.lock().unwrap();

        let Some(coupon) = inner.coupons.get_mut(code) else {
            return Ok(None);
        };

        if coupon.merchant_id != merchant_id
            || coupon.status != CouponStatus::Active
            || coupon.expires_at <= now
        {
            return Ok(None);
        }

        coupon.status = CouponStatus::Redeemed;
        coupon.redeemed_at = Some(now);
        Ok(Some(coupon.clone()))
    }

    async fn active_coupons_for_merchant(
        &self,
        merchant_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Coupon>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut coupons: Vec<Coupon> = inner
            .coupons
            .values()
            .filter(|c| {
                c.merchant_id == merchant_id
                    && c.status == CouponStatus::Active
                    && c.expires_at > now
            })
            .cloned()
            .collect();
        coupons.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(coupons)
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let mut swept = 0;
        for coupon in inner.coupons.values_mut() {
            if coupon.status == CouponStatus::Active && coupon.expires_at <= now {
                coupon.status = CouponStatus::Expired;
                swept += 1;
            }
        }
        Ok(swept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::offer::Offer;
    use chrono::Duration;
    use sqlx::types::Json;

    fn coupon(merchant_id: Uuid, code: &str, expires_at: DateTime<Utc>) -> Coupon {
        Coupon {
            id: Uuid::new_v4(),
            code: code.to_string(),
            merchant_id,
            customer_id: Uuid::new_v4(),
            offer: Json(Offer::Custom {
                title: "Free appetizer".to_string(),
                details: None,
            }),
            status: CouponStatus::Active,
            authentication_token: "tok".to_string(),
            created_at: Utc::now(),
            expires_at,
            redeemed_at: None,
        }
    }

    #[tokio::test]
    async fn test_redeem_is_conditional_on_status() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let merchant_id = Uuid::new_v4();
        store
            .insert_coupon(&coupon(merchant_id, "AAAA-1111", now + Duration::days(7)))
            .await
            .unwrap();

        let first = store.redeem_coupon("AAAA-1111", merchant_id, now).await.unwrap();
        assert!(first.is_some());
        assert_eq!(first.unwrap().redeemed_at, Some(now));

        let second = store.redeem_coupon("AAAA-1111", merchant_id, now).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_redeem_refuses_other_merchants_and_expired_rows() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let merchant_id = Uuid::new_v4();
        store
            .insert_coupon(&coupon(merchant_id, "BBBB-2222", now + Duration::days(7)))
            .await
            .unwrap();
        store
            .insert_coupon(&coupon(merchant_id, "CCCC-3333", now - Duration::hours(1)))
            .await
            .unwrap();

        let other = store.redeem_coupon("BBBB-2222", Uuid::new_v4(), now).await.unwrap();
        assert!(other.is_none());

        let expired = store.redeem_coupon("CCCC-3333", merchant_id, now).await.unwrap();
        assert!(expired.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_code_is_rejected() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let c = coupon(Uuid::new_v4(), "DDDD-4444", now + Duration::days(1));
        store.insert_coupon(&c).await.unwrap();

        let result = store.insert_coupon(&c).await;
        assert!(matches!(result, Err(StoreError::DuplicateCode)));
    }

    #[tokio::test]
    async fn test_sweep_marks_only_past_active_rows() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let merchant_id = Uuid::new_v4();
        store
            .insert_coupon(&coupon(merchant_id, "EEEE-5555", now - Duration::hours(2)))
            .await
            .unwrap();
        store
            .insert_coupon(&coupon(merchant_id, "FFFF-6666", now + Duration::hours(2)))
            .await
            .unwrap();

        let swept = store.sweep_expired(now).await.unwrap();
        assert_eq!(swept, 1);

        let stale = store.coupon_by_code("EEEE-5555").await.unwrap().unwrap();
        assert_eq!(stale.status, CouponStatus::Expired);
        let live = store.coupon_by_code("FFFF-6666").await.unwrap().unwrap();
        assert_eq!(live.status, CouponStatus::Active);
    }
}
