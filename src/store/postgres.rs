use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{Store, StoreError};
use crate::models::{
    coupon::{Coupon, CouponStatus},
    customer::{CreateCustomerData, Customer},
    merchant::{CreateMerchantData, Merchant},
};

/// Production store backed by the relational database.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn merchant_by_slug(&self, slug: &str) -> Result<Option<Merchant>, StoreError> {
        let merchant = sqlx::query_as::<_, Merchant>(
            r#"
            SELECT * FROM merchants WHERE slug = $1
            "#,
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(merchant)
    }

    async fn merchant_by_id(&self, id: Uuid) -> Result<Option<Merchant>, StoreError> {
        let merchant = sqlx::query_as::<_, Merchant>(
            r#"
            SELECT * FROM merchants WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(merchant)
    }

    async fn insert_merchant(&self, data: CreateMerchantData) -> Result<Merchant, StoreError> {
        let merchant = sqlx::query_as::<_, Merchant>(
            r#"
            INSERT INTO merchants (slug, name, redeem_pin, timezone)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&data.slug)
        .bind(&data.name)
        .bind(&data.redeem_pin)
        .bind(&data.timezone)
        .fetch_one(&self.pool)
        .await?;

        Ok(merchant)
    }

    async fn increment_redemption_count(&self, merchant_id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE merchants
            SET redemption_count = redemption_count + 1, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(merchant_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_last_reminder_sent_at(
        &self,
        merchant_id: Uuid,
        sent_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE merchants
            SET last_reminder_sent_at = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(merchant_id)
        .bind(sent_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn customer_by_id(&self, id: Uuid) -> Result<Option<Customer>, StoreError> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            SELECT * FROM customers WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    async fn insert_customer(&self, data: CreateCustomerData) -> Result<Customer, StoreError> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (name, phone, email)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&data.name)
        .bind(&data.phone)
        .bind(&data.email)
        .fetch_one(&self.pool)
        .await?;

        Ok(customer)
    }

    async fn coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, StoreError> {
        let coupon = sqlx::query_as::<_, Coupon>(
            r#"
            SELECT * FROM coupons WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(coupon)
    }

    async fn insert_coupon(&self, coupon: &Coupon) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO coupons (
                id, code, merchant_id, customer_id, offer, status,
                authentication_token, created_at, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(coupon.id)
        .bind(&coupon.code)
        .bind(coupon.merchant_id)
        .bind(coupon.customer_id)
        .bind(&coupon.offer)
        .bind(coupon.status)
        .bind(&coupon.authentication_token)
        .bind(coupon.created_at)
        .bind(coupon.expires_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StoreError::DuplicateCode)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn redeem_coupon(
        &self,
        code: &str,
        merchant_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Coupon>, StoreError> {
        // Row-level compare-and-set: at most one concurrent caller gets the
        // updated row back, everyone else matches zero rows.
        let coupon = sqlx::query_as::<_, Coupon>(
            r#"
            UPDATE coupons
            SET status = $4, redeemed_at = $3
            WHERE code = $1 AND merchant_id = $2 AND status = $5 AND expires_at > $3
            RETURNING *
            "#,
        )
        .bind(code)
        .bind(merchant_id)
        .bind(now)
        .bind(CouponStatus::Redeemed)
        .bind(CouponStatus::Active)
        .fetch_optional(&self.pool)
        .await?;

        Ok(coupon)
    }

    async fn active_coupons_for_merchant(
        &self,
        merchant_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Coupon>, StoreError> {
        let coupons = sqlx::query_as::<_, Coupon>(
            r#"
            SELECT * FROM coupons
            WHERE merchant_id = $1 AND status = $3 AND expires_at > $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(merchant_id)
        .bind(now)
        .bind(CouponStatus::Active)
        .fetch_all(&self.pool)
        .await?;

        Ok(coupons)
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE coupons
            SET status = $2
            WHERE status = $3 AND expires_at <= $1
            "#,
        )
        .bind(now)
        .bind(CouponStatus::Expired)
        .bind(CouponStatus::Active)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
