// Store module - injected persistence seam
//
// Components receive a store handle explicitly instead of reaching for a
// process-wide client, so the redemption protocol can be exercised against
// an in-process fake.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    coupon::Coupon,
    customer::{CreateCustomerData, Customer},
    merchant::{CreateMerchantData, Merchant},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("coupon code already exists")]
    DuplicateCode,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn merchant_by_slug(&self, slug: &str) -> Result<Option<Merchant>, StoreError>;

    async fn merchant_by_id(&self, id: Uuid) -> Result<Option<Merchant>, StoreError>;

    async fn insert_merchant(&self, data: CreateMerchantData) -> Result<Merchant, StoreError>;

    /// Advisory statistics counter. Callers treat a failure here as
    /// non-fatal; the coupon row is the authoritative record.
    async fn increment_redemption_count(&self, merchant_id: Uuid) -> Result<(), StoreError>;

    async fn set_last_reminder_sent_at(
        &self,
        merchant_id: Uuid,
        sent_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn customer_by_id(&self, id: Uuid) -> Result<Option<Customer>, StoreError>;

    async fn insert_customer(&self, data: CreateCustomerData) -> Result<Customer, StoreError>;

    /// Lookup by canonical (uppercase) code.
    async fn coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, StoreError>;

    async fn insert_coupon(&self, coupon: &Coupon) -> Result<(), StoreError>;

    /// The one conditional write in the system: transitions the coupon to
    /// `redeemed` only while it is still `active`, owned by `merchant_id`
    /// and not past `expires_at`, all in a single statement. Returns the
    /// updated row, or `None` when no row matched - the caller lost the
    /// race or the preconditions no longer hold.
    async fn redeem_coupon(
        &self,
        code: &str,
        merchant_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Coupon>, StoreError>;

    /// Unredeemed, unexpired coupons of a merchant (reminder campaign
    /// targets).
    async fn active_coupons_for_merchant(
        &self,
        merchant_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Coupon>, StoreError>;

    /// Persists `expired` for stored-`active` rows whose window has
    /// passed. Indexing optimization only - read paths derive expiry from
    /// `expires_at` regardless.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}
