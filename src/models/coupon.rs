use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::offer::Offer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CouponStatus {
    Active,
    Redeemed,
    Expired,
}

impl CouponStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponStatus::Active => "active",
            CouponStatus::Redeemed => "redeemed",
            CouponStatus::Expired => "expired",
        }
    }

    fn parse(s: &str) -> Result<Self, String> {
        match s {
            "active" => Ok(CouponStatus::Active),
            "redeemed" => Ok(CouponStatus::Redeemed),
            "expired" => Ok(CouponStatus::Expired),
            other => Err(format!("unknown coupon status: {other}")),
        }
    }
}

// Stored as TEXT, delegating to the string codecs.

impl sqlx::Type<sqlx::Postgres> for CouponStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <&str as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <&str as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for CouponStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Self::parse(s).map_err(Into::into)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for CouponStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <String as sqlx::Encode<'q, sqlx::Postgres>>::encode_by_ref(&self.as_str().to_string(), buf)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String, // stored uppercase, globally unique
    pub merchant_id: Uuid,
    pub customer_id: Uuid,
    pub offer: Json<Offer>,
    pub status: CouponStatus,
    pub authentication_token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub redeemed_at: Option<DateTime<Utc>>,
}

impl Coupon {
    /// Read-time expiry: the stored status may still say `active` for a
    /// coupon whose window has passed, so callers must check this, never
    /// the status column alone.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Canonical form used for lookups: codes are displayed and entered in
/// uppercase by convention.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}
