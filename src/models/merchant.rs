use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Merchant {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub redeem_pin: String,
    pub timezone: String, // IANA zone, e.g. "America/New_York"
    pub is_active: bool,
    pub redemption_count: i64,
    pub last_reminder_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateMerchantData {
    pub slug: String,
    pub name: String,
    pub redeem_pin: String,
    pub timezone: String,
}
