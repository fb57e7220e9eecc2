use chrono::{DateTime, Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use sqlx::types::Json;
use uuid::Uuid;

use crate::models::{coupon::CouponStatus, Coupon, Offer};
use crate::store::{Store, StoreError};

// No 0/O or 1/I - codes get read out loud over store counters.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_GROUP_LEN: usize = 4;
const MAX_CODE_ATTEMPTS: usize = 5;
const AUTH_TOKEN_BYTES: usize = 16;

#[derive(thiserror::Error, Debug)]
pub enum ClaimError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("could not allocate a unique coupon code")]
    CodeSpaceContention,

    #[error("system random generator unavailable")]
    Rng,
}

#[derive(Debug, Clone)]
pub struct ClaimRequest {
    pub merchant_id: Uuid,
    pub customer_id: Uuid,
    pub offer: Offer,
    pub valid_days: i64,
}

/// Issues a coupon to a customer: allocates a unique display code and an
/// authentication token, snapshots the offer and stores the row. Called by
/// the landing-page claim flow.
pub async fn claim(
    store: &dyn Store,
    request: ClaimRequest,
    now: DateTime<Utc>,
) -> Result<Coupon, ClaimError> {
    let rng = SystemRandom::new();

    for attempt in 1..=MAX_CODE_ATTEMPTS {
        let coupon = Coupon {
            id: Uuid::new_v4(),
            code: generate_code(&rng)?,
            merchant_id: request.merchant_id,
            customer_id: request.customer_id,
            offer: Json(request.offer.clone()),
            status: CouponStatus::Active,
            authentication_token: generate_auth_token(&rng)?,
            created_at: now,
            expires_at: now + Duration::days(request.valid_days),
            redeemed_at: None,
        };

        match store.insert_coupon(&coupon).await {
            Ok(()) => {
                tracing::info!(
                    code = %coupon.code,
                    merchant_id = %coupon.merchant_id,
                    "Coupon claimed"
                );
                return Ok(coupon);
            }
            Err(StoreError::DuplicateCode) => {
                tracing::debug!(attempt, "Coupon code collision, regenerating");
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(ClaimError::CodeSpaceContention)
}

/// Display code in `XXXX-XXXX` form over the ambiguity-free alphabet.
fn generate_code(rng: &SystemRandom) -> Result<String, ClaimError> {
    let mut bytes = [0u8; CODE_GROUP_LEN * 2];
    rng.fill(&mut bytes).map_err(|_| ClaimError::Rng)?;

    let mut code = String::with_capacity(CODE_GROUP_LEN * 2 + 1);
    for (i, byte) in bytes.iter().enumerate() {
        if i == CODE_GROUP_LEN {
            code.push('-');
        }
        code.push(CODE_ALPHABET[*byte as usize % CODE_ALPHABET.len()] as char);
    }
    Ok(code)
}

fn generate_auth_token(rng: &SystemRandom) -> Result<String, ClaimError> {
    let mut bytes = [0u8; AUTH_TOKEN_BYTES];
    rng.fill(&mut bytes).map_err(|_| ClaimError::Rng)?;
    Ok(hex::encode(bytes))
}
