use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::api::middleware::auth::{staff_session, AuthError};
use crate::api::middleware::session::AppState;
use crate::error::AppError;
use crate::services::coupon_verifier::{self, VerifyOutcome};
use crate::services::pin_session;
use crate::services::redemption::{self, RedeemOutcome};

// Request/Response types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPinRequest {
    pub merchant_slug: String,
    pub pin: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPinResponse {
    pub success: bool,
    pub merchant_id: Uuid,
    pub merchant_name: String,
    pub timezone: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponActionRequest {
    pub coupon_code: String,
    pub merchant_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedCouponPayload {
    pub name: String,
    pub customer_name: String,
    pub customer_phone: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemedCouponPayload {
    pub code: String,
    pub offer: String,
    pub customer: String,
    pub redeemed_at: DateTime<Utc>,
}

// Business outcomes are expected results rendered verbatim to staff, so
// they travel as HTTP 200 with `success: false`; only auth and storage
// failures use error statuses.
fn business_failure(message: String, error_code: &'static str) -> Response {
    Json(json!({
        "success": false,
        "message": message,
        "errorCode": error_code,
    }))
    .into_response()
}

fn already_redeemed_message(redeemed_at: Option<DateTime<Utc>>) -> String {
    match redeemed_at {
        Some(at) => format!(
            "This coupon was already redeemed on {}.",
            at.format("%Y-%m-%d %H:%M UTC")
        ),
        None => "This coupon was already redeemed.".to_string(),
    }
}

// Handlers

/// Staff login: exchanges a merchant slug + PIN for a signed session
/// token. Slug-not-found and wrong-PIN are indistinguishable on the wire.
async fn verify_pin(
    State(state): State<AppState>,
    Json(request): Json<VerifyPinRequest>,
) -> Result<Response, AppError> {
    let now = Utc::now();

    let session = match pin_session::authenticate(
        state.store.as_ref(),
        &request.merchant_slug,
        &request.pin,
        now,
    )
    .await?
    {
        Some(s) => s,
        None => {
            let body = Json(json!({
                "success": false,
                "message": "Invalid store or PIN.",
            }));
            return Ok((StatusCode::UNAUTHORIZED, body).into_response());
        }
    };

    let token = state
        .signer
        .issue(&session)
        .map_err(|e| AppError::Internal(e.into()))?;

    Ok(Json(VerifyPinResponse {
        success: true,
        merchant_id: session.merchant_id,
        merchant_name: session.merchant_name,
        timezone: session.timezone,
        token,
    })
    .into_response())
}

/// Advisory verification: no writes, staff see the customer payload and
/// decide whether to confirm.
async fn verify_coupon(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CouponActionRequest>,
) -> Result<Response, AppError> {
    let now = Utc::now();

    let session = match staff_session(&state.signer, &headers, now) {
        Ok(s) => s,
        Err(e) => return Ok(e.into_response()),
    };
    // The token claim is authoritative; the body field exists for wire
    // compatibility and must agree with it.
    if request.merchant_id != session.merchant_id {
        return Ok(AuthError::MerchantMismatch.into_response());
    }

    let outcome = coupon_verifier::verify(
        state.store.as_ref(),
        &request.coupon_code,
        session.merchant_id,
        now,
    )
    .await?;

    let response = match outcome {
        VerifyOutcome::Verified { coupon, customer } => Json(json!({
            "success": true,
            "coupon": VerifiedCouponPayload {
                name: coupon.offer.title().to_string(),
                customer_name: customer.name,
                customer_phone: customer.phone,
            },
        }))
        .into_response(),
        VerifyOutcome::NotFound => {
            business_failure("Coupon code not found.".to_string(), "COUPON_NOT_FOUND")
        }
        VerifyOutcome::WrongMerchant => business_failure(
            "This coupon does not belong to this store.".to_string(),
            "WRONG_MERCHANT",
        ),
        VerifyOutcome::AlreadyRedeemed { redeemed_at } => {
            business_failure(already_redeemed_message(redeemed_at), "ALREADY_REDEEMED")
        }
        VerifyOutcome::Expired => {
            business_failure("This coupon has expired.".to_string(), "EXPIRED")
        }
    };

    Ok(response)
}

/// The commit step of the two-phase protocol.
async fn redeem(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CouponActionRequest>,
) -> Result<Response, AppError> {
    let now = Utc::now();

    let session = match staff_session(&state.signer, &headers, now) {
        Ok(s) => s,
        Err(e) => return Ok(e.into_response()),
    };
    if request.merchant_id != session.merchant_id {
        return Ok(AuthError::MerchantMismatch.into_response());
    }

    let outcome = redemption::redeem(
        state.store.as_ref(),
        &request.coupon_code,
        session.merchant_id,
        now,
    )
    .await?;

    let response = match outcome {
        RedeemOutcome::Redeemed { coupon, customer } => {
            let redeemed_at = coupon.redeemed_at.unwrap_or(now);
            Json(json!({
                "success": true,
                "coupon": RedeemedCouponPayload {
                    code: coupon.code,
                    offer: coupon.offer.title().to_string(),
                    customer: customer.name,
                    redeemed_at,
                },
            }))
            .into_response()
        }
        RedeemOutcome::NotFound => {
            business_failure("Coupon code not found.".to_string(), "COUPON_NOT_FOUND")
        }
        RedeemOutcome::WrongMerchant => business_failure(
            "This coupon does not belong to this store.".to_string(),
            "WRONG_MERCHANT",
        ),
        RedeemOutcome::AlreadyRedeemed { redeemed_at } => {
            business_failure(already_redeemed_message(redeemed_at), "ALREADY_REDEEMED")
        }
        RedeemOutcome::Expired => {
            business_failure("This coupon has expired.".to_string(), "EXPIRED")
        }
    };

    Ok(response)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/verify-pin", post(verify_pin))
        .route("/verify-coupon", post(verify_coupon))
        .route("/redeem", post(redeem))
}
