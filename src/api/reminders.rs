use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::api::middleware::auth::{staff_session, AuthError};
use crate::api::middleware::session::AppState;
use crate::error::AppError;
use crate::services::reminders::{self, CampaignOutcome};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRemindersRequest {
    /// Optional on the staff path (the session supplies it); required on
    /// the admin override path.
    pub merchant_id: Option<Uuid>,
}

const ADMIN_KEY_HEADER: &str = "x-admin-key";

fn admin_key_matches(state: &AppState, headers: &HeaderMap) -> bool {
    let Some(expected) = state.admin_api_key.as_ref() else {
        return false;
    };
    let Some(supplied) = headers.get(ADMIN_KEY_HEADER).and_then(|v| v.to_str().ok()) else {
        return false;
    };

    ring::constant_time::verify_slices_are_equal(
        expected.expose_secret().as_bytes(),
        supplied.as_bytes(),
    )
    .is_ok()
}

fn campaign_response(outcome: CampaignOutcome) -> Response {
    match outcome {
        CampaignOutcome::Dispatched { delivered, failed } => Json(json!({
            "success": true,
            "delivered": delivered,
            "failed": failed,
        }))
        .into_response(),
        CampaignOutcome::CooldownActive { remaining_hours } => Json(json!({
            "success": false,
            "message": format!(
                "A reminder campaign was already sent recently. Try again in {} hour(s).",
                remaining_hours
            ),
            "errorCode": "COOLDOWN_ACTIVE",
            "remainingHours": remaining_hours,
        }))
        .into_response(),
        CampaignOutcome::MerchantNotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "message": "Merchant not found.",
            })),
        )
            .into_response(),
    }
}

/// Triggers a bulk reminder campaign for the session's merchant, gated by
/// the 24-hour cooldown. Support staff presenting the admin key and an
/// explicit merchant id go through the override path instead, which skips
/// the guard.
async fn trigger_reminders(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<TriggerRemindersRequest>,
) -> Result<Response, AppError> {
    let now = Utc::now();

    if let Some(merchant_id) = request.merchant_id {
        if admin_key_matches(&state, &headers) {
            let outcome = reminders::send_campaign_unguarded(
                state.store.as_ref(),
                state.notifier.as_ref(),
                merchant_id,
                now,
            )
            .await?;
            return Ok(campaign_response(outcome));
        }
    }

    let session = match staff_session(&state.signer, &headers, now) {
        Ok(s) => s,
        Err(e) => return Ok(e.into_response()),
    };
    if let Some(claimed) = request.merchant_id {
        if claimed != session.merchant_id {
            return Ok(AuthError::MerchantMismatch.into_response());
        }
    }

    let outcome = reminders::send_campaign(
        state.store.as_ref(),
        state.notifier.as_ref(),
        session.merchant_id,
        now,
    )
    .await?;

    Ok(campaign_response(outcome))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/reminders", post(trigger_reminders))
}
