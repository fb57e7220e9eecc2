use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::services::pin_session::{SessionSigner, SessionTokenError, StaffSession};

/// Authentication error responses
#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    SessionExpired,
    MerchantMismatch,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "Authentication required. Please enter the store PIN.",
            ),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid session token."),
            AuthError::SessionExpired => (
                StatusCode::UNAUTHORIZED,
                "Session expired. Please enter the store PIN again.",
            ),
            AuthError::MerchantMismatch => (
                StatusCode::FORBIDDEN,
                "Session does not match the requested store.",
            ),
        };

        let body = Json(json!({
            "success": false,
            "message": message,
        }));

        (status, body).into_response()
    }
}

/// Extracts and verifies the staff session from the `Authorization: Bearer`
/// header. The verified claim is the authoritative merchant identity for
/// the request.
pub fn staff_session(
    signer: &SessionSigner,
    headers: &HeaderMap,
    now: DateTime<Utc>,
) -> Result<StaffSession, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidToken)?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidToken)?;

    match signer.verify(token, now) {
        Ok(session) => Ok(session),
        Err(SessionTokenError::Expired) => Err(AuthError::SessionExpired),
        Err(_) => Err(AuthError::InvalidToken),
    }
}
