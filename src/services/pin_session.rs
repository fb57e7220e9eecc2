use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use ring::hmac;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{Store, StoreError};

/// Staff sessions stay valid for 8 hours after the PIN check.
pub const SESSION_TTL_HOURS: i64 = 8;

/// The authenticated context a staff device carries between calls.
///
/// Nothing is persisted server-side: the descriptor travels as a signed
/// bearer token and every verify/redeem call derives the merchant from the
/// verified claim, never from a client-supplied field alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffSession {
    pub merchant_id: Uuid,
    pub merchant_name: String,
    pub timezone: String,
    pub issued_at: DateTime<Utc>,
}

impl StaffSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.issued_at >= Duration::hours(SESSION_TTL_HOURS)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SessionTokenError {
    #[error("malformed session token")]
    Malformed,

    #[error("session token signature mismatch")]
    BadSignature,

    #[error("session expired, please enter the PIN again")]
    Expired,
}

/// Signs and verifies staff session tokens.
///
/// Token format: `base64url(claim JSON) . hex(HMAC-SHA256 over the encoded
/// claim)`.
pub struct SessionSigner {
    key: hmac::Key,
}

impl SessionSigner {
    pub fn new(secret: &Secret<String>) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret.expose_secret().as_bytes()),
        }
    }

    pub fn issue(&self, session: &StaffSession) -> Result<String, serde_json::Error> {
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(session)?);
        let signature = hmac::sign(&self.key, payload.as_bytes());
        Ok(format!("{}.{}", payload, hex::encode(signature.as_ref())))
    }

    pub fn verify(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<StaffSession, SessionTokenError> {
        let (payload, signature_hex) = token
            .split_once('.')
            .ok_or(SessionTokenError::Malformed)?;

        let signature = hex::decode(signature_hex).map_err(|_| SessionTokenError::Malformed)?;

        // ring's verify is constant-time
        hmac::verify(&self.key, payload.as_bytes(), &signature)
            .map_err(|_| SessionTokenError::BadSignature)?;

        let claim = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| SessionTokenError::Malformed)?;
        let session: StaffSession =
            serde_json::from_slice(&claim).map_err(|_| SessionTokenError::Malformed)?;

        if session.is_expired(now) {
            return Err(SessionTokenError::Expired);
        }

        Ok(session)
    }
}

/// Validates a staff-entered PIN against the merchant record.
///
/// Returns `None` for unknown slug, inactive merchant and wrong PIN alike;
/// the caller surfaces a single `InvalidPin` message so slugs cannot be
/// enumerated. No side effects, safe to retry.
#[tracing::instrument(skip(store, pin))]
pub async fn authenticate(
    store: &dyn Store,
    merchant_slug: &str,
    pin: &str,
    now: DateTime<Utc>,
) -> Result<Option<StaffSession>, StoreError> {
    let slug = merchant_slug.trim().to_ascii_lowercase();
    let pin = pin.trim();

    if pin.is_empty() {
        return Ok(None);
    }

    let merchant = match store.merchant_by_slug(&slug).await? {
        Some(m) => m,
        None => {
            tracing::info!(slug = %slug, "PIN check against unknown merchant");
            return Ok(None);
        }
    };

    if !merchant.is_active {
        tracing::warn!(merchant_id = %merchant.id, "PIN check against inactive merchant");
        return Ok(None);
    }

    if !pin_matches(merchant.redeem_pin.trim(), pin) {
        tracing::info!(merchant_id = %merchant.id, "Wrong PIN");
        return Ok(None);
    }

    tracing::info!(merchant_id = %merchant.id, "Staff session issued");

    Ok(Some(StaffSession {
        merchant_id: merchant.id,
        merchant_name: merchant.name,
        timezone: merchant.timezone,
        issued_at: now,
    }))
}

fn pin_matches(expected: &str, supplied: &str) -> bool {
    ring::constant_time::verify_slices_are_equal(expected.as_bytes(), supplied.as_bytes()).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::merchant::CreateMerchantData;
    use crate::store::MemoryStore;

    fn signer() -> SessionSigner {
        SessionSigner::new(&Secret::new("test-session-secret".to_string()))
    }

    fn session(now: DateTime<Utc>) -> StaffSession {
        StaffSession {
            merchant_id: Uuid::new_v4(),
            merchant_name: "B. Dragon House".to_string(),
            timezone: "America/New_York".to_string(),
            issued_at: now,
        }
    }

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_merchant(CreateMerchantData {
                slug: "bdragon-house".to_string(),
                name: "B. Dragon House".to_string(),
                redeem_pin: "4821".to_string(),
                timezone: "America/New_York".to_string(),
            })
            .await
            .unwrap();
        store
    }

    #[test]
    fn test_token_roundtrip() {
        let signer = signer();
        let now = Utc::now();
        let session = session(now);

        let token = signer.issue(&session).unwrap();
        let verified = signer.verify(&token, now + Duration::hours(1)).unwrap();

        assert_eq!(verified.merchant_id, session.merchant_id);
        assert_eq!(verified.merchant_name, session.merchant_name);
        assert_eq!(verified.issued_at, session.issued_at);
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let signer = signer();
        let now = Utc::now();
        let token = signer.issue(&session(now)).unwrap();

        // Flip a character inside the payload portion
        let mut chars: Vec<char> = token.chars().collect();
        chars[3] = if chars[3] == 'A' { 'B' } else { 'A' };
        let tampered: String = chars.into_iter().collect();

        let result = signer.verify(&tampered, now);
        assert!(matches!(
            result,
            Err(SessionTokenError::BadSignature) | Err(SessionTokenError::Malformed)
        ));
    }

    #[test]
    fn test_foreign_key_signature_is_rejected() {
        let now = Utc::now();
        let token = signer().issue(&session(now)).unwrap();

        let other = SessionSigner::new(&Secret::new("different-secret".to_string()));
        assert!(matches!(
            other.verify(&token, now),
            Err(SessionTokenError::BadSignature)
        ));
    }

    #[test]
    fn test_session_expires_after_eight_hours() {
        let signer = signer();
        let now = Utc::now();
        let token = signer.issue(&session(now)).unwrap();

        assert!(signer
            .verify(&token, now + Duration::hours(8) - Duration::seconds(1))
            .is_ok());
        assert!(matches!(
            signer.verify(&token, now + Duration::hours(8)),
            Err(SessionTokenError::Expired)
        ));
    }

    #[test]
    fn test_garbage_token_is_malformed() {
        let signer = signer();
        assert!(matches!(
            signer.verify("not-a-token", Utc::now()),
            Err(SessionTokenError::Malformed)
        ));
    }

    #[tokio::test]
    async fn test_authenticate_success_carries_merchant_context() {
        let store = seeded_store().await;
        let now = Utc::now();

        let session = authenticate(&store, "bdragon-house", "4821", now)
            .await
            .unwrap()
            .expect("valid PIN should authenticate");

        assert_eq!(session.merchant_name, "B. Dragon House");
        assert_eq!(session.timezone, "America/New_York");
        assert_eq!(session.issued_at, now);
    }

    #[tokio::test]
    async fn test_authenticate_trims_and_lowercases_input() {
        let store = seeded_store().await;

        let session = authenticate(&store, "  BDragon-House ", " 4821 ", Utc::now())
            .await
            .unwrap();
        assert!(session.is_some());
    }

    #[tokio::test]
    async fn test_wrong_pin_and_unknown_slug_are_indistinguishable() {
        let store = seeded_store().await;
        let now = Utc::now();

        let wrong_pin = authenticate(&store, "bdragon-house", "0000", now)
            .await
            .unwrap();
        let unknown_slug = authenticate(&store, "no-such-store", "4821", now)
            .await
            .unwrap();

        assert!(wrong_pin.is_none());
        assert!(unknown_slug.is_none());
    }

    #[tokio::test]
    async fn test_empty_pin_is_refused() {
        let store = seeded_store().await;
        let session = authenticate(&store, "bdragon-house", "   ", Utc::now())
            .await
            .unwrap();
        assert!(session.is_none());
    }
}
