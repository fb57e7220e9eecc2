use std::sync::Arc;

use secrecy::Secret;

use crate::services::notifier::Notifier;
use crate::services::pin_session::SessionSigner;
use crate::store::Store;

/// Application state shared by all handlers. The store handle is injected
/// here so the whole protocol runs unchanged against the in-memory store
/// in tests.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub signer: Arc<SessionSigner>,
    pub notifier: Arc<dyn Notifier>,
    pub admin_api_key: Option<Secret<String>>,
}
