//! In-memory session for the one active account.
//!
//! The dashboard is single-tenant: one set of provider credentials at a
//! time, held in an explicit store passed into the handlers (no ambient
//! singleton). Nothing survives a restart.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::provider::TwilioClient;

/// The logged-in account and its authenticated provider client.
#[derive(Clone)]
pub struct Session {
    pub account_sid: String,
    pub account_name: String,
    pub client: Arc<TwilioClient>,
}

/// Holder for the active session, shared across request handlers.
#[derive(Default)]
pub struct SessionStore {
    active: RwLock<Option<Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active session (a later login wins).
    pub async fn login(&self, session: Session) {
        *self.active.write().await = Some(session);
    }

    pub async fn logout(&self) {
        *self.active.write().await = None;
    }

    pub async fn current(&self) -> Option<Session> {
        self.active.read().await.clone()
    }
}
