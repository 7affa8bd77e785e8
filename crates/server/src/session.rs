//! Session capability consumed by the credential service, and the registry
//! that keeps signed-in sessions alive between HTTP requests.
//!
//! The external provider handshake lives outside this crate; the service only
//! needs to sign principals in and out and to read what a finished handshake
//! produced.

use crate::models::{ExternalLoginInfo, User};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;

/// Lifetime of a session signed in without "remember me".
pub const SESSION_LIFETIME: Duration = Duration::hours(1);
/// Lifetime of a persistent ("remember me") session.
pub const PERSISTENT_SESSION_LIFETIME: Duration = Duration::days(14);

#[async_trait]
pub trait SessionManager: Send + Sync {
    async fn sign_in(&self, user: &User, persistent: bool);

    async fn sign_out(&self);

    /// The result of an in-flight external handshake, if any.
    async fn external_login_info(&self) -> Option<ExternalLoginInfo>;
}

/// The principal currently signed in to a [`MemorySession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedInUser {
    pub user_id: String,
    pub email: String,
    pub persistent: bool,
}

/// In-process session holding one principal and one pending external login.
#[derive(Debug, Default)]
pub struct MemorySession {
    principal: RwLock<Option<SignedInUser>>,
    pending_external: RwLock<Option<ExternalLoginInfo>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_external_login(&self, info: Option<ExternalLoginInfo>) {
        *self.pending_external.write().await = info;
    }

    pub async fn current(&self) -> Option<SignedInUser> {
        self.principal.read().await.clone()
    }
}

#[async_trait]
impl SessionManager for MemorySession {
    async fn sign_in(&self, user: &User, persistent: bool) {
        *self.principal.write().await = Some(SignedInUser {
            user_id: user.id.clone(),
            email: user.email.clone(),
            persistent,
        });
    }

    async fn sign_out(&self) {
        *self.principal.write().await = None;
    }

    async fn external_login_info(&self) -> Option<ExternalLoginInfo> {
        self.pending_external.read().await.clone()
    }
}

/// A session registered under an opaque id.
#[derive(Debug, Clone)]
pub struct EstablishedSession {
    pub id: String,
    pub persistent: bool,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug)]
struct SessionEntry {
    session: Arc<MemorySession>,
    expires_at: OffsetDateTime,
}

/// Signed-in sessions keyed by session id, shared across requests.
///
/// Entries are dropped on sign-out or once they expire; expired entries are
/// swept lazily whenever a new session is registered.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    entries: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `session` if someone is signed in to it.
    pub async fn establish(&self, session: Arc<MemorySession>) -> Option<EstablishedSession> {
        let principal = session.current().await?;
        let now = OffsetDateTime::now_utc();
        let lifetime = if principal.persistent {
            PERSISTENT_SESSION_LIFETIME
        } else {
            SESSION_LIFETIME
        };
        let established = EstablishedSession {
            id: uuid::Uuid::new_v4().simple().to_string(),
            persistent: principal.persistent,
            expires_at: now + lifetime,
        };

        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            established.id.clone(),
            SessionEntry {
                session,
                expires_at: established.expires_at,
            },
        );
        tracing::debug!(user_id = %principal.user_id, active = entries.len(), "Session established");
        Some(established)
    }

    /// The live session registered under `id`.
    pub async fn get(&self, id: &str) -> Option<Arc<MemorySession>> {
        let now = OffsetDateTime::now_utc();
        {
            let entries = self.entries.read().await;
            match entries.get(id) {
                Some(entry) if entry.expires_at > now => return Some(entry.session.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        self.entries.write().await.remove(id);
        None
    }

    /// Unregister a session, handing it back so it can be signed out.
    pub async fn remove(&self, id: &str) -> Option<Arc<MemorySession>> {
        self.entries
            .write()
            .await
            .remove(id)
            .map(|entry| entry.session)
    }
}
