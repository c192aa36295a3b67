//! Authentication collaborators.
//!
//! The journal only needs to know who is signed in. Providers hold the current
//! session and tell subscribers when it changes.

pub mod local;
pub mod remote;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::domain::UserId;
use crate::store::{lock, StoreError};

pub use local::{hash_password, LocalAuth, LocalUser};
pub use remote::RemoteAuth;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("session is no longer valid: {0}")]
    SessionRejected(String),

    #[error("auth backend error: {0}")]
    Backend(#[from] StoreError),

    #[error("unexpected auth response: {0}")]
    ResponseFormat(String),
}

/// An authenticated user. Serializable so a CLI can keep it between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub user_id: UserId,
    pub email: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Handle returned by [`AuthProvider::on_session_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type SessionListener = Box<dyn Fn(Option<&Session>) + Send + Sync>;

pub trait AuthProvider: Send + Sync {
    fn current_session(&self) -> Option<Session>;

    fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    fn sign_out(&self) -> Result<(), AuthError>;

    /// Reinstate a session saved by an earlier run.
    fn restore_session(&self, session: Session) -> Result<(), AuthError>;

    /// `listener` runs synchronously after every sign-in, sign-out and restore.
    fn on_session_change(&self, listener: SessionListener) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId);
}

/// Subscriber registry shared by the auth providers.
#[derive(Default)]
pub struct SessionBroadcaster {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(SubscriptionId, Arc<dyn Fn(Option<&Session>) + Send + Sync>)>>,
}

impl SessionBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: SessionListener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.listeners).push((id, Arc::from(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        lock(&self.listeners).retain(|(sub, _)| *sub != id);
    }

    pub fn len(&self) -> usize {
        lock(&self.listeners).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Listeners run outside the registry lock, so they may unsubscribe themselves.
    pub fn notify(&self, session: Option<&Session>) {
        let listeners: Vec<_> = lock(&self.listeners)
            .iter()
            .map(|(_, f)| Arc::clone(f))
            .collect();
        for listener in listeners {
            listener(session);
        }
    }
}

impl std::fmt::Debug for SessionBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBroadcaster")
            .field("listeners", &self.len())
            .finish()
    }
}
