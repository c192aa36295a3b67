//! Credentials from the configuration file, for offline use.
//!
//! Passwords are stored as the BLAKE3 hex digest of the UTF-8 password.
//! Session tokens are `<issued-at nanos>.<mac>`, where the mac is a keyed
//! BLAKE3 hash over the user and issue time, keyed from the password digest.
//! Changing a user's password invalidates their saved sessions.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::{info, warn};

use super::{AuthError, AuthProvider, Session, SessionBroadcaster, SessionListener, SubscriptionId};
use crate::domain::UserId;
use crate::store::lock;

/// A configured user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalUser {
    pub email: String,
    /// BLAKE3 hex digest of the password.
    pub password_blake3: String,
    pub user_id: UserId,
}

/// BLAKE3 hex digest, the format `LocalUser::password_blake3` expects.
pub fn hash_password(password: &str) -> String {
    blake3::hash(password.as_bytes()).to_hex().to_string()
}

const TOKEN_CONTEXT: &str = "xrpaper local session token v1";

fn token_mac(password_digest: &blake3::Hash, user: &LocalUser, issued_nanos: i64) -> blake3::Hash {
    let key = blake3::derive_key(TOKEN_CONTEXT, password_digest.as_bytes());
    let message = format!(
        "{}\n{}\n{issued_nanos}",
        user.user_id,
        user.email.to_lowercase()
    );
    blake3::keyed_hash(&key, message.as_bytes())
}

fn issue_token(password_digest: &blake3::Hash, user: &LocalUser, issued_nanos: i64) -> String {
    format!(
        "{issued_nanos}.{}",
        token_mac(password_digest, user, issued_nanos).to_hex()
    )
}

/// Recompute the mac for `token`. Malformed tokens never verify.
fn verify_token(password_digest: &blake3::Hash, user: &LocalUser, token: &str) -> bool {
    let Some((issued, mac)) = token.split_once('.') else {
        return false;
    };
    let (Ok(issued_nanos), Ok(mac)) = (issued.parse::<i64>(), blake3::Hash::from_hex(mac)) else {
        return false;
    };
    // blake3::Hash equality is constant-time.
    token_mac(password_digest, user, issued_nanos) == mac
}

#[derive(Debug)]
pub struct LocalAuth {
    users: Vec<LocalUser>,
    session: Mutex<Option<Session>>,
    broadcaster: SessionBroadcaster,
}

impl LocalAuth {
    pub fn new(users: Vec<LocalUser>) -> Self {
        Self {
            users,
            session: Mutex::new(None),
            broadcaster: SessionBroadcaster::new(),
        }
    }

    fn find(&self, email: &str) -> Option<&LocalUser> {
        let email = email.trim();
        self.users.iter().find(|u| u.email.eq_ignore_ascii_case(email))
    }

    fn set_session(&self, session: Option<Session>) {
        *lock(&self.session) = session.clone();
        self.broadcaster.notify(session.as_ref());
    }
}

impl AuthProvider for LocalAuth {
    fn current_session(&self) -> Option<Session> {
        lock(&self.session).clone()
    }

    fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let Some(user) = self.find(email) else {
            warn!(email, "sign-in rejected: unknown user");
            return Err(AuthError::InvalidCredentials);
        };
        let expected = blake3::Hash::from_hex(user.password_blake3.trim())
            .map_err(|_| AuthError::InvalidCredentials)?;
        // blake3::Hash equality is constant-time.
        if blake3::hash(password.as_bytes()) != expected {
            warn!(email, "sign-in rejected: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let issued_nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let session = Session {
            access_token: issue_token(&expected, user, issued_nanos),
            user_id: user.user_id.clone(),
            email: user.email.clone(),
            expires_at: None,
        };
        info!(user_id = %session.user_id, "signed in");
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    fn sign_out(&self) -> Result<(), AuthError> {
        if let Some(s) = lock(&self.session).as_ref() {
            info!(user_id = %s.user_id, "signed out");
        }
        self.set_session(None);
        Ok(())
    }

    /// The saved session must name a configured user and carry a token
    /// issued for that user under their current password.
    fn restore_session(&self, session: Session) -> Result<(), AuthError> {
        let user = match self.find(&session.email) {
            Some(user) if user.user_id == session.user_id => user,
            _ => {
                return Err(AuthError::SessionRejected(format!(
                    "no configured user {}",
                    session.email
                )))
            }
        };
        let digest = blake3::Hash::from_hex(user.password_blake3.trim())
            .map_err(|_| AuthError::SessionRejected("stored password hash is malformed".into()))?;
        if !verify_token(&digest, user, &session.access_token) {
            warn!(user_id = %session.user_id, "restore rejected: token does not verify");
            return Err(AuthError::SessionRejected("session token is invalid".into()));
        }
        self.set_session(Some(session));
        Ok(())
    }

    fn on_session_change(&self, listener: SessionListener) -> SubscriptionId {
        self.broadcaster.subscribe(listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.broadcaster.unsubscribe(id);
    }
}
