//! GoTrue password grant against the hosted backend.

use chrono::{Duration, Utc};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::sync::Mutex;
use tracing::{info, warn};

use super::{AuthError, AuthProvider, Session, SessionBroadcaster, SessionListener, SubscriptionId};
use crate::domain::UserId;
use crate::store::remote::{http_client, send_with_retry, RequestKind, RetryPolicy};
use crate::store::{lock, StoreError};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: UserId,
    #[serde(default)]
    email: Option<String>,
}

impl TokenResponse {
    fn into_session(self, fallback_email: &str) -> Session {
        Session {
            access_token: self.access_token,
            user_id: self.user.id,
            email: self.user.email.unwrap_or_else(|| fallback_email.to_string()),
            expires_at: self.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }
}

#[derive(Debug)]
pub struct RemoteAuth {
    client: Client,
    base_url: String,
    anon_key: String,
    retry: RetryPolicy,
    session: Mutex<Option<Session>>,
    broadcaster: SessionBroadcaster,
}

impl RemoteAuth {
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self, AuthError> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            retry: RetryPolicy::default(),
            session: Mutex::new(None),
            broadcaster: SessionBroadcaster::new(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    fn set_session(&self, session: Option<Session>) {
        *lock(&self.session) = session.clone();
        self.broadcaster.notify(session.as_ref());
    }
}

impl AuthProvider for RemoteAuth {
    fn current_session(&self) -> Option<Session> {
        lock(&self.session).clone()
    }

    fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let body = serde_json::json!({ "email": email.trim(), "password": password });
        let resp = send_with_retry(&self.retry, RequestKind::Idempotent, "password grant", || {
            self.client
                .post(self.auth_url("token"))
                .query(&[("grant_type", "password")])
                .header("apikey", &self.anon_key)
                .json(&body)
        })
        .map_err(|e| match e {
            StoreError::Rejected { status: 400 | 401 | 422, .. } => AuthError::InvalidCredentials,
            other => AuthError::Backend(other),
        })?;

        let token: TokenResponse = resp
            .json()
            .map_err(|e| AuthError::ResponseFormat(e.to_string()))?;
        let session = token.into_session(email.trim());
        info!(user_id = %session.user_id, "signed in");
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    /// The local session is dropped even when the backend call fails.
    fn sign_out(&self) -> Result<(), AuthError> {
        let Some(session) = self.current_session() else {
            return Ok(());
        };
        let result = send_with_retry(&self.retry, RequestKind::Idempotent, "logout", || {
            self.client
                .post(self.auth_url("logout"))
                .header("apikey", &self.anon_key)
                .bearer_auth(&session.access_token)
        });
        self.set_session(None);
        match result {
            Ok(_) => {
                info!(user_id = %session.user_id, "signed out");
                Ok(())
            }
            // An expired token cannot be revoked; the user is signed out either way.
            Err(StoreError::Rejected { status: 401 | 403, .. }) => Ok(()),
            Err(e) => {
                warn!(error = %e, "logout request failed");
                Err(e.into())
            }
        }
    }

    fn restore_session(&self, session: Session) -> Result<(), AuthError> {
        if session.is_expired(Utc::now()) {
            return Err(AuthError::SessionRejected("access token expired".into()));
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn token_response_becomes_session() {
        let token: TokenResponse = serde_json::from_value(json!({
            "access_token": "jwt",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "r",
            "user": {"id": "8d0f", "email": "trader@example.com"}
        }))
        .unwrap();
        let session = token.into_session("ignored@example.com");
        assert_eq!(session.user_id, UserId::new("8d0f"));
        assert_eq!(session.email, "trader@example.com");
        assert!(session.expires_at.unwrap() > Utc::now());
    }

    #[test]
    fn expired_session_is_not_restored() {
        let auth = RemoteAuth::new("https://example.supabase.co", "anon").unwrap();
        let session = Session {
            access_token: "jwt".into(),
            user_id: UserId::new("u1"),
            email: "a@b.c".into(),
            expires_at: Some(Utc::now() - Duration::seconds(5)),
        };
        assert!(auth.restore_session(session).is_err());
        assert!(auth.current_session().is_none());
    }

    #[test]
    fn sign_out_without_session_is_a_no_op() {
        let auth = RemoteAuth::new("https://example.supabase.co", "anon").unwrap();
        auth.sign_out().unwrap();
    }

    #[test]
    fn urls() {
        let auth = RemoteAuth::new("https://example.supabase.co/", "anon").unwrap();
        assert_eq!(auth.auth_url("token"), "https://example.supabase.co/auth/v1/token");
    }
}
