//! Factory: turns an `AppConfig` into the store and auth trait objects.

use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::auth::{AuthError, AuthProvider, LocalAuth, RemoteAuth, SubscriptionId};
use crate::config::{AppConfig, AuthConfig, BackendConfig, ConfigError};
use crate::store::{JsonFileStore, LevelStore, MemoryStore, RemoteStore, SnapshotStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// A store that keeps both levels and snapshots.
pub trait JournalStore: Send + Sync {
    fn levels(&self) -> &dyn LevelStore;
    fn snapshots(&self) -> &dyn SnapshotStore;
}

impl<T: LevelStore + SnapshotStore> JournalStore for T {
    fn levels(&self) -> &dyn LevelStore {
        self
    }

    fn snapshots(&self) -> &dyn SnapshotStore {
        self
    }
}

/// Collaborators built from configuration.
pub struct Backend {
    pub store: Arc<dyn JournalStore>,
    pub auth: Box<dyn AuthProvider>,
    token_subscription: Option<SubscriptionId>,
}

impl Drop for Backend {
    fn drop(&mut self) {
        if let Some(id) = self.token_subscription.take() {
            self.auth.unsubscribe(id);
        }
    }
}

/// Build the store and auth provider. `base_dir` anchors a relative journal path.
///
/// With a remote store, the signed-in user's token is forwarded to the store
/// on every session change.
pub fn create_backend(config: &AppConfig, base_dir: &Path) -> Result<Backend, BackendError> {
    let auth: Box<dyn AuthProvider> = match &config.auth {
        AuthConfig::Local { users } => Box::new(LocalAuth::new(users.clone())),
        AuthConfig::Remote { .. } => {
            let creds = config
                .auth_credentials()
                .ok_or(ConfigError::MissingRemoteCredentials { section: "auth" })?;
            Box::new(RemoteAuth::new(&creds.url, &creds.anon_key)?)
        }
    };

    let mut token_subscription = None;
    let store: Arc<dyn JournalStore> = match &config.backend {
        BackendConfig::Memory => Arc::new(MemoryStore::new()),
        BackendConfig::JsonFile { path } => {
            let path = config.journal_path(base_dir).unwrap_or_else(|| path.clone());
            Arc::new(JsonFileStore::open(path)?)
        }
        BackendConfig::Remote { .. } => {
            let creds = config
                .backend_credentials()
                .ok_or(ConfigError::MissingRemoteCredentials { section: "backend" })?;
            let remote = Arc::new(RemoteStore::new(&creds.url, &creds.anon_key)?);
            let forward = Arc::clone(&remote);
            token_subscription = Some(auth.on_session_change(Box::new(move |session| {
                forward.set_access_token(session.map(|s| s.access_token.clone()));
            })));
            remote
        }
    };

    let kind = match config.backend {
        BackendConfig::Memory => "memory",
        BackendConfig::JsonFile { .. } => "json_file",
        BackendConfig::Remote { .. } => "remote",
    };
    debug!(backend = kind, "backend ready");
    Ok(Backend {
        store,
        auth,
        token_subscription,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{hash_password, LocalUser};
    use crate::domain::{LevelType, NewLevel, Timeframe, UserId};
    use crate::store::LevelFilter;

    #[test]
    fn memory_backend_with_local_auth() {
        let mut config = AppConfig {
            backend: BackendConfig::Memory,
            ..AppConfig::default()
        };
        config.auth = AuthConfig::Local {
            users: vec![LocalUser {
                email: "a@b.c".into(),
                password_blake3: hash_password("pw"),
                user_id: UserId::new("u1"),
            }],
        };
        let backend = create_backend(&config, Path::new(".")).unwrap();
        backend.auth.sign_in_with_password("a@b.c", "pw").unwrap();

        backend
            .store
            .levels()
            .insert_level(NewLevel::new("X", Timeframe::M5, LevelType::Support, 1.0))
            .unwrap();
        let found = backend
            .store
            .levels()
            .query_levels(&LevelFilter::for_symbol("X"))
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn remote_without_credentials_fails() {
        let config = AppConfig {
            backend: BackendConfig::Remote {
                url: None,
                anon_key: None,
            },
            ..AppConfig::default()
        };
        assert!(matches!(
            create_backend(&config, Path::new(".")),
            Err(BackendError::Config(ConfigError::MissingRemoteCredentials { .. }))
        ));
    }
}
