//! Application configuration: one TOML file.
//!
//! ```toml
//! [journal]
//! default_symbol = "BTCUSDT"
//! default_timeframe = "5m"
//!
//! [mood]
//! type = "ATR_BAND"
//!
//! [backend]
//! type = "JSON_FILE"
//! path = "journal.json"
//!
//! [auth]
//! type = "LOCAL"
//! [[auth.users]]
//! email = "trader@example.com"
//! password_blake3 = "…"
//! user_id = "u1"
//! ```
//!
//! Every section is optional. Remote credentials may come from
//! `XRPAPER_URL` / `XRPAPER_ANON_KEY` instead of the file.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::auth::LocalUser;
use crate::domain::Timeframe;
use crate::mood::{create_mood_policy, FactoryError, MoodPolicyConfig};

pub const ENV_URL: &str = "XRPAPER_URL";
pub const ENV_ANON_KEY: &str = "XRPAPER_ANON_KEY";
pub const DEFAULT_LOG_FILTER: &str = "xrpaper=info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("[{section}] uses the remote backend but no url/anon_key is set (file or XRPAPER_URL/XRPAPER_ANON_KEY)")]
    MissingRemoteCredentials { section: &'static str },

    #[error("user {email}: password_blake3 is not a 64-character hex digest")]
    BadPasswordHash { email: String },

    #[error("user {email} is configured more than once")]
    DuplicateUser { email: String },

    #[error("invalid [mood] section: {0}")]
    Mood(#[from] FactoryError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    pub default_symbol: String,
    pub default_timeframe: Timeframe,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            default_symbol: "BTCUSDT".into(),
            default_timeframe: Timeframe::default(),
        }
    }
}

/// Where levels and snapshots live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackendConfig {
    Memory,
    /// Relative paths resolve against the config file's directory.
    JsonFile {
        #[serde(default = "default_journal_path")]
        path: PathBuf,
    },
    Remote {
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        anon_key: Option<String>,
    },
}

fn default_journal_path() -> PathBuf {
    PathBuf::from("journal.json")
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::JsonFile {
            path: default_journal_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthConfig {
    Local {
        #[serde(default)]
        users: Vec<LocalUser>,
    },
    /// Falls back to the `[backend]` credentials when its own are unset.
    Remote {
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        anon_key: Option<String>,
    },
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig::Local { users: Vec::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.into(),
        }
    }
}

/// Resolved endpoint of the hosted backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCredentials {
    pub url: String,
    pub anon_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub journal: JournalConfig,
    pub mood: MoodPolicyConfig,
    pub backend: BackendConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

fn non_empty(v: &Option<String>) -> Option<String> {
    v.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

impl AppConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load, apply environment overrides and validate.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Fill unset remote credentials from the environment.
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        let env_url = env(ENV_URL).filter(|s| !s.trim().is_empty());
        let env_key = env(ENV_ANON_KEY).filter(|s| !s.trim().is_empty());

        let fill = |url: &mut Option<String>, anon_key: &mut Option<String>| {
            if non_empty(url).is_none() {
                *url = env_url.clone();
            }
            if non_empty(anon_key).is_none() {
                *anon_key = env_key.clone();
            }
        };
        if let BackendConfig::Remote { url, anon_key } = &mut self.backend {
            fill(url, anon_key);
        }
        if let AuthConfig::Remote { url, anon_key } = &mut self.auth {
            fill(url, anon_key);
        }
    }

    pub fn backend_credentials(&self) -> Option<RemoteCredentials> {
        match &self.backend {
            BackendConfig::Remote { url, anon_key } => Some(RemoteCredentials {
                url: non_empty(url)?,
                anon_key: non_empty(anon_key)?,
            }),
            _ => None,
        }
    }

    pub fn auth_credentials(&self) -> Option<RemoteCredentials> {
        match &self.auth {
            AuthConfig::Remote { url, anon_key } => {
                let own = non_empty(url).zip(non_empty(anon_key));
                match own {
                    Some((url, anon_key)) => Some(RemoteCredentials { url, anon_key }),
                    None => self.backend_credentials(),
                }
            }
            AuthConfig::Local { .. } => None,
        }
    }

    /// JSON document location, resolved against `base_dir` when relative.
    pub fn journal_path(&self, base_dir: &Path) -> Option<PathBuf> {
        match &self.backend {
            BackendConfig::JsonFile { path } if path.is_relative() => Some(base_dir.join(path)),
            BackendConfig::JsonFile { path } => Some(path.clone()),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        create_mood_policy(&self.mood)?;

        if matches!(self.backend, BackendConfig::Remote { .. }) && self.backend_credentials().is_none()
        {
            return Err(ConfigError::MissingRemoteCredentials { section: "backend" });
        }

        match &self.auth {
            AuthConfig::Remote { .. } if self.auth_credentials().is_none() => {
                return Err(ConfigError::MissingRemoteCredentials { section: "auth" });
            }
            AuthConfig::Local { users } => {
                let mut seen = HashSet::new();
                for user in users {
                    if blake3::Hash::from_hex(user.password_blake3.trim()).is_err() {
                        return Err(ConfigError::BadPasswordHash {
                            email: user.email.clone(),
                        });
                    }
                    if !seen.insert(user.email.trim().to_lowercase()) {
                        return Err(ConfigError::DuplicateUser {
                            email: user.email.clone(),
                        });
                    }
                }
            }
            AuthConfig::Remote { .. } => {}
        }
        Ok(())
    }
}
