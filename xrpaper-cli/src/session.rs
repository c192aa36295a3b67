//! Session file: keeps the signed-in user between CLI runs.

use std::path::{Path, PathBuf};

use tracing::warn;
use xrpaper_core::auth::{AuthProvider, Session};

/// Default session location: `<data_dir>/xrpaper/session.json`.
pub fn default_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("xrpaper")
        .join("session.json")
}

/// Load a saved session. Missing or unreadable files mean "signed out".
pub fn load(path: &Path) -> Option<Session> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(session) => Some(session),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable session file");
            None
        }
    }
}

pub fn save(path: &Path, session: &Session) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(session)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn clear(path: &Path) -> anyhow::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Reinstate the saved session on `auth`. A session the provider refuses is
/// discarded so the next run starts signed out.
pub fn restore(path: &Path, auth: &dyn AuthProvider) {
    let Some(session) = load(path) else {
        return;
    };
    if let Err(e) = auth.restore_session(session) {
        warn!(error = %e, "saved session rejected, signing out");
        if let Err(e) = clear(path) {
            warn!(error = %e, "could not remove session file");
        }
    }
}
