//! Store persisted as one pretty-printed JSON document.
//!
//! The whole document is rewritten after every mutation. Fine for a personal
//! journal; not meant for concurrent writers across processes.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use super::memory::StoreState;
use super::{lock, LevelFilter, LevelStore, SnapshotStore, StoreError};
use crate::domain::{
    IndicatorSnapshot, LevelId, NewLevel, NewSnapshot, PriceLevel, SnapshotId, UserId,
};

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl JsonFileStore {
    /// Open the document at `path`. A missing file is an empty store; a file
    /// that does not parse is an error, so a typo never wipes the journal.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = load(&path)?;
        debug!(
            path = %path.display(),
            levels = state.levels.len(),
            snapshots = state.snapshots.len(),
            "journal document loaded"
        );
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `f` to the state and persist it. Nothing is written when `f` fails.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut StoreState) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut state = lock(&self.state);
        let mut next = state.clone();
        let out = f(&mut next)?;
        save(&self.path, &next)?;
        *state = next;
        Ok(out)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn load(path: &Path) -> Result<StoreState, StoreError> {
    match std::fs::read_to_string(path) {
        Ok(content) if content.trim().is_empty() => Ok(StoreState::default()),
        Ok(content) => serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: path.display().to_string(),
            source,
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreState::default()),
        Err(e) => Err(io_error(path, e)),
    }
}

fn save(path: &Path, state: &StoreState) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }
    let json = serde_json::to_string_pretty(state).map_err(|source| StoreError::Corrupt {
        path: path.display().to_string(),
        source,
    })?;
    std::fs::write(path, json).map_err(|e| io_error(path, e))
}

impl LevelStore for JsonFileStore {
    fn query_levels(&self, filter: &LevelFilter) -> Result<Vec<PriceLevel>, StoreError> {
        Ok(lock(&self.state).query_levels(filter))
    }

    fn insert_level(&self, level: NewLevel) -> Result<PriceLevel, StoreError> {
        let stored = self.mutate(|s| Ok(s.insert_level(level)))?;
        info!(id = %stored.id, symbol = %stored.symbol, price = stored.price, "level stored");
        Ok(stored)
    }

    fn delete_level(&self, id: &LevelId, owner: &UserId) -> Result<(), StoreError> {
        self.mutate(|s| s.delete_level(id, owner))?;
        info!(%id, "level deleted");
        Ok(())
    }
}

impl SnapshotStore for JsonFileStore {
    fn insert_snapshot(&self, snapshot: NewSnapshot) -> Result<SnapshotId, StoreError> {
        let id = self.mutate(|s| Ok(s.insert_snapshot(snapshot)))?;
        info!(%id, path = %self.path.display(), "snapshot stored");
        Ok(id)
    }

    fn get_snapshot(&self, id: &SnapshotId) -> Result<Option<IndicatorSnapshot>, StoreError> {
        Ok(lock(&self.state).get_snapshot(id))
    }

    fn delete_snapshot(&self, id: &SnapshotId, owner: &UserId) -> Result<(), StoreError> {
        self.mutate(|s| s.delete_snapshot(id, owner))?;
        info!(%id, "snapshot deleted");
        Ok(())
    }

    fn latest_snapshot(&self, user_id: &UserId) -> Result<Option<IndicatorSnapshot>, StoreError> {
        Ok(lock(&self.state).latest_snapshot(user_id))
    }
}
