//! In-process store for tests and throwaway sessions.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::info;

use super::{lock, sort_by_price_desc, LevelFilter, LevelStore, SnapshotStore, StoreError};
use crate::domain::{
    IndicatorSnapshot, LevelId, NewLevel, NewSnapshot, PriceLevel, SnapshotId, UserId,
};

/// Store contents. Also the on-disk document of [`super::JsonFileStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct StoreState {
    #[serde(default)]
    pub next_level_id: u64,
    #[serde(default)]
    pub next_snapshot_id: u64,
    #[serde(default)]
    pub levels: Vec<PriceLevel>,
    #[serde(default)]
    pub snapshots: Vec<IndicatorSnapshot>,
}

impl StoreState {
    pub fn query_levels(&self, filter: &LevelFilter) -> Vec<PriceLevel> {
        let mut found: Vec<PriceLevel> = self
            .levels
            .iter()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        sort_by_price_desc(&mut found);
        found
    }

    pub fn insert_level(&mut self, level: NewLevel) -> PriceLevel {
        self.next_level_id += 1;
        let stored = level.into_level(LevelId::from(self.next_level_id));
        self.levels.push(stored.clone());
        stored
    }

    pub fn delete_level(&mut self, id: &LevelId, owner: &UserId) -> Result<(), StoreError> {
        let before = self.levels.len();
        self.levels
            .retain(|l| !(&l.id == id && l.user_id.as_ref() == Some(owner)));
        if self.levels.len() == before {
            return Err(StoreError::LevelNotFound(id.clone()));
        }
        Ok(())
    }

    pub fn insert_snapshot(&mut self, snapshot: NewSnapshot) -> SnapshotId {
        self.next_snapshot_id += 1;
        let id = SnapshotId::from(self.next_snapshot_id);
        self.snapshots
            .push(snapshot.into_snapshot(id.clone(), Utc::now()));
        id
    }

    pub fn get_snapshot(&self, id: &SnapshotId) -> Option<IndicatorSnapshot> {
        self.snapshots.iter().find(|s| &s.id == id).cloned()
    }

    pub fn delete_snapshot(&mut self, id: &SnapshotId, owner: &UserId) -> Result<(), StoreError> {
        let before = self.snapshots.len();
        self.snapshots
            .retain(|s| !(&s.id == id && s.user_id.as_ref() == Some(owner)));
        if self.snapshots.len() == before {
            return Err(StoreError::SnapshotNotFound(id.clone()));
        }
        Ok(())
    }

    /// Newest by `created_at`; among equal times the later insert wins.
    pub fn latest_snapshot(&self, user_id: &UserId) -> Option<IndicatorSnapshot> {
        self.snapshots
            .iter()
            .filter(|s| s.user_id.as_ref() == Some(user_id))
            .max_by_key(|s| s.created_at)
            .cloned()
    }
}

/// Levels and snapshots held in memory behind a mutex. Ids are sequential.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level_count(&self) -> usize {
        lock(&self.state).levels.len()
    }

    pub fn snapshot_count(&self) -> usize {
        lock(&self.state).snapshots.len()
    }
}

impl LevelStore for MemoryStore {
    fn query_levels(&self, filter: &LevelFilter) -> Result<Vec<PriceLevel>, StoreError> {
        Ok(lock(&self.state).query_levels(filter))
    }

    fn insert_level(&self, level: NewLevel) -> Result<PriceLevel, StoreError> {
        let stored = lock(&self.state).insert_level(level);
        info!(id = %stored.id, symbol = %stored.symbol, price = stored.price, "level stored");
        Ok(stored)
    }

    fn delete_level(&self, id: &LevelId, owner: &UserId) -> Result<(), StoreError> {
        lock(&self.state).delete_level(id, owner)?;
        info!(%id, "level deleted");
        Ok(())
    }
}

impl SnapshotStore for MemoryStore {
    fn insert_snapshot(&self, snapshot: NewSnapshot) -> Result<SnapshotId, StoreError> {
        let id = lock(&self.state).insert_snapshot(snapshot);
        info!(%id, "snapshot stored");
        Ok(id)
    }

    fn get_snapshot(&self, id: &SnapshotId) -> Result<Option<IndicatorSnapshot>, StoreError> {
        Ok(lock(&self.state).get_snapshot(id))
    }

    fn delete_snapshot(&self, id: &SnapshotId, owner: &UserId) -> Result<(), StoreError> {
        lock(&self.state).delete_snapshot(id, owner)?;
        info!(%id, "snapshot deleted");
        Ok(())
    }

    fn latest_snapshot(&self, user_id: &UserId) -> Result<Option<IndicatorSnapshot>, StoreError> {
        Ok(lock(&self.state).latest_snapshot(user_id))
    }
}
