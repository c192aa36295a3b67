//! Persistence collaborators for levels and study snapshots.
//!
//! The engine never talks to a store directly; the [`crate::journal::Journal`]
//! service does. Every implementation must be `Send + Sync`.

pub mod json_file;
pub mod memory;
pub mod remote;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use crate::domain::{
    IndicatorSnapshot, LevelId, NewLevel, NewSnapshot, PriceLevel, SnapshotId, Timeframe, UserId,
};

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use remote::{RemoteStore, RetryPolicy};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by backend")]
    RateLimited,

    #[error("backend rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected response: {0}")]
    ResponseFormat(String),

    #[error("level not found: {0}")]
    LevelNotFound(LevelId),

    #[error("snapshot not found: {0}")]
    SnapshotNotFound(SnapshotId),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt store document {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Selection for [`LevelStore::query_levels`].
///
/// A time bound only matches levels that carry an observation time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelFilter {
    pub user_id: Option<UserId>,
    pub symbol: String,
    pub timeframe: Option<Timeframe>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl LevelFilter {
    pub fn for_symbol(symbol: &str) -> Self {
        Self {
            symbol: symbol.trim().to_uppercase(),
            ..Self::default()
        }
    }

    pub fn user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn timeframe(mut self, timeframe: Option<Timeframe>) -> Self {
        self.timeframe = timeframe;
        self
    }

    pub fn between(mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    fn has_time_bound(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }

    /// In-process evaluation, shared by the local stores.
    pub fn matches(&self, level: &PriceLevel) -> bool {
        if let Some(user) = &self.user_id {
            if level.user_id.as_ref() != Some(user) {
                return false;
            }
        }
        if !level.symbol.eq_ignore_ascii_case(&self.symbol) {
            return false;
        }
        if let Some(tf) = self.timeframe {
            if level.timeframe != tf {
                return false;
            }
        }
        if self.has_time_bound() {
            let Some(at) = level.observed_at else {
                return false;
            };
            if self.from.is_some_and(|from| at < from) || self.to.is_some_and(|to| at > to) {
                return false;
            }
        }
        true
    }
}

/// A poisoned lock still holds consistent data here: every mutation is a
/// single push/retain or a whole-state swap.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Price-descending order used by every `query_levels` implementation.
pub(crate) fn sort_by_price_desc(levels: &mut [PriceLevel]) {
    levels.sort_by(|a, b| b.price.total_cmp(&a.price));
}

/// Storage for support/resistance levels.
pub trait LevelStore: Send + Sync {
    /// Levels matching the filter, ordered by price descending.
    fn query_levels(&self, filter: &LevelFilter) -> Result<Vec<PriceLevel>, StoreError>;

    fn insert_level(&self, level: NewLevel) -> Result<PriceLevel, StoreError>;

    /// Delete `id` if it belongs to `owner`. Another user's level reads as not found.
    fn delete_level(&self, id: &LevelId, owner: &UserId) -> Result<(), StoreError>;
}

/// Storage for study snapshots.
pub trait SnapshotStore: Send + Sync {
    fn insert_snapshot(&self, snapshot: NewSnapshot) -> Result<SnapshotId, StoreError>;

    fn get_snapshot(&self, id: &SnapshotId) -> Result<Option<IndicatorSnapshot>, StoreError>;

    /// Delete `id` if it belongs to `owner`. Another user's snapshot reads as not found.
    fn delete_snapshot(&self, id: &SnapshotId, owner: &UserId) -> Result<(), StoreError>;

    /// The user's most recently created snapshot.
    fn latest_snapshot(&self, user_id: &UserId) -> Result<Option<IndicatorSnapshot>, StoreError>;
}
