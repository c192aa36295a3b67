//! PostgREST-backed store (`hl_lines` and `mex_runs` tables).
//!
//! Requests carry the project's anon key as `apikey` and, once a user is
//! signed in, their access token as the bearer. Reads and deletes are retried
//! with exponential backoff on network failures, 5xx and 429. Inserts are only
//! retried when the request cannot have reached the server, since a repeated
//! POST would store a second row.

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{sort_by_price_desc, LevelFilter, LevelStore, SnapshotStore, StoreError};
use crate::domain::{
    parse_timestamp, IndicatorSnapshot, LevelId, LevelType, NewLevel, NewSnapshot, PriceLevel,
    SnapshotId, Timeframe, UserId,
};
use crate::numeric::normalize_json;

const LEVELS_TABLE: &str = "hl_lines";
const SNAPSHOTS_TABLE: &str = "mex_runs";

/// Backoff for transient failures: `base_delay * 2^(attempt-1)` between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.pow(attempt.saturating_sub(1))
    }
}

pub(crate) fn http_client() -> Result<Client, StoreError> {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| StoreError::NetworkUnreachable(format!("cannot build HTTP client: {e}")))
}

/// How a request may be repeated after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestKind {
    /// GET, DELETE, auth calls: sending twice has the same effect as once.
    Idempotent,
    /// POST of a new row.
    Insert,
}

/// What went wrong on one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    /// No connection was made; the server never saw the request.
    Connect,
    Timeout,
    Status(StatusCode),
    Other,
}

impl RequestKind {
    fn retries(self, failure: Failure) -> bool {
        match failure {
            Failure::Connect => true,
            Failure::Status(status) if status == StatusCode::TOO_MANY_REQUESTS => true,
            Failure::Timeout => self == RequestKind::Idempotent,
            Failure::Status(status) => status.is_server_error() && self == RequestKind::Idempotent,
            Failure::Other => false,
        }
    }
}

/// Send a request, retrying the failures `kind` allows. `build` is called once per attempt.
pub(crate) fn send_with_retry(
    policy: &RetryPolicy,
    kind: RequestKind,
    what: &str,
    build: impl Fn() -> RequestBuilder,
) -> Result<Response, StoreError> {
    let mut last_error = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let delay = policy.delay(attempt);
            warn!(%what, attempt, delay_ms = delay.as_millis() as u64, "retrying backend request");
            std::thread::sleep(delay);
        }

        let (failure, error) = match build().send() {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    return Ok(resp);
                }
                let error = if status == StatusCode::TOO_MANY_REQUESTS {
                    StoreError::RateLimited
                } else {
                    StoreError::Rejected {
                        status: status.as_u16(),
                        message: resp.text().unwrap_or_default(),
                    }
                };
                (Failure::Status(status), error)
            }
            Err(e) => {
                let failure = if e.is_connect() {
                    Failure::Connect
                } else if e.is_timeout() {
                    Failure::Timeout
                } else {
                    Failure::Other
                };
                (failure, StoreError::NetworkUnreachable(e.to_string()))
            }
        };
        if !kind.retries(failure) {
            return Err(error);
        }
        last_error = Some(error);
    }

    Err(last_error.unwrap_or_else(|| StoreError::ResponseFormat("max retries exceeded".into())))
}

/// `hl_lines` row as the backend returns it.
#[derive(Debug, Deserialize)]
struct LevelRow {
    id: LevelId,
    #[serde(default)]
    user_id: Option<UserId>,
    symbol: String,
    timeframe: String,
    #[serde(rename = "type", default)]
    level_type: Option<String>,
    price: Value,
    #[serde(default)]
    at: Option<String>,
}

impl LevelRow {
    /// `None` for rows with an unknown timeframe or a non-numeric price.
    fn into_level(self) -> Option<PriceLevel> {
        let timeframe: Timeframe = self.timeframe.parse().ok()?;
        let price = normalize_json(&self.price)?;
        Some(PriceLevel {
            id: self.id,
            user_id: self.user_id,
            symbol: self.symbol,
            timeframe,
            level_type: self
                .level_type
                .map(|t| t.parse::<LevelType>().unwrap_or_default())
                .unwrap_or_default(),
            price,
            observed_at: self.at.as_deref().and_then(parse_timestamp),
        })
    }
}

pub struct RemoteStore {
    client: Client,
    base_url: String,
    anon_key: String,
    access_token: RwLock<Option<String>>,
    retry: RetryPolicy,
}

impl RemoteStore {
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self, StoreError> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            access_token: RwLock::new(None),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Use a signed-in user's token for row-level security. `None` reverts to the anon key.
    pub fn set_access_token(&self, token: Option<String>) {
        let mut guard = self
            .access_token
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = token;
    }

    fn bearer(&self) -> String {
        let guard = self
            .access_token
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.clone().unwrap_or_else(|| self.anon_key.clone())
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn request(&self, method: reqwest::Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, self.table_url(table))
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer())
    }

    fn rows(resp: Response, what: &str) -> Result<Vec<Value>, StoreError> {
        resp.json::<Vec<Value>>()
            .map_err(|e| StoreError::ResponseFormat(format!("{what}: {e}")))
    }

    fn level_query(filter: &LevelFilter) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("symbol", format!("eq.{}", filter.symbol.trim().to_uppercase())),
            ("order", "price.desc".to_string()),
        ];
        if let Some(user) = &filter.user_id {
            query.push(("user_id", format!("eq.{user}")));
        }
        if let Some(tf) = filter.timeframe {
            query.push(("timeframe", format!("eq.{tf}")));
        }
        if let Some(from) = filter.from {
            query.push(("at", format!("gte.{}", from.to_rfc3339())));
        }
        if let Some(to) = filter.to {
            query.push(("at", format!("lte.{}", to.to_rfc3339())));
        }
        query
    }

    /// Row filter matching `id` only when `owner` holds it.
    fn owned_row_query(id: &str, owner: &UserId) -> [(&'static str, String); 2] {
        [("id", format!("eq.{id}")), ("user_id", format!("eq.{owner}"))]
    }

    /// Delete the matching rows and report how many went.
    fn delete_rows(
        &self,
        table: &str,
        query: &[(&str, String)],
        what: &str,
    ) -> Result<usize, StoreError> {
        let resp = send_with_retry(&self.retry, RequestKind::Idempotent, what, || {
            self.request(reqwest::Method::DELETE, table)
                .header("Prefer", "return=representation")
                .query(query)
        })?;
        Ok(Self::rows(resp, what)?.len())
    }

    fn first_snapshot(&self, query: &[(&str, String)]) -> Result<Option<IndicatorSnapshot>, StoreError> {
        let resp = send_with_retry(&self.retry, RequestKind::Idempotent, "select snapshot", || {
            self.request(reqwest::Method::GET, SNAPSHOTS_TABLE).query(query)
        })?;
        let rows = Self::rows(resp, "snapshot rows")?;
        Ok(rows.first().and_then(IndicatorSnapshot::from_raw))
    }
}

impl LevelStore for RemoteStore {
    fn query_levels(&self, filter: &LevelFilter) -> Result<Vec<PriceLevel>, StoreError> {
        let query = Self::level_query(filter);
        let resp = send_with_retry(&self.retry, RequestKind::Idempotent, "select levels", || {
            self.request(reqwest::Method::GET, LEVELS_TABLE).query(&query)
        })?;
        let rows = Self::rows(resp, "level rows")?;
        let total = rows.len();

        let mut levels: Vec<PriceLevel> = rows
            .into_iter()
            .filter_map(|row| serde_json::from_value::<LevelRow>(row).ok())
            .filter_map(LevelRow::into_level)
            .collect();
        if levels.len() < total {
            warn!(skipped = total - levels.len(), "ignored malformed level rows");
        }
        sort_by_price_desc(&mut levels);
        debug!(symbol = %filter.symbol, count = levels.len(), "levels fetched");
        Ok(levels)
    }

    fn insert_level(&self, level: NewLevel) -> Result<PriceLevel, StoreError> {
        let resp = send_with_retry(&self.retry, RequestKind::Insert, "insert level", || {
            self.request(reqwest::Method::POST, LEVELS_TABLE)
                .header("Prefer", "return=representation")
                .json(&level)
        })?;
        let row = Self::rows(resp, "inserted level")?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::ResponseFormat("insert returned no row".into()))?;
        let stored = serde_json::from_value::<LevelRow>(row)
            .ok()
            .and_then(LevelRow::into_level)
            .ok_or_else(|| StoreError::ResponseFormat("inserted level row is malformed".into()))?;
        info!(id = %stored.id, symbol = %stored.symbol, price = stored.price, "level stored");
        Ok(stored)
    }

    fn delete_level(&self, id: &LevelId, owner: &UserId) -> Result<(), StoreError> {
        let query = Self::owned_row_query(id.as_str(), owner);
        if self.delete_rows(LEVELS_TABLE, &query, "delete level")? == 0 {
            return Err(StoreError::LevelNotFound(id.clone()));
        }
        info!(%id, "level deleted");
        Ok(())
    }
}

impl SnapshotStore for RemoteStore {
    fn insert_snapshot(&self, snapshot: NewSnapshot) -> Result<SnapshotId, StoreError> {
        let resp = send_with_retry(&self.retry, RequestKind::Insert, "insert snapshot", || {
            self.request(reqwest::Method::POST, SNAPSHOTS_TABLE)
                .header("Prefer", "return=representation")
                .json(&snapshot)
        })?;
        let row = Self::rows(resp, "inserted snapshot")?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::ResponseFormat("insert returned no row".into()))?;
        let id = row
            .get("id")
            .cloned()
            .and_then(|v| serde_json::from_value::<SnapshotId>(v).ok())
            .ok_or_else(|| StoreError::ResponseFormat("inserted snapshot has no id".into()))?;
        info!(%id, "snapshot stored");
        Ok(id)
    }

    fn get_snapshot(&self, id: &SnapshotId) -> Result<Option<IndicatorSnapshot>, StoreError> {
        self.first_snapshot(&[
            ("select", "*".to_string()),
            ("id", format!("eq.{id}")),
            ("limit", "1".to_string()),
        ])
    }

    fn delete_snapshot(&self, id: &SnapshotId, owner: &UserId) -> Result<(), StoreError> {
        let query = Self::owned_row_query(id.as_str(), owner);
        if self.delete_rows(SNAPSHOTS_TABLE, &query, "delete snapshot")? == 0 {
            return Err(StoreError::SnapshotNotFound(id.clone()));
        }
        info!(%id, "snapshot deleted");
        Ok(())
    }

    fn latest_snapshot(&self, user_id: &UserId) -> Result<Option<IndicatorSnapshot>, StoreError> {
        self.first_snapshot(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{user_id}")),
            ("order", "created_at.desc".to_string()),
            ("limit", "1".to_string()),
        ])
    }
}
