//! IndicatorSnapshot: a frozen study session, read back by the execution view.
//!
//! `hl_rows` is a copy of the levels in scope at capture time. Later edits to
//! the level set never reach a stored snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ids::{SnapshotId, UserId};
use super::inputs::IndicatorInputs;
use super::level::{nullable_level_type, HorizontalLevel, LevelType, PriceLevel};
use super::time::parse_timestamp;
use super::timeframe::Timeframe;
use crate::mood::Mood;
use crate::numeric::normalize_json;

/// Frozen copy of a level embedded in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotLevel {
    pub price: f64,
    #[serde(default)]
    pub timeframe: Option<Timeframe>,
    #[serde(rename = "type", default, deserialize_with = "nullable_level_type")]
    pub level_type: LevelType,
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

impl SnapshotLevel {
    /// Freeze a live level. Levels without an observation time get the capture time.
    pub fn freeze(level: &PriceLevel, captured_at: DateTime<Utc>) -> Self {
        Self {
            price: level.price,
            timeframe: Some(level.timeframe),
            level_type: level.level_type,
            at: Some(level.observed_at.unwrap_or(captured_at)),
        }
    }
}

impl HorizontalLevel for SnapshotLevel {
    fn price(&self) -> f64 {
        self.price
    }

    fn level_type(&self) -> LevelType {
        self.level_type
    }
}

/// Insert payload for a snapshot ("save and advance").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub price_now: Option<f64>,
    pub atr_abs: Option<f64>,
    pub atr_pct: Option<f64>,
    pub rsi_k: Option<f64>,
    pub rsi_d: Option<f64>,
    pub ema20: Option<f64>,
    pub ema200: Option<f64>,
    pub vwap: Option<f64>,
    pub vol_avg: Option<f64>,
    pub mex_signal: Mood,
    pub hl_rows: Vec<SnapshotLevel>,
}

impl NewSnapshot {
    #[allow(clippy::too_many_arguments)]
    pub fn capture(
        user_id: Option<UserId>,
        symbol: &str,
        timeframe: Timeframe,
        date_from: Option<DateTime<Utc>>,
        date_to: Option<DateTime<Utc>>,
        inputs: &IndicatorInputs,
        signal: Mood,
        levels: &[PriceLevel],
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            symbol: symbol.to_uppercase(),
            timeframe,
            date_from,
            date_to,
            price_now: inputs.price,
            atr_abs: inputs.atr,
            atr_pct: inputs.atr_pct(),
            rsi_k: inputs.rsi_k,
            rsi_d: inputs.rsi_d,
            ema20: inputs.ema20,
            ema200: inputs.ema200,
            vwap: inputs.vwap,
            vol_avg: inputs.vol_avg,
            mex_signal: signal,
            hl_rows: levels
                .iter()
                .map(|l| SnapshotLevel::freeze(l, captured_at))
                .collect(),
        }
    }

    pub fn into_snapshot(self, id: SnapshotId, created_at: DateTime<Utc>) -> IndicatorSnapshot {
        IndicatorSnapshot {
            id,
            user_id: self.user_id,
            symbol: Some(self.symbol),
            timeframe: Some(self.timeframe),
            date_from: self.date_from,
            date_to: self.date_to,
            price_now: self.price_now,
            atr_abs: self.atr_abs,
            atr_pct: self.atr_pct,
            rsi_k: self.rsi_k,
            rsi_d: self.rsi_d,
            ema20: self.ema20,
            ema200: self.ema200,
            vwap: self.vwap,
            vol_avg: self.vol_avg,
            signal: Some(self.mex_signal),
            hl_rows: self.hl_rows,
            created_at: Some(created_at),
        }
    }
}

/// A stored study snapshot. Fields a backend did not provide are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub id: SnapshotId,
    pub user_id: Option<UserId>,
    pub symbol: Option<String>,
    pub timeframe: Option<Timeframe>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub price_now: Option<f64>,
    pub atr_abs: Option<f64>,
    pub atr_pct: Option<f64>,
    pub rsi_k: Option<f64>,
    pub rsi_d: Option<f64>,
    pub ema20: Option<f64>,
    pub ema200: Option<f64>,
    pub vwap: Option<f64>,
    pub vol_avg: Option<f64>,
    #[serde(rename = "mex_signal")]
    pub signal: Option<Mood>,
    pub hl_rows: Vec<SnapshotLevel>,
    pub created_at: Option<DateTime<Utc>>,
}

// ─── Raw row normalization ───────────────────────────────────────────

fn first_present<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|k| obj.get(*k)).find(|v| match v {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    })
}

/// First alias that holds a finite number; aliases holding junk are skipped.
fn num(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().filter_map(|k| obj.get(*k)).find_map(normalize_json)
}

fn text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    first_present(obj, keys).map(|v| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

fn timestamp(obj: &Map<String, Value>, keys: &[&str]) -> Option<DateTime<Utc>> {
    text(obj, keys).and_then(|s| parse_timestamp(&s))
}

fn raw_level(v: &Value) -> Option<SnapshotLevel> {
    let obj = v.as_object()?;
    let price = num(obj, &["price"])?;
    Some(SnapshotLevel {
        price,
        timeframe: text(obj, &["timeframe", "tf"]).and_then(|s| s.parse().ok()),
        level_type: text(obj, &["type"])
            .map(|s| s.parse().unwrap_or_default())
            .unwrap_or_default(),
        at: timestamp(obj, &["at"]),
    })
}

fn raw_levels(v: Option<&Value>) -> Vec<SnapshotLevel> {
    let parsed;
    let array = match v {
        Some(Value::Array(items)) => items,
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => {
                parsed = items;
                &parsed
            }
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    array.iter().filter_map(raw_level).collect()
}

impl IndicatorSnapshot {
    /// Normalize a loosely-typed store row.
    ///
    /// Fields are looked up through alias lists, numbers may arrive as strings,
    /// `hl_rows` may be a JSON-encoded string, and ATR% is derived from ATR and
    /// price when the row does not carry it. Returns `None` when the row is not
    /// an object or has no id.
    pub fn from_raw(raw: &Value) -> Option<IndicatorSnapshot> {
        let obj = raw.as_object()?;
        let id = match obj.get("id")? {
            Value::String(s) if !s.is_empty() => SnapshotId::new(s.clone()),
            Value::Number(n) => SnapshotId::new(n.to_string()),
            _ => return None,
        };

        let price_now = num(obj, &["price_now", "price", "last_price"]);
        let atr_abs = num(obj, &["atr_abs", "atr"]);
        let atr_pct = num(obj, &["atr_pct", "atrPercent", "atrp"]).or_else(|| {
            let (atr, px) = atr_abs.zip(price_now)?;
            (px != 0.0).then(|| atr / px * 100.0)
        });

        Some(IndicatorSnapshot {
            id,
            user_id: text(obj, &["user_id"]).map(UserId::new),
            symbol: text(obj, &["symbol", "sym", "ticker"]),
            timeframe: text(obj, &["timeframe", "tf"]).and_then(|s| s.parse().ok()),
            date_from: timestamp(
                obj,
                &["date_from", "from", "period_from", "start_at", "start"],
            ),
            date_to: timestamp(obj, &["date_to", "to", "period_to", "end_at", "end"]),
            price_now,
            atr_abs,
            atr_pct,
            rsi_k: num(obj, &["rsi_k", "rsiK"]),
            rsi_d: num(obj, &["rsi_d", "rsiD"]),
            ema20: num(obj, &["ema20", "ema_20"]),
            ema200: num(obj, &["ema200", "ema_200"]),
            vwap: num(obj, &["vwap"]),
            vol_avg: num(obj, &["vol_avg", "volAvg", "volume_avg"]),
            signal: text(obj, &["mex_signal", "signal"]).and_then(|s| Mood::from_label(&s)),
            hl_rows: raw_levels(obj.get("hl_rows")),
            created_at: timestamp(obj, &["created_at"]),
        })
    }
}
