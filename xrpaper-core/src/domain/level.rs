//! PriceLevel: a persisted support/resistance marker ("HL").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ids::{LevelId, UserId};
use super::timeframe::Timeframe;

/// Role of a horizontal level relative to price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelType {
    Support,
    Resistance,
    /// Unclassified marker. Also absorbs unknown labels coming from a store.
    #[default]
    #[serde(other)]
    Undefined,
}

impl LevelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LevelType::Support => "support",
            LevelType::Resistance => "resistance",
            LevelType::Undefined => "undefined",
        }
    }
}

impl fmt::Display for LevelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LevelType {
    type Err = std::convert::Infallible;

    /// Accepts the English labels and the Portuguese ones shown in the level
    /// manager (`suporte`, `resistência`, `indefinido`). Anything else is `Undefined`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "support" | "suporte" => LevelType::Support,
            "resistance" | "resistencia" | "resistência" => LevelType::Resistance,
            _ => LevelType::Undefined,
        })
    }
}

/// A null `type` column reads as `Undefined`.
pub(crate) fn nullable_level_type<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<LevelType, D::Error> {
    Ok(Option::<LevelType>::deserialize(deserializer)?.unwrap_or_default())
}

/// Anything carrying a price and a support/resistance role.
///
/// Implemented by live levels and by the frozen copies embedded in a snapshot,
/// so nearest-level selection runs on either.
pub trait HorizontalLevel {
    fn price(&self) -> f64;
    fn level_type(&self) -> LevelType;
}

/// A persisted support/resistance level. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub id: LevelId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub symbol: String,
    pub timeframe: Timeframe,
    #[serde(rename = "type", default, deserialize_with = "nullable_level_type")]
    pub level_type: LevelType,
    pub price: f64,
    #[serde(rename = "at", default)]
    pub observed_at: Option<DateTime<Utc>>,
}

impl PriceLevel {
    pub fn is_support(&self) -> bool {
        self.level_type == LevelType::Support
    }

    pub fn is_resistance(&self) -> bool {
        self.level_type == LevelType::Resistance
    }
}

impl HorizontalLevel for PriceLevel {
    fn price(&self) -> f64 {
        self.price
    }

    fn level_type(&self) -> LevelType {
        self.level_type
    }
}

/// Insert payload for a new level; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLevel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub symbol: String,
    pub timeframe: Timeframe,
    #[serde(rename = "type")]
    pub level_type: LevelType,
    pub price: f64,
    #[serde(rename = "at", default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
}

impl NewLevel {
    /// Symbols are stored uppercase.
    pub fn new(symbol: &str, timeframe: Timeframe, level_type: LevelType, price: f64) -> Self {
        Self {
            user_id: None,
            symbol: symbol.trim().to_uppercase(),
            timeframe,
            level_type,
            price,
            observed_at: None,
        }
    }

    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn observed_at(mut self, at: DateTime<Utc>) -> Self {
        self.observed_at = Some(at);
        self
    }

    pub fn into_level(self, id: LevelId) -> PriceLevel {
        PriceLevel {
            id,
            user_id: self.user_id,
            symbol: self.symbol,
            timeframe: self.timeframe,
            level_type: self.level_type,
            price: self.price,
            observed_at: self.observed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_level_uppercases_symbol() {
        let lvl = NewLevel::new(" btcusdt ", Timeframe::M5, LevelType::Support, 100.0);
        assert_eq!(lvl.symbol, "BTCUSDT");
    }

    #[test]
    fn parses_portuguese_labels() {
        assert_eq!("suporte".parse::<LevelType>().unwrap(), LevelType::Support);
        assert_eq!("Resistência".parse::<LevelType>().unwrap(), LevelType::Resistance);
        assert_eq!("indefinido".parse::<LevelType>().unwrap(), LevelType::Undefined);
    }

    #[test]
    fn store_row_deserializes() {
        let row = r#"{"id":3,"user_id":"u1","symbol":"BTCUSDT","timeframe":"1h",
                      "type":"resistance","price":113000.5,"at":"2025-09-01T12:00:00Z"}"#;
        let lvl: PriceLevel = serde_json::from_str(row).unwrap();
        assert_eq!(lvl.id, LevelId::new("3"));
        assert!(lvl.is_resistance());
        assert_eq!(lvl.timeframe, Timeframe::H1);
        assert!(lvl.observed_at.is_some());
    }

    #[test]
    fn null_or_unknown_type_is_undefined() {
        let row = r#"{"id":"a","symbol":"X","timeframe":"5m","type":null,"price":1.0,"at":null}"#;
        let lvl: PriceLevel = serde_json::from_str(row).unwrap();
        assert_eq!(lvl.level_type, LevelType::Undefined);
        assert!(lvl.observed_at.is_none());

        let row = r#"{"id":"b","symbol":"X","timeframe":"5m","type":"pivot","price":1.0}"#;
        let lvl: PriceLevel = serde_json::from_str(row).unwrap();
        assert_eq!(lvl.level_type, LevelType::Undefined);
    }
}
