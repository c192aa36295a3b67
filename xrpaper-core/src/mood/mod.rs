//! MoodClassifier: qualitative market signal from indicator thresholds.
//!
//! Two heuristics exist and both are kept as named policies behind the
//! `MoodPolicy` trait. Configuration picks one; nothing blends them.

pub mod additive;
pub mod atr_band;

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use additive::AdditiveScore;
pub use atr_band::AtrBand;

/// Three-valued market mood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Favorable,
    Unfavorable,
    Neutral,
}

impl Mood {
    /// Display label used in the journal screens and reports.
    pub fn label(&self) -> &'static str {
        match self {
            Mood::Favorable => "Favorável",
            Mood::Unfavorable => "Desfavorável",
            Mood::Neutral => "Neutro",
        }
    }

    /// Lenient parse: English or Portuguese, any case, with or without accents.
    pub fn from_label(raw: &str) -> Option<Mood> {
        let folded: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| match c {
                'á' | 'à' | 'â' | 'ã' => 'a',
                'é' | 'ê' => 'e',
                other => other,
            })
            .collect();
        match folded.as_str() {
            "favorable" | "favoravel" => Some(Mood::Favorable),
            "unfavorable" | "desfavoravel" => Some(Mood::Unfavorable),
            "neutral" | "neutro" => Some(Mood::Neutral),
            _ => None,
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Mood {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Mood::from_label(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown mood label '{raw}'")))
    }
}

/// Indicator readings consumed by the mood policies. Missing readings are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MoodInputs {
    pub price: Option<f64>,
    pub ema20: Option<f64>,
    pub ema200: Option<f64>,
    pub rsi_k: Option<f64>,
    pub rsi_d: Option<f64>,
    pub atr: Option<f64>,
}

/// Finite value or nothing.
pub(crate) fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

/// Verdict of a policy plus the state it saw, for display and auditing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodEvaluation {
    pub policy: String,
    pub mood: Mood,
    /// Names of the conditions that fired.
    pub conditions: Vec<String>,
    /// Intermediate values (score, ATR%, ...).
    pub state: BTreeMap<String, f64>,
}

/// A mood classification heuristic.
///
/// Implementations must be total: any subset of missing inputs yields a
/// verdict (falling back to `Neutral`), never a panic.
pub trait MoodPolicy: Send + Sync {
    /// Stable policy name (e.g. "additive_score").
    fn name(&self) -> &str;

    fn classify(&self, inputs: &MoodInputs) -> MoodEvaluation;
}

/// Classify with the default additive-score policy.
pub fn classify_mood(inputs: &MoodInputs) -> Mood {
    AdditiveScore::default().classify(inputs).mood
}

// ─── Configuration & factory ─────────────────────────────────────────

/// Serializable policy selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MoodPolicyConfig {
    /// One point per bullish condition; `>= favorable_at` is Favorable,
    /// `<= unfavorable_at` is Unfavorable.
    AdditiveScore {
        #[serde(default = "default_favorable_at")]
        favorable_at: u32,
        #[serde(default = "default_unfavorable_at")]
        unfavorable_at: u32,
    },
    /// ATR as a percentage of price, combined with an RSI K band.
    AtrBand {
        #[serde(default = "default_favorable_atr_pct")]
        favorable_atr_pct: f64,
        #[serde(default = "default_unfavorable_atr_pct")]
        unfavorable_atr_pct: f64,
        #[serde(default = "default_rsi_low")]
        rsi_low: f64,
        #[serde(default = "default_rsi_high")]
        rsi_high: f64,
    },
}

fn default_favorable_at() -> u32 {
    3
}
fn default_unfavorable_at() -> u32 {
    1
}
fn default_favorable_atr_pct() -> f64 {
    1.0
}
fn default_unfavorable_atr_pct() -> f64 {
    0.5
}
fn default_rsi_low() -> f64 {
    50.0
}
fn default_rsi_high() -> f64 {
    80.0
}

impl Default for MoodPolicyConfig {
    fn default() -> Self {
        MoodPolicyConfig::AdditiveScore {
            favorable_at: default_favorable_at(),
            unfavorable_at: default_unfavorable_at(),
        }
    }
}

impl MoodPolicyConfig {
    pub fn atr_band_defaults() -> Self {
        MoodPolicyConfig::AtrBand {
            favorable_atr_pct: default_favorable_atr_pct(),
            unfavorable_atr_pct: default_unfavorable_atr_pct(),
            rsi_low: default_rsi_low(),
            rsi_high: default_rsi_high(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FactoryError {
    #[error("additive thresholds overlap: favorable_at={favorable_at} must exceed unfavorable_at={unfavorable_at}")]
    OverlappingScores { favorable_at: u32, unfavorable_at: u32 },
    #[error("ATR% thresholds inverted: favorable {favorable} must be >= unfavorable {unfavorable}")]
    InvertedAtrThresholds { favorable: f64, unfavorable: f64 },
    #[error("RSI band [{low}, {high}] is empty")]
    EmptyRsiBand { low: f64, high: f64 },
}

/// Build a mood policy from its configuration.
pub fn create_mood_policy(config: &MoodPolicyConfig) -> Result<Box<dyn MoodPolicy>, FactoryError> {
    match *config {
        MoodPolicyConfig::AdditiveScore {
            favorable_at,
            unfavorable_at,
        } => {
            if favorable_at <= unfavorable_at {
                return Err(FactoryError::OverlappingScores {
                    favorable_at,
                    unfavorable_at,
                });
            }
            Ok(Box::new(AdditiveScore::new(favorable_at, unfavorable_at)))
        }
        MoodPolicyConfig::AtrBand {
            favorable_atr_pct,
            unfavorable_atr_pct,
            rsi_low,
            rsi_high,
        } => {
            if favorable_atr_pct < unfavorable_atr_pct {
                return Err(FactoryError::InvertedAtrThresholds {
                    favorable: favorable_atr_pct,
                    unfavorable: unfavorable_atr_pct,
                });
            }
            if rsi_low > rsi_high {
                return Err(FactoryError::EmptyRsiBand {
                    low: rsi_low,
                    high: rsi_high,
                });
            }
            Ok(Box::new(AtrBand::new(
                favorable_atr_pct,
                unfavorable_atr_pct,
                rsi_low,
                rsi_high,
            )))
        }
    }
}
