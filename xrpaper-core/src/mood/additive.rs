//! Additive score policy.
//!
//! One point each for: price above EMA20, price above EMA200, RSI K above D,
//! positive ATR. A condition whose inputs are missing scores nothing.

use std::collections::BTreeMap;

use super::{finite, Mood, MoodEvaluation, MoodInputs, MoodPolicy};

#[derive(Debug, Clone)]
pub struct AdditiveScore {
    pub favorable_at: u32,
    pub unfavorable_at: u32,
}

impl AdditiveScore {
    pub fn new(favorable_at: u32, unfavorable_at: u32) -> Self {
        assert!(
            favorable_at > unfavorable_at,
            "favorable_at must exceed unfavorable_at"
        );
        Self {
            favorable_at,
            unfavorable_at,
        }
    }
}

impl Default for AdditiveScore {
    fn default() -> Self {
        Self::new(3, 1)
    }
}

impl MoodPolicy for AdditiveScore {
    fn name(&self) -> &str {
        "additive_score"
    }

    fn classify(&self, inputs: &MoodInputs) -> MoodEvaluation {
        let price = finite(inputs.price);
        let checks: [(&str, Option<bool>); 4] = [
            (
                "price_above_ema20",
                price.zip(finite(inputs.ema20)).map(|(p, e)| p > e),
            ),
            (
                "price_above_ema200",
                price.zip(finite(inputs.ema200)).map(|(p, e)| p > e),
            ),
            (
                "rsi_k_above_d",
                finite(inputs.rsi_k)
                    .zip(finite(inputs.rsi_d))
                    .map(|(k, d)| k > d),
            ),
            ("atr_positive", finite(inputs.atr).map(|a| a > 0.0)),
        ];

        let evaluable = checks.iter().filter(|(_, c)| c.is_some()).count();
        let conditions: Vec<String> = checks
            .iter()
            .filter(|(_, c)| *c == Some(true))
            .map(|(name, _)| name.to_string())
            .collect();
        let score = conditions.len() as u32;

        // Nothing to judge: stay neutral instead of reading "no data" as bearish.
        let mood = if evaluable == 0 {
            Mood::Neutral
        } else if score >= self.favorable_at {
            Mood::Favorable
        } else if score <= self.unfavorable_at {
            Mood::Unfavorable
        } else {
            Mood::Neutral
        };

        let mut state = BTreeMap::new();
        state.insert("score".to_string(), f64::from(score));
        state.insert("evaluable".to_string(), evaluable as f64);

        MoodEvaluation {
            policy: self.name().to_string(),
            mood,
            conditions,
            state,
        }
    }
}
