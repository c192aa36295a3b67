//! ATR-band policy.
//!
//! Uses volatility relative to price (`ATR% = atr / price * 100`) together with
//! the RSI K/D crossover and a K band. Needs every input; otherwise Neutral.

use std::collections::BTreeMap;

use super::{finite, Mood, MoodEvaluation, MoodInputs, MoodPolicy};

#[derive(Debug, Clone)]
pub struct AtrBand {
    pub favorable_atr_pct: f64,
    pub unfavorable_atr_pct: f64,
    pub rsi_low: f64,
    pub rsi_high: f64,
}

impl AtrBand {
    pub fn new(favorable_atr_pct: f64, unfavorable_atr_pct: f64, rsi_low: f64, rsi_high: f64) -> Self {
        assert!(
            favorable_atr_pct >= unfavorable_atr_pct,
            "favorable ATR% must be >= unfavorable ATR%"
        );
        assert!(rsi_low <= rsi_high, "RSI band must not be empty");
        Self {
            favorable_atr_pct,
            unfavorable_atr_pct,
            rsi_low,
            rsi_high,
        }
    }

    /// ATR as a percentage of price; `None` when either is missing or price is zero.
    pub fn atr_percent(atr: Option<f64>, price: Option<f64>) -> Option<f64> {
        let (atr, price) = finite(atr).zip(finite(price))?;
        if price == 0.0 {
            return None;
        }
        Some(atr / price * 100.0)
    }
}

impl Default for AtrBand {
    fn default() -> Self {
        Self::new(1.0, 0.5, 50.0, 80.0)
    }
}

impl MoodPolicy for AtrBand {
    fn name(&self) -> &str {
        "atr_band"
    }

    fn classify(&self, inputs: &MoodInputs) -> MoodEvaluation {
        let mut state = BTreeMap::new();
        let mut conditions = Vec::new();

        let atr_pct = Self::atr_percent(inputs.atr, inputs.price);
        let rsi = finite(inputs.rsi_k).zip(finite(inputs.rsi_d));

        let mood = match (atr_pct, rsi) {
            (Some(atr_pct), Some((k, d))) => {
                state.insert("atr_pct".to_string(), atr_pct);

                let volatile = atr_pct >= self.favorable_atr_pct;
                let in_band = (self.rsi_low..=self.rsi_high).contains(&k);
                let rising = k > d;
                let quiet = atr_pct < self.unfavorable_atr_pct;
                let falling = k < d;

                for (name, fired) in [
                    ("atr_pct_expanding", volatile),
                    ("rsi_k_in_band", in_band),
                    ("rsi_k_above_d", rising),
                    ("atr_pct_compressed", quiet),
                    ("rsi_k_below_d", falling),
                ] {
                    if fired {
                        conditions.push(name.to_string());
                    }
                }

                if volatile && in_band && rising {
                    Mood::Favorable
                } else if quiet || falling {
                    Mood::Unfavorable
                } else {
                    Mood::Neutral
                }
            }
            _ => Mood::Neutral,
        };

        MoodEvaluation {
            policy: self.name().to_string(),
            mood,
            conditions,
            state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(price: f64, atr: f64, rsi_k: f64, rsi_d: f64) -> MoodInputs {
        MoodInputs {
            price: Some(price),
            atr: Some(atr),
            rsi_k: Some(rsi_k),
            rsi_d: Some(rsi_d),
            ..MoodInputs::default()
        }
    }

    #[test]
    fn expanding_volatility_in_band_is_favorable() {
        let eval = AtrBand::default().classify(&inputs(100.0, 1.5, 60.0, 55.0));
        assert_eq!(eval.mood, Mood::Favorable);
        assert!((eval.state["atr_pct"] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn band_edges_are_inclusive() {
        assert_eq!(
            AtrBand::default().classify(&inputs(100.0, 1.0, 80.0, 79.0)).mood,
            Mood::Favorable
        );
        assert_eq!(
            AtrBand::default().classify(&inputs(100.0, 1.0, 50.0, 49.0)).mood,
            Mood::Favorable
        );
    }

    #[test]
    fn rsi_above_band_is_neutral() {
        let eval = AtrBand::default().classify(&inputs(100.0, 2.0, 85.0, 70.0));
        assert_eq!(eval.mood, Mood::Neutral);
    }

    #[test]
    fn compressed_atr_is_unfavorable() {
        let eval = AtrBand::default().classify(&inputs(100.0, 0.3, 60.0, 55.0));
        assert_eq!(eval.mood, Mood::Unfavorable);
    }

    #[test]
    fn k_below_d_is_unfavorable() {
        // Study example: ATR% ~0.08 and K < D.
        let eval = AtrBand::default().classify(&inputs(112863.0, 89.74, 43.41, 47.94));
        assert_eq!(eval.mood, Mood::Unfavorable);
        assert!(eval.conditions.contains(&"rsi_k_below_d".to_string()));
    }

    #[test]
    fn middle_volatility_is_neutral() {
        let eval = AtrBand::default().classify(&inputs(100.0, 0.7, 60.0, 55.0));
        assert_eq!(eval.mood, Mood::Neutral);
    }

    #[test]
    fn any_missing_input_is_neutral() {
        let mut partial = inputs(100.0, 0.1, 40.0, 60.0);
        partial.rsi_d = None;
        assert_eq!(AtrBand::default().classify(&partial).mood, Mood::Neutral);
        assert_eq!(
            AtrBand::default().classify(&MoodInputs::default()).mood,
            Mood::Neutral
        );
    }

    #[test]
    fn zero_price_is_neutral() {
        let eval = AtrBand::default().classify(&inputs(0.0, 1.0, 60.0, 50.0));
        assert_eq!(eval.mood, Mood::Neutral);
        assert!(eval.state.is_empty());
    }
}
