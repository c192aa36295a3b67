//! Indicator readings copied from a broker or charting screen.

use serde::{Deserialize, Serialize};

use crate::levels::OverlayInputs;
use crate::mood::MoodInputs;
use crate::numeric::normalize_opt;

/// Raw, user-typed readings. Any field may be blank or use either decimal convention.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawIndicatorInputs {
    pub price: Option<String>,
    pub atr: Option<String>,
    pub rsi_k: Option<String>,
    pub rsi_d: Option<String>,
    pub ema20: Option<String>,
    pub ema200: Option<String>,
    pub vwap: Option<String>,
    pub vol_avg: Option<String>,
}

/// Normalized readings. Unparseable input is `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorInputs {
    pub price: Option<f64>,
    /// Absolute ATR.
    pub atr: Option<f64>,
    pub rsi_k: Option<f64>,
    pub rsi_d: Option<f64>,
    pub ema20: Option<f64>,
    pub ema200: Option<f64>,
    pub vwap: Option<f64>,
    pub vol_avg: Option<f64>,
}

impl IndicatorInputs {
    pub fn from_raw(raw: &RawIndicatorInputs) -> Self {
        Self {
            price: normalize_opt(raw.price.as_deref()),
            atr: normalize_opt(raw.atr.as_deref()),
            rsi_k: normalize_opt(raw.rsi_k.as_deref()),
            rsi_d: normalize_opt(raw.rsi_d.as_deref()),
            ema20: normalize_opt(raw.ema20.as_deref()),
            ema200: normalize_opt(raw.ema200.as_deref()),
            vwap: normalize_opt(raw.vwap.as_deref()),
            vol_avg: normalize_opt(raw.vol_avg.as_deref()),
        }
    }

    pub fn mood_inputs(&self) -> MoodInputs {
        MoodInputs {
            price: self.price,
            ema20: self.ema20,
            ema200: self.ema200,
            rsi_k: self.rsi_k,
            rsi_d: self.rsi_d,
            atr: self.atr,
        }
    }

    pub fn overlay_inputs(&self) -> OverlayInputs {
        OverlayInputs {
            price_now: self.price,
            ema20: self.ema20,
            ema200: self.ema200,
        }
    }

    /// ATR as a percentage of price, when both are known and price is non-zero.
    pub fn atr_pct(&self) -> Option<f64> {
        crate::mood::AtrBand::atr_percent(self.atr, self.price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_mixed_conventions() {
        let raw = RawIndicatorInputs {
            price: Some("112.863".into()),
            atr: Some("89,74".into()),
            rsi_k: Some("43.41".into()),
            rsi_d: Some("".into()),
            ema20: Some("112,043.00".into()),
            ema200: None,
            vwap: Some("abc".into()),
            vol_avg: Some("8.684".into()),
        };
        let inputs = IndicatorInputs::from_raw(&raw);
        // A lone dot is a decimal point, not a thousands separator.
        assert_eq!(inputs.price, Some(112.863));
        assert_eq!(inputs.atr, Some(89.74));
        assert_eq!(inputs.rsi_d, None);
        assert_eq!(inputs.ema20, Some(112043.0));
        assert_eq!(inputs.ema200, None);
        assert_eq!(inputs.vwap, None);
    }

    #[test]
    fn atr_pct_needs_price() {
        let inputs = IndicatorInputs {
            price: Some(200.0),
            atr: Some(3.0),
            ..IndicatorInputs::default()
        };
        assert_eq!(inputs.atr_pct(), Some(1.5));
        assert_eq!(IndicatorInputs::default().atr_pct(), None);
    }
}
