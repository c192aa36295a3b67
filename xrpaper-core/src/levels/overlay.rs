//! OverlayBuilder: synthetic pseudo-levels from the current indicator readings.

use serde::{Deserialize, Serialize};

pub const LABEL_PRICE_NOW: &str = "[Valor Atual]";
pub const LABEL_EMA20: &str = "[EMA20]";
pub const LABEL_EMA200: &str = "[EMA200]";

/// Ephemeral marker drawn next to real levels. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayLevel {
    pub label: String,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OverlayInputs {
    pub price_now: Option<f64>,
    pub ema20: Option<f64>,
    pub ema200: Option<f64>,
}

/// One overlay per known input, generated in the order: price, EMA20, EMA200.
///
/// Final placement is left to the merge sort.
pub fn build_overlays(inputs: &OverlayInputs) -> Vec<OverlayLevel> {
    [
        (LABEL_PRICE_NOW, inputs.price_now),
        (LABEL_EMA20, inputs.ema20),
        (LABEL_EMA200, inputs.ema200),
    ]
    .into_iter()
    .filter_map(|(label, value)| {
        value.filter(|v| v.is_finite()).map(|price| OverlayLevel {
            label: label.to_string(),
            price,
        })
    })
    .collect()
}
