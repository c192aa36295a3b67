//! LevelMerger/Sorter: one price-ordered view over real levels and overlays.

use serde::Serialize;
use std::cmp::Ordering;

use super::overlay::OverlayLevel;
use crate::domain::PriceLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelKind {
    Hl,
    Overlay,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MergedLevel {
    Hl(PriceLevel),
    Overlay(OverlayLevel),
}

impl MergedLevel {
    pub fn kind(&self) -> LevelKind {
        match self {
            MergedLevel::Hl(_) => LevelKind::Hl,
            MergedLevel::Overlay(_) => LevelKind::Overlay,
        }
    }

    pub fn price(&self) -> f64 {
        match self {
            MergedLevel::Hl(l) => l.price,
            MergedLevel::Overlay(o) => o.price,
        }
    }

    pub fn as_hl(&self) -> Option<&PriceLevel> {
        match self {
            MergedLevel::Hl(l) => Some(l),
            MergedLevel::Overlay(_) => None,
        }
    }
}

/// Non-finite prices compare as negative infinity.
fn sort_key(price: f64) -> f64 {
    if price.is_finite() {
        price
    } else {
        f64::NEG_INFINITY
    }
}

/// Merge persisted levels and overlays, sorted by price descending.
///
/// Persisted levels come first in the input sequence, then overlays; the sort
/// is stable, so equal prices keep that order.
pub fn merge_and_sort(levels: &[PriceLevel], overlays: &[OverlayLevel]) -> Vec<MergedLevel> {
    let mut merged: Vec<MergedLevel> = levels
        .iter()
        .cloned()
        .map(MergedLevel::Hl)
        .chain(overlays.iter().cloned().map(MergedLevel::Overlay))
        .collect();

    merged.sort_by(|a, b| {
        sort_key(b.price())
            .partial_cmp(&sort_key(a.price()))
            .unwrap_or(Ordering::Equal)
    });
    merged
}
