//! NearestLevelSelector: the supports and resistances bounding a reference price.
//!
//! Two policies are exposed and deliberately kept apart:
//! - [`select_nearest`]: direction-constrained. Supports at or below `px`,
//!   resistances at or above it, two of each, closest first.
//! - [`select_nearest_by_distance`]: one of each type by minimum `|px - price|`,
//!   whichever side of `px` it sits on.
//!
//! They disagree near the boundary and neither invents a fallback; EMA
//! fallbacks belong to the execution planner.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::merge::MergedLevel;
use crate::domain::{HorizontalLevel, LevelType};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NearestLevels {
    pub support1: Option<f64>,
    pub support2: Option<f64>,
    pub resistance1: Option<f64>,
    pub resistance2: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NearestByDistance {
    pub support: Option<f64>,
    pub resistance: Option<f64>,
}

fn prices_of<L: HorizontalLevel>(levels: &[L], wanted: LevelType) -> impl Iterator<Item = f64> + '_ {
    levels
        .iter()
        .filter(move |l| l.level_type() == wanted)
        .map(|l| l.price())
        .filter(|p| p.is_finite())
}

/// Closest support at/below and resistance at/above `px`, plus the next of each.
pub fn select_nearest<L: HorizontalLevel>(levels: &[L], px: f64) -> NearestLevels {
    if !px.is_finite() {
        return NearestLevels::default();
    }

    let mut supports: Vec<f64> = prices_of(levels, LevelType::Support)
        .filter(|p| *p <= px)
        .collect();
    supports.sort_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));

    let mut resistances: Vec<f64> = prices_of(levels, LevelType::Resistance)
        .filter(|p| *p >= px)
        .collect();
    resistances.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    NearestLevels {
        support1: supports.first().copied(),
        support2: supports.get(1).copied(),
        resistance1: resistances.first().copied(),
        resistance2: resistances.get(1).copied(),
    }
}

/// Same as [`select_nearest`], considering only the persisted (`hl`) entries of a merged view.
pub fn select_nearest_merged(merged: &[MergedLevel], px: f64) -> NearestLevels {
    let levels: Vec<_> = merged.iter().filter_map(MergedLevel::as_hl).cloned().collect();
    select_nearest(&levels, px)
}

fn closest(prices: impl Iterator<Item = f64>, px: f64) -> Option<f64> {
    // `min_by` keeps the first of equal elements, so ties go to input order.
    prices.min_by(|a, b| {
        (px - a)
            .abs()
            .partial_cmp(&(px - b).abs())
            .unwrap_or(Ordering::Equal)
    })
}

/// Nearest support and nearest resistance by absolute distance, either side of `px`.
pub fn select_nearest_by_distance<L: HorizontalLevel>(levels: &[L], px: f64) -> NearestByDistance {
    if !px.is_finite() {
        return NearestByDistance::default();
    }
    NearestByDistance {
        support: closest(prices_of(levels, LevelType::Support), px),
        resistance: closest(prices_of(levels, LevelType::Resistance), px),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LevelId, PriceLevel, Timeframe};
    use crate::levels::overlay::OverlayLevel;

    fn lvl(price: f64, level_type: LevelType) -> PriceLevel {
        PriceLevel {
            id: LevelId::new(format!("{price}")),
            user_id: None,
            symbol: "BTCUSDT".into(),
            timeframe: Timeframe::M15,
            level_type,
            price,
            observed_at: None,
        }
    }

    #[test]
    fn bounding_pair() {
        let levels = vec![
            lvl(112000.0, LevelType::Support),
            lvl(113000.0, LevelType::Resistance),
        ];
        let n = select_nearest(&levels, 112500.0);
        assert_eq!(n.support1, Some(112000.0));
        assert_eq!(n.resistance1, Some(113000.0));
        assert_eq!(n.support2, None);
        assert_eq!(n.resistance2, None);
    }

    #[test]
    fn second_nearest_is_further_away() {
        let levels = vec![
            lvl(90.0, LevelType::Support),
            lvl(98.0, LevelType::Support),
            lvl(95.0, LevelType::Support),
            lvl(110.0, LevelType::Resistance),
            lvl(104.0, LevelType::Resistance),
            lvl(120.0, LevelType::Resistance),
        ];
        let n = select_nearest(&levels, 100.0);
        assert_eq!((n.support1, n.support2), (Some(98.0), Some(95.0)));
        assert_eq!((n.resistance1, n.resistance2), (Some(104.0), Some(110.0)));
    }

    #[test]
    fn wrong_side_levels_are_ignored() {
        let levels = vec![
            lvl(105.0, LevelType::Support),
            lvl(95.0, LevelType::Resistance),
            lvl(99.0, LevelType::Undefined),
        ];
        assert_eq!(select_nearest(&levels, 100.0), NearestLevels::default());
    }

    #[test]
    fn level_at_price_qualifies_on_both_sides() {
        let levels = vec![lvl(100.0, LevelType::Support), lvl(100.0, LevelType::Resistance)];
        let n = select_nearest(&levels, 100.0);
        assert_eq!(n.support1, Some(100.0));
        assert_eq!(n.resistance1, Some(100.0));
    }

    #[test]
    fn non_finite_reference_or_levels() {
        let levels = vec![lvl(f64::NAN, LevelType::Support), lvl(90.0, LevelType::Support)];
        assert_eq!(select_nearest(&levels, 100.0).support1, Some(90.0));
        assert_eq!(select_nearest(&levels, f64::NAN), NearestLevels::default());
    }

    #[test]
    fn empty_input() {
        let none: Vec<PriceLevel> = Vec::new();
        assert_eq!(select_nearest(&none, 1.0), NearestLevels::default());
        assert_eq!(select_nearest_by_distance(&none, 1.0), NearestByDistance::default());
    }

    #[test]
    fn merged_view_ignores_overlays() {
        let merged = vec![
            MergedLevel::Overlay(OverlayLevel {
                label: "[EMA20]".into(),
                price: 99.0,
            }),
            MergedLevel::Hl(lvl(97.0, LevelType::Support)),
        ];
        assert_eq!(select_nearest_merged(&merged, 100.0).support1, Some(97.0));
    }

    #[test]
    fn distance_policy_crosses_sides() {
        // A support just above price is nearer than the one below.
        let levels = vec![
            lvl(90.0, LevelType::Support),
            lvl(101.0, LevelType::Support),
            lvl(99.5, LevelType::Resistance),
            lvl(130.0, LevelType::Resistance),
        ];
        let by_distance = select_nearest_by_distance(&levels, 100.0);
        assert_eq!(by_distance.support, Some(101.0));
        assert_eq!(by_distance.resistance, Some(99.5));

        let constrained = select_nearest(&levels, 100.0);
        assert_eq!(constrained.support1, Some(90.0));
        assert_eq!(constrained.resistance1, Some(130.0));
    }

    #[test]
    fn distance_ties_keep_input_order() {
        let levels = vec![lvl(98.0, LevelType::Support), lvl(102.0, LevelType::Support)];
        assert_eq!(select_nearest_by_distance(&levels, 100.0).support, Some(98.0));
    }
}
