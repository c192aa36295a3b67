//! ExecutionPlanner: stop, targets and risk/reward from the bounding levels.
//!
//! Fallbacks when a level slot is empty:
//! - the "low" reference is `min(ema20, price)`;
//! - the "high" reference is `max(ema200, price)`.
//!
//! Both fallbacks need a finite EMA and a finite price; with either missing
//! the slot stays empty.
//!
//! Breakout and pullback use the same formulas; `Mode` only selects the
//! trigger checklist in [`super::guidance`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::levels::NearestLevels;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Breakout,
    Pullback,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Long => "long",
            Direction::Short => "short",
        })
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Breakout => "breakout",
            Mode::Pullback => "pullback",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown mode '{0}' (expected breakout or pullback)")]
pub struct ParseModeError(pub String);

impl FromStr for Mode {
    type Err = ParseModeError;

    /// Accepts `breakout`/`rompimento` and `pullback`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "breakout" | "rompimento" => Ok(Mode::Breakout),
            "pullback" => Ok(Mode::Pullback),
            _ => Err(ParseModeError(s.to_string())),
        }
    }
}

/// Everything the planner reads. Missing values are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub price: Option<f64>,
    pub ema20: Option<f64>,
    pub ema200: Option<f64>,
    pub support1: Option<f64>,
    pub support2: Option<f64>,
    pub resistance1: Option<f64>,
    pub resistance2: Option<f64>,
}

impl ExecutionContext {
    pub fn new(
        price: Option<f64>,
        ema20: Option<f64>,
        ema200: Option<f64>,
        nearest: &NearestLevels,
    ) -> Self {
        Self {
            price,
            ema20,
            ema200,
            support1: nearest.support1,
            support2: nearest.support2,
            resistance1: nearest.resistance1,
            resistance2: nearest.resistance2,
        }
    }

    fn finite(v: Option<f64>) -> Option<f64> {
        v.filter(|x| x.is_finite())
    }

    /// `min(ema20, price)`, when both are known.
    fn low_fallback(&self) -> Option<f64> {
        Self::finite(self.ema20)
            .zip(Self::finite(self.price))
            .map(|(ema, px)| ema.min(px))
    }

    /// `max(ema200, price)`, when both are known.
    fn high_fallback(&self) -> Option<f64> {
        Self::finite(self.ema200)
            .zip(Self::finite(self.price))
            .map(|(ema, px)| ema.max(px))
    }
}

/// Derived stop/targets for one direction and mode. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub direction: Direction,
    pub mode: Mode,
    pub stop: Option<f64>,
    pub target1: Option<f64>,
    pub target2: Option<f64>,
    pub risk_reward1: Option<f64>,
    pub risk_reward2: Option<f64>,
}

/// Reward-to-risk ratio. `None` when any input is missing or the risk is not positive.
///
/// Long: `risk = price - stop`, `reward = target - price`.
/// Short: `risk = stop - price`, `reward = price - target`.
pub fn risk_reward(
    direction: Direction,
    price: Option<f64>,
    stop: Option<f64>,
    target: Option<f64>,
) -> Option<f64> {
    let price = price.filter(|v| v.is_finite())?;
    let stop = stop.filter(|v| v.is_finite())?;
    let target = target.filter(|v| v.is_finite())?;

    let (risk, reward) = match direction {
        Direction::Long => (price - stop, target - price),
        Direction::Short => (stop - price, price - target),
    };
    if risk <= 0.0 {
        return None;
    }
    Some(reward / risk)
}

/// Plan stop and targets for a direction. Pure; `mode` is carried through unchanged.
pub fn plan_execution(ctx: &ExecutionContext, direction: Direction, mode: Mode) -> ExecutionPlan {
    let level = ExecutionContext::finite;

    let (stop, target1, target2) = match direction {
        Direction::Long => (
            level(ctx.support1).or_else(|| ctx.low_fallback()),
            level(ctx.resistance1).or_else(|| ctx.high_fallback()),
            level(ctx.resistance2),
        ),
        Direction::Short => (
            level(ctx.resistance1).or_else(|| ctx.high_fallback()),
            level(ctx.support1).or_else(|| ctx.low_fallback()),
            level(ctx.support2),
        ),
    };

    ExecutionPlan {
        direction,
        mode,
        stop,
        target1,
        target2,
        risk_reward1: risk_reward(direction, ctx.price, stop, target1),
        risk_reward2: risk_reward(direction, ctx.price, stop, target2),
    }
}
