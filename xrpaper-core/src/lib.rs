//! XRPaper core: level-based signal derivation for a discretionary trading journal.
//!
//! The engine turns hand-entered support/resistance levels and indicator
//! readings into:
//! - a merged, price-sorted view of levels and indicator overlays,
//! - the supports and resistances bounding the current price,
//! - a qualitative mood (Favorable / Unfavorable / Neutral),
//! - stop, targets and reward-to-risk for long and short setups.
//!
//! Engine functions are pure. Persistence and authentication sit behind the
//! [`store`] and [`auth`] traits, and [`journal::Journal`] wires them together.

pub mod auth;
pub mod backend;
pub mod config;
pub mod domain;
pub mod execution;
pub mod journal;
pub mod levels;
pub mod mood;
pub mod numeric;
pub mod report;
pub mod store;

pub use execution::plan_execution;
pub use levels::{build_overlays, merge_and_sort, select_nearest};
pub use mood::classify_mood;
pub use numeric::normalize_number;
