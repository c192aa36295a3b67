//! Domain types for the XRPaper journal.

pub mod ids;
pub mod inputs;
pub mod level;
pub mod snapshot;
pub mod time;
pub mod timeframe;

pub use ids::{LevelId, SnapshotId, UserId};
pub use inputs::{IndicatorInputs, RawIndicatorInputs};
pub use level::{HorizontalLevel, LevelType, NewLevel, PriceLevel};
pub use snapshot::{IndicatorSnapshot, NewSnapshot, SnapshotLevel};
pub use time::parse_timestamp;
pub use timeframe::{ParseTimeframeError, Timeframe};
