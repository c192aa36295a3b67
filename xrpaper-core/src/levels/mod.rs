//! Level view: overlays, merged ordering, nearest support/resistance.

pub mod merge;
pub mod nearest;
pub mod overlay;

pub use merge::{merge_and_sort, LevelKind, MergedLevel};
pub use nearest::{
    select_nearest, select_nearest_by_distance, select_nearest_merged, NearestByDistance,
    NearestLevels,
};
pub use overlay::{build_overlays, OverlayInputs, OverlayLevel};
