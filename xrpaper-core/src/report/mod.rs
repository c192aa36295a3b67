//! Report rendering: Markdown and JSON for execution views, CSV for levels.

pub mod csv;
pub mod format;
pub mod markdown;

pub use format::{format_num, format_pct, format_price, format_timestamp};
pub use markdown::render_execution;

use crate::journal::ExecutionView;

/// Pretty JSON of an execution view.
pub fn render_execution_json(view: &ExecutionView) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(view)
}
