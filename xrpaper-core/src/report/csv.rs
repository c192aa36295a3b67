//! CSV export of the level list.

use serde::Serialize;
use std::io::Write;

use crate::domain::PriceLevel;

#[derive(Serialize)]
struct LevelRecord<'a> {
    id: &'a str,
    symbol: &'a str,
    timeframe: &'static str,
    #[serde(rename = "type")]
    level_type: &'static str,
    price: f64,
    at: String,
}

/// One row per level with a header line. `at` is RFC 3339 or empty.
pub fn write_levels<W: Write>(levels: &[PriceLevel], writer: W) -> Result<(), ::csv::Error> {
    let mut out = ::csv::Writer::from_writer(writer);
    for level in levels {
        out.serialize(LevelRecord {
            id: level.id.as_str(),
            symbol: &level.symbol,
            timeframe: level.timeframe.as_str(),
            level_type: level.level_type.as_str(),
            price: level.price,
            at: level.observed_at.map(|at| at.to_rfc3339()).unwrap_or_default(),
        })?;
    }
    out.flush()?;
    Ok(())
}
