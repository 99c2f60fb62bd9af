//! CSV export of destination tables, one file per destination.

use crate::{
    error::ForecastResult,
    forecast::MemberForecast,
    store::validate_destination,
};
use std::path::{Path, PathBuf};

/// Write `rows` to `<dir>/<name>.csv`, replacing any previous export.
/// Undefined values are written as empty cells.
pub fn write_destination(dir: &Path, name: &str, rows: &[MemberForecast]) -> ForecastResult<PathBuf> {
    validate_destination(name)?;
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{name}.csv"));
    let mut writer = csv::Writer::from_path(&path)?;
    if rows.is_empty() {
        // serde only emits headers alongside the first record
        writer.write_record(HEADERS)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(path)
}

const HEADERS: &[&str] = &[
    "member_id",
    "total_cost",
    "unit_count",
    "avg_cost_per_unit",
    "avg_days_between",
    "units_per_year",
    "earliest_date",
    "latest_date",
    "days_since_last",
    "predicted_12_month_cost",
];
