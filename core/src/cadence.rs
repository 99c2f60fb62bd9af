//! Cadence estimator.
//!
//! A member's cadence is the mean gap, in days, between their three most
//! recent service dates. Fewer than three dated claims means no cadence.
//! Cadence drives the annual unit forecast: `365 / cadence`.

use crate::{claims::ClaimRecord, types::MemberId};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// How many of the most recent service dates feed the estimate.
pub const CADENCE_WINDOW: usize = 3;

pub const DAYS_PER_YEAR: f64 = 365.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cadence {
    /// Mean days between the most recent visits; `None` when undefined.
    pub avg_days_between: Option<f64>,
    /// `None` when the cadence is undefined or zero.
    pub units_per_year: Option<f64>,
}

impl Cadence {
    pub fn from_dates(dates: &[Option<NaiveDate>]) -> Self {
        let avg_days_between = average_interval(dates);
        Self {
            avg_days_between,
            units_per_year: avg_days_between.and_then(units_per_year),
        }
    }

    pub fn is_defined(&self) -> bool {
        self.avg_days_between.is_some()
    }
}

/// The most recent `CADENCE_WINDOW` dated entries, newest first.
/// Equal dates keep their input order.
pub fn most_recent(dates: &[Option<NaiveDate>]) -> Vec<NaiveDate> {
    let mut dated: Vec<NaiveDate> = dates.iter().flatten().copied().collect();
    dated.sort_by(|a, b| b.cmp(a));
    dated.truncate(CADENCE_WINDOW);
    dated
}

/// Mean absolute gap between successive most-recent service dates.
pub fn average_interval(dates: &[Option<NaiveDate>]) -> Option<f64> {
    let recent = most_recent(dates);
    if recent.len() < CADENCE_WINDOW {
        return None;
    }
    let diffs: Vec<f64> = recent
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).num_days() as f64)
        .collect();
    let mean = diffs.iter().sum::<f64>() / diffs.len() as f64;
    Some(mean.abs())
}

/// Annualized visit count; `None` for a zero interval rather than infinity.
pub fn units_per_year(avg_days_between: f64) -> Option<f64> {
    if avg_days_between > 0.0 {
        Some(DAYS_PER_YEAR / avg_days_between)
    } else {
        None
    }
}

/// Cadence for every member that appears in `records`.
pub fn estimate(records: &[&ClaimRecord]) -> BTreeMap<MemberId, Cadence> {
    let mut by_member: BTreeMap<&str, Vec<Option<NaiveDate>>> = BTreeMap::new();
    for record in records {
        by_member
            .entry(record.member_id.as_str())
            .or_default()
            .push(record.service_date);
    }

    by_member
        .into_iter()
        .map(|(member_id, dates)| {
            let cadence = Cadence::from_dates(&dates);
            if cadence.avg_days_between == Some(0.0) {
                log::warn!("Member {member_id}: recent visits share one date, units/year undefined");
            }
            (member_id.to_string(), cadence)
        })
        .collect()
}
