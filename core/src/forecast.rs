//! Recency gate and predictor, plus the per-selector pipeline that ties
//! the filter, cadence estimator and summary aggregator together.
//!
//! PIPELINE (one selector, one source table):
//!   1. filter claim lines by selector; empty subset => NotFound
//!   2. summarize cost, units and date span per member
//!   3. estimate cadence per member
//!   4. join on member id; members with no dated claim never appear, and
//!      members with an undefined cadence appear unless configured out
//!   5. gate on days since last service and extrapolate 12 months

use crate::{
    cadence::{self, Cadence},
    claims::{ClaimRecord, ClaimTable},
    clock::AsOfClock,
    config::{ForecastConfig, RECENCY_GATE_DAYS},
    selector::Selector,
    summary::{self, MemberSummary},
    types::{Days, MemberId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One output row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberForecast {
    pub member_id: MemberId,
    pub total_cost: f64,
    pub unit_count: u64,
    pub avg_cost_per_unit: f64,
    pub avg_days_between: Option<f64>,
    pub units_per_year: Option<f64>,
    pub earliest_date: Option<NaiveDate>,
    pub latest_date: Option<NaiveDate>,
    pub days_since_last: Option<Days>,
    /// `Some(0.0)` for inactive members; `None` when no rate can be derived.
    pub predicted_12_month_cost: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastOptions {
    pub recency_gate_days: Days,
    pub include_undefined_cadence: bool,
}

impl Default for ForecastOptions {
    fn default() -> Self {
        Self {
            recency_gate_days: RECENCY_GATE_DAYS,
            include_undefined_cadence: true,
        }
    }
}

impl From<&ForecastConfig> for ForecastOptions {
    fn from(config: &ForecastConfig) -> Self {
        Self {
            recency_gate_days: config.recency_gate_days,
            include_undefined_cadence: config.include_undefined_cadence,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectorForecast {
    Found(Vec<MemberForecast>),
    NotFound,
}

/// 12-month cost for one member.
///
/// Active members (last service under `gate` days ago) get
/// `avg_cost_per_unit * units_per_year`; inactive members get exactly 0.
pub fn predict_cost(
    avg_cost_per_unit: f64,
    units_per_year: Option<f64>,
    days_since_last: Option<Days>,
    gate: Days,
) -> Option<f64> {
    let days = days_since_last?;
    if days < gate {
        units_per_year.map(|units| avg_cost_per_unit * units)
    } else {
        Some(0.0)
    }
}

fn member_row(
    summary: &MemberSummary,
    cadence: Option<&Cadence>,
    clock: &AsOfClock,
    gate: Days,
) -> MemberForecast {
    let avg_cost_per_unit = summary.avg_cost_per_unit();
    let avg_days_between = cadence.and_then(|c| c.avg_days_between);
    let units_per_year = cadence.and_then(|c| c.units_per_year);
    let days_since_last = summary.latest_date.map(|d| clock.days_since(d));

    MemberForecast {
        member_id: summary.member_id.clone(),
        total_cost: summary.total_cost,
        unit_count: summary.unit_count,
        avg_cost_per_unit,
        avg_days_between,
        units_per_year,
        earliest_date: summary.earliest_date,
        latest_date: summary.latest_date,
        days_since_last,
        predicted_12_month_cost: predict_cost(avg_cost_per_unit, units_per_year, days_since_last, gate),
    }
}

/// Forecast rows for an already-filtered set of claim lines, ordered by
/// member id.
pub fn forecast_members(
    records: &[&ClaimRecord],
    clock: &AsOfClock,
    options: ForecastOptions,
) -> Vec<MemberForecast> {
    let summaries = summary::summarize(records);
    let cadences = cadence::estimate(records);

    summaries
        .values()
        .filter_map(|summary| {
            if summary.latest_date.is_none() {
                log::debug!("Member {}: no dated claim, excluded", summary.member_id);
                return None;
            }
            let cadence = cadences.get(&summary.member_id).filter(|c| c.is_defined());
            if cadence.is_none() && !options.include_undefined_cadence {
                log::debug!("Member {}: cadence undefined, excluded", summary.member_id);
                return None;
            }
            Some(member_row(summary, cadence, clock, options.recency_gate_days))
        })
        .collect()
}

/// Filter `table` by `selector` and forecast every matching member.
pub fn forecast_selector(
    table: &ClaimTable,
    selector: &Selector,
    clock: &AsOfClock,
    options: ForecastOptions,
) -> SelectorForecast {
    let matched = selector.filter(&table.records);
    if matched.is_empty() {
        return SelectorForecast::NotFound;
    }
    log::debug!("{}: {} claim lines match {selector}", table.name, matched.len());
    SelectorForecast::Found(forecast_members(&matched, clock, options))
}
