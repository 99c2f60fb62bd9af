//! forecast-core: 12-month member cost forecasts from claims extracts.
//!
//! One heuristic, applied per selector (procedure code or drug name):
//! average days between each member's three most recent services,
//! annualized, times average cost per unit, zeroed for members whose
//! last service is 275 or more days old.

pub mod cadence;
pub mod claims;
pub mod clock;
pub mod config;
pub mod csv_export;
pub mod engine;
pub mod error;
pub mod forecast;
pub mod selector;
pub mod store;
pub mod summary;
pub mod types;
