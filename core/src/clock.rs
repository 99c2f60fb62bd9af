//! Run clock: the single "as-of" date every forecast is measured against.
//!
//! Nothing in the pipeline reads the wall clock directly. The runner
//! resolves one date up front and threads it through, so two runs with
//! the same as-of date and the same input produce identical tables.

use crate::types::Days;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AsOfClock {
    pub as_of: NaiveDate,
}

impl AsOfClock {
    pub fn fixed(as_of: NaiveDate) -> Self {
        Self { as_of }
    }

    /// Today's local calendar date.
    pub fn today() -> Self {
        Self { as_of: Local::now().date_naive() }
    }

    /// Whole days from `date` to the as-of date. Negative for future dates.
    pub fn days_since(&self, date: NaiveDate) -> Days {
        (self.as_of - date).num_days()
    }
}
