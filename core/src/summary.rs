//! Member summary aggregator: cost, units and date span per member.

use crate::{claims::ClaimRecord, types::MemberId};
use chrono::NaiveDate;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct MemberSummary {
    pub member_id: MemberId,
    /// Sum of employer-paid amounts; blank amounts contribute nothing.
    pub total_cost: f64,
    /// Number of matching claim lines. Always at least 1.
    pub unit_count: u64,
    pub earliest_date: Option<NaiveDate>,
    pub latest_date: Option<NaiveDate>,
}

impl MemberSummary {
    fn new(member_id: &str) -> Self {
        Self {
            member_id: member_id.to_string(),
            total_cost: 0.0,
            unit_count: 0,
            earliest_date: None,
            latest_date: None,
        }
    }

    fn add(&mut self, record: &ClaimRecord) {
        self.total_cost += record.employer_paid.unwrap_or(0.0);
        self.unit_count += 1;
        if let Some(date) = record.service_date {
            self.earliest_date = Some(self.earliest_date.map_or(date, |d| d.min(date)));
            self.latest_date = Some(self.latest_date.map_or(date, |d| d.max(date)));
        }
    }

    pub fn avg_cost_per_unit(&self) -> f64 {
        self.total_cost / self.unit_count as f64
    }
}

/// One summary per member, keyed and ordered by member id.
pub fn summarize(records: &[&ClaimRecord]) -> BTreeMap<MemberId, MemberSummary> {
    let mut out: BTreeMap<MemberId, MemberSummary> = BTreeMap::new();
    for record in records {
        out.entry(record.member_id.clone())
            .or_insert_with(|| MemberSummary::new(&record.member_id))
            .add(record);
    }
    out
}
