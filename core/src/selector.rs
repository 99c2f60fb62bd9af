//! Record filter: which claim lines belong to one forecasting call.

use crate::{claims::ClaimRecord, config::SourceKind};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Exact match on the normalized procedure code.
    Code(String),
    /// Case-insensitive substring match on the drug name.
    Name(String),
}

impl Selector {
    pub fn for_kind(kind: SourceKind, value: &str) -> Self {
        match kind {
            SourceKind::Procedure => Selector::Code(value.trim().to_string()),
            SourceKind::Drug => Selector::Name(value.trim().to_lowercase()),
        }
    }

    pub fn matches(&self, record: &ClaimRecord) -> bool {
        match self {
            Selector::Code(code) => record.key == *code,
            Selector::Name(fragment) => {
                !record.key.is_empty() && record.key.to_lowercase().contains(fragment.as_str())
            }
        }
    }

    /// The subset of `records` this selector matches, in input order.
    pub fn filter<'a>(&self, records: &'a [ClaimRecord]) -> Vec<&'a ClaimRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Code(code) => write!(f, "procedure code {code}"),
            Selector::Name(name) => write!(f, "drug name ~ '{name}'"),
        }
    }
}
