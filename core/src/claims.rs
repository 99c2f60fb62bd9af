//! Claims tables: one parsed line per billed claim.
//!
//! Tables arrive as CSV exports of workbook tabs. Headers are the
//! human-readable names from the extract; `TableSchema` maps them to the
//! canonical fields below. Columns the forecaster does not use are ignored.

use crate::{
    config::{SourceConfig, SourceKind},
    error::{ForecastError, ForecastResult},
    types::MemberId,
};
use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use std::{fs::File, io::Read, path::Path};

#[derive(Debug, Clone, PartialEq)]
pub struct ClaimRecord {
    pub member_id: MemberId,
    /// Procedure code (medical) or drug name (pharmacy).
    pub key: String,
    pub service_date: Option<NaiveDate>,
    pub paid_date: Option<NaiveDate>,
    pub employer_paid: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ClaimTable {
    pub name: String,
    pub kind: SourceKind,
    pub records: Vec<ClaimRecord>,
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

impl ClaimTable {
    /// Read `<data_dir>/<source.name>.csv`.
    pub fn load(data_dir: &str, source: &SourceConfig) -> ForecastResult<Self> {
        let path = Path::new(data_dir).join(format!("{}.csv", source.name));
        let file = File::open(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", path.display()))?;
        let table = Self::from_reader(source, file)?;
        log::debug!(
            "Loaded {} claim lines from {}",
            table.records.len(),
            path.display()
        );
        Ok(table)
    }

    pub fn from_reader<R: Read>(source: &SourceConfig, reader: R) -> ForecastResult<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::Headers)
            .flexible(true)
            .from_reader(reader);
        let headers = rdr.headers()?.clone();
        let columns = ColumnIndex::resolve(&source.name, &headers, source)?;

        let mut records = Vec::new();
        for (i, result) in rdr.records().enumerate() {
            let row = result?;
            // Row 1 is the header.
            let row_no = i + 2;
            if row.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            match columns.parse_row(&source.name, source.kind, row_no, &row)? {
                Some(record) => records.push(record),
                None => log::debug!("{} row {row_no}: no member id, skipped", source.name),
            }
        }

        Ok(Self {
            name: source.name.clone(),
            kind: source.kind,
            records,
        })
    }
}

/// Positions of the canonical fields within the header row.
struct ColumnIndex<'a> {
    source: &'a SourceConfig,
    member_id: usize,
    key: usize,
    service_date: usize,
    paid_date: usize,
    employer_paid: usize,
}

impl<'a> ColumnIndex<'a> {
    fn resolve(table: &str, headers: &StringRecord, source: &'a SourceConfig) -> ForecastResult<Self> {
        let find = |column: &str| {
            headers
                .iter()
                .position(|h| h == column.trim())
                .ok_or_else(|| ForecastError::MissingColumn {
                    table: table.to_string(),
                    column: column.to_string(),
                })
        };
        let schema = &source.schema;
        Ok(Self {
            source,
            member_id: find(&schema.member_id)?,
            key: find(&schema.key)?,
            service_date: find(&schema.service_date)?,
            paid_date: find(&schema.paid_date)?,
            employer_paid: find(&schema.employer_paid)?,
        })
    }

    fn parse_row(
        &self,
        table: &str,
        kind: SourceKind,
        row_no: usize,
        row: &StringRecord,
    ) -> ForecastResult<Option<ClaimRecord>> {
        let cell = |idx: usize| row.get(idx).unwrap_or("").trim();
        let schema = &self.source.schema;

        let member_id = strip_float_suffix(cell(self.member_id));
        if member_id.is_empty() {
            return Ok(None);
        }

        let key = match kind {
            SourceKind::Procedure => strip_float_suffix(cell(self.key)).to_string(),
            SourceKind::Drug => cell(self.key).to_string(),
        };

        let date_field = |idx: usize, column: &str| -> ForecastResult<Option<NaiveDate>> {
            let raw = cell(idx);
            if raw.is_empty() {
                return Ok(None);
            }
            parse_date(raw).map(Some).ok_or_else(|| ForecastError::InvalidDate {
                table: table.to_string(),
                row: row_no,
                column: column.to_string(),
                value: raw.to_string(),
            })
        };

        let raw_amount = cell(self.employer_paid);
        let employer_paid = if raw_amount.is_empty() {
            None
        } else {
            Some(parse_amount(raw_amount).ok_or_else(|| ForecastError::InvalidAmount {
                table: table.to_string(),
                row: row_no,
                column: schema.employer_paid.clone(),
                value: raw_amount.to_string(),
            })?)
        };

        Ok(Some(ClaimRecord {
            member_id: member_id.to_string(),
            key,
            service_date: date_field(self.service_date, &schema.service_date)?,
            paid_date: date_field(self.paid_date, &schema.paid_date)?,
            employer_paid,
        }))
    }
}

/// Spreadsheet exports render integer cells as `96413.0`.
pub fn strip_float_suffix(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed.strip_suffix(".0").unwrap_or(trimmed)
}

/// Parse a calendar date, dropping any time-of-day component.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Parse a currency cell: `1234.5`, `$1,234.50`, `(12.00)` for negatives.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let mut s = raw.trim();
    let negative = s.starts_with('(') && s.ends_with(')');
    if negative {
        s = &s[1..s.len() - 1];
    }
    let cleaned: String = s.chars().filter(|c| *c != '$' && *c != ',').collect();
    let value: f64 = cleaned.trim().parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value } else { value })
}
