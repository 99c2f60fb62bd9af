//! SQLite persistence layer: the output "workbook".
//!
//! RULE: Only store.rs talks to the database.
//! Each destination is a table that is dropped and rebuilt on every write;
//! the run ledger (forecast_run, selector_outcome) is append-only.

use crate::{
    error::{ForecastError, ForecastResult},
    forecast::MemberForecast,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

pub struct ForecastStore {
    conn: Connection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    Written,
    NotFound,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Written => "written",
            OutcomeStatus::NotFound => "not_found",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "written" => Some(OutcomeStatus::Written),
            "not_found" => Some(OutcomeStatus::NotFound),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeRow {
    pub source: String,
    pub destination: String,
    pub selector: String,
    pub status: OutcomeStatus,
    pub member_count: i64,
}

/// Ledger tables a destination must never overwrite.
const RESERVED_TABLES: &[&str] = &["forecast_run", "selector_outcome"];

/// Destination names become SQL identifiers, so only `[A-Za-z0-9_]+`.
pub fn validate_destination(name: &str) -> ForecastResult<()> {
    let lower = name.to_ascii_lowercase();
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && !lower.starts_with("sqlite_")
        && !RESERVED_TABLES.contains(&lower.as_str());
    if valid {
        Ok(())
    } else {
        Err(ForecastError::InvalidDestination { name: name.to_string() })
    }
}

impl ForecastStore {
    pub fn open(path: &str) -> ForecastResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (:memory: ignores it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> ForecastResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> ForecastResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_forecast_ledger.sql"))?;
        Ok(())
    }

    // ── Run ledger ─────────────────────────────────────────────

    pub fn insert_run(&self, run_id: &str, as_of: NaiveDate, version: &str) -> ForecastResult<()> {
        self.conn.execute(
            "INSERT INTO forecast_run (run_id, as_of, version, started_at) VALUES (?1, ?2, ?3, ?4)",
            params![run_id, as_of.to_string(), version, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn record_outcome(&self, run_id: &str, outcome: &OutcomeRow) -> ForecastResult<()> {
        self.conn.execute(
            "INSERT INTO selector_outcome (run_id, source, destination, selector, status, member_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                run_id,
                outcome.source,
                outcome.destination,
                outcome.selector,
                outcome.status.as_str(),
                outcome.member_count,
            ],
        )?;
        Ok(())
    }

    pub fn outcomes_for_run(&self, run_id: &str) -> ForecastResult<Vec<OutcomeRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT source, destination, selector, status, member_count
             FROM selector_outcome WHERE run_id = ?1
             ORDER BY id ASC",
        )?;
        let raw = stmt
            .query_map(params![run_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(source, destination, selector, status, member_count)| -> ForecastResult<OutcomeRow> {
                let status = OutcomeStatus::parse(&status)
                    .ok_or_else(|| anyhow::anyhow!("Unknown outcome status '{status}'"))?;
                Ok(OutcomeRow { source, destination, selector, status, member_count })
            })
            .collect()
    }

    // ── Destinations ───────────────────────────────────────────

    pub fn destination_exists(&self, name: &str) -> ForecastResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Drop `name` if present, recreate it, and insert `rows`, atomically.
    pub fn replace_destination(&self, name: &str, rows: &[MemberForecast]) -> ForecastResult<()> {
        validate_destination(name)?;
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS \"{name}\";
             CREATE TABLE \"{name}\" (
                 member_id                TEXT PRIMARY KEY,
                 total_cost               REAL NOT NULL,
                 unit_count               INTEGER NOT NULL,
                 avg_cost_per_unit        REAL NOT NULL,
                 avg_days_between         REAL,
                 units_per_year           REAL,
                 earliest_date            TEXT,
                 latest_date              TEXT,
                 days_since_last          INTEGER,
                 predicted_12_month_cost  REAL
             );"
        ))?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO \"{name}\" (
                     member_id, total_cost, unit_count, avg_cost_per_unit, avg_days_between,
                     units_per_year, earliest_date, latest_date, days_since_last,
                     predicted_12_month_cost
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ))?;
            for row in rows {
                stmt.execute(params![
                    row.member_id,
                    row.total_cost,
                    row.unit_count as i64,
                    row.avg_cost_per_unit,
                    row.avg_days_between,
                    row.units_per_year,
                    row.earliest_date.map(|d| d.to_string()),
                    row.latest_date.map(|d| d.to_string()),
                    row.days_since_last,
                    row.predicted_12_month_cost,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Read a destination back in member order.
    pub fn read_destination(&self, name: &str) -> ForecastResult<Vec<MemberForecast>> {
        validate_destination(name)?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT member_id, total_cost, unit_count, avg_cost_per_unit, avg_days_between,
                    units_per_year, earliest_date, latest_date, days_since_last,
                    predicted_12_month_cost
             FROM \"{name}\" ORDER BY member_id ASC"
        ))?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    MemberForecast {
                        member_id: row.get(0)?,
                        total_cost: row.get(1)?,
                        unit_count: row.get::<_, i64>(2)? as u64,
                        avg_cost_per_unit: row.get(3)?,
                        avg_days_between: row.get(4)?,
                        units_per_year: row.get(5)?,
                        earliest_date: None,
                        latest_date: None,
                        days_since_last: row.get(8)?,
                        predicted_12_month_cost: row.get(9)?,
                    },
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(mut forecast, earliest, latest)| -> ForecastResult<MemberForecast> {
                forecast.earliest_date = parse_stored_date(earliest)?;
                forecast.latest_date = parse_stored_date(latest)?;
                Ok(forecast)
            })
            .collect()
    }
}

fn parse_stored_date(raw: Option<String>) -> ForecastResult<Option<NaiveDate>> {
    raw.map(|s| {
        NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map_err(|e| ForecastError::from(anyhow::anyhow!("Stored date '{s}' unreadable: {e}")))
    })
    .transpose()
}
