//! The forecast engine: runs a batch of selector calls against the claims
//! tables and writes each result to its destination.
//!
//! RULES:
//!   - Runs execute in configuration order, one at a time.
//!   - Each source table is loaded once, before the first write, and
//!     reused by every run.
//!   - A selector with no matching claims is logged and skipped; its
//!     destination is left untouched and the batch continues.
//!   - Every run, written or skipped, lands in the selector_outcome ledger.

use crate::{
    claims::ClaimTable,
    clock::AsOfClock,
    config::{ForecastConfig, RunSpec, SourceConfig},
    csv_export,
    error::{ForecastError, ForecastResult},
    forecast::{forecast_selector, ForecastOptions, SelectorForecast},
    selector::Selector,
    store::{validate_destination, ForecastStore, OutcomeRow, OutcomeStatus},
    types::RunId,
};
use std::{collections::HashMap, path::PathBuf};

pub struct ForecastEngine {
    pub run_id: RunId,
    pub clock:  AsOfClock,
    config:     ForecastConfig,
    data_dir:   String,
    csv_out:    Option<PathBuf>,
    tables:     HashMap<String, ClaimTable>,
    store:      ForecastStore,
}

impl ForecastEngine {
    pub fn new(
        run_id: RunId,
        clock: AsOfClock,
        config: ForecastConfig,
        store: ForecastStore,
        data_dir: &str,
    ) -> Self {
        Self {
            run_id,
            clock,
            config,
            data_dir: data_dir.to_string(),
            csv_out: None,
            tables: HashMap::new(),
            store,
        }
    }

    /// Build an engine with a fresh run id registered in the ledger.
    /// Call this instead of new() + manual insert_run().
    pub fn build(
        config: ForecastConfig,
        clock: AsOfClock,
        store: ForecastStore,
        data_dir: &str,
    ) -> ForecastResult<Self> {
        let run_id = uuid::Uuid::new_v4().to_string();
        store.insert_run(&run_id, clock.as_of, env!("CARGO_PKG_VERSION"))?;
        Ok(Self::new(run_id, clock, config, store, data_dir))
    }

    /// Also export every written destination to `<dir>/<destination>.csv`.
    pub fn with_csv_export(mut self, dir: impl Into<PathBuf>) -> Self {
        self.csv_out = Some(dir.into());
        self
    }

    /// Register an already-loaded table, bypassing the CSV loader.
    pub fn insert_table(&mut self, table: ClaimTable) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn store(&self) -> &ForecastStore {
        &self.store
    }

    /// Check every run's source and destination, then load every source
    /// table the batch reads. Nothing is written until all of it passes.
    pub fn validate(&mut self) -> ForecastResult<()> {
        let mut sources: Vec<SourceConfig> = Vec::new();
        for spec in &self.config.runs {
            let source = self.source_for(spec)?;
            validate_destination(&spec.destination)?;
            if !sources.iter().any(|s| s.name == source.name) {
                sources.push(source.clone());
            }
        }
        for source in &sources {
            self.ensure_loaded(source)?;
        }
        Ok(())
    }

    /// Run every configured selector in order.
    pub fn run_batch(&mut self) -> ForecastResult<Vec<OutcomeRow>> {
        self.validate()?;
        let runs = self.config.runs.clone();
        let mut outcomes = Vec::with_capacity(runs.len());
        for spec in &runs {
            outcomes.push(self.run_one(spec)?);
        }
        Ok(outcomes)
    }

    /// Forecast one selector and write its destination.
    pub fn run_one(&mut self, spec: &RunSpec) -> ForecastResult<OutcomeRow> {
        let source = self.source_for(spec)?.clone();
        self.ensure_loaded(&source)?;
        let table = self
            .tables
            .get(&source.name)
            .ok_or_else(|| ForecastError::UnknownSource { name: source.name.clone() })?;

        let selector = Selector::for_kind(source.kind, &spec.selector);
        let options = ForecastOptions::from(&self.config);

        let (status, member_count) = match forecast_selector(table, &selector, &self.clock, options) {
            SelectorForecast::NotFound => {
                log::warn!(
                    "{selector} not found in {}; skipping {}",
                    source.name,
                    spec.destination
                );
                (OutcomeStatus::NotFound, 0)
            }
            SelectorForecast::Found(rows) => {
                // export first: a failed export must not leave the table replaced
                if let Some(dir) = &self.csv_out {
                    let path = csv_export::write_destination(dir, &spec.destination, &rows)?;
                    log::debug!("Exported {}", path.display());
                }
                self.store.replace_destination(&spec.destination, &rows)?;
                log::info!(
                    "{}: {} members forecast for {selector}",
                    spec.destination,
                    rows.len()
                );
                (OutcomeStatus::Written, rows.len() as i64)
            }
        };

        let outcome = OutcomeRow {
            source: source.name,
            destination: spec.destination.clone(),
            selector: spec.selector.clone(),
            status,
            member_count,
        };
        self.store.record_outcome(&self.run_id, &outcome)?;
        Ok(outcome)
    }

    fn source_for(&self, spec: &RunSpec) -> ForecastResult<&SourceConfig> {
        self.config
            .source(&spec.source)
            .ok_or_else(|| ForecastError::UnknownSource { name: spec.source.clone() })
    }

    fn ensure_loaded(&mut self, source: &SourceConfig) -> ForecastResult<()> {
        if !self.tables.contains_key(&source.name) {
            let table = ClaimTable::load(&self.data_dir, source)?;
            self.tables.insert(source.name.clone(), table);
        }
        Ok(())
    }
}
