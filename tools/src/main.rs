//! forecast-runner: headless batch runner for member cost forecasts.
//!
//! Usage:
//!   forecast-runner --data-dir ./data --db forecasts.db
//!   forecast-runner --config data/forecast_runs.json --as-of 2024-09-30 --csv-out ./out

use anyhow::{Context, Result};
use chrono::NaiveDate;
use forecast_core::{
    clock::AsOfClock,
    config::ForecastConfig,
    engine::ForecastEngine,
    store::{ForecastStore, OutcomeRow, OutcomeStatus},
};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let data_dir = flag_value(&args, "--data-dir").unwrap_or("./data");
    let db = flag_value(&args, "--db").unwrap_or("forecasts.db");
    let csv_out = flag_value(&args, "--csv-out");

    let clock = match flag_value(&args, "--as-of") {
        Some(raw) => AsOfClock::fixed(
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .with_context(|| format!("--as-of expects YYYY-MM-DD, got '{raw}'"))?,
        ),
        None => AsOfClock::today(),
    };

    let config = match flag_value(&args, "--config") {
        Some(path) => ForecastConfig::load(path)?,
        None => ForecastConfig::default_batch(),
    };

    println!("Member cost forecaster");
    println!("  data_dir:  {data_dir}");
    println!("  db:        {db}");
    println!("  as_of:     {}", clock.as_of);
    println!("  runs:      {}", config.runs.len());
    if let Some(dir) = csv_out {
        println!("  csv_out:   {dir}");
    }
    println!();

    let store = ForecastStore::open(db)?;
    store.migrate()?;

    let mut engine = ForecastEngine::build(config, clock, store, data_dir)?;
    if let Some(dir) = csv_out {
        engine = engine.with_csv_export(dir);
    }

    let outcomes = engine.run_batch()?;
    print_summary(&engine.run_id, &outcomes);
    Ok(())
}

fn print_summary(run_id: &str, outcomes: &[OutcomeRow]) {
    println!("=== RUN SUMMARY ===");
    println!("  run_id:  {run_id}");
    for o in outcomes {
        match o.status {
            OutcomeStatus::Written => println!(
                "  {:<28} {:>6} members  ({} '{}')",
                o.destination, o.member_count, o.source, o.selector
            ),
            OutcomeStatus::NotFound => println!(
                "  {:<28}    not found  ({} '{}')",
                o.destination, o.source, o.selector
            ),
        }
    }
    let skipped = outcomes
        .iter()
        .filter(|o| o.status == OutcomeStatus::NotFound)
        .count();
    println!("  written: {}  skipped: {skipped}", outcomes.len() - skipped);
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
