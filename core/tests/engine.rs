//! Engine tests: batch execution, destination replacement, run ledger,
//! and loading from CSV exports on disk.

use chrono::NaiveDate;
use forecast_core::{
    claims::{ClaimRecord, ClaimTable},
    clock::AsOfClock,
    config::SourceKind,
    config::{ForecastConfig, RunSpec},
    engine::ForecastEngine,
    error::ForecastError,
    forecast::MemberForecast,
    store::{ForecastStore, OutcomeStatus},
};
use std::path::{Path, PathBuf};

const MEDICAL_CSV: &str = "\
Member ID,Provider Name,CPT / HCPCS Procedure Code,Service Date,Paid Date,Sum Employer Paid Amount (Med),Included Inpatient Admit
1001.0,City Oncology,J9271,2024-03-01,2024-03-20,\"$9,000.00\",N
1001.0,City Oncology,J9271,2024-03-22,2024-04-10,\"$9,000.00\",N
1001.0,City Oncology,J9271,2024-04-12,2024-05-01,\"$9,000.00\",N
1002,Renal Care,90935,2024-04-01,2024-04-15,400,N
1002,Renal Care,90935,2024-04-03,2024-04-15,400,N
1002,Renal Care,90935,2024-04-05,2024-04-15,400,N
1003,Renal Care,90935,2024-04-05,2024-04-15,400,N
";

const RX_CSV: &str = "\
Member ID,Preferred Drug Name (Artemis),NDC Code,Service Date,Paid Date,Sum Employer Paid Amount (Rx),Sum Days Supply,Sum Rx Scripts (HCG)
2001,HUMIRA PEN,0074-0554-02,01/10/2024,01/12/2024,6500.00,28,1
2001,Humira Injection,0074-0554-02,02/07/2024,02/09/2024,6500.00,28,1
2001,HUMIRA PEN,0074-0554-02,03/06/2024,03/08/2024,6500.00,28,1
2002,DUPIXENT,0024-5914-00,02/01/2024,02/03/2024,3200.00,28,1
";

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("forecast-engine-{tag}-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    std::fs::write(dir.join("hcc_medical.csv"), MEDICAL_CSV).expect("write medical");
    std::fs::write(dir.join("hcc_rx.csv"), RX_CSV).expect("write rx");
    dir
}

fn as_of() -> AsOfClock {
    AsOfClock::fixed(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
}

fn build(config: ForecastConfig, data_dir: &Path) -> ForecastEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = ForecastStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    ForecastEngine::build(config, as_of(), store, data_dir.to_str().unwrap()).expect("build engine")
}

#[test]
fn default_batch_writes_found_and_skips_missing() {
    let dir = scratch_dir("batch");
    let mut engine = build(ForecastConfig::default_batch(), &dir);

    let outcomes = engine.run_batch().expect("batch");
    assert_eq!(outcomes.len(), 8);

    let status = |dest: &str| {
        outcomes
            .iter()
            .find(|o| o.destination == dest)
            .map(|o| (o.status, o.member_count))
            .unwrap()
    };
    assert_eq!(status("humira_predictions"), (OutcomeStatus::Written, 1));
    // 2002 has a single DUPIXENT fill: kept, with no cadence
    assert_eq!(status("dupixent_predictions"), (OutcomeStatus::Written, 1));
    assert_eq!(status("ovidrel_predictions"), (OutcomeStatus::NotFound, 0));
    assert_eq!(status("keytruda_predictions"), (OutcomeStatus::Written, 1));
    assert_eq!(status("initialchemo_predictions"), (OutcomeStatus::NotFound, 0));
    assert_eq!(status("hemodialysis_predictions"), (OutcomeStatus::Written, 2));

    let store = engine.store();
    assert!(!store.destination_exists("ovidrel_predictions").unwrap());
    assert!(store.destination_exists("dupixent_predictions").unwrap());

    let dupixent = store.read_destination("dupixent_predictions").unwrap();
    assert_eq!(dupixent[0].member_id, "2002");
    assert!((dupixent[0].total_cost - 3200.0).abs() < 1e-9);
    assert_eq!(dupixent[0].latest_date, NaiveDate::from_ymd_opt(2024, 2, 1));
    assert_eq!(dupixent[0].avg_days_between, None);
    assert_eq!(dupixent[0].predicted_12_month_cost, None);

    let keytruda = store.read_destination("keytruda_predictions").unwrap();
    assert_eq!(keytruda.len(), 1);
    assert_eq!(keytruda[0].member_id, "1001");
    assert!((keytruda[0].total_cost - 27_000.0).abs() < 1e-9);
    assert_eq!(keytruda[0].avg_days_between, Some(21.0));
    assert_eq!(keytruda[0].days_since_last, Some(50));

    let ledger = store.outcomes_for_run(&engine.run_id).unwrap();
    assert_eq!(ledger, outcomes);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn rerun_replaces_destination_with_identical_rows() {
    let dir = scratch_dir("rerun");
    let mut engine = build(ForecastConfig::default_batch(), &dir);

    let spec = RunSpec::new("hcc_medical", "hemodialysis_predictions", "90935");
    engine.run_one(&spec).unwrap();
    let first: Vec<MemberForecast> = engine.store().read_destination("hemodialysis_predictions").unwrap();
    engine.run_one(&spec).unwrap();
    let second = engine.store().read_destination("hemodialysis_predictions").unwrap();

    assert_eq!(first, second);
    let ids: Vec<_> = second.iter().map(|r| r.member_id.as_str()).collect();
    assert_eq!(ids, vec!["1002", "1003"]);
    assert_eq!(second[1].avg_days_between, None);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn not_found_leaves_prior_destination_untouched() {
    let dir = scratch_dir("untouched");
    let mut engine = build(ForecastConfig::default_batch(), &dir);

    engine
        .run_one(&RunSpec::new("hcc_medical", "keytruda_predictions", "J9271"))
        .unwrap();
    let outcome = engine
        .run_one(&RunSpec::new("hcc_medical", "keytruda_predictions", "00000"))
        .unwrap();

    assert_eq!(outcome.status, OutcomeStatus::NotFound);
    assert_eq!(engine.store().read_destination("keytruda_predictions").unwrap().len(), 1);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn unknown_source_fails_before_any_write() {
    let dir = scratch_dir("unknown");
    let mut config = ForecastConfig::default_batch();
    config.runs.push(RunSpec::new("hcc_dental", "cleaning_predictions", "D1110"));
    let mut engine = build(config, &dir);

    let err = engine.run_batch().unwrap_err();
    assert!(matches!(err, ForecastError::UnknownSource { ref name } if name == "hcc_dental"));
    assert!(!engine.store().destination_exists("humira_predictions").unwrap());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn unreadable_source_fails_before_any_write() {
    let dir = std::env::temp_dir().join(format!("forecast-engine-partial-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    // only the pharmacy tab is present; the humira run reads it first
    std::fs::write(dir.join("hcc_rx.csv"), RX_CSV).unwrap();
    let mut engine = build(ForecastConfig::default_batch(), &dir);

    assert!(engine.run_batch().is_err());
    assert!(!engine.store().destination_exists("humira_predictions").unwrap());
    assert!(engine.store().outcomes_for_run(&engine.run_id).unwrap().is_empty());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn failed_export_leaves_destination_unwritten() {
    let dir = scratch_dir("export-fails");
    // a plain file where the export directory should be
    let out = dir.join("out");
    std::fs::write(&out, "not a directory").unwrap();
    let mut engine = build(ForecastConfig::default_batch(), &dir).with_csv_export(&out);

    let spec = RunSpec::new("hcc_rx", "humira_predictions", "humira");
    assert!(engine.run_one(&spec).is_err());
    assert!(!engine.store().destination_exists("humira_predictions").unwrap());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn csv_export_mirrors_written_destinations() {
    let dir = scratch_dir("export");
    let out = dir.join("out");
    let mut engine = build(ForecastConfig::default_batch(), &dir).with_csv_export(&out);

    engine.run_batch().unwrap();

    assert!(out.join("humira_predictions.csv").exists());
    assert!(!out.join("ovidrel_predictions.csv").exists());
    let text = std::fs::read_to_string(out.join("humira_predictions.csv")).unwrap();
    assert!(text.lines().nth(1).unwrap().starts_with("2001,"));

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn missing_source_file_is_an_error() {
    let dir = std::env::temp_dir().join(format!("forecast-engine-empty-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let mut engine = build(ForecastConfig::default_batch(), &dir);

    assert!(engine.run_batch().is_err());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn preloaded_table_skips_the_loader() {
    let dir = std::env::temp_dir().join(format!("forecast-engine-preload-{}", uuid::Uuid::new_v4()));
    let mut engine = build(ForecastConfig::default_batch(), &dir);

    let fill = |day: u32| ClaimRecord {
        member_id: "3001".into(),
        key: "SKYRIZI PEN".into(),
        service_date: NaiveDate::from_ymd_opt(2024, 5, day),
        paid_date: None,
        employer_paid: Some(1000.0),
    };
    engine.insert_table(ClaimTable {
        name: "hcc_rx".into(),
        kind: SourceKind::Drug,
        records: vec![fill(1), fill(11), fill(21)],
    });

    let outcome = engine
        .run_one(&RunSpec::new("hcc_rx", "skyrizi_predictions", "Skyrizi"))
        .unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Written);

    let rows = engine.store().read_destination("skyrizi_predictions").unwrap();
    assert_eq!(rows[0].avg_days_between, Some(10.0));
    assert_eq!(rows[0].units_per_year, Some(36.5));
    // 11 days since 2024-05-21, so active: 1000 * 36.5
    assert_eq!(rows[0].predicted_12_month_cost, Some(36_500.0));
    assert!(!dir.exists());
}
