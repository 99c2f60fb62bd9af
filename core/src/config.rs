//! Batch configuration: claims sources, their header mappings, and the
//! list of (source, destination, selector) runs.
//!
//! Loaded from JSON with `ForecastConfig::load`; `default_batch()` is the
//! standing HCC batch used when no file is given.

use crate::types::Days;
use serde::{Deserialize, Serialize};

/// Members whose latest service is this many days old or older are
/// treated as inactive and forecast to zero.
pub const RECENCY_GATE_DAYS: Days = 275;

/// Which filter a source's selectors are applied with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Medical claims; selectors are exact procedure codes.
    Procedure,
    /// Pharmacy claims; selectors are case-insensitive drug name fragments.
    Drug,
}

/// Raw header for each canonical field of a claims table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableSchema {
    pub member_id: String,
    /// Procedure code column for medical, drug name column for pharmacy.
    pub key: String,
    pub service_date: String,
    pub paid_date: String,
    pub employer_paid: String,
}

impl TableSchema {
    pub fn medical() -> Self {
        Self {
            member_id: "Member ID".into(),
            key: "CPT / HCPCS Procedure Code".into(),
            service_date: "Service Date".into(),
            paid_date: "Paid Date".into(),
            employer_paid: "Sum Employer Paid Amount (Med)".into(),
        }
    }

    pub fn pharmacy() -> Self {
        Self {
            member_id: "Member ID".into(),
            key: "Preferred Drug Name (Artemis)".into(),
            service_date: "Service Date".into(),
            paid_date: "Paid Date".into(),
            employer_paid: "Sum Employer Paid Amount (Rx)".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceConfig {
    /// Sheet name; the loader reads `<data_dir>/<name>.csv`.
    pub name: String,
    pub kind: SourceKind,
    pub schema: TableSchema,
}

/// One forecasting call: filter `source` by `selector`, write `destination`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSpec {
    pub source: String,
    pub destination: String,
    pub selector: String,
}

impl RunSpec {
    pub fn new(source: &str, destination: &str, selector: &str) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            selector: selector.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    pub sources: Vec<SourceConfig>,
    pub runs: Vec<RunSpec>,
    #[serde(default = "default_recency_gate")]
    pub recency_gate_days: Days,
    /// Keep members whose cadence cannot be computed, with null cadence
    /// and prediction. Members without any dated claim are always dropped.
    #[serde(default = "default_include_undefined_cadence")]
    pub include_undefined_cadence: bool,
}

fn default_recency_gate() -> Days {
    RECENCY_GATE_DAYS
}

fn default_include_undefined_cadence() -> bool {
    true
}

impl ForecastConfig {
    /// Load a batch definition from a JSON file.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: ForecastConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        Ok(config)
    }

    /// The standing HCC batch: five specialty drugs, three procedures.
    pub fn default_batch() -> Self {
        Self {
            sources: vec![
                SourceConfig {
                    name: "hcc_medical".into(),
                    kind: SourceKind::Procedure,
                    schema: TableSchema::medical(),
                },
                SourceConfig {
                    name: "hcc_rx".into(),
                    kind: SourceKind::Drug,
                    schema: TableSchema::pharmacy(),
                },
            ],
            runs: vec![
                RunSpec::new("hcc_rx", "humira_predictions", "humira"),
                RunSpec::new("hcc_rx", "dupixent_predictions", "dupixent"),
                RunSpec::new("hcc_rx", "ovidrel_predictions", "ovidrel"),
                RunSpec::new("hcc_rx", "skyrizi_predictions", "skyrizi"),
                RunSpec::new("hcc_rx", "stelera_predictions", "stelera"),
                RunSpec::new("hcc_medical", "keytruda_predictions", "J9271"),
                RunSpec::new("hcc_medical", "initialchemo_predictions", "96413"),
                RunSpec::new("hcc_medical", "hemodialysis_predictions", "90935"),
            ],
            recency_gate_days: RECENCY_GATE_DAYS,
            include_undefined_cadence: true,
        }
    }

    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }
}
