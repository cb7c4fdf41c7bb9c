//! Partition roster
//!
//! A partition is one company code plus the few attributes that decide how the
//! pipeline treats it. The roster is read once at start-up and never changes
//! during a run. Rows come either inline from the TOML config or from a CSV
//! export of the partition spreadsheet.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Reconciliation path for a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Scenario {
    /// Normal path: accounting document found through open down-payment lines
    A,
    /// Billing path: accounting document found through cleared billing documents
    B,
}

impl Scenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::A => "A",
            Scenario::B => "B",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Scenario {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Scenario> for String {
    fn from(value: Scenario) -> Self {
        value.as_str().to_string()
    }
}

impl std::str::FromStr for Scenario {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" | "normal" => Ok(Scenario::A),
            "b" => Ok(Scenario::B),
            other => Err(Error::Config(format!("Unknown scenario tag: '{}'", other))),
        }
    }
}

/// One business unit routed through the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    /// Company code
    pub code: String,
    /// Invoice-type tag carried from the roster
    #[serde(default)]
    pub invoice_type: String,
    /// Reconciliation path
    pub scenario: Scenario,
    /// When set, a flag value of "NA" disqualifies a record
    #[serde(default)]
    pub treat_na_as_flagged: bool,
}

impl Partition {
    pub fn new(code: impl Into<String>, scenario: Scenario) -> Self {
        Self {
            code: code.into(),
            invoice_type: String::new(),
            scenario,
            treat_na_as_flagged: false,
        }
    }

    pub fn with_na_policy(mut self, treat_na_as_flagged: bool) -> Self {
        self.treat_na_as_flagged = treat_na_as_flagged;
        self
    }
}

/// Row shape of the spreadsheet export
#[derive(Debug, Deserialize)]
struct RosterRow {
    #[serde(rename = "CompanyCode")]
    code: String,
    #[serde(rename = "InvoiceType", default)]
    invoice_type: String,
    #[serde(rename = "Scenario")]
    scenario: String,
    #[serde(rename = "TreatNaAsFlagged", default)]
    treat_na_as_flagged: String,
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "false" | "no" | "n" | "0" => Ok(false),
        "true" | "yes" | "y" | "x" | "1" => Ok(true),
        other => Err(Error::Roster(format!("Invalid policy flag: '{}'", other))),
    }
}

/// Read the roster from a CSV export
///
/// The header row must name `CompanyCode` and `Scenario`; `InvoiceType` and
/// `TreatNaAsFlagged` are optional. Blank company codes are skipped.
pub fn load_roster_csv(path: &Path) -> Result<Vec<Partition>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut partitions = Vec::new();
    for (index, row) in reader.deserialize::<RosterRow>().enumerate() {
        let row = row?;
        if row.code.is_empty() {
            tracing::debug!(line = index + 2, "Skipping roster row without company code");
            continue;
        }
        partitions.push(Partition {
            scenario: row.scenario.parse()?,
            treat_na_as_flagged: parse_flag(&row.treat_na_as_flagged)?,
            code: row.code,
            invoice_type: row.invoice_type,
        });
    }

    Ok(partitions)
}

/// Reject an empty roster or one that names a partition twice
pub fn validate_roster(partitions: &[Partition]) -> Result<()> {
    if partitions.is_empty() {
        return Err(Error::Config("Partition roster is empty".to_string()));
    }

    let mut seen = HashSet::new();
    for partition in partitions {
        if partition.code.trim().is_empty() {
            return Err(Error::Config("Partition with blank code in roster".to_string()));
        }
        if !seen.insert(partition.code.as_str()) {
            return Err(Error::Config(format!(
                "Partition '{}' appears more than once in roster",
                partition.code
            )));
        }
    }
    Ok(())
}
