use std::fmt;
use std::str::FromStr;

use reqwest::Url;
use serde::Serialize;
use tracing::warn;

use crate::error::HarvestError;

pub const NOT_AVAILABLE: &str = "Not Available";
pub const NOT_FOUND: &str = "Not Found";
pub const FAILED: &str = "Failed";
pub const UNKNOWN: &str = "Unknown";

pub const SAMPLE_ID_COLUMN: &str = "Sample Number (ID)";
pub const TISSUE_COLUMN: &str = "Tissue";
pub const CELL_LINE_COLUMN: &str = "Cell line";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchQuery {
    pub keyword: String,
    pub query_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Accession(String);

impl Accession {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn unknown() -> Self {
        Self(UNKNOWN.to_string())
    }

    // Reads the `acc` query parameter of a GEO result link. Values that
    // cannot serve as a file name component become `Unknown`.
    pub fn from_result_url(url: &Url) -> Self {
        let Some((_, value)) = url.query_pairs().find(|(key, _)| key == "acc") else {
            return Self::unknown();
        };
        if value.trim().is_empty() {
            return Self::unknown();
        }
        match value.parse() {
            Ok(accession) => accession,
            Err(err) => {
                warn!(%url, error = %err, "rejected accession in result link");
                Self::unknown()
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn archive_name(&self) -> String {
        format!("{}_family.xml.tgz", self.0)
    }

    pub fn miniml_name(&self) -> String {
        format!("{}_family.xml", self.0)
    }
}

impl FromStr for Accession {
    type Err = HarvestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        let is_valid = !normalized.is_empty()
            && normalized != "."
            && normalized != ".."
            && normalized
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-'));
        if !is_valid {
            return Err(HarvestError::InvalidAccession(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

impl fmt::Display for Accession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, Option<String>)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: impl Into<String>, value: Option<String>) {
        let column = column.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn with(mut self, column: impl Into<String>, value: Option<String>) -> Self {
        self.set(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, value)| value.as_deref())
    }

    pub fn contains(&self, column: &str) -> bool {
        self.fields.iter().any(|(name, _)| name == column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn merged(&self, other: &Record) -> Record {
        let mut merged = self.clone();
        for (name, value) in &other.fields {
            merged.set(name.clone(), value.clone());
        }
        merged
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRecord {
    pub sample_id: String,
    pub tissue: String,
    pub cell_line: String,
}

impl SampleRecord {
    pub fn to_record(&self) -> Record {
        Record::new()
            .with(SAMPLE_ID_COLUMN, Some(self.sample_id.clone()))
            .with(TISSUE_COLUMN, Some(self.tissue.clone()))
            .with(CELL_LINE_COLUMN, Some(self.cell_line.clone()))
    }

    pub fn empty_record() -> Record {
        Record::new()
            .with(SAMPLE_ID_COLUMN, None)
            .with(TISSUE_COLUMN, None)
            .with(CELL_LINE_COLUMN, None)
    }
}

impl Default for SampleRecord {
    fn default() -> Self {
        Self {
            sample_id: NOT_AVAILABLE.to_string(),
            tissue: NOT_AVAILABLE.to_string(),
            cell_line: NOT_AVAILABLE.to_string(),
        }
    }
}

// Cartesian join of one detail record with its samples. A detail record
// without samples still yields one row with empty sample columns.
pub fn join_samples(detail: &Record, samples: &[SampleRecord]) -> Vec<Record> {
    if samples.is_empty() {
        return vec![detail.merged(&SampleRecord::empty_record())];
    }
    samples
        .iter()
        .map(|sample| detail.merged(&sample.to_record()))
        .collect()
}
