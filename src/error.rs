use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum HarvestError {
    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid search query: {0}")]
    InvalidQuery(String),

    #[error("invalid accession: {0}")]
    InvalidAccession(String),

    #[error("invalid CSS selector: {0}")]
    InvalidSelector(String),

    #[error("GEO request failed: {0}")]
    GeoHttp(String),

    #[error("GEO returned status {status}: {message}")]
    GeoStatus { status: u16, message: String },

    #[error("failed to parse document: {0}")]
    Parse(String),

    #[error("archive extraction failed: {0}")]
    Archive(String),

    #[error("spreadsheet write failed: {0}")]
    Sheet(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
