use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::domain::SearchQuery;
use crate::error::HarvestError;

pub const DEFAULT_CONFIG_FILE: &str = "geo-harvest.json";
pub const DEFAULT_KEYWORDS: [&str; 3] = ["single-cell", "metastatic cancer", "tumor microenvironment"];
pub const DEFAULT_SITE_BASE_URL: &str = "https://www.ncbi.nlm.nih.gov";
pub const DEFAULT_RESULT_SELECTOR: &str = ".rslt a[href^='/geo/query/acc.cgi?acc=']";
pub const DEFAULT_MAX_ARCHIVE_MB: u64 = 30;
pub const DEFAULT_MAX_SHEET_MB: u64 = 50;

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub queries: Vec<QueryEntry>,
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub site_base_url: Option<String>,
    #[serde(default)]
    pub result_selector: Option<String>,
    #[serde(default)]
    pub max_archive_mb: Option<u64>,
    #[serde(default)]
    pub max_sheet_mb: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum QueryEntry {
    Shorthand(String),
    Detailed(QueryEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct QueryEntryObject {
    pub keyword: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub queries: Vec<SearchQuery>,
    pub output_dir: Utf8PathBuf,
    pub site_base_url: Url,
    pub result_selector: String,
    pub max_archive_bytes: u64,
    pub max_sheet_bytes: u64,
}

impl ResolvedConfig {
    pub fn xml_dir(&self) -> Utf8PathBuf {
        self.output_dir.join("xml")
    }

    pub fn crawl_sheet_base(&self) -> Utf8PathBuf {
        self.output_dir.join("final_result")
    }

    pub fn detail_sheet_base(&self) -> Utf8PathBuf {
        self.output_dir.join("detail_result")
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, HarvestError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| HarvestError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| HarvestError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, HarvestError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let queries = if config.queries.is_empty() {
            DEFAULT_KEYWORDS
                .iter()
                .map(|keyword| shorthand_query(keyword))
                .collect::<Result<Vec<_>, HarvestError>>()?
        } else {
            config
                .queries
                .into_iter()
                .map(|entry| match entry {
                    QueryEntry::Shorthand(keyword) => shorthand_query(&keyword),
                    QueryEntry::Detailed(obj) => detailed_query(obj),
                })
                .collect::<Result<Vec<_>, HarvestError>>()?
        };

        let site_base_url = config
            .site_base_url
            .as_deref()
            .unwrap_or(DEFAULT_SITE_BASE_URL);
        let site_base_url = Url::parse(site_base_url)
            .map_err(|err| HarvestError::ConfigParse(format!("site_base_url: {err}")))?;

        Ok(ResolvedConfig {
            schema_version,
            queries,
            output_dir: Utf8PathBuf::from(config.output_dir.unwrap_or_else(|| "data".to_string())),
            site_base_url,
            result_selector: config
                .result_selector
                .unwrap_or_else(|| DEFAULT_RESULT_SELECTOR.to_string()),
            max_archive_bytes: megabytes(
                "max_archive_mb",
                config.max_archive_mb.unwrap_or(DEFAULT_MAX_ARCHIVE_MB),
            )?,
            max_sheet_bytes: megabytes(
                "max_sheet_mb",
                config.max_sheet_mb.unwrap_or(DEFAULT_MAX_SHEET_MB),
            )?,
        })
    }
}

pub fn default_search_url(keyword: &str) -> String {
    format!(
        "http://www.ncbi.nlm.nih.gov/gds?term=({})%20AND%20homo%20sapiens[Organism]",
        keyword.trim().replace(' ', "%20")
    )
}

fn megabytes(key: &str, value: u64) -> Result<u64, HarvestError> {
    value
        .checked_mul(MIB)
        .ok_or_else(|| HarvestError::ConfigParse(format!("{key}: {value} MB is out of range")))
}

fn shorthand_query(keyword: &str) -> Result<SearchQuery, HarvestError> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Err(HarvestError::InvalidQuery("empty keyword".to_string()));
    }
    Ok(SearchQuery {
        keyword: keyword.to_string(),
        query_url: default_search_url(keyword),
    })
}

fn detailed_query(obj: QueryEntryObject) -> Result<SearchQuery, HarvestError> {
    let keyword = obj.keyword.trim();
    if keyword.is_empty() {
        return Err(HarvestError::InvalidQuery("empty keyword".to_string()));
    }
    Url::parse(obj.url.trim())
        .map_err(|err| HarvestError::InvalidQuery(format!("{}: {err}", obj.url)))?;
    Ok(SearchQuery {
        keyword: keyword.to_string(),
        query_url: obj.url.trim().to_string(),
    })
}
