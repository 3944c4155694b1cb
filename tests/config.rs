use std::fs;

use assert_matches::assert_matches;

use geo_harvest::config::{ConfigLoader, DEFAULT_KEYWORDS, default_search_url};
use geo_harvest::error::HarvestError;

#[test]
fn loads_shorthand_and_detailed_queries() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("geo-harvest.json");
    fs::write(
        &path,
        r#"{
            "schema_version": 1,
            "queries": [
                "single-cell",
                { "keyword": "glioma", "url": "https://www.ncbi.nlm.nih.gov/gds?term=glioma" }
            ],
            "output_dir": "harvest",
            "max_archive_mb": 10,
            "max_sheet_mb": 5
        }"#,
    )
    .unwrap();

    let config = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(config.queries.len(), 2);
    assert_eq!(config.queries[0].keyword, "single-cell");
    assert_eq!(config.queries[0].query_url, default_search_url("single-cell"));
    assert_eq!(config.queries[1].keyword, "glioma");
    assert_eq!(
        config.queries[1].query_url,
        "https://www.ncbi.nlm.nih.gov/gds?term=glioma"
    );
    assert_eq!(config.output_dir.as_str(), "harvest");
    assert_eq!(config.xml_dir().as_str(), "harvest/xml");
    assert_eq!(config.max_archive_bytes, 10 * 1024 * 1024);
    assert_eq!(config.max_sheet_bytes, 5 * 1024 * 1024);
}

#[test]
fn empty_config_falls_back_to_default_keywords() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("geo-harvest.json");
    fs::write(&path, "{}").unwrap();

    let config = ConfigLoader::resolve(path.to_str()).unwrap();
    let keywords = config
        .queries
        .iter()
        .map(|query| query.keyword.as_str())
        .collect::<Vec<_>>();
    assert_eq!(keywords, DEFAULT_KEYWORDS);
    assert_eq!(config.max_archive_bytes, 30 * 1024 * 1024);
    assert_eq!(config.max_sheet_bytes, 50 * 1024 * 1024);
}

#[test]
fn explicit_missing_file_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent.json");

    let result = ConfigLoader::resolve(path.to_str());
    assert_matches!(result, Err(HarvestError::ConfigRead(missing)) if missing == path);
}

#[test]
fn invalid_json_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("geo-harvest.json");
    fs::write(&path, r#"{ "queries": [42] }"#).unwrap();

    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(HarvestError::ConfigParse(_))
    );
}

#[test]
fn blank_keyword_is_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("geo-harvest.json");
    fs::write(&path, r#"{ "queries": ["  "] }"#).unwrap();

    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(HarvestError::InvalidQuery(_))
    );
}
