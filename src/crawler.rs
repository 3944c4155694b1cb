use reqwest::Url;
use scraper::{Html, Selector};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::archive::{ArchiveOutcome, ArchiveRetriever};
use crate::config::ResolvedConfig;
use crate::domain::{Accession, FAILED, NOT_FOUND, Record, SearchQuery, join_samples};
use crate::error::HarvestError;
use crate::extract::{self, MINIML_LINK_TEXT};
use crate::geo::{GeoClient, normalize_url};
use crate::miniml;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::sink::TabularSink;

#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlSummary {
    pub started_at: String,
    pub finished_at: String,
    pub queries: Vec<QuerySummary>,
    pub archives: ArchiveCounts,
    pub rows_collected: usize,
    pub rows_persisted: usize,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuerySummary {
    pub keyword: String,
    pub query_url: String,
    pub accessions: usize,
    pub rows: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ArchiveCounts {
    pub extracted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub not_found: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScrapeSummary {
    pub started_at: String,
    pub finished_at: String,
    pub pages: usize,
    pub scraped: usize,
    pub files: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AccessionRows {
    pub accession: Accession,
    pub status: String,
    pub rows: Vec<Record>,
}

pub struct Crawler<G: GeoClient, S: TabularSink> {
    config: ResolvedConfig,
    geo: G,
    sink: S,
    retriever: ArchiveRetriever,
    result_selector: Selector,
}

impl<G: GeoClient, S: TabularSink> Crawler<G, S> {
    pub fn new(config: ResolvedConfig, geo: G, sink: S) -> Result<Self, HarvestError> {
        let result_selector = Selector::parse(&config.result_selector).map_err(|err| {
            HarvestError::InvalidSelector(format!("{}: {err}", config.result_selector))
        })?;
        let retriever = ArchiveRetriever::new(
            config.output_dir.clone(),
            config.xml_dir(),
            config.max_archive_bytes,
        );
        Ok(Self {
            config,
            geo,
            sink,
            retriever,
            result_selector,
        })
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn run(&mut self, progress: &dyn ProgressSink) -> CrawlSummary {
        let mut summary = CrawlSummary {
            started_at: iso_timestamp(),
            ..CrawlSummary::default()
        };
        let mut results: Vec<Record> = Vec::new();
        let mut persisted = 0;

        for query in self.config.queries.clone() {
            let hits = self.search(&query, progress);
            let mut query_summary = QuerySummary {
                keyword: query.keyword.clone(),
                query_url: query.query_url.clone(),
                accessions: hits.len(),
                rows: 0,
            };

            for (url, accession) in hits {
                let processed = self.process_accession(&query.keyword, &url, accession, progress);
                match processed.status.as_str() {
                    "Extracted" => summary.archives.extracted += 1,
                    "Skipped" => summary.archives.skipped += 1,
                    NOT_FOUND => summary.archives.not_found += 1,
                    _ => summary.archives.failed += 1,
                }
                query_summary.rows += processed.rows.len();
                results.extend(processed.rows);
                persisted = self.flush(&results, persisted, &mut summary.files);
            }
            summary.queries.push(query_summary);
        }

        summary.rows_collected = results.len();
        summary.rows_persisted = persisted;
        summary.finished_at = iso_timestamp();
        info!(
            rows = summary.rows_collected,
            persisted = summary.rows_persisted,
            "crawl finished"
        );
        summary
    }

    pub fn search(&self, query: &SearchQuery, progress: &dyn ProgressSink) -> Vec<(Url, Accession)> {
        info!(keyword = %query.keyword, "searching GEO");
        progress.event(ProgressEvent::phase(format!(
            "phase=Search; {}",
            query.keyword
        )));
        let listing = match self.geo.fetch_text(&query.query_url) {
            Ok(listing) => listing,
            Err(err) => {
                error!(keyword = %query.keyword, url = %query.query_url, error = %err, "search failed");
                return Vec::new();
            }
        };
        let hits = self.list_results(&listing);
        info!(keyword = %query.keyword, results = hits.len(), "listed search results");
        hits
    }

    pub fn list_results(&self, listing: &str) -> Vec<(Url, Accession)> {
        let document = Html::parse_document(listing);
        document
            .select(&self.result_selector)
            .filter_map(|anchor| anchor.value().attr("href"))
            .filter_map(|href| match self.config.site_base_url.join(href) {
                Ok(url) => Some(url),
                Err(err) => {
                    warn!(%href, error = %err, "unresolvable result link");
                    None
                }
            })
            .map(|url| {
                let accession = Accession::from_result_url(&url);
                (url, accession)
            })
            .collect()
    }

    pub fn process_accession(
        &self,
        keyword: &str,
        url: &Url,
        accession: Accession,
        progress: &dyn ProgressSink,
    ) -> AccessionRows {
        info!(accession = %accession, %url, "processing accession");
        progress.event(ProgressEvent::phase(format!("phase=Resolve; {accession}")));
        let page = match self.geo.fetch_text(url.as_str()) {
            Ok(page) => page,
            Err(err) => {
                error!(accession = %accession, error = %err, "detail page fetch failed");
                String::new()
            }
        };
        let document = Html::parse_document(&page);

        let (status, xml_url, xml_path, samples) =
            match extract::link_with_text(&document, MINIML_LINK_TEXT) {
                Some(href) => {
                    let base_url = normalize_url(&href);
                    let xml_url = ArchiveRetriever::archive_url(&base_url, &accession);
                    let outcome = self
                        .retriever
                        .retrieve(&self.geo, &base_url, &accession, progress);
                    let samples = match &outcome {
                        ArchiveOutcome::Extracted(path) => {
                            info!(accession = %accession, %path, "MINiML file ready");
                            miniml::parse_samples(path.as_std_path())
                        }
                        _ => {
                            warn!(accession = %accession, status = outcome.status(), "no MINiML file");
                            Vec::new()
                        }
                    };
                    let xml_path = outcome
                        .path()
                        .map(|path| path.to_string())
                        .unwrap_or_else(|| FAILED.to_string());
                    (outcome.status().to_string(), xml_url, xml_path, samples)
                }
                None => {
                    info!(accession = %accession, "no MINiML link found");
                    (
                        NOT_FOUND.to_string(),
                        NOT_FOUND.to_string(),
                        FAILED.to_string(),
                        Vec::new(),
                    )
                }
            };

        let detail = Record::new()
            .with("Keyword", Some(keyword.to_string()))
            .with("Accession Number", Some(accession.to_string()))
            .with("Status", Some(status.clone()))
            .merged(&extract::series_fields(&document))
            .with("XML File URL", Some(xml_url))
            .with("XML File Path", Some(xml_path));

        let rows = join_samples(&detail, &samples);
        debug!(accession = %accession, rows = rows.len(), "joined detail and samples");
        AccessionRows {
            accession,
            status,
            rows,
        }
    }

    // Rows that fail to persist stay pending and go out with the next flush.
    fn flush(&mut self, results: &[Record], persisted: usize, files: &mut Vec<String>) -> usize {
        if persisted >= results.len() {
            return persisted;
        }
        match self.sink.append(&results[persisted..]) {
            Ok(path) => {
                let path = path.to_string();
                if !files.contains(&path) {
                    files.push(path);
                }
                results.len()
            }
            Err(err) => {
                error!(pending = results.len() - persisted, error = %err, "failed to save rows");
                persisted
            }
        }
    }
}

pub fn scrape_detail_pages<G: GeoClient, S: TabularSink>(
    geo: &G,
    urls: &[String],
    sink: &mut S,
    progress: &dyn ProgressSink,
) -> ScrapeSummary {
    let mut summary = ScrapeSummary {
        started_at: iso_timestamp(),
        pages: urls.len(),
        ..ScrapeSummary::default()
    };

    for url in urls {
        info!(%url, "processing URL");
        progress.event(ProgressEvent::phase(format!("phase=Scrape; {url}")));
        let page = match geo.fetch_text(url) {
            Ok(page) => page,
            Err(err) => {
                error!(%url, error = %err, "error scraping data");
                continue;
            }
        };
        let record = extract::detail_page_fields(&Html::parse_document(&page), url);
        for (column, value) in record.iter() {
            debug!(column, value = value.unwrap_or(""), "fetched field");
        }
        match sink.append(std::slice::from_ref(&record)) {
            Ok(path) => {
                summary.scraped += 1;
                let path = path.to_string();
                if !summary.files.contains(&path) {
                    summary.files.push(path);
                }
            }
            Err(err) => error!(%url, error = %err, "failed to save scraped data"),
        }
    }

    summary.finished_at = iso_timestamp();
    summary
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
