use std::io::{self, Write};

use serde::Serialize;
use tracing::{debug, info};

use crate::crawler::{CrawlSummary, ScrapeSummary};
use crate::progress::{ProgressEvent, ProgressSink, TransferProgress};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl OutputMode {
    // Stdout carries the JSON summary in non-interactive runs.
    pub fn log_stream(&self) -> LogStream {
        match self {
            OutputMode::Interactive => LogStream::Stdout,
            OutputMode::NonInteractive => LogStream::Stderr,
        }
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_crawl(result: &CrawlSummary) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_scrape(result: &ScrapeSummary) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => debug!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => debug!("{}", event.message),
        }
    }

    fn transfer(&self, progress: TransferProgress) {
        if progress.done {
            info!(
                file = %progress.name,
                bytes = progress.received,
                "download complete"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_runs_keep_logs_off_stdout() {
        assert_eq!(OutputMode::NonInteractive.log_stream(), LogStream::Stderr);
        assert_eq!(OutputMode::Interactive.log_stream(), LogStream::Stdout);
    }

    #[test]
    fn summary_serializes_as_plain_json() {
        let summary = CrawlSummary {
            rows_persisted: 2,
            files: vec!["data/final_result_1.csv".to_string()],
            ..CrawlSummary::default()
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["rows_persisted"], 2);
        assert_eq!(json["files"][0], "data/final_result_1.csv");
        assert_eq!(json["archives"]["skipped"], 0);
    }
}
