use std::cell::RefCell;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use miette::IntoDiagnostic;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use geo_harvest::config::{ConfigLoader, ResolvedConfig};
use geo_harvest::crawler::{Crawler, scrape_detail_pages};
use geo_harvest::extract::ExtractionProfile;
use geo_harvest::geo::GeoHttpClient;
use geo_harvest::output::{JsonOutput, LogProgress, LogStream, OutputMode};
use geo_harvest::progress::{ProgressEvent, ProgressSink, TransferProgress};
use geo_harvest::sink::RollingCsvSink;

#[derive(Parser)]
#[command(name = "geo-harvest")]
#[command(about = "Harvest GEO dataset metadata and MINiML sample characteristics into spreadsheets")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    output_dir: Option<String>,

    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Search GEO for every configured keyword (default)")]
    Crawl,
    #[command(about = "Scrape standalone GEO detail pages")]
    Scrape(ScrapeArgs),
}

#[derive(Args)]
struct ScrapeArgs {
    #[arg(required = true)]
    urls: Vec<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let writer = match output_mode.log_stream() {
        LogStream::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogStream::Stderr => BoxMakeWriter::new(std::io::stderr),
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(writer)
        .init();

    let mut config = ConfigLoader::resolve(cli.config.as_deref()).into_diagnostic()?;
    if let Some(dir) = cli.output_dir {
        config.output_dir = Utf8PathBuf::from(dir);
    }
    let geo = GeoHttpClient::new().into_diagnostic()?;

    let bars = BarProgress::default();
    let progress: &dyn ProgressSink = match output_mode {
        OutputMode::Interactive => &bars,
        OutputMode::NonInteractive => &LogProgress,
    };

    match cli.command.unwrap_or(Command::Crawl) {
        Command::Crawl => run_crawl(config, geo, progress, output_mode),
        Command::Scrape(args) => run_scrape(config, geo, args.urls, progress, output_mode),
    }
}

fn run_crawl(
    config: ResolvedConfig,
    geo: GeoHttpClient,
    progress: &dyn ProgressSink,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let sink = RollingCsvSink::new(
        config.crawl_sheet_base(),
        ExtractionProfile::Series.columns(),
        config.max_sheet_bytes,
    );
    let mut crawler = Crawler::new(config, geo, sink).into_diagnostic()?;
    let summary = crawler.run(progress);
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_crawl(&summary).into_diagnostic()?,
        OutputMode::Interactive => info!(
            queries = summary.queries.len(),
            rows = summary.rows_persisted,
            extracted = summary.archives.extracted,
            skipped = summary.archives.skipped,
            failed = summary.archives.failed,
            not_found = summary.archives.not_found,
            files = ?summary.files,
            "summary"
        ),
    }
    Ok(())
}

fn run_scrape(
    config: ResolvedConfig,
    geo: GeoHttpClient,
    urls: Vec<String>,
    progress: &dyn ProgressSink,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let mut sink = RollingCsvSink::new(
        config.detail_sheet_base(),
        ExtractionProfile::DetailPage.columns(),
        config.max_sheet_bytes,
    );
    let summary = scrape_detail_pages(&geo, &urls, &mut sink, progress);
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_scrape(&summary).into_diagnostic()?,
        OutputMode::Interactive => info!(
            pages = summary.pages,
            scraped = summary.scraped,
            files = ?summary.files,
            "summary"
        ),
    }
    Ok(())
}

#[derive(Default)]
struct BarProgress {
    current: RefCell<Option<(String, ProgressBar)>>,
}

impl BarProgress {
    fn start(name: &str, total: Option<u64>) -> ProgressBar {
        let bar = match total {
            Some(total) => ProgressBar::new(total),
            None => ProgressBar::new_spinner(),
        };
        let style = ProgressStyle::default_bar()
            .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        bar.set_message(format!("Downloading {name}"));
        bar
    }
}

impl ProgressSink for BarProgress {
    fn event(&self, event: ProgressEvent) {
        LogProgress.event(event);
    }

    fn transfer(&self, progress: TransferProgress) {
        let mut current = self.current.borrow_mut();
        let same_file = current
            .as_ref()
            .map(|(name, _)| *name == progress.name)
            .unwrap_or(false);
        if !same_file {
            if let Some((_, previous)) = current.take() {
                previous.finish_and_clear();
            }
            *current = Some((
                progress.name.clone(),
                Self::start(&progress.name, progress.total),
            ));
        }
        if let Some((_, bar)) = current.as_ref() {
            bar.set_position(progress.received);
        }
        if progress.done {
            if let Some((name, bar)) = current.take() {
                bar.finish_with_message(format!("Downloaded {name}"));
            }
        }
    }
}
