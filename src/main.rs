//! CLI entry point for the PNCP price research tool.
//!
//! `collect` pulls the last year of procurement items from the Compras.gov.br
//! open-data API and exports the consolidated records, the per-unit summary,
//! the reference price table and an HTML technical note. `analyze` runs the
//! aggregation half on items saved to disk.

use anyhow::Result;
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use pncp_price_research::{
    config::{DEFAULT_CV_THRESHOLD, DEFAULT_ENDPOINT, DEFAULT_PAGE_SIZE, ResearchConfig},
    fetch::{BasicClient, StopReason},
    filters::{FilterOptions, MaterialOrService, ValueRange},
    output::write_tables,
    parser::parse_records,
    pipeline::{analyze, run},
    report::write_html,
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "pncp_price_research")]
#[command(about = "Collects PNCP procurement items and derives reference prices", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the last 365 days of items from the API and export the results
    Collect {
        /// Catalog item code (CATMAT/CATSER)
        #[arg(short = 'i', long)]
        catalog_item: Option<u64>,

        #[command(flatten)]
        filters: FilterArgs,

        #[command(flatten)]
        range: RangeArgs,

        /// Items requested per page
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u32,

        /// Per-request timeout in seconds
        #[arg(long, default_value_t = 60)]
        timeout_secs: u64,

        /// Stop after this many pages even if the API reports more
        #[arg(long)]
        max_pages: Option<u32>,

        #[command(flatten)]
        export: ExportArgs,
    },
    /// Aggregate items saved as JSON (an item array or a full API page)
    Analyze {
        /// Path to the saved JSON file
        #[arg(value_name = "FILE")]
        source: PathBuf,

        #[command(flatten)]
        range: RangeArgs,

        #[command(flatten)]
        export: ExportArgs,
    },
}

#[derive(Args)]
struct FilterArgs {
    /// Contracting organization CNPJ
    #[arg(long)]
    org_cnpj: Option<String>,

    /// Organizational unit code
    #[arg(long)]
    org_unit_code: Option<i64>,

    /// Item status code (e.g. "4")
    #[arg(long)]
    item_status: Option<String>,

    /// Material (M) or service (S)
    #[arg(long, value_enum)]
    material_or_service: Option<MaterialOrService>,

    /// Class code
    #[arg(long)]
    class_code: Option<i64>,

    /// Group code
    #[arg(long)]
    group_code: Option<i64>,

    /// Supplier code
    #[arg(long)]
    supplier_code: Option<String>,

    /// Only items with (true) or without (false) a result
    #[arg(long)]
    has_result: Option<bool>,

    /// BPS flag
    #[arg(long)]
    bps: Option<bool>,

    /// Normal preference margin flag
    #[arg(long)]
    normal_preference_margin: Option<bool>,

    /// NCM classification code
    #[arg(long)]
    ncm_code: Option<String>,
}

impl From<FilterArgs> for FilterOptions {
    fn from(a: FilterArgs) -> Self {
        FilterOptions {
            org_cnpj: a.org_cnpj,
            org_unit_code: a.org_unit_code,
            item_status: a.item_status,
            material_or_service: a.material_or_service,
            class_code: a.class_code,
            group_code: a.group_code,
            supplier_code: a.supplier_code,
            has_result: a.has_result,
            bps: a.bps,
            normal_preference_margin: a.normal_preference_margin,
            ncm_code: a.ncm_code,
        }
    }
}

#[derive(Args)]
struct RangeArgs {
    /// Drop items whose awarded unit price is below this value
    #[arg(long)]
    min_value: Option<f64>,

    /// Drop items whose awarded unit price is above this value
    #[arg(long)]
    max_value: Option<f64>,

    /// Coefficient of variation (%) at which outlier trimming stops
    #[arg(long, default_value_t = DEFAULT_CV_THRESHOLD)]
    cv_threshold: f64,
}

#[derive(Args)]
struct ExportArgs {
    /// Base name for output files (without extension)
    #[arg(short, long)]
    output_base: Option<String>,

    /// Directory to write output files to
    #[arg(short = 'd', long, default_value = ".")]
    output_dir: PathBuf,

    /// Gzip compress the CSV tables
    #[arg(long, default_value_t = false)]
    gzip: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/pncp_price_research.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("pncp_price_research.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Collect {
            catalog_item,
            filters,
            range,
            page_size,
            timeout_secs,
            max_pages,
            export,
        } => {
            let config = ResearchConfig {
                endpoint: std::env::var("PNCP_API_URL")
                    .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
                catalog_item,
                filters: filters.into(),
                value_range: ValueRange::new(range.min_value, range.max_value),
                page_size,
                request_timeout: Duration::from_secs(timeout_secs),
                max_pages,
                cv_threshold: range.cv_threshold,
                output_base: export.output_base.clone(),
            };
            collect(&config, &export.output_dir, export.gzip).await?;
        }
        Commands::Analyze {
            source,
            range,
            export,
        } => {
            let bytes = std::fs::read(&source)?;
            let records = parse_records(&bytes)?;
            info!(source = %source.display(), records = records.len(), "Loaded saved items");

            let analysis = analyze(
                records,
                &ValueRange::new(range.min_value, range.max_value),
                range.cv_threshold,
            );

            let base = export.output_base.unwrap_or_else(|| {
                source
                    .file_stem()
                    .and_then(OsStr::to_str)
                    .unwrap_or("pncp_itens")
                    .to_string()
            });
            write_tables(
                &export.output_dir,
                &base,
                &analysis.records,
                &analysis.summaries,
                &analysis.prices,
                export.gzip,
            )?;
        }
    }

    Ok(())
}

/// Runs the full pipeline and writes every artifact, partial or not.
#[tracing::instrument(skip(config), fields(catalog_item = ?config.catalog_item))]
async fn collect(config: &ResearchConfig, output_dir: &Path, gzip: bool) -> Result<()> {
    let client = BasicClient::new();
    let today = Local::now().date_naive();

    let report = run(&client, config, today).await;

    if let StopReason::Fault(e) = &report.stop {
        warn!(
            kind = e.kind(),
            page = e.page(),
            fetched = report.fetched,
            pages = report.pages_requested,
            "Collection incomplete, exporting partial results"
        );
    }

    let base = config.output_base_name(&report.window);
    let paths = write_tables(
        output_dir,
        &base,
        &report.records,
        &report.summaries,
        &report.prices,
        gzip,
    )?;
    let html_path = output_dir.join(format!("{base}.html"));
    write_html(&html_path, &report, today)?;

    info!(
        pages = report.pages_requested,
        records = report.records.len(),
        units = report.summaries.len(),
        tables = %paths.records.parent().unwrap_or(output_dir).display(),
        html = %html_path.display(),
        "Research complete"
    );
    Ok(())
}
