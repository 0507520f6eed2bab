//! eodpipe CLI — bundle ingestion, inspection, and sink bootstrap commands.
//!
//! Commands:
//! - `ingest` — load bundle bars into the daily price table
//! - `tickers` — list the bundle universe
//! - `status` — per-ticker bar counts and date ranges
//! - `init-db` — create the price table and its index
//! - `import` — build bundle partitions from a CSV of bars

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use eodpipe_core::bundle::{BundleStore, RawBar};
use eodpipe_core::config::JobConfig;
use eodpipe_core::dates::PACKED_DATE_FACTOR;
use eodpipe_core::ingest::{run_ingest, CommitMode, IngestRequest, StdoutProgress};
use eodpipe_core::sink::{SqliteSink, DEFAULT_TABLE};

#[derive(Parser)]
#[command(
    name = "eodpipe",
    about = "eodpipe CLI — end-of-day bar ingestion into a daily price table"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load bundle bars into the daily price table.
    Ingest {
        /// Path to a TOML job file. Mutually exclusive with --start/--end.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Start date (YYYY-MM-DD), inclusive.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD), inclusive.
        #[arg(long)]
        end: Option<String>,

        /// Comma-delimited tickers. Empty means the full bundle universe.
        #[arg(long, default_value = "")]
        tickers: String,

        /// Commit mode: single (one combined commit at the end) or
        /// per-ticker (commit after each ticker).
        #[arg(long, default_value = "single")]
        mode: String,

        /// Bundle directory.
        #[arg(long, default_value = "bundle")]
        bundle_dir: PathBuf,

        /// SQLite database file.
        #[arg(long, default_value = "prices.db")]
        db: PathBuf,

        /// Target table name.
        #[arg(long, default_value = DEFAULT_TABLE)]
        table: String,
    },
    /// List the bundle universe, one ticker per line.
    Tickers {
        /// Bundle directory.
        #[arg(long, default_value = "bundle")]
        bundle_dir: PathBuf,
    },
    /// Report per-ticker bar counts and date ranges.
    Status {
        /// Bundle directory.
        #[arg(long, default_value = "bundle")]
        bundle_dir: PathBuf,
    },
    /// Create the price table and its index if absent.
    InitDb {
        /// SQLite database file.
        #[arg(long, default_value = "prices.db")]
        db: PathBuf,

        /// Target table name.
        #[arg(long, default_value = DEFAULT_TABLE)]
        table: String,
    },
    /// Build bundle partitions from a CSV of bars
    /// (header: ticker,date,open,high,low,close,volume).
    Import {
        /// CSV file to import.
        #[arg(long)]
        csv: PathBuf,

        /// Bundle directory.
        #[arg(long, default_value = "bundle")]
        bundle_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest {
            config,
            start,
            end,
            tickers,
            mode,
            bundle_dir,
            db,
            table,
        } => run_ingest_cmd(config, start, end, tickers, mode, bundle_dir, db, table),
        Commands::Tickers { bundle_dir } => run_tickers(&bundle_dir),
        Commands::Status { bundle_dir } => run_status(&bundle_dir),
        Commands::InitDb { db, table } => run_init_db(&db, table),
        Commands::Import { csv, bundle_dir } => run_import(&csv, bundle_dir),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_ingest_cmd(
    config_path: Option<PathBuf>,
    start: Option<String>,
    end: Option<String>,
    tickers: String,
    mode: String,
    bundle_dir: PathBuf,
    db: PathBuf,
    table: String,
) -> Result<()> {
    // Validate mutually exclusive options
    if config_path.is_some() && (start.is_some() || end.is_some()) {
        bail!("--config and --start/--end are mutually exclusive");
    }

    let (request, bundle_dir, db, table) = if let Some(path) = config_path {
        let job = JobConfig::from_file(&path)?;
        (
            IngestRequest {
                start: job.job.start_date,
                end: job.job.end_date,
                tickers: job.job.tickers,
                mode: job.job.mode,
            },
            job.bundle.dir,
            job.sink.db,
            job.sink.table,
        )
    } else {
        let (Some(start), Some(end)) = (start, end) else {
            bail!("--start and --end are required without --config");
        };
        (
            IngestRequest {
                start: parse_date(&start)?,
                end: parse_date(&end)?,
                tickers: split_tickers(&tickers),
                mode: parse_mode(&mode)?,
            },
            bundle_dir,
            db,
            table,
        )
    };

    let store = BundleStore::new(&bundle_dir);
    let mut sink = SqliteSink::open(&db, table)?;
    sink.init_schema()?;

    run_ingest(&store, &mut sink, &request, &StdoutProgress, None)?;

    println!("Finished");
    Ok(())
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{s}' (expected YYYY-MM-DD)"))
}

fn split_tickers(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

fn parse_mode(name: &str) -> Result<CommitMode> {
    match name {
        "single" => Ok(CommitMode::Single),
        "per-ticker" | "per_ticker" => Ok(CommitMode::PerTicker),
        _ => bail!("unknown mode '{name}'. Valid: single, per-ticker"),
    }
}

fn run_tickers(bundle_dir: &Path) -> Result<()> {
    let store = BundleStore::new(bundle_dir);
    for ticker in store.list_tickers()? {
        println!("{ticker}");
    }
    Ok(())
}

fn run_status(bundle_dir: &Path) -> Result<()> {
    let store = BundleStore::new(bundle_dir);
    let statuses = store.status()?;

    if statuses.is_empty() {
        println!("Bundle is empty: {}", bundle_dir.display());
        return Ok(());
    }

    println!("Bundle: {}", bundle_dir.display());
    println!("Tickers: {}", statuses.len());
    println!();
    println!("{:<14} {:>8}  {:<12} {:<12}", "Ticker", "Bars", "First", "Last");
    println!("{}", "-".repeat(50));
    for s in &statuses {
        let first = s
            .first_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".into());
        let last = s
            .last_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".into());
        println!("{:<14} {:>8}  {:<12} {:<12}", s.ticker, s.bar_count, first, last);
    }

    Ok(())
}

fn run_init_db(db: &Path, table: String) -> Result<()> {
    let sink = SqliteSink::open(db, table)?;
    sink.init_schema()?;
    println!("Price table ready in {}", db.display());
    Ok(())
}

fn run_import(csv_path: &Path, bundle_dir: PathBuf) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(csv_path)
        .with_context(|| format!("open CSV '{}'", csv_path.display()))?;

    let mut by_ticker: BTreeMap<String, Vec<RawBar>> = BTreeMap::new();

    for (line, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("read CSV record {}", line + 1))?;
        if record.len() != 7 {
            bail!(
                "record {}: expected 7 columns (ticker,date,open,high,low,close,volume), got {}",
                line + 1,
                record.len()
            );
        }

        let ticker = record[0].to_string();
        let raw_date: i64 = record[1]
            .parse()
            .with_context(|| format!("record {}: bad date '{}'", line + 1, &record[1]))?;
        // Accept plain YYYYMMDD alongside the packed on-disk form.
        let date = if raw_date < 100_000_000 {
            raw_date * PACKED_DATE_FACTOR
        } else {
            raw_date
        };

        let field = |idx: usize, name: &str| -> Result<f64> {
            record[idx]
                .parse()
                .with_context(|| format!("record {}: bad {name} '{}'", line + 1, &record[idx]))
        };

        by_ticker.entry(ticker).or_default().push(RawBar {
            date,
            open: field(2, "open")?,
            high: field(3, "high")?,
            low: field(4, "low")?,
            close: field(5, "close")?,
            volume: record[6]
                .parse()
                .with_context(|| format!("record {}: bad volume '{}'", line + 1, &record[6]))?,
        });
    }

    if by_ticker.is_empty() {
        bail!("no records in '{}'", csv_path.display());
    }

    let store = BundleStore::new(bundle_dir);
    for (ticker, bars) in &by_ticker {
        store.write_bars(ticker, bars)?;
        println!("Imported {ticker}: {} bar(s)", bars.len());
    }

    println!("Done. {} ticker(s) imported.", by_ticker.len());
    Ok(())
}
