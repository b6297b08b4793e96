//! NGX end-of-day ingestion CLI
//!
//! Run with: `cargo run --bin ngx-eod -- ingest data/raw/ngx_eod/2025-12-01.csv`
//!
//! Store location and raw-data directory come from `EOD_DATABASE_PATH` /
//! `EOD_DATA_DIR` (a `.env` file is honoured) unless overridden by flags.
//! Set `RUST_LOG=ngx_eod=debug` for per-scope logging.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use ngx_eod::{
    ingest_directory, ingest_file, read_reference_file, ConnectionManager, EodProvider,
    IngestError, PriceRepository, SecurityRepository, Settings,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "ngx-eod", version, about = "Ingest NGX daily price lists into a local store")]
struct Cli {
    /// Store file (overrides EOD_DATABASE_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Raw EOD file directory (overrides EOD_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ingest one daily price file (CSV/TSV/XLSX)
    Ingest {
        file: PathBuf,
        /// Trading date applied to every row; optional if the file has a Date column
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    /// Ingest every price file in the data directory
    IngestDir {
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    /// Upsert securities from a CSV reference feed (ticker, company, sector, industry)
    Securities { file: PathBuf },
    /// List stored tickers
    Tickers,
    /// Print stored bars for one or more symbols
    Fetch {
        #[arg(required = true)]
        symbols: Vec<String>,
        #[arg(long, value_parser = parse_date)]
        start: Option<NaiveDate>,
        #[arg(long, value_parser = parse_date)]
        end: Option<NaiveDate>,
        /// Emit one JSON object per line
        #[arg(long)]
        json: bool,
    },
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD, got '{}': {}", raw, e))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::from_env();
    if let Some(db) = &cli.db {
        settings = settings.with_store_path(db);
    }
    if let Some(dir) = &cli.data_dir {
        settings = settings.with_data_dir(dir);
    }

    match run(cli.command, &settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error [{}]: {}", err.kind(), err);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, settings: &Settings) -> Result<(), IngestError> {
    let connections = ConnectionManager::new(settings);
    let provider = EodProvider::new(settings);

    match command {
        Command::Ingest { file, date } => {
            let prices = PriceRepository::new(connections, None)?;
            let summary = ingest_file(&provider, &prices, &file, date)?;
            println!("{}", summary);
        }
        Command::IngestDir { date } => {
            let prices = PriceRepository::new(connections, None)?;
            let summaries = ingest_directory(&provider, &prices, date)?;
            for summary in &summaries {
                println!("{}", summary);
            }
            let total: usize = summaries.iter().map(|s| s.rows).sum();
            println!("Ingested {} rows from {} files", total, summaries.len());
        }
        Command::Securities { file } => {
            let securities = SecurityRepository::new(connections, None)?;
            let records = read_reference_file(&file)?;
            let written = securities.upsert(&records)?;
            println!("Upserted {} securities from {}", written, file.display());
        }
        Command::Tickers => {
            let securities = SecurityRepository::new(connections, None)?;
            for ticker in securities.list_tickers()? {
                println!("{}", ticker);
            }
        }
        Command::Fetch {
            symbols,
            start,
            end,
            json,
        } => {
            let prices = PriceRepository::new(connections, None)?;
            let bars = prices.fetch(symbols.as_slice(), start, end)?;
            if json {
                for bar in &bars {
                    match serde_json::to_string(bar) {
                        Ok(line) => println!("{}", line),
                        Err(e) => tracing::warn!(error = %e, "failed to serialize bar"),
                    }
                }
            } else {
                println!(
                    "{:<10} {:<12} {:>10} {:>10} {:>10} {:>10} {:>14}",
                    "symbol", "date", "open", "high", "low", "close", "volume"
                );
                for bar in &bars {
                    println!(
                        "{:<10} {:<12} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>14}",
                        bar.symbol,
                        bar.date.to_string(),
                        bar.open,
                        bar.high,
                        bar.low,
                        bar.close,
                        bar.volume
                    );
                }
            }
            tracing::info!(rows = bars.len(), "fetched");
        }
    }

    Ok(())
}
