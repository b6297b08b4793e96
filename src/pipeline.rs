//! Ingestion runs: raw file -> normalized batch -> `eod_prices`.

use crate::error::Result;
use crate::provider::EodProvider;
use crate::repository::PriceRepository;
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

/// Outcome of ingesting one raw file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub path: PathBuf,
    pub rows: usize,
    /// Date applied to every row, or `None` when dates came from the file
    pub trading_date: Option<NaiveDate>,
}

impl fmt::Display for IngestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ingested {} rows from {}", self.rows, self.path.display())?;
        match self.trading_date {
            Some(date) => write!(f, " for {}", date),
            None => write!(f, " (dates from file)"),
        }
    }
}

/// Loads one file and appends it to the price table.
///
/// Sequential and all-or-nothing per file: a load failure happens before the
/// store is opened, and the write itself is a single transaction.
pub fn ingest_file(
    provider: &EodProvider,
    repo: &PriceRepository,
    path: impl AsRef<Path>,
    trading_date: Option<NaiveDate>,
) -> Result<IngestSummary> {
    let batch = provider.load_file(path.as_ref(), trading_date)?;
    let rows = repo.upsert(&batch)?;

    Ok(IngestSummary {
        path: batch
            .source()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| path.as_ref().to_path_buf()),
        rows,
        trading_date,
    })
}

/// Ingests every supported file in the provider's data directory, in file
/// name order.
///
/// Stops at the first failing file; files ingested before it stay committed.
pub fn ingest_directory(
    provider: &EodProvider,
    repo: &PriceRepository,
    trading_date: Option<NaiveDate>,
) -> Result<Vec<IngestSummary>> {
    let files = provider.list_files()?;
    info!(dir = %provider.data_dir().display(), files = files.len(), "ingesting directory");

    files
        .iter()
        .map(|path| ingest_file(provider, repo, path, trading_date))
        .collect()
}
