use crate::connection::ConnectionManager;
use crate::error::{IngestError, Result};
use crate::model::{CanonicalColumn, NormalizedBatch, PriceBar};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter};
use std::path::PathBuf;
use tracing::{debug, info};

/// Daily OHLCV table.
///
/// Append-only: there is no key on `(symbol, date)`, so ingesting the same
/// file twice stores every row twice.
#[derive(Debug, Clone)]
pub struct PriceRepository {
    connections: ConnectionManager,
    db_path: Option<PathBuf>,
}

impl PriceRepository {
    /// Creates the repository and makes sure the `eod_prices` table exists.
    ///
    /// # Arguments
    /// * `connections` - Connection manager used for every operation
    /// * `db_path` - Store override; `None` uses the manager's default location
    pub fn new(connections: ConnectionManager, db_path: Option<PathBuf>) -> Result<Self> {
        let repo = PriceRepository {
            connections,
            db_path,
        };
        repo.ensure_schema()?;
        Ok(repo)
    }

    /// Creates the `eod_prices` table and its lookup index if absent.
    pub fn ensure_schema(&self) -> Result<()> {
        self.connections.with_connection(self.db_path.as_deref(), |conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS eod_prices (
                    date DATE,
                    open DOUBLE,
                    high DOUBLE,
                    low DOUBLE,
                    close DOUBLE,
                    volume BIGINT,
                    symbol TEXT
                )",
                [],
            )?;

            // Lookup only; duplicates are still accepted.
            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_eod_prices_symbol_date ON eod_prices(symbol, date)",
                [],
            )?;
            debug!("eod_prices schema ensured");
            Ok(())
        })
    }

    /// Appends every row of `batch`.
    ///
    /// The batch's columns are checked (case-insensitively) against the
    /// canonical set before the store is opened. Rows are written in a single
    /// transaction.
    ///
    /// # Returns
    /// The number of rows written.
    ///
    /// # Errors
    /// Returns [`IngestError::Schema`] naming the first missing column; nothing
    /// is written in that case.
    pub fn upsert(&self, batch: &NormalizedBatch) -> Result<usize> {
        validate_columns(batch)?;
        if batch.is_empty() {
            return Ok(0);
        }

        let written = self
            .connections
            .with_connection(self.db_path.as_deref(), |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO eod_prices (date, open, high, low, close, volume, symbol)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    )?;
                    for bar in batch.rows() {
                        stmt.execute(params![
                            bar.date,
                            bar.open,
                            bar.high,
                            bar.low,
                            bar.close,
                            bar.volume,
                            bar.symbol
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(batch.len())
            })?;

        info!(rows = written, origin = %batch.origin(), "appended EOD rows");
        Ok(written)
    }

    /// Fetches bars for `symbols`, optionally bounded by an inclusive date
    /// range, ordered by `(symbol, date)`.
    ///
    /// An empty symbol list, or symbols with no stored rows, give an empty
    /// result. Symbols are matched in their stored upper-case form.
    pub fn fetch<S: AsRef<str>>(
        &self,
        symbols: &[S],
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<PriceBar>> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let mut values: Vec<Value> = symbols
            .iter()
            .map(|s| Value::Text(s.as_ref().trim().to_uppercase()))
            .collect();
        let placeholders = vec!["?"; values.len()].join(", ");
        let mut query = format!(
            "SELECT date, open, high, low, close, volume, symbol FROM eod_prices
             WHERE symbol IN ({})",
            placeholders
        );
        if let Some(start) = start {
            query.push_str(" AND date >= ?");
            values.push(Value::Text(start.format("%Y-%m-%d").to_string()));
        }
        if let Some(end) = end {
            query.push_str(" AND date <= ?");
            values.push(Value::Text(end.format("%Y-%m-%d").to_string()));
        }
        query.push_str(" ORDER BY symbol, date");

        self.connections
            .with_connection(self.db_path.as_deref(), |conn| {
                let mut stmt = conn.prepare(&query)?;
                let bars = stmt
                    .query_map(params_from_iter(values.iter()), |row| {
                        Ok(PriceBar {
                            date: row.get(0)?,
                            open: row.get(1)?,
                            high: row.get(2)?,
                            low: row.get(3)?,
                            close: row.get(4)?,
                            volume: row.get(5)?,
                            symbol: row.get(6)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<PriceBar>>>()?;
                Ok(bars)
            })
    }

    /// Total number of stored rows.
    pub fn count(&self) -> Result<u64> {
        self.connections
            .with_connection(self.db_path.as_deref(), |conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM eod_prices", [], |row| row.get(0))?;
                Ok(count as u64)
            })
    }
}

fn validate_columns(batch: &NormalizedBatch) -> Result<()> {
    let present: Vec<String> = batch
        .columns()
        .iter()
        .map(|c| c.trim().to_lowercase())
        .collect();

    match CanonicalColumn::ALL
        .iter()
        .find(|column| !present.iter().any(|p| p == column.as_str()))
    {
        Some(missing) => Err(IngestError::schema(missing.as_str(), batch.origin())),
        None => Ok(()),
    }
}
