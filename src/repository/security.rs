use crate::connection::ConnectionManager;
use crate::error::{IngestError, Result};
use crate::model::{Security, SecurityRecord};
use rusqlite::{params, OptionalExtension};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

/// Securities master table: reference metadata per ticker.
///
/// Rows are keyed by ticker; writes are last-write-wins on every other column.
#[derive(Debug, Clone)]
pub struct SecurityRepository {
    connections: ConnectionManager,
    db_path: Option<PathBuf>,
}

impl SecurityRepository {
    /// Creates the repository and makes sure the `securities` table exists.
    ///
    /// # Arguments
    /// * `connections` - Connection manager used for every operation
    /// * `db_path` - Store override; `None` uses the manager's default location
    pub fn new(connections: ConnectionManager, db_path: Option<PathBuf>) -> Result<Self> {
        let repo = SecurityRepository {
            connections,
            db_path,
        };
        repo.ensure_schema()?;
        Ok(repo)
    }

    /// Creates the `securities` table if it is absent.
    pub fn ensure_schema(&self) -> Result<()> {
        self.connections.with_connection(self.db_path.as_deref(), |conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS securities (
                    ticker TEXT PRIMARY KEY,
                    company TEXT,
                    sector TEXT,
                    industry TEXT
                )",
                [],
            )?;
            Ok(())
        })
    }

    /// Inserts new tickers and replaces existing ones.
    ///
    /// Every record is validated before the store is opened, so a missing
    /// field means nothing is written. Tickers are trimmed and upper-cased.
    ///
    /// # Returns
    /// The number of records written.
    ///
    /// # Errors
    /// Returns [`IngestError::Validation`] naming the first missing field.
    pub fn upsert(&self, records: &[SecurityRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let securities = records
            .iter()
            .enumerate()
            .map(|(idx, record)| validate(record, idx + 1))
            .collect::<Result<Vec<Security>>>()?;

        let written = self
            .connections
            .with_connection(self.db_path.as_deref(), |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT OR REPLACE INTO securities (ticker, company, sector, industry)
                         VALUES (?1, ?2, ?3, ?4)",
                    )?;
                    for security in &securities {
                        stmt.execute(params![
                            security.ticker,
                            security.company,
                            security.sector,
                            security.industry
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(securities.len())
            })?;

        info!(rows = written, "upserted securities");
        Ok(written)
    }

    /// Returns every stored ticker, sorted ascending.
    pub fn list_tickers(&self) -> Result<Vec<String>> {
        self.connections
            .with_connection(self.db_path.as_deref(), |conn| {
                let mut stmt = conn.prepare("SELECT ticker FROM securities ORDER BY ticker")?;
                let tickers = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                Ok(tickers)
            })
    }

    /// Looks up one security by ticker (case-insensitive).
    pub fn get(&self, ticker: &str) -> Result<Option<Security>> {
        let ticker = ticker.trim().to_uppercase();
        self.connections
            .with_connection(self.db_path.as_deref(), |conn| {
                let security = conn
                    .query_row(
                        "SELECT ticker, company, sector, industry FROM securities WHERE ticker = ?1",
                        [&ticker],
                        |row| {
                            Ok(Security {
                                ticker: row.get(0)?,
                                company: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                                sector: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                                industry: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                            })
                        },
                    )
                    .optional()?;
                Ok(security)
            })
    }
}

fn validate(record: &SecurityRecord, position: usize) -> Result<Security> {
    let field = |name: &str| {
        record
            .get(name)
            .map(str::to_string)
            .ok_or_else(|| IngestError::Validation {
                field: name.to_string(),
                record: format!("security record {}", position),
            })
    };

    Ok(Security {
        ticker: field("ticker")?.to_uppercase(),
        company: field("company")?,
        sector: field("sector")?,
        industry: field("industry")?,
    })
}

/// Reads a CSV reference feed into records keyed by its header names.
pub fn read_reference_file(path: &Path) -> Result<Vec<SecurityRecord>> {
    let file = File::open(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let parse_error = |e: csv::Error| IngestError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let headers = reader.headers().map_err(parse_error)?.clone();
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(parse_error)?;
        let record = headers
            .iter()
            .zip(row.iter())
            .fold(SecurityRecord::new(), |record, (field, value)| {
                record.with(field, value)
            });
        records.push(record);
    }
    Ok(records)
}
