//! Loader for daily NGX price-list files.
//!
//! The provider turns one raw file into a [`NormalizedBatch`] with the fixed
//! column order `[date, open, high, low, close, volume, symbol]`. It never
//! touches storage, and it either produces the whole batch or fails.

use crate::config::Settings;
use crate::error::{IngestError, Result};
use crate::headers::{self, HeaderMap};
use crate::model::{CanonicalColumn, NormalizedBatch, PriceBar};
use crate::table::{FileFormat, RawTable};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// Tried in order. Slash dates are month-first: `01/12/2025` is 12 January.
// Day-first exports need one of the unambiguous layouts.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d-%b-%Y",
    "%d %b %Y",
    "%m/%d/%Y",
    "%Y%m%d",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Reads raw EOD files from disk and normalizes them.
#[derive(Debug, Clone)]
pub struct EodProvider {
    data_dir: PathBuf,
}

impl EodProvider {
    /// Creates a provider that resolves relative file names against the
    /// configured raw-data directory.
    pub fn new(settings: &Settings) -> Self {
        Self::with_data_dir(&settings.eod_data_dir)
    }

    pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Self {
        EodProvider {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Loads one raw file and normalizes it.
    ///
    /// When `trading_date` is given every row gets that date, overriding any
    /// date column in the file. Otherwise the file's date column is parsed per
    /// row.
    ///
    /// # Errors
    /// * [`IngestError::Io`] / [`IngestError::Read`] if the file cannot be read
    /// * [`IngestError::Schema`] naming the first semantic column with no header
    /// * [`IngestError::MissingDate`] if no date is available from either source
    /// * [`IngestError::Coercion`] for the first value that cannot be converted
    pub fn load_file(
        &self,
        path: impl AsRef<Path>,
        trading_date: Option<NaiveDate>,
    ) -> Result<NormalizedBatch> {
        let path = self.resolve_path(path.as_ref());
        let table = RawTable::read(&path)?;
        let batch = normalize(&table, trading_date)?;

        info!(
            path = %path.display(),
            rows = batch.len(),
            trading_date = ?trading_date,
            "normalized EOD file"
        );
        Ok(batch)
    }

    /// Lists the raw files in the data directory with a supported extension,
    /// sorted by file name.
    pub fn list_files(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.data_dir).map_err(|source| IngestError::Io {
            path: self.data_dir.clone(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| IngestError::Io {
                    path: self.data_dir.clone(),
                    source,
                })?
                .path();
            if path.is_file() && FileFormat::is_supported(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Absolute paths and paths that exist relative to the working directory
    /// are used as-is; anything else is looked up in the data directory.
    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() || path.exists() {
            return path.to_path_buf();
        }
        let candidate = self.data_dir.join(path);
        if candidate.exists() {
            debug!(path = %candidate.display(), "resolved against data directory");
            candidate
        } else {
            path.to_path_buf()
        }
    }
}

/// Normalizes an in-memory raw table into a batch.
pub fn normalize(table: &RawTable, trading_date: Option<NaiveDate>) -> Result<NormalizedBatch> {
    let origin = table.path.display().to_string();
    let map = headers::resolve(&table.headers, &origin)?;

    let dates = match (trading_date, map.date) {
        (Some(date), _) => DateSource::Fixed(date),
        (None, Some(idx)) => DateSource::Column(idx),
        (None, None) => {
            return Err(IngestError::MissingDate {
                path: table.path.clone(),
            })
        }
    };

    let rows = table
        .rows
        .iter()
        .enumerate()
        .map(|(idx, row)| normalize_row(row, idx + 1, &map, dates))
        .collect::<Result<Vec<PriceBar>>>()?;

    Ok(NormalizedBatch::new(rows).from_source(&table.path))
}

/// Where each row's trading date comes from.
#[derive(Debug, Clone, Copy)]
enum DateSource {
    Fixed(NaiveDate),
    Column(usize),
}

fn normalize_row(
    row: &[String],
    row_number: usize,
    map: &HeaderMap,
    dates: DateSource,
) -> Result<PriceBar> {
    let cell = |idx: usize| row.get(idx).map(String::as_str).unwrap_or("");

    let date = match dates {
        DateSource::Fixed(date) => date,
        DateSource::Column(idx) => parse_date(cell(idx))
            .ok_or_else(|| coercion(CanonicalColumn::Date, row_number, cell(idx), "a date"))?,
    };

    Ok(PriceBar {
        date,
        open: parse_price(cell(map.open), CanonicalColumn::Open, row_number)?,
        high: parse_price(cell(map.high), CanonicalColumn::High, row_number)?,
        low: parse_price(cell(map.low), CanonicalColumn::Low, row_number)?,
        close: parse_price(cell(map.close), CanonicalColumn::Close, row_number)?,
        volume: parse_volume(cell(map.volume), row_number)?,
        symbol: cell(map.symbol).trim().to_uppercase(),
    })
}

fn coercion(column: CanonicalColumn, row: usize, value: &str, expected: &'static str) -> IngestError {
    IngestError::Coercion {
        column: column.as_str().to_string(),
        row,
        value: value.to_string(),
        expected,
    }
}

fn parse_price(raw: &str, column: CanonicalColumn, row: usize) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| coercion(column, row, raw, "a number"))
}

/// Blank volume means nothing traded. Integral floats such as `1200.0` are
/// accepted since spreadsheets store every number as a float.
fn parse_volume(raw: &str, row: usize) -> Result<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    if let Ok(volume) = trimmed.parse::<i64>() {
        if volume >= 0 {
            return Ok(volume);
        }
    } else if let Ok(value) = trimmed.parse::<f64>() {
        if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value < i64::MAX as f64 {
            return Ok(value as i64);
        }
    }
    Err(coercion(
        CanonicalColumn::Volume,
        row,
        raw,
        "a non-negative integer",
    ))
}

/// Parses a trading date in any of the layouts seen in exporter output.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            path: PathBuf::from("eod.csv"),
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_normalize_with_file_date() {
        let t = table(
            &["Symbol", "Open", "High", "Low", "Close", "Volume", "Date"],
            &[&["MTNN", "190.0", "195.0", "188.0", "192.5", "1234567", "2025-12-01"]],
        );
        let batch = normalize(&t, None).unwrap();
        assert_eq!(
            batch.rows(),
            &[PriceBar::new("MTNN", ymd(2025, 12, 1), 190.0, 195.0, 188.0, 192.5, 1234567)]
        );
        assert_eq!(
            batch.columns(),
            &["date", "open", "high", "low", "close", "volume", "symbol"]
        );
    }

    #[test]
    fn test_trading_date_overrides_file_date() {
        let t = table(
            &["Symbol", "Open", "High", "Low", "Close", "Volume", "Date"],
            &[&["MTNN", "190.0", "195.0", "188.0", "192.5", "1234567", "2025-12-01"]],
        );
        let batch = normalize(&t, Some(ymd(2025, 12, 2))).unwrap();
        assert_eq!(batch.rows()[0].date, ymd(2025, 12, 2));
    }

    #[test]
    fn test_trading_date_ignores_unparseable_file_dates() {
        let t = table(
            &["Ticker", "Open", "High", "Low", "Price", "Vol", "Date"],
            &[&["ZENITHBANK", "35", "36", "34.5", "35.6", "100", "n/a"]],
        );
        let batch = normalize(&t, Some(ymd(2025, 12, 2))).unwrap();
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_missing_date_error() {
        let t = table(
            &["Symbol", "Open", "High", "Low", "Close", "Volume"],
            &[&["MTNN", "1", "1", "1", "1", "1"]],
        );
        assert!(matches!(
            normalize(&t, None),
            Err(IngestError::MissingDate { .. })
        ));
    }

    #[test]
    fn test_schema_error_reported_before_missing_date() {
        let t = table(&["Symbol", "Open", "High", "Low", "Volume"], &[]);
        match normalize(&t, None) {
            Err(IngestError::Schema { column, .. }) => assert_eq!(column, "close"),
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_symbol_trimmed_and_uppercased() {
        let t = table(
            &["symbol", "open", "high", "low", "close", "volume"],
            &[&["  gtco ", "1", "2", "0.5", "1.5", "10"]],
        );
        let batch = normalize(&t, Some(ymd(2025, 1, 2))).unwrap();
        assert_eq!(batch.rows()[0].symbol, "GTCO");
    }

    #[test]
    fn test_fractional_volume_fails_whole_file() {
        let t = table(
            &["Symbol", "Open", "High", "Low", "Close", "Volume"],
            &[
                &["MTNN", "1", "2", "0.5", "1.5", "10"],
                &["GTCO", "1", "2", "0.5", "1.5", "12.5"],
            ],
        );
        match normalize(&t, Some(ymd(2025, 1, 2))) {
            Err(IngestError::Coercion { column, row, value, .. }) => {
                assert_eq!(column, "volume");
                assert_eq!(row, 2);
                assert_eq!(value, "12.5");
            }
            other => panic!("expected coercion error, got {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_and_negative_volume_rejected() {
        for bad in ["abc", "-5", "1e400"] {
            let t = table(
                &["Symbol", "Open", "High", "Low", "Close", "Volume"],
                &[&["MTNN", "1", "2", "0.5", "1.5", bad]],
            );
            assert!(
                matches!(normalize(&t, Some(ymd(2025, 1, 2))), Err(IngestError::Coercion { .. })),
                "volume {bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_volume_blank_and_integral_float() {
        assert_eq!(parse_volume("", 1).unwrap(), 0);
        assert_eq!(parse_volume("1234567.0", 1).unwrap(), 1234567);
        assert_eq!(parse_volume(" 42 ", 1).unwrap(), 42);
    }

    #[test]
    fn test_bad_price_is_coercion_error() {
        let t = table(
            &["Symbol", "Open", "High", "Low", "Close", "Volume"],
            &[&["MTNN", "1", "2", "0.5", "", "10"]],
        );
        match normalize(&t, Some(ymd(2025, 1, 2))) {
            Err(IngestError::Coercion { column, .. }) => assert_eq!(column, "close"),
            other => panic!("expected coercion error, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_file_date_is_coercion_error() {
        let t = table(
            &["Symbol", "Open", "High", "Low", "Close", "Volume", "Date"],
            &[&["MTNN", "1", "2", "0.5", "1.5", "10", "yesterday"]],
        );
        match normalize(&t, None) {
            Err(IngestError::Coercion { column, .. }) => assert_eq!(column, "date"),
            other => panic!("expected coercion error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_date_layouts() {
        let expected = Some(ymd(2025, 12, 1));
        assert_eq!(parse_date("2025-12-01"), expected);
        assert_eq!(parse_date("2025/12/01"), expected);
        assert_eq!(parse_date("01-Dec-2025"), expected);
        assert_eq!(parse_date("01 Dec 2025"), expected);
        assert_eq!(parse_date("12/01/2025"), expected);
        assert_eq!(parse_date("20251201"), expected);
        assert_eq!(parse_date("2025-12-01 16:30:00"), expected);
        assert_eq!(parse_date("2025-12-01T16:30:00+01:00"), expected);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("not a date"), None);
    }

    #[test]
    fn test_slash_dates_are_month_first() {
        assert_eq!(parse_date("01/12/2025"), Some(ymd(2025, 1, 12)));
        assert_eq!(parse_date("13/01/2025"), None);
    }

    #[test]
    fn test_load_file_resolves_against_data_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("ngx_2025-12-01.csv"),
            "Symbol,Open,High,Low,Close,Volume\nMTNN,1,2,0.5,1.5,10\n",
        )
        .unwrap();

        let provider = EodProvider::with_data_dir(dir.path());
        let batch = provider
            .load_file("ngx_2025-12-01.csv", Some(ymd(2025, 12, 1)))
            .unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.source(), Some(dir.path().join("ngx_2025-12-01.csv").as_path()));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let provider = EodProvider::with_data_dir(dir.path());
        let result = provider.load_file("absent.csv", None);
        assert!(matches!(result, Err(IngestError::Io { .. })));
    }

    #[test]
    fn test_list_files_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        for name in ["b.csv", "a.xlsx", "notes.md", "c.tsv"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("archive.csv")).unwrap();

        let provider = EodProvider::with_data_dir(dir.path());
        let names: Vec<String> = provider
            .list_files()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.xlsx", "b.csv", "c.tsv"]);
    }

    #[test]
    fn test_list_files_missing_directory() {
        let provider = EodProvider::with_data_dir("/definitely/not/here");
        assert!(matches!(provider.list_files(), Err(IngestError::Io { .. })));
    }
}
