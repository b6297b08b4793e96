use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Canonical columns of a normalized EOD table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalColumn {
    Date,
    Open,
    High,
    Low,
    Close,
    Volume,
    Symbol,
}

impl CanonicalColumn {
    /// Output order of a normalized batch and of the `eod_prices` table.
    pub const ALL: [CanonicalColumn; 7] = [
        CanonicalColumn::Date,
        CanonicalColumn::Open,
        CanonicalColumn::High,
        CanonicalColumn::Low,
        CanonicalColumn::Close,
        CanonicalColumn::Volume,
        CanonicalColumn::Symbol,
    ];

    /// Returns the column name as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalColumn::Date => "date",
            CanonicalColumn::Open => "open",
            CanonicalColumn::High => "high",
            CanonicalColumn::Low => "low",
            CanonicalColumn::Close => "close",
            CanonicalColumn::Volume => "volume",
            CanonicalColumn::Symbol => "symbol",
        }
    }
}

impl fmt::Display for CanonicalColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One end-of-day OHLCV bar for a security.
///
/// Identity is `(symbol, date)`, but the store does not enforce uniqueness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Shares traded; never negative
    pub volume: i64,
    pub symbol: String,
}

impl PriceBar {
    pub fn new(
        symbol: impl Into<String>,
        date: NaiveDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: i64,
    ) -> Self {
        PriceBar {
            date,
            open,
            high,
            low,
            close,
            volume,
            symbol: symbol.into(),
        }
    }
}

/// The normalized rows produced from one raw input file.
///
/// Carries its column names alongside the rows so the write path can check
/// the shape before anything reaches storage. Symbols are held trimmed and
/// upper-cased whichever constructor built the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedBatch {
    columns: Vec<String>,
    rows: Vec<PriceBar>,
    source: Option<PathBuf>,
}

impl NormalizedBatch {
    /// Creates a batch with the canonical column set.
    pub fn new(rows: Vec<PriceBar>) -> Self {
        NormalizedBatch {
            columns: CanonicalColumn::ALL
                .iter()
                .map(|c| c.as_str().to_string())
                .collect(),
            rows: canonical_symbols(rows),
            source: None,
        }
    }

    /// Creates a batch with an explicit column list.
    ///
    /// Used when a batch is assembled outside the provider; the repository
    /// still validates the columns before writing.
    pub fn with_columns<I, S>(columns: I, rows: Vec<PriceBar>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        NormalizedBatch {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: canonical_symbols(rows),
            source: None,
        }
    }

    /// Tags the batch with the raw file it came from.
    pub fn from_source(mut self, source: impl AsRef<Path>) -> Self {
        self.source = Some(source.as_ref().to_path_buf());
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[PriceBar] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<PriceBar> {
        self.rows
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Human-readable origin for error messages.
    pub(crate) fn origin(&self) -> String {
        match &self.source {
            Some(path) => path.display().to_string(),
            None => "batch".to_string(),
        }
    }
}

fn canonical_symbols(mut rows: Vec<PriceBar>) -> Vec<PriceBar> {
    for bar in &mut rows {
        bar.symbol = bar.symbol.trim().to_uppercase();
    }
    rows
}

/// Reference metadata for a listed security.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Security {
    /// Upper-case ticker; primary key
    pub ticker: String,
    pub company: String,
    pub sector: String,
    pub industry: String,
}

impl Security {
    pub fn new(
        ticker: impl Into<String>,
        company: impl Into<String>,
        sector: impl Into<String>,
        industry: impl Into<String>,
    ) -> Self {
        Security {
            ticker: ticker.into(),
            company: company.into(),
            sector: sector.into(),
            industry: industry.into(),
        }
    }
}

/// A loosely-typed reference-feed row awaiting validation.
///
/// Field names are compared case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityRecord {
    fields: BTreeMap<String, String>,
}

impl SecurityRecord {
    pub const REQUIRED_FIELDS: [&'static str; 4] = ["ticker", "company", "sector", "industry"];

    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, replacing any earlier value under the same name.
    pub fn with(mut self, field: &str, value: impl Into<String>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: &str, value: impl Into<String>) {
        self.fields
            .insert(field.trim().to_lowercase(), value.into());
    }

    /// Returns the trimmed value of a field, or `None` if absent or blank.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .get(&field.to_lowercase())
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }
}

impl From<&Security> for SecurityRecord {
    fn from(security: &Security) -> Self {
        SecurityRecord::new()
            .with("ticker", security.ticker.clone())
            .with("company", security.company.clone())
            .with("sector", security.sector.clone())
            .with("industry", security.industry.clone())
    }
}
