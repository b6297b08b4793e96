//! Header resolution for raw EOD files.
//!
//! Exporters disagree on naming ("Price" vs "Close", "Vol" vs "Volume"), so raw
//! headers are matched against a fixed alias table. Within one column the
//! aliases are listed in priority order: when a file carries several of them,
//! the earliest alias wins regardless of where it sits in the file.

use crate::error::{IngestError, Result};
use crate::model::CanonicalColumn;
use tracing::debug;

/// Lower-cased header aliases per canonical column, highest priority first.
pub const HEADER_ALIASES: &[(CanonicalColumn, &[&str])] = &[
    (CanonicalColumn::Symbol, &["symbol", "ticker"]),
    (CanonicalColumn::Open, &["open"]),
    (CanonicalColumn::High, &["high"]),
    (CanonicalColumn::Low, &["low"]),
    (CanonicalColumn::Close, &["close", "price", "last"]),
    (CanonicalColumn::Volume, &["volume", "vol"]),
    (CanonicalColumn::Date, &["date"]),
];

/// Columns a raw file must provide; `date` may come from the caller instead.
pub const REQUIRED_COLUMNS: [CanonicalColumn; 6] = [
    CanonicalColumn::Symbol,
    CanonicalColumn::Open,
    CanonicalColumn::High,
    CanonicalColumn::Low,
    CanonicalColumn::Close,
    CanonicalColumn::Volume,
];

/// Positions of the canonical columns within a raw header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderMap {
    pub symbol: usize,
    pub open: usize,
    pub high: usize,
    pub low: usize,
    pub close: usize,
    pub volume: usize,
    pub date: Option<usize>,
}

/// Finds the raw header index for one canonical column, if any alias matches.
pub fn locate(headers: &[String], column: CanonicalColumn) -> Option<usize> {
    let aliases = HEADER_ALIASES
        .iter()
        .find(|(canonical, _)| *canonical == column)
        .map(|(_, aliases)| *aliases)?;

    aliases.iter().find_map(|alias| {
        headers
            .iter()
            .position(|header| header.trim().to_lowercase() == *alias)
    })
}

/// Maps a raw header row onto the canonical columns.
///
/// # Errors
/// Returns [`IngestError::Schema`] naming the first required column with no
/// matching header. `origin` identifies the file in the message.
pub fn resolve(headers: &[String], origin: &str) -> Result<HeaderMap> {
    let find = |column: CanonicalColumn| {
        locate(headers, column).ok_or_else(|| IngestError::schema(column.as_str(), origin))
    };

    // Evaluated in REQUIRED_COLUMNS order so the reported column is deterministic.
    let map = HeaderMap {
        symbol: find(CanonicalColumn::Symbol)?,
        open: find(CanonicalColumn::Open)?,
        high: find(CanonicalColumn::High)?,
        low: find(CanonicalColumn::Low)?,
        close: find(CanonicalColumn::Close)?,
        volume: find(CanonicalColumn::Volume)?,
        date: locate(headers, CanonicalColumn::Date),
    };

    let used = [
        Some(map.symbol),
        Some(map.open),
        Some(map.high),
        Some(map.low),
        Some(map.close),
        Some(map.volume),
        map.date,
    ];
    let dropped: Vec<&str> = headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| !used.contains(&Some(*idx)))
        .map(|(_, header)| header.as_str())
        .collect();
    if !dropped.is_empty() {
        debug!(origin, ?dropped, "ignoring unrecognized headers");
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_canonical_headers() {
        let h = headers(&["Symbol", "Open", "High", "Low", "Close", "Volume", "Date"]);
        let map = resolve(&h, "eod.csv").unwrap();
        assert_eq!(
            map,
            HeaderMap {
                symbol: 0,
                open: 1,
                high: 2,
                low: 3,
                close: 4,
                volume: 5,
                date: Some(6),
            }
        );
    }

    #[test]
    fn test_resolve_aliases_any_case_and_order() {
        let h = headers(&["VOL", "last", "TICKER", "low", "HIGH", "oPeN"]);
        let map = resolve(&h, "eod.csv").unwrap();
        assert_eq!(map.volume, 0);
        assert_eq!(map.close, 1);
        assert_eq!(map.symbol, 2);
        assert_eq!(map.low, 3);
        assert_eq!(map.high, 4);
        assert_eq!(map.open, 5);
        assert_eq!(map.date, None);
    }

    #[test]
    fn test_close_priority_over_price_and_last() {
        let h = headers(&["Last", "Price", "Close"]);
        assert_eq!(locate(&h, CanonicalColumn::Close), Some(2));

        let h = headers(&["Last", "Price"]);
        assert_eq!(locate(&h, CanonicalColumn::Close), Some(1));
    }

    #[test]
    fn test_symbol_priority_over_ticker() {
        let h = headers(&["Ticker", "Symbol"]);
        assert_eq!(locate(&h, CanonicalColumn::Symbol), Some(1));
    }

    #[test]
    fn test_padded_headers_match() {
        let h = headers(&["  Close  "]);
        assert_eq!(locate(&h, CanonicalColumn::Close), Some(0));
    }

    #[test]
    fn test_missing_close_is_schema_error() {
        let h = headers(&["Symbol", "Open", "High", "Low", "Volume", "Date"]);
        match resolve(&h, "eod.csv") {
            Err(IngestError::Schema { column, origin }) => {
                assert_eq!(column, "close");
                assert_eq!(origin, "eod.csv");
            }
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_first_missing_column_reported() {
        let h = headers(&["Date", "Close"]);
        match resolve(&h, "eod.csv") {
            Err(IngestError::Schema { column, .. }) => assert_eq!(column, "symbol"),
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_unrecognized_headers_ignored() {
        let h = headers(&["Symbol", "Open", "High", "Low", "Close", "Volume", "Trades", "Value"]);
        assert!(resolve(&h, "eod.csv").is_ok());
    }

    #[test]
    fn test_alias_table_covers_every_column() {
        for column in CanonicalColumn::ALL {
            assert!(
                HEADER_ALIASES.iter().any(|(c, _)| *c == column),
                "{column} has no aliases"
            );
        }
    }
}
