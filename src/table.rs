//! Raw tabular file reading.
//!
//! Files are loaded into an in-memory [`RawTable`] with the original headers
//! and every cell as trimmed text. Interpretation of the cells is left to the
//! provider.

use crate::error::{IngestError, Result};
use calamine::{open_workbook_auto, Data, Reader};
use std::fs::File;
use std::path::{Path, PathBuf};

/// On-disk format of a raw file, inferred from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Delimited text with the given field separator
    Delimited(u8),
    /// Excel / OpenDocument workbook; the first worksheet is read
    Spreadsheet,
}

impl FileFormat {
    const SPREADSHEET_EXTENSIONS: [&'static str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];
    const DELIMITED_EXTENSIONS: [&'static str; 3] = ["csv", "tsv", "txt"];

    /// Infers the format from the file extension. Unknown extensions are read
    /// as comma-delimited text.
    pub fn from_path(path: &Path) -> Self {
        match extension(path).as_deref() {
            Some(ext) if Self::SPREADSHEET_EXTENSIONS.contains(&ext) => FileFormat::Spreadsheet,
            Some("tsv") => FileFormat::Delimited(b'\t'),
            _ => FileFormat::Delimited(b','),
        }
    }

    /// Whether `path` has one of the extensions raw EOD files are published in.
    pub fn is_supported(path: &Path) -> bool {
        match extension(path) {
            Some(ext) => {
                Self::SPREADSHEET_EXTENSIONS.contains(&ext.as_str())
                    || Self::DELIMITED_EXTENSIONS.contains(&ext.as_str())
            }
            None => false,
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// A table read verbatim from a raw file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    pub path: PathBuf,
    pub headers: Vec<String>,
    /// Data rows, each padded or truncated to the header width
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Reads `path`, choosing the parser from its extension.
    pub fn read(path: &Path) -> Result<Self> {
        match FileFormat::from_path(path) {
            FileFormat::Delimited(delimiter) => Self::read_delimited(path, delimiter),
            FileFormat::Spreadsheet => Self::read_spreadsheet(path),
        }
    }

    /// Reads a delimited text file with a header row.
    pub fn read_delimited(path: &Path, delimiter: u8) -> Result<Self> {
        let file = File::open(path).map_err(|source| IngestError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| read_error(path, e))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| read_error(path, e))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self::assemble(path, headers, rows))
    }

    /// Reads the first worksheet of a workbook; its first row is the header.
    pub fn read_spreadsheet(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(IngestError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
            });
        }

        let mut workbook = open_workbook_auto(path).map_err(|e| read_error(path, e))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| IngestError::Read {
                path: path.to_path_buf(),
                message: "workbook has no worksheets".to_string(),
            })?
            .map_err(|e| read_error(path, e))?;

        let mut cells = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect::<Vec<String>>());
        let headers = cells.next().unwrap_or_default();
        let rows = cells.collect();

        Ok(Self::assemble(path, headers, rows))
    }

    fn assemble(path: &Path, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .filter(|row| row.iter().any(|cell| !cell.is_empty()))
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();

        RawTable {
            path: path.to_path_buf(),
            headers,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn read_error(path: &Path, err: impl std::fmt::Display) -> IngestError {
    IngestError::Read {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) => s.trim().to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) => datetime.date().format("%Y-%m-%d").to_string(),
            None => dt.as_f64().to_string(),
        },
        other => other.to_string().trim().to_string(),
    }
}
