//! In-memory CSV table with per-column type inference.

mod infer;

pub use infer::{classify, parse_datetime, parse_number, DATETIME_THRESHOLD};

use crate::error::LoadError;
use chrono::NaiveDateTime;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Latin1,
}

impl FromStr for Encoding {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" => Ok(Encoding::Latin1),
            other => Err(LoadError::UnsupportedEncoding(other.to_string())),
        }
    }
}

impl Encoding {
    fn decode(self, bytes: Vec<u8>) -> Result<String, LoadError> {
        match self {
            Encoding::Utf8 => {
                let text = String::from_utf8(bytes).map_err(|e| LoadError::Decode {
                    encoding: "utf-8",
                    detail: e.utf8_error().to_string(),
                })?;
                Ok(match text.strip_prefix('\u{feff}') {
                    Some(rest) => rest.to_string(),
                    None => text,
                })
            }
            // Every byte maps to the code point of the same value
            Encoding::Latin1 => Ok(bytes.into_iter().map(char::from).collect()),
        }
    }
}

/// How to read the input file
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub separator: u8,
    pub decimal: char,
    pub encoding: Encoding,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            separator: b',',
            decimal: '.',
            encoding: Encoding::Utf8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    DateTime,
    Text,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Numeric => "numeric",
            ColumnKind::DateTime => "datetime",
            ColumnKind::Text => "text",
        };
        f.write_str(name)
    }
}

/// Typed cells of one column; `None` is a missing value
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    DateTime(Vec<Option<NaiveDateTime>>),
    Text(Vec<Option<String>>),
}

impl ColumnData {
    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnData::Numeric(_) => ColumnKind::Numeric,
            ColumnData::DateTime(_) => ColumnKind::DateTime,
            ColumnData::Text(_) => ColumnKind::Text,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::DateTime(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn kind(&self) -> ColumnKind {
        self.data.kind()
    }

    pub fn as_numeric(&self) -> Option<&[Option<f64>]> {
        match &self.data {
            ColumnData::Numeric(v) => Some(v),
            _ => None,
        }
    }

    /// Value of row `i` on a continuous axis: the number itself, or seconds
    /// since the Unix epoch for datetimes. Text has no axis position.
    pub fn axis_value(&self, i: usize) -> Option<f64> {
        match &self.data {
            ColumnData::Numeric(v) => v.get(i).copied().flatten(),
            ColumnData::DateTime(v) => v.get(i).copied().flatten().map(datetime_to_secs),
            ColumnData::Text(_) => None,
        }
    }

    /// Present non-missing numeric values, in row order
    pub fn present_numbers(&self) -> Vec<f64> {
        self.as_numeric()
            .map(|v| v.iter().flatten().copied().collect())
            .unwrap_or_default()
    }
}

pub fn datetime_to_secs(dt: NaiveDateTime) -> f64 {
    dt.and_utc().timestamp_millis() as f64 / 1000.0
}

/// A loaded CSV: named, typed columns of equal length
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    rows: usize,
}

impl Table {
    /// Read and classify a CSV file
    pub fn load<P: AsRef<Path>>(path: P, opts: &LoadOptions) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let text = opts.encoding.decode(bytes)?;
        Self::from_text(&text, opts)
    }

    /// Parse already-decoded CSV text. The first record is the header.
    pub fn from_text(text: &str, opts: &LoadOptions) -> Result<Self, LoadError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(opts.separator)
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut records = reader.records();
        let header = match records.next() {
            Some(record) => record?,
            None => return Err(LoadError::NoHeader),
        };
        let names: Vec<String> = header.iter().map(|h| h.trim().to_string()).collect();
        let width = names.len();

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); width];
        let mut rows = 0;
        for (idx, record) in records.enumerate() {
            let record = record?;
            if record.len() > width {
                return Err(LoadError::RaggedRow {
                    row: idx + 2,
                    found: record.len(),
                    expected: width,
                });
            }
            for (col, values) in cells.iter_mut().enumerate() {
                values.push(record.get(col).unwrap_or("").to_string());
            }
            rows += 1;
        }

        let columns = names
            .into_iter()
            .zip(cells)
            .map(|(name, raw)| Column {
                name,
                data: classify(raw, opts.decimal),
            })
            .collect();

        Ok(Self { columns, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn numeric_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns_of(ColumnKind::Numeric)
    }

    pub fn datetime_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns_of(ColumnKind::DateTime)
    }

    fn columns_of(&self, kind: ColumnKind) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(move |c| c.kind() == kind)
    }
}
