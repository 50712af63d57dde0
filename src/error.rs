//! Error types shared by the sampler and the plotter.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to obtain a reading from an external source.
///
/// Every variant is recoverable from the sampler's point of view: the tick
/// is logged and skipped.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },
    #[error("field {field} not found in output")]
    MissingField { field: String },
    #[error("malformed value for {field}: '{raw}'")]
    Malformed { field: String, raw: String },
    #[error("instrument I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no answer to '{query}' within {timeout_ms} ms")]
    Timeout { query: String, timeout_ms: u64 },
}

/// Failure to load a CSV file into a [`crate::table::Table`].
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported encoding '{0}' (expected utf-8 or latin-1)")]
    UnsupportedEncoding(String),
    #[error("file is not valid {encoding}: {detail}")]
    Decode { encoding: &'static str, detail: String },
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row} has {found} fields, header has {expected}")]
    RaggedRow {
        row: usize,
        found: usize,
        expected: usize,
    },
    #[error("CSV has no header row")]
    NoHeader,
}

/// A plot's preconditions were not met, or the figure could not be written.
#[derive(Error, Debug)]
pub enum PlotError {
    #[error("No datetime-like column found. Specify --time-col.")]
    NoDatetimeColumn,
    #[error("No numeric columns to plot.")]
    NoNumericColumns,
    #[error("No numeric columns found for histograms.")]
    NoNumericForHistogram,
    #[error("Need at least two numeric columns for a correlation heatmap.")]
    NotEnoughForCorrelation,
    #[error("column '{0}' not found")]
    UnknownColumn(String),
    #[error("column '{column}' is not {expected}")]
    WrongKind {
        column: String,
        expected: &'static str,
    },
    #[error("no rows left to plot for {0}")]
    NoData(String),
    #[error("failed to render {path}: {detail}")]
    Render { path: PathBuf, detail: String },
    #[error("display error: {0}")]
    Display(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
