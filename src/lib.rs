//! Power logging for single-board computers and quick charts from CSV files.
//!
//! The `powerlog` binary samples voltage and current from the board's PMIC
//! (through `vcgencmd`) or from an SCPI bench supply and appends rows to a
//! CSV file with a running energy total. The `csv-graphs` binary loads any
//! CSV, infers column types and renders line, histogram, top-N bar, scatter
//! and correlation charts.

pub mod error;
pub mod logging;
pub mod plot;
pub mod sampler;
pub mod source;
pub mod table;
