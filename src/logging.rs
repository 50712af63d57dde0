//! Logger setup and the CSV sample log written by the sampler.

use crate::source::Reading;
use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Install the `env_logger` backend for the `log` facade.
/// Defaults to `info`; override with `RUST_LOG`.
pub fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

/// Column layout of the sample log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvSchema {
    /// `Timestamp, Voltage (V), Current (A), Power (W), Energy So Far (Joules)`
    Pmic { millis: bool },
    /// `Timestamp, Pi_Temp_C, Pi_Voltage_V, Sig_Voltage_V, Sig_Current_A, Power_W`
    Bench,
}

impl CsvSchema {
    pub fn header(&self) -> &'static [&'static str] {
        match self {
            CsvSchema::Pmic { .. } => &[
                "Timestamp",
                "Voltage (V)",
                "Current (A)",
                "Power (W)",
                "Energy So Far (Joules)",
            ],
            CsvSchema::Bench => &[
                "Timestamp",
                "Pi_Temp_C",
                "Pi_Voltage_V",
                "Sig_Voltage_V",
                "Sig_Current_A",
                "Power_W",
            ],
        }
    }

    fn format_timestamp(&self, ts: &NaiveDateTime) -> String {
        match self {
            CsvSchema::Pmic { millis: false } => ts.format("%Y-%m-%dT%H:%M:%S").to_string(),
            CsvSchema::Pmic { millis: true } => ts.format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
            CsvSchema::Bench => ts.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        }
    }

    /// Render one sample as CSV fields
    pub fn row(&self, sample: &Sample) -> Vec<String> {
        let ts = self.format_timestamp(&sample.timestamp);
        match self {
            CsvSchema::Pmic { .. } => vec![
                ts,
                format!("{:.6}", sample.reading.voltage),
                format!("{:.6}", sample.reading.current),
                format!("{:.6}", sample.power_w),
                format!("{:.4}", sample.energy_joules),
            ],
            CsvSchema::Bench => {
                let board = sample.reading.board.unwrap_or_default();
                vec![
                    ts,
                    board.temp_c.map(|t| format!("{:.2}", t)).unwrap_or_default(),
                    board.core_volts.map(|v| format!("{:.4}", v)).unwrap_or_default(),
                    format!("{:.4}", sample.reading.voltage),
                    format!("{:.4}", sample.reading.current),
                    format!("{:.6}", sample.power_w),
                ]
            }
        }
    }
}

/// One logged tick
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: NaiveDateTime,
    pub reading: Reading,
    pub power_w: f64,
    /// Running total since the sampler started
    pub energy_joules: f64,
}

/// Appends samples to a CSV file, one flushed row per tick
pub struct SampleWriter<W: Write> {
    writer: csv::Writer<W>,
    schema: CsvSchema,
    rows_written: u64,
}

impl SampleWriter<File> {
    /// Create (or truncate) the log file and write the header
    pub fn create<P: AsRef<Path>>(path: P, schema: CsvSchema) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path.as_ref())
            .with_context(|| format!("Failed to create log file: {}", path.as_ref().display()))?;
        Self::new(file, schema)
    }
}

impl<W: Write> SampleWriter<W> {
    pub fn new(inner: W, schema: CsvSchema) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(inner);
        writer
            .write_record(schema.header())
            .context("Failed to write CSV header")?;
        writer.flush()?;

        Ok(Self {
            writer,
            schema,
            rows_written: 0,
        })
    }

    /// Append a sample and flush it to the underlying file
    pub fn log(&mut self, sample: &Sample) -> Result<()> {
        self.writer
            .write_record(self.schema.row(sample))
            .context("Failed to write CSV row")?;
        self.writer.flush()?;
        self.rows_written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }
}

impl<W: Write> Drop for SampleWriter<W> {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// `energy_log_<YYYYmmdd_HHMMSS_mmm>.csv` for PMIC runs, `power_log.csv` for bench runs
pub fn default_log_path(schema: CsvSchema, started: DateTime<Local>) -> PathBuf {
    match schema {
        CsvSchema::Pmic { .. } => {
            PathBuf::from(format!("energy_log_{}.csv", started.format("%Y%m%d_%H%M%S_%3f")))
        }
        CsvSchema::Bench => PathBuf::from("power_log.csv"),
    }
}
