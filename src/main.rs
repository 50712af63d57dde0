//! Power sampler - logs voltage, current, power and energy to CSV.
//!
//! Reads the board PMIC through `vcgencmd pmic_read_adc`, or an SCPI bench
//! supply over TCP together with board temperature and core voltage.

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, ValueEnum};
use log::{info, warn};
use powerlog::logging::{default_log_path, init_logger, CsvSchema, SampleWriter};
use powerlog::sampler::{Sampler, SamplerConfig};
use powerlog::source::{BenchSource, PmicSource, PowerSource, SystemRunner, TcpScpi, Vcgencmd};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SourceKind {
    /// Board power-management chip via `vcgencmd pmic_read_adc`
    Pmic,
    /// SCPI bench supply plus board telemetry
    Bench,
}

/// Sample power draw into a CSV file
#[derive(Parser, Debug)]
#[command(name = "powerlog")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Measurement source
    #[arg(short, long, value_enum, default_value_t = SourceKind::Pmic)]
    source: SourceKind,

    /// Sampling interval in seconds [default: 0.1 for pmic, 0.5 for bench]
    #[arg(short, long)]
    interval: Option<f64>,

    /// Stop after this many seconds, 0 runs until Ctrl+C
    /// [default: 360 for pmic, unlimited for bench]
    #[arg(short, long)]
    duration: Option<f64>,

    /// Output CSV file [default: energy_log_<timestamp>.csv or power_log.csv]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// PMIC rail to read
    #[arg(long, default_value = "VDD_CORE")]
    rail: String,

    /// Millisecond timestamps in the PMIC log
    #[arg(long)]
    millis: bool,

    /// Path to the vcgencmd utility
    #[arg(long, default_value = "vcgencmd")]
    vcgencmd: String,

    /// Bench supply address (host or host:port, default port 5025)
    #[arg(long)]
    scpi_addr: Option<String>,

    /// Supply output channel, e.g. CH1
    #[arg(long)]
    scpi_channel: Option<String>,

    /// Per-query SCPI timeout in milliseconds
    #[arg(long, default_value = "2000")]
    scpi_timeout_ms: u64,

    /// Kill a vcgencmd call that runs longer than this, in milliseconds
    #[arg(long, default_value = "5000")]
    cmd_timeout_ms: u64,

    /// Bench mode: don't query board temperature and voltage
    #[arg(long)]
    no_board: bool,

    /// Also write the run summary as JSON
    #[arg(long)]
    summary_json: Option<PathBuf>,

    /// Don't print each sample to stdout
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn interval(&self) -> Result<Duration> {
        let secs = self.interval.unwrap_or(match self.source {
            SourceKind::Pmic => 0.1,
            SourceKind::Bench => 0.5,
        });
        if !secs.is_finite() || secs <= 0.0 {
            bail!("--interval must be a positive number of seconds, got {}", secs);
        }
        let interval = Duration::try_from_secs_f64(secs)
            .with_context(|| format!("--interval {} is out of range", secs))?;
        if interval.is_zero() {
            bail!("--interval {} rounds down to zero", secs);
        }
        Ok(interval)
    }

    fn duration(&self) -> Result<Option<Duration>> {
        let secs = match (self.duration, self.source) {
            (Some(d), _) => d,
            (None, SourceKind::Pmic) => 360.0,
            (None, SourceKind::Bench) => 0.0,
        };
        if !secs.is_finite() || secs < 0.0 {
            bail!("--duration must be zero or a positive number of seconds, got {}", secs);
        }
        if secs == 0.0 {
            return Ok(None);
        }
        let duration = Duration::try_from_secs_f64(secs)
            .with_context(|| format!("--duration {} is out of range", secs))?;
        Ok(Some(duration))
    }

    fn runner(&self) -> SystemRunner {
        SystemRunner::new(Duration::from_millis(self.cmd_timeout_ms))
    }

    fn schema(&self) -> CsvSchema {
        match self.source {
            SourceKind::Pmic => CsvSchema::Pmic {
                millis: self.millis,
            },
            SourceKind::Bench => CsvSchema::Bench,
        }
    }
}

async fn open_source(args: &Args) -> Result<Box<dyn PowerSource>> {
    match args.source {
        SourceKind::Pmic => Ok(Box::new(PmicSource::new(
            Vcgencmd::new(args.runner(), &args.vcgencmd),
            &args.rail,
        ))),
        SourceKind::Bench => {
            let addr = args
                .scpi_addr
                .as_deref()
                .context("--scpi-addr is required for the bench source")?;
            let timeout = Duration::from_millis(args.scpi_timeout_ms);
            let supply = TcpScpi::connect(addr, timeout)
                .await
                .with_context(|| format!("Failed to connect to bench supply at {}", addr))?;

            let board = (!args.no_board).then(|| Vcgencmd::new(args.runner(), &args.vcgencmd));
            let mut bench = BenchSource::new(supply, board, args.scpi_channel.as_deref());
            match bench.identify().await {
                Ok(idn) => info!("Connected to: {}", idn),
                Err(e) => warn!("Supply did not answer *IDN?: {}", e),
            }
            Ok(Box::new(bench))
        }
    }
}

/// Resolves on Ctrl+C; never resolves if the handler can't be installed
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Unable to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logger();

    let config = SamplerConfig {
        interval: args.interval()?,
        duration: args.duration()?,
        echo: !args.quiet,
    };
    let schema = args.schema();
    let path = args
        .output
        .clone()
        .unwrap_or_else(|| default_log_path(schema, Local::now()));

    let source = open_source(&args).await?;
    let writer = SampleWriter::create(&path, schema)?;
    info!("Logging to {} (Ctrl+C to stop)", path.display());

    let summary = Sampler::new(source, writer, config).run(ctrl_c()).await?;

    summary.print();
    println!("Data saved to {}", path.display());
    if let Some(ref json_path) = args.summary_json {
        summary.write_json(json_path)?;
        info!("Summary written to {}", json_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        Args::parse_from(std::iter::once("powerlog").chain(extra.iter().copied()))
    }

    #[test]
    fn defaults_depend_on_source() {
        let pmic = parse(&[]);
        assert_eq!(pmic.interval().unwrap(), Duration::from_millis(100));
        assert_eq!(pmic.duration().unwrap(), Some(Duration::from_secs(360)));

        let bench = parse(&["--source", "bench"]);
        assert_eq!(bench.interval().unwrap(), Duration::from_millis(500));
        assert_eq!(bench.duration().unwrap(), None);
    }

    #[test]
    fn zero_duration_runs_until_interrupted() {
        assert_eq!(parse(&["--duration", "0"]).duration().unwrap(), None);
        assert_eq!(
            parse(&["--duration", "1.5"]).duration().unwrap(),
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn huge_values_are_errors_not_panics() {
        let err = parse(&["--interval", "1e20"]).interval().unwrap_err();
        assert!(err.to_string().contains("--interval"));
        let err = parse(&["--duration", "1e20"]).duration().unwrap_err();
        assert!(err.to_string().contains("--duration"));
    }

    #[test]
    fn non_positive_values_are_rejected() {
        assert!(parse(&["--interval", "0"]).interval().is_err());
        assert!(parse(&["--interval=-1"]).interval().is_err());
        assert!(parse(&["--duration=-2"]).duration().is_err());
        assert!(parse(&["--interval", "NaN"]).interval().is_err());
        assert!(parse(&["--interval", "1e-12"]).interval().is_err());
    }

    #[test]
    fn command_timeout_flag() {
        assert_eq!(parse(&[]).cmd_timeout_ms, 5000);
        assert_eq!(parse(&["--cmd-timeout-ms", "250"]).cmd_timeout_ms, 250);
    }
}
