//! Fixed-cadence sampling loop with running energy integration.

use crate::logging::{Sample, SampleWriter};
use crate::source::{PowerSource, Reading};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::{info, warn};
use serde::Serialize;
use std::future::Future;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;

/// Running energy total: each successful tick adds `power × interval`.
///
/// Starts at zero for every run and only ever grows for non-negative power.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnergyAccumulator {
    total_joules: f64,
}

impl EnergyAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one tick's worth of energy and return the new total
    pub fn add(&mut self, power_w: f64, interval: Duration) -> f64 {
        self.total_joules += power_w * interval.as_secs_f64();
        self.total_joules
    }

    pub fn total_joules(&self) -> f64 {
        self.total_joules
    }

    pub fn watt_hours(&self) -> f64 {
        self.total_joules / 3600.0
    }
}

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub interval: Duration,
    /// `None` runs until interrupted
    pub duration: Option<Duration>,
    /// Print one line per sample to stdout
    pub echo: bool,
}

/// End-of-run statistics
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Local>,
    pub elapsed_secs: f64,
    pub interval_secs: f64,
    pub samples_written: u64,
    pub ticks_skipped: u64,
    pub total_energy_joules: f64,
    pub total_energy_wh: f64,
    pub avg_power_w: Option<f64>,
    pub peak_power_w: Option<f64>,
    pub interrupted: bool,
}

impl RunSummary {
    pub fn print(&self) {
        println!("\n{}", "=".repeat(60));
        println!("                     ENERGY SUMMARY");
        println!("{}", "=".repeat(60));
        println!(
            "Duration: {:.1}s  Interval: {:.3}s  Samples: {}  Skipped: {}",
            self.elapsed_secs, self.interval_secs, self.samples_written, self.ticks_skipped
        );
        if let (Some(avg), Some(peak)) = (self.avg_power_w, self.peak_power_w) {
            println!("Power: avg {:.3} W, peak {:.3} W", avg, peak);
        }
        if self.interrupted {
            println!("Stopped by user before the configured duration.");
        }
        println!(
            "Done! Total energy used: {:.2} J = {:.6} Wh",
            self.total_energy_joules, self.total_energy_wh
        );
        println!("{}", "=".repeat(60));
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)
            .with_context(|| format!("Failed to write summary: {}", path.as_ref().display()))?;
        Ok(())
    }
}

pub struct Sampler<W: Write> {
    source: Box<dyn PowerSource>,
    writer: SampleWriter<W>,
    config: SamplerConfig,
    energy: EnergyAccumulator,
    ticks_skipped: u64,
    power_sum: f64,
    peak_power: Option<f64>,
}

impl<W: Write> Sampler<W> {
    pub fn new(source: Box<dyn PowerSource>, writer: SampleWriter<W>, config: SamplerConfig) -> Self {
        Self {
            source,
            writer,
            config,
            energy: EnergyAccumulator::new(),
            ticks_skipped: 0,
            power_sum: 0.0,
            peak_power: None,
        }
    }

    /// Sample until the configured duration elapses or `shutdown` resolves.
    ///
    /// Each tick queries the source once and then sleeps until one interval
    /// after the tick started. A failed query is logged and contributes
    /// nothing to the energy total. The log is flushed before returning.
    pub async fn run<F: Future<Output = ()>>(mut self, shutdown: F) -> Result<RunSummary> {
        tokio::pin!(shutdown);

        let started_at = Local::now();
        let start = Instant::now();
        let mut interrupted = false;

        info!(
            "Sampling {} every {:.3}s{}",
            self.source.name(),
            self.config.interval.as_secs_f64(),
            self.config
                .duration
                .map(|d| format!(" for {:.1}s", d.as_secs_f64()))
                .unwrap_or_else(|| " until interrupted".to_string())
        );

        loop {
            if let Some(limit) = self.config.duration {
                if start.elapsed() >= limit {
                    break;
                }
            }

            let tick_start = Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = &mut shutdown => None,
                result = self.source.read() => Some(result),
            };
            let Some(result) = outcome else {
                interrupted = true;
                break;
            };

            match result {
                Ok(reading) => self.record(reading)?,
                Err(e) => {
                    self.ticks_skipped += 1;
                    warn!("{}: reading unavailable, tick skipped: {}", self.source.name(), e);
                }
            }

            let stop = tokio::select! {
                biased;
                _ = &mut shutdown => true,
                _ = tokio::time::sleep_until(tick_start + self.config.interval) => false,
            };
            if stop {
                interrupted = true;
                break;
            }
        }

        if interrupted {
            info!("Measurement stopped by user.");
        }
        self.writer.flush()?;

        let samples = self.writer.rows_written();
        Ok(RunSummary {
            started_at,
            elapsed_secs: start.elapsed().as_secs_f64(),
            interval_secs: self.config.interval.as_secs_f64(),
            samples_written: samples,
            ticks_skipped: self.ticks_skipped,
            total_energy_joules: self.energy.total_joules(),
            total_energy_wh: self.energy.watt_hours(),
            avg_power_w: (samples > 0).then(|| self.power_sum / samples as f64),
            peak_power_w: self.peak_power,
            interrupted,
        })
    }

    fn record(&mut self, reading: Reading) -> Result<()> {
        let power_w = reading.power();
        let energy_joules = self.energy.add(power_w, self.config.interval);

        let sample = Sample {
            timestamp: Local::now().naive_local(),
            reading,
            power_w,
            energy_joules,
        };
        self.writer.log(&sample)?;

        self.power_sum += power_w;
        self.peak_power = Some(self.peak_power.map_or(power_w, |p| p.max(power_w)));

        if self.config.echo {
            print_sample(&sample);
        }
        Ok(())
    }
}

fn print_sample(sample: &Sample) {
    let ts = sample.timestamp.format("%H:%M:%S%.3f");
    match sample.reading.board {
        Some(board) => println!(
            "[{}] Temp: {} | Pi Volt: {} | Sig Volt: {:.2}V | Curr: {:.3}A | Power: {:.2}W",
            ts,
            board.temp_c.map(|t| format!("{:.2}°C", t)).unwrap_or_else(|| "N/A".into()),
            board.core_volts.map(|v| format!("{:.3}V", v)).unwrap_or_else(|| "N/A".into()),
            sample.reading.voltage,
            sample.reading.current,
            sample.power_w
        ),
        None => println!(
            "[{}] V: {:.4}V | I: {:.4}A | P: {:.4}W | E: {:.3}J",
            ts, sample.reading.voltage, sample.reading.current, sample.power_w, sample.energy_joules
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_power_times_interval() {
        let mut acc = EnergyAccumulator::new();
        let dt = Duration::from_millis(100);
        acc.add(2.0, dt);
        acc.add(3.0, dt);
        let total = acc.add(5.0, dt);
        assert!((total - 1.0).abs() < 1e-12);
        assert!((acc.watt_hours() - 1.0 / 3600.0).abs() < 1e-15);
    }

    #[test]
    fn starts_at_zero() {
        assert_eq!(EnergyAccumulator::new().total_joules(), 0.0);
    }
}
