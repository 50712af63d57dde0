//! Measurement sources for the sampler.
//!
//! A source produces one [`Reading`] per tick. Failures are reported as
//! [`SourceError`] and never abort the sampling loop.

pub mod bench;
pub mod command;
pub mod pmic;
pub mod scpi;

pub use bench::BenchSource;
pub use command::{CommandRunner, SystemRunner, Vcgencmd};
pub use pmic::PmicSource;
pub use scpi::{ScpiTransport, TcpScpi};

use crate::error::SourceError;
use async_trait::async_trait;

/// Host board telemetry reported alongside bench supply readings.
/// Each field is independent: a failed query leaves only that field empty.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoardTelemetry {
    pub temp_c: Option<f64>,
    pub core_volts: Option<f64>,
}

/// One successful measurement
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// Volts
    pub voltage: f64,
    /// Amperes
    pub current: f64,
    pub board: Option<BoardTelemetry>,
}

impl Reading {
    pub fn new(voltage: f64, current: f64) -> Self {
        Self {
            voltage,
            current,
            board: None,
        }
    }

    /// Instantaneous power in watts
    pub fn power(&self) -> f64 {
        self.voltage * self.current
    }
}

#[async_trait]
pub trait PowerSource: Send {
    /// Short label used in log messages
    fn name(&self) -> &str;

    async fn read(&mut self) -> Result<Reading, SourceError>;
}

/// Parse a `label=<number><unit>` style value, tolerating surrounding
/// whitespace and an optional unit suffix.
pub(crate) fn parse_quantity(field: &str, raw: &str, unit: &str) -> Result<f64, SourceError> {
    let trimmed = raw.trim();
    let number = trimmed.strip_suffix(unit).unwrap_or(trimmed).trim();
    number.parse::<f64>().map_err(|_| SourceError::Malformed {
        field: field.to_string(),
        raw: raw.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_is_voltage_times_current() {
        let reading = Reading::new(5.1, 0.5);
        assert!((reading.power() - 2.55).abs() < 1e-12);
    }

    #[test]
    fn parse_quantity_strips_unit() {
        assert_eq!(parse_quantity("v", " 0.8512V ", "V").unwrap(), 0.8512);
        assert_eq!(parse_quantity("a", "1.5", "A").unwrap(), 1.5);
    }

    #[test]
    fn parse_quantity_rejects_garbage() {
        let err = parse_quantity("VDD_CORE_V", "n/aV", "V").unwrap_err();
        assert!(matches!(err, SourceError::Malformed { .. }));
    }
}
