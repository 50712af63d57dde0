//! Bench supply readings combined with host board telemetry.

use super::command::{CommandRunner, Vcgencmd};
use super::scpi::{measure_query, parse_scpi_number, ScpiTransport};
use super::{BoardTelemetry, PowerSource, Reading};
use crate::error::SourceError;
use async_trait::async_trait;
use log::warn;

/// Reads output voltage and current from an SCPI supply that powers the
/// board, plus the board's own temperature and core voltage.
pub struct BenchSource<T: ScpiTransport, R: CommandRunner> {
    supply: T,
    board: Option<Vcgencmd<R>>,
    volt_query: String,
    curr_query: String,
}

impl<T: ScpiTransport, R: CommandRunner> BenchSource<T, R> {
    /// `board` is `None` when the host has no `vcgencmd`
    pub fn new(supply: T, board: Option<Vcgencmd<R>>, channel: Option<&str>) -> Self {
        Self {
            supply,
            board,
            volt_query: measure_query("VOLT", channel),
            curr_query: measure_query("CURR", channel),
        }
    }

    /// Ask the supply to identify itself (`*IDN?`)
    pub async fn identify(&mut self) -> Result<String, SourceError> {
        self.supply.query("*IDN?").await
    }
}

async fn read_board<R: CommandRunner>(board: Option<&Vcgencmd<R>>) -> Option<BoardTelemetry> {
    let vc = board?;

    let temp_c = match vc.measure_temp().await {
        Ok(t) => Some(t),
        Err(e) => {
            warn!("board temperature unavailable: {}", e);
            None
        }
    };
    let core_volts = match vc.measure_volts().await {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("board core voltage unavailable: {}", e);
            None
        }
    };

    Some(BoardTelemetry { temp_c, core_volts })
}

#[async_trait]
impl<T: ScpiTransport, R: CommandRunner> PowerSource for BenchSource<T, R> {
    fn name(&self) -> &str {
        "bench supply"
    }

    async fn read(&mut self) -> Result<Reading, SourceError> {
        let board = read_board(self.board.as_ref()).await;

        let raw_volt = self.supply.query(&self.volt_query).await?;
        let voltage = parse_scpi_number("Sig_Voltage_V", &raw_volt)?;
        let raw_curr = self.supply.query(&self.curr_query).await?;
        let current = parse_scpi_number("Sig_Current_A", &raw_curr)?;

        Ok(Reading {
            voltage,
            current,
            board,
        })
    }
}
