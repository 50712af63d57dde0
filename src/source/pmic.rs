//! Power rail readings from the board PMIC.

use super::command::{parse_pmic_rail, CommandRunner, Vcgencmd};
use super::{PowerSource, Reading};
use crate::error::SourceError;
use async_trait::async_trait;

/// Reads one rail's voltage and current from `vcgencmd pmic_read_adc`
pub struct PmicSource<R: CommandRunner> {
    vcgencmd: Vcgencmd<R>,
    rail: String,
}

impl<R: CommandRunner> PmicSource<R> {
    pub fn new(vcgencmd: Vcgencmd<R>, rail: impl Into<String>) -> Self {
        Self {
            vcgencmd,
            rail: rail.into(),
        }
    }
}

#[async_trait]
impl<R: CommandRunner> PowerSource for PmicSource<R> {
    fn name(&self) -> &str {
        &self.rail
    }

    async fn read(&mut self) -> Result<Reading, SourceError> {
        let output = self.vcgencmd.pmic_read_adc().await?;
        let (voltage, current) = parse_pmic_rail(&output, &self.rail)?;
        Ok(Reading::new(voltage, current))
    }
}
