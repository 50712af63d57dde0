//! External command execution and `vcgencmd` output parsing.

use super::parse_quantity;
use crate::error::SourceError;
use async_trait::async_trait;
use std::time::Duration;

/// Runs an external program and returns its stdout
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[&str]) -> Result<String, SourceError>;
}

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs commands on the host via `tokio::process`.
/// A command still running after `timeout` is killed.
#[derive(Debug, Clone, Copy)]
pub struct SystemRunner {
    timeout: Duration,
}

impl SystemRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<String, SourceError> {
        let command = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");

        let child = tokio::process::Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| SourceError::Timeout {
                query: command.clone(),
                timeout_ms: self.timeout.as_millis() as u64,
            })?
            .map_err(|source| SourceError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(SourceError::CommandFailed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Thin wrapper over the Raspberry Pi `vcgencmd` utility
pub struct Vcgencmd<R: CommandRunner> {
    runner: R,
    program: String,
}

impl<R: CommandRunner> Vcgencmd<R> {
    pub fn new(runner: R, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    /// Raw `pmic_read_adc` dump (one line per rail and quantity)
    pub async fn pmic_read_adc(&self) -> Result<String, SourceError> {
        self.runner.run(&self.program, &["pmic_read_adc"]).await
    }

    /// SoC temperature in °C
    pub async fn measure_temp(&self) -> Result<f64, SourceError> {
        let output = self.runner.run(&self.program, &["measure_temp"]).await?;
        parse_measure_temp(&output)
    }

    /// Core voltage in volts
    pub async fn measure_volts(&self) -> Result<f64, SourceError> {
        let output = self.runner.run(&self.program, &["measure_volts"]).await?;
        parse_measure_volts(&output)
    }
}

/// Extract voltage and current for `rail` from `pmic_read_adc` output.
///
/// Lines look like `     VDD_CORE_V volt(15)=0.85126000V`. The label must
/// be the first token on the line so that e.g. `EXT5V_V` never matches a
/// search for `5V`.
pub fn parse_pmic_rail(output: &str, rail: &str) -> Result<(f64, f64), SourceError> {
    let volt_label = format!("{rail}_V");
    let amp_label = format!("{rail}_A");

    let voltage = find_labelled(output, &volt_label)
        .ok_or_else(|| SourceError::MissingField {
            field: volt_label.clone(),
        })
        .and_then(|raw| parse_quantity(&volt_label, raw, "V"))?;

    let current = find_labelled(output, &amp_label)
        .ok_or_else(|| SourceError::MissingField {
            field: amp_label.clone(),
        })
        .and_then(|raw| parse_quantity(&amp_label, raw, "A"))?;

    Ok((voltage, current))
}

fn find_labelled<'a>(output: &'a str, label: &str) -> Option<&'a str> {
    output.lines().find_map(|line| {
        let trimmed = line.trim();
        if trimmed.split_whitespace().next() != Some(label) {
            return None;
        }
        trimmed.split_once('=').map(|(_, value)| value)
    })
}

/// Parse `temp=48.3'C`
pub fn parse_measure_temp(output: &str) -> Result<f64, SourceError> {
    let value = strip_key(output, "temp")?;
    parse_quantity("temp", value, "'C")
}

/// Parse `volt=0.8563V`
pub fn parse_measure_volts(output: &str) -> Result<f64, SourceError> {
    let value = strip_key(output, "volt")?;
    parse_quantity("volt", value, "V")
}

fn strip_key<'a>(output: &'a str, key: &str) -> Result<&'a str, SourceError> {
    output
        .trim()
        .split_once('=')
        .filter(|(k, _)| k.trim() == key)
        .map(|(_, v)| v)
        .ok_or_else(|| SourceError::MissingField {
            field: key.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PMIC_OUTPUT: &str = "\
     3V7_WL_SW_A current(0)=0.00000000A
   3V3_SYS_A current(1)=0.06049000A
    VDD_CORE_A current(7)=2.42306000A
     EXT5V_V volt(24)=5.13800000V
    VDD_CORE_V volt(15)=0.85126000V
";

    #[test]
    fn parses_core_rail() {
        let (v, a) = parse_pmic_rail(PMIC_OUTPUT, "VDD_CORE").unwrap();
        assert!((v - 0.85126).abs() < 1e-9);
        assert!((a - 2.42306).abs() < 1e-9);
    }

    #[test]
    fn missing_current_is_reported() {
        let err = parse_pmic_rail(PMIC_OUTPUT, "EXT5V").unwrap_err();
        match err {
            SourceError::MissingField { field } => assert_eq!(field, "EXT5V_A"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_value_is_reported() {
        let output = "VDD_CORE_V volt(15)=???V\nVDD_CORE_A current(7)=1.0A\n";
        let err = parse_pmic_rail(output, "VDD_CORE").unwrap_err();
        assert!(matches!(err, SourceError::Malformed { .. }));
    }

    #[test]
    fn parses_temperature_and_volts() {
        assert_eq!(parse_measure_temp("temp=48.3'C\n").unwrap(), 48.3);
        assert_eq!(parse_measure_volts("volt=0.8563V\n").unwrap(), 0.8563);
    }

    #[test]
    fn rejects_wrong_key() {
        assert!(parse_measure_temp("volt=0.8563V").is_err());
        assert!(parse_measure_volts("").is_err());
    }

    struct Canned(&'static str);

    #[async_trait]
    impl CommandRunner for Canned {
        async fn run(&self, _program: &str, _args: &[&str]) -> Result<String, SourceError> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn vcgencmd_uses_runner_output() {
        let vc = Vcgencmd::new(Canned("temp=51.0'C\n"), "vcgencmd");
        assert_eq!(vc.measure_temp().await.unwrap(), 51.0);
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let err = SystemRunner::default()
            .run("/nonexistent/vcgencmd-for-tests", &["measure_temp"])
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_command_times_out() {
        let started = std::time::Instant::now();
        let err = SystemRunner::new(Duration::from_millis(50))
            .run("sleep", &["5"])
            .await
            .unwrap_err();
        match err {
            SourceError::Timeout { query, timeout_ms } => {
                assert_eq!(query, "sleep 5");
                assert_eq!(timeout_ms, 50);
            }
            other => panic!("expected a timeout, got {:?}", other),
        }
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn quick_command_finishes_within_timeout() {
        let out = SystemRunner::new(Duration::from_secs(5))
            .run("echo", &["temp=48.3'C"])
            .await
            .unwrap();
        assert_eq!(parse_measure_temp(&out).unwrap(), 48.3);
    }
}
