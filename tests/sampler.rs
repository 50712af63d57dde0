use async_trait::async_trait;
use powerlog::error::SourceError;
use powerlog::logging::{CsvSchema, SampleWriter};
use powerlog::sampler::{Sampler, SamplerConfig};
use powerlog::source::{PowerSource, Reading};
use powerlog::table::{LoadOptions, Table};
use std::time::Duration;

/// Tick `i` reads 5 V at `0.1 * (i + 1)` A, failing on the listed ticks
struct ScriptedSource {
    tick: usize,
    fail_on: Vec<usize>,
}

#[async_trait]
impl PowerSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn read(&mut self) -> Result<Reading, SourceError> {
        let i = self.tick;
        self.tick += 1;
        if self.fail_on.contains(&i) {
            return Err(SourceError::MissingField {
                field: "VDD_CORE_A".into(),
            });
        }
        Ok(Reading::new(5.0, 0.1 * (i + 1) as f64))
    }
}

fn config(duration: Option<Duration>) -> SamplerConfig {
    SamplerConfig {
        interval: Duration::from_millis(100),
        duration,
        echo: false,
    }
}

#[tokio::test(start_paused = true)]
async fn energy_sums_successful_ticks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("energy.csv");
    let writer = SampleWriter::create(&path, CsvSchema::Pmic { millis: true }).unwrap();
    let source = ScriptedSource {
        tick: 0,
        fail_on: vec![3, 7],
    };

    let summary = Sampler::new(Box::new(source), writer, config(Some(Duration::from_secs(1))))
        .run(std::future::pending())
        .await
        .unwrap();

    // ticks 0..10 with 3 and 7 skipped: 0.5 W * (1+..+10 - 4 - 8) * 0.1 s
    assert_eq!(summary.samples_written, 8);
    assert_eq!(summary.ticks_skipped, 2);
    assert!(!summary.interrupted);
    assert!((summary.total_energy_joules - 2.15).abs() < 1e-9);
    assert!((summary.total_energy_wh - 2.15 / 3600.0).abs() < 1e-12);
    assert_eq!(summary.peak_power_w, Some(5.0));

    let table = Table::load(&path, &LoadOptions::default()).unwrap();
    assert_eq!(table.row_count(), 8);
    let energy = table
        .column("Energy So Far (Joules)")
        .unwrap()
        .present_numbers();
    assert!(energy.windows(2).all(|w| w[1] >= w[0]));
    assert!((energy[energy.len() - 1] - 2.15).abs() < 1e-4);
}

#[tokio::test(start_paused = true)]
async fn interrupt_keeps_partial_log() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("power_log.csv");
    let writer = SampleWriter::create(&path, CsvSchema::Bench).unwrap();
    let source = ScriptedSource {
        tick: 0,
        fail_on: Vec::new(),
    };

    let shutdown = tokio::time::sleep(Duration::from_millis(350));
    let summary = Sampler::new(Box::new(source), writer, config(None))
        .run(shutdown)
        .await
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.samples_written, 4);

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(
        lines[0],
        "Timestamp,Pi_Temp_C,Pi_Voltage_V,Sig_Voltage_V,Sig_Current_A,Power_W"
    );
    // no board telemetry from this source
    assert!(lines[1].contains(",,,5.0000,0.1000,0.500000"));
}

#[tokio::test(start_paused = true)]
async fn failing_source_never_stops_the_loop() {
    let writer = SampleWriter::new(Vec::new(), CsvSchema::Pmic { millis: false }).unwrap();
    let source = ScriptedSource {
        tick: 0,
        fail_on: (0..100).collect(),
    };

    let summary = Sampler::new(Box::new(source), writer, config(Some(Duration::from_millis(500))))
        .run(std::future::pending())
        .await
        .unwrap();

    assert_eq!(summary.samples_written, 0);
    assert_eq!(summary.ticks_skipped, 5);
    assert_eq!(summary.total_energy_joules, 0.0);
    assert_eq!(summary.avg_power_w, None);
}
