//! CLI tests for the `sound_meter` binary measuring WAV files

use std::fs;
use std::path::Path;
use std::process::Command;

use sound_meter::testing::{generate_pcm, write_pcm_wav, SyntheticSignal};

fn write_tone(path: &Path, seconds: usize) {
    let tone = SyntheticSignal::Sine {
        frequency_hz: 1_000.0,
        amplitude: 0.5,
    };
    write_pcm_wav(path, 48_000, &generate_pcm(tone, 48_000, 48_000 * seconds)).unwrap();
}

fn meter() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_sound_meter"));
    command.env("RUST_LOG", "warn");
    command
}

#[test]
fn csv_report_for_wav_input() {
    let dir = tempfile::tempdir().unwrap();
    let wav = dir.path().join("tone.wav");
    let report = dir.path().join("levels.csv");
    write_tone(&wav, 3);

    let output = meter()
        .arg("--input")
        .arg(&wav)
        .arg("--output")
        .arg(&report)
        .output()
        .expect("failed to run sound_meter");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    // file_period rotation names the first file levels000.csv
    let text = fs::read_to_string(dir.path().join("levels000.csv")).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "segment, ts, LAFmax, LAFmin, LApeak, LAE, LAeq");
    assert_eq!(lines.len(), 4);

    let fields: Vec<&str> = lines[2].split(',').map(str::trim).collect();
    assert_eq!(fields[0], "1");
    let lae: f64 = fields[5].parse().unwrap();
    assert!((lae - 84.9).abs() <= 0.15, "LAE column was {}", lae);
}

#[test]
fn json_report_defaults_next_to_input() {
    let dir = tempfile::tempdir().unwrap();
    let wav = dir.path().join("station.wav");
    write_tone(&wav, 1);
    let config = dir.path().join("meter.json");
    fs::write(
        &config,
        r#"{ "measurement": { "file_period": 0 }, "output": { "identification": "ROOF_1" } }"#,
    )
    .unwrap();

    let status = meter()
        .arg("--config")
        .arg(&config)
        .args(["--format", "json"])
        .arg("-i")
        .arg(&wav)
        .status()
        .unwrap();
    assert!(status.success());

    let text = fs::read_to_string(dir.path().join("station.wav.json")).unwrap();
    let record: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
    assert_eq!(record["identification"], "ROOF_1");
    assert_eq!(record["segment"], 0);
    assert!(record["LAeq"].as_f64().unwrap().is_finite());
}

#[test]
fn duration_flag_limits_measurement() {
    let dir = tempfile::tempdir().unwrap();
    let wav = dir.path().join("long.wav");
    let report = dir.path().join("short.csv");
    write_tone(&wav, 4);

    let status = meter()
        .arg("-i")
        .arg(&wav)
        .arg("-o")
        .arg(&report)
        .args(["--duration", "2"])
        .status()
        .unwrap();
    assert!(status.success());

    let text = fs::read_to_string(dir.path().join("short000.csv")).unwrap();
    assert_eq!(text.lines().count(), 3);
}

#[test]
fn audit_dump_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let wav = dir.path().join("tone.wav");
    let audit = dir.path().join("audit");
    write_tone(&wav, 1);

    let status = meter()
        .arg("-i")
        .arg(&wav)
        .arg("-o")
        .arg(dir.path().join("levels.csv"))
        .arg("--audit")
        .arg(&audit)
        .status()
        .unwrap();
    assert!(status.success());

    let reader = hound::WavReader::open(audit.join("a_weighted.wav")).unwrap();
    assert_eq!(reader.duration(), 48_000);
    assert!(audit.join("time_weighted_power.wav").exists());
}

#[test]
fn missing_input_exits_with_status_1() {
    let dir = tempfile::tempdir().unwrap();
    let output = meter()
        .arg("-i")
        .arg(dir.path().join("absent.wav"))
        .arg("-o")
        .arg(dir.path().join("levels.csv"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to open input"));
}

#[test]
fn unsupported_sample_rate_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let wav = dir.path().join("low.wav");
    write_pcm_wav(&wav, 16_000, &vec![0i16; 16_000]).unwrap();

    let output = meter()
        .arg("-i")
        .arg(&wav)
        .arg("-o")
        .arg(dir.path().join("levels.csv"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unsupported sample rate"));
}
