use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use sound_meter::audio::{
    list_input_devices, AcquisitionSource, AuditRecorder, FileSource, LiveDevice,
};
use sound_meter::config::AppConfig;
use sound_meter::error::{
    log_audio_error, log_calibration_error, log_telemetry_error, ErrorCode, MeterError,
};
use sound_meter::logging::init_tracing;
use sound_meter::output::{default_output_path, ReportFormat, ReportWriter};
use sound_meter::telemetry::{TelemetryBroadcaster, TelemetryPublisher};
use sound_meter::{shutdown, Meter, RunSummary};

#[derive(Parser, Debug)]
#[command(
    name = "sound_meter",
    about = "A-weighted sound level meter with live Unix-socket telemetry"
)]
struct Cli {
    /// JSON configuration file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,
    /// Capture device name ("default" for the host default input)
    #[arg(short = 'd', long, conflicts_with = "input")]
    device: Option<String>,
    /// Measure a 16-bit PCM WAV file instead of a capture device
    #[arg(short = 'i', long)]
    input: Option<PathBuf>,
    /// Report file (defaults to the input name plus extension)
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
    /// Report format
    #[arg(short = 'f', long, value_enum)]
    format: Option<ReportFormat>,
    /// Capture sample rate in Hz (WAV input uses the file's rate)
    #[arg(short = 'r', long)]
    sample_rate: Option<u32>,
    /// Station identification written into JSON reports
    #[arg(short = 'n', long)]
    identification: Option<String>,
    /// Stop after this many seconds of measurement
    #[arg(short = 't', long)]
    duration: Option<f64>,
    /// Calibrate against a reference tone for the given seconds (default 5)
    #[arg(short = 'c', long, num_args = 0..=1, default_missing_value = "5")]
    calibrate: Option<f64>,
    /// Unix socket path for live telemetry
    #[arg(long)]
    socket: Option<PathBuf>,
    /// Directory receiving WAV dumps of the filter outputs
    #[arg(long)]
    audit: Option<PathBuf>,
    /// Print the available capture devices and exit
    #[arg(long)]
    list_devices: bool,
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.list_devices {
        for name in list_input_devices().context("Failed to list capture devices")? {
            println!("{name}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AppConfig::default(),
    };
    apply_overrides(&mut config, &cli);
    config.validate().context("Invalid configuration")?;

    shutdown::install_stop_handlers().context("Failed to install signal handlers")?;

    let report_path = default_output_path(
        config.output.path.as_deref(),
        cli.input.as_deref(),
        config.output.format,
    );
    let mut writer = ReportWriter::new(
        report_path,
        config.output.format,
        config.output.identification.clone(),
        config.measurement.file_period,
    );

    let mut broadcaster = match &config.telemetry.socket_path {
        Some(path) => Some(
            TelemetryBroadcaster::start(path)
                .map_err(|err| {
                    log_telemetry_error(&err, "startup");
                    err
                })
                .with_context(|| format!("Failed to start telemetry on {}", path.display()))?,
        ),
        None => None,
    };
    let publisher = broadcaster.as_ref().map(TelemetryBroadcaster::publisher);

    let result = match &cli.input {
        Some(path) => {
            let mut source = FileSource::open(path)
                .with_context(|| format!("Failed to open input {}", path.display()))?;
            measure(&mut source, &config, &cli, &mut writer, publisher)
        }
        None => {
            let mut device = LiveDevice::open(&config.audio.input_device, config.audio.sample_rate)
                .with_context(|| {
                    format!("Failed to open capture device {}", config.audio.input_device)
                })?;
            let result = measure(&mut device, &config, &cli, &mut writer, publisher);
            if device.overruns() > 0 {
                tracing::warn!(
                    "[Main] {} sample(s) dropped by the capture queue",
                    device.overruns()
                );
            }
            result
        }
    };

    if let Some(broadcaster) = broadcaster.as_mut() {
        broadcaster.shutdown();
    }

    let summary = result?;
    if let Some(levels) = summary.last_levels {
        tracing::info!(
            "[Main] Last segment: LAeq {:.1} dB, LAE {:.1} dB, LAFmax {:.1} dB",
            levels.laeq,
            levels.lae,
            levels.lafmax
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn measure<S: AcquisitionSource>(
    source: &mut S,
    config: &AppConfig,
    cli: &Cli,
    writer: &mut ReportWriter,
    publisher: Option<TelemetryPublisher>,
) -> Result<RunSummary> {
    let mut meter = Meter::new(config, writer);
    if let Some(publisher) = publisher {
        meter = meter.with_publisher(publisher);
    }
    if let Some(dir) = &cli.audit {
        let recorder = AuditRecorder::create(dir, source.sample_rate())
            .with_context(|| format!("Failed to create audit files in {}", dir.display()))?;
        meter = meter.with_audit(recorder);
    }
    if let Some(seconds) = cli.duration {
        if seconds <= 0.0 {
            bail!("--duration must be positive (got {seconds})");
        }
        meter = meter.with_max_duration(seconds);
    }

    meter
        .run(source, shutdown::stop_requested)
        .map_err(|err| {
            match &err {
                MeterError::Audio(audio) => log_audio_error(audio, "measurement"),
                MeterError::Calibration(cal) => log_calibration_error(cal, "calibration"),
                MeterError::Output(_) => tracing::error!(
                    "[Main] Report output failed (code {}): {}",
                    err.code(),
                    err.message()
                ),
                MeterError::Config(_) => tracing::error!(
                    "[Main] Configuration rejected (code {}): {}",
                    err.code(),
                    err.message()
                ),
            }
            err
        })
        .context("Measurement failed")
}

/// Apply command-line flags on top of the file configuration
fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(device) = &cli.device {
        config.audio.input_device = device.clone();
    }
    if let Some(rate) = cli.sample_rate {
        config.audio.sample_rate = rate;
    }
    if let Some(path) = &cli.output {
        config.output.path = Some(path.clone());
    }
    if let Some(format) = cli.format {
        config.output.format = format;
    }
    if let Some(identification) = &cli.identification {
        config.output.identification = identification.clone();
    }
    if let Some(seconds) = cli.calibrate {
        config.calibration.time = seconds;
    }
    if let Some(path) = &cli.socket {
        config.telemetry.socket_path = Some(path.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "sound_meter",
            "-i",
            "rec.wav",
            "-f",
            "json",
            "-n",
            "ROOF",
            "-c",
            "--socket",
            "/tmp/meter.sock",
        ]);
        let mut config = AppConfig::default();
        apply_overrides(&mut config, &cli);
        assert_eq!(config.output.format, ReportFormat::Json);
        assert_eq!(config.output.identification, "ROOF");
        assert_eq!(config.calibration.time, 5.0);
        assert_eq!(
            config.telemetry.socket_path,
            Some(PathBuf::from("/tmp/meter.sock"))
        );
    }

    #[test]
    fn test_calibrate_with_explicit_seconds() {
        let cli = Cli::parse_from(["sound_meter", "--calibrate", "12.5"]);
        let mut config = AppConfig::default();
        apply_overrides(&mut config, &cli);
        assert_eq!(config.calibration.time, 12.5);
    }

    #[test]
    fn test_device_conflicts_with_input() {
        assert!(Cli::try_parse_from(["sound_meter", "-d", "hw:1", "-i", "a.wav"]).is_err());
    }
}
