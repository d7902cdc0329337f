use std::io::BufReader;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use sound_meter::logging::init_tracing;
use sound_meter::telemetry::TelemetryMessage;

#[derive(Parser, Debug)]
#[command(
    name = "sound_meter_client",
    about = "Print live levels from a running sound_meter"
)]
struct Cli {
    /// Telemetry socket of the meter
    #[arg(short = 's', long)]
    socket: PathBuf,
    /// Exit after this many messages
    #[arg(short = 'n', long)]
    count: Option<usize>,
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

    let stream = UnixStream::connect(&cli.socket)
        .with_context(|| format!("Failed to connect to {}", cli.socket.display()))?;
    tracing::info!("[Client] Connected to {:?}", cli.socket);

    // Messages arrive back to back without a delimiter
    let messages =
        serde_json::Deserializer::from_reader(BufReader::new(stream)).into_iter::<TelemetryMessage>();

    let mut received = 0usize;
    for message in messages {
        let message = message.context("Malformed telemetry message")?;
        println!("{}", serde_json::to_string(&message)?);
        received += 1;
        if cli.count.is_some_and(|count| received >= count) {
            break;
        }
    }

    tracing::info!("[Client] Received {} message(s)", received);
    Ok(ExitCode::SUCCESS)
}
