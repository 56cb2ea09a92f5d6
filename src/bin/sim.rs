//! Wireless UART Simulator Binary
//!
//! Runs the engine against the in-memory transport and walks every command.

use std::process;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};
use wireless_uart::link::{FailureKind, SetupStep};
use wireless_uart::protocol::{
    AsciiString, Command, FrameReassembler, IntervalSeconds, RegisterNumber,
};
use wireless_uart::transport::sim::{Fault, SimulatedPeer, SimulatedTransport};
use wireless_uart::{driver, Config, EngineHandle, OperationStep, PeerAddress, WriteOutcome};

/// Wireless UART Simulator
#[derive(Parser, Debug)]
#[command(name = "wireless-uart-sim")]
#[command(about = "Drive the wireless UART engine against a simulated peer")]
#[command(version)]
struct Args {
    /// Target peer address
    #[arg(short, long, default_value = "C0:FF:EE:00:00:01")]
    target: String,

    /// Maximum bytes per transport write
    #[arg(short, long, default_value = "20")]
    chunk_size: usize,

    /// Setup attempts to fail (timeouts at service discovery) before connecting
    #[arg(short, long, default_value = "1")]
    failures: usize,

    /// Device name to write to the peer
    #[arg(short, long, default_value = "Sample-UartController-001")]
    name: String,

    /// Sensor samples the peer reports per sampling command
    #[arg(short, long, default_value = "3")]
    samples: usize,

    /// Decode this hex byte stream and exit instead of running the simulator
    #[arg(long)]
    feed: Option<String>,
}

/// How long to wait for the link or a write report
const WAIT: Duration = Duration::from_secs(30);

/// How long to wait for a command's reply once its write completed
const REPLY_WAIT: Duration = Duration::from_secs(1);

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,wireless_uart=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("Wireless UART Simulator v{}", wireless_uart::VERSION);

    if let Some(hex) = &args.feed {
        if let Err(e) = feed_hex(hex) {
            tracing::error!("{}", e);
            process::exit(1);
        }
        return;
    }

    if let Err(e) = simulate(&args) {
        tracing::error!("Simulation failed: {}", e);
        process::exit(1);
    }
}

/// Push a hex stream through a reassembler one byte at a time
fn feed_hex(hex: &str) -> Result<(), String> {
    let digits: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits in {:?}", hex));
    }

    let bytes = (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16))
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|e| format!("invalid hex {:?}: {}", hex, e))?;

    let mut reassembler = FrameReassembler::new();
    let mut total = 0;
    for byte in bytes {
        let summary = reassembler.feed(&[byte], |packet| {
            tracing::info!("Packet: {:?}", packet);
        });
        total += summary.dispatched;
    }

    tracing::info!(
        "Dispatched {} packet(s), {} byte(s) left buffered",
        total,
        reassembler.buffered_len()
    );
    Ok(())
}

fn simulate(args: &Args) -> wireless_uart::Result<()> {
    let target: PeerAddress = args.target.parse()?;
    let config = Config::builder()
        .target(target)
        .chunk_size(args.chunk_size)
        .operation_timeout(Duration::from_millis(500))
        .build();

    let faults =
        (0..args.failures).map(|_| Fault::new(SetupStep::DiscoverServices, FailureKind::Timeout));
    let peer = SimulatedPeer::new(target, "UART Controller")?.with_samples(args.samples);
    let chunk_size = args.chunk_size;

    let handle = driver::spawn(config, move |sink| {
        SimulatedTransport::new(sink, peer, chunk_size).with_faults(faults)
    })?;

    tracing::info!("Waiting for link to {}", target);
    if !handle.wait_for_step(OperationStep::Connected, WAIT) {
        tracing::error!("Link not ready, stuck at {}", handle.operation_step());
        return Err(wireless_uart::UartError::NotConnected);
    }

    let register = RegisterNumber::new(4)?;
    let commands = vec![
        Command::ConnectionTest,
        Command::VersionRead,
        Command::RegisterWrite {
            register,
            value: 0x5A,
        },
        Command::RegisterRead { register },
        Command::DeviceNameWrite {
            name: AsciiString::new(args.name.as_str())?,
        },
        Command::DeviceNameRead,
        Command::SensorSampling {
            interval: IntervalSeconds::new(1)?,
        },
    ];

    for command in commands {
        run_command(&handle, command)?;
    }

    // Give trailing notifications a moment to arrive
    while let Ok(packet) = handle.packets().recv_timeout(Duration::from_millis(200)) {
        tracing::info!("Packet: {:?}", packet);
    }

    let stats = handle.stats()?;
    tracing::info!("Link stats: {:?}", stats);

    handle.shutdown();
    tracing::info!("Simulator stopped");
    Ok(())
}

/// Submit one command and wait for its write to finish
fn run_command(handle: &EngineHandle, command: Command) -> wireless_uart::Result<()> {
    tracing::info!("Sending {:?}", command);
    let job = handle.submit(command)?;

    loop {
        match handle.write_reports().recv_timeout(WAIT) {
            Ok(report) if report.job == job => {
                return match report.outcome {
                    WriteOutcome::Completed => {
                        // Replies trail the write completion
                        match handle.packets().recv_timeout(REPLY_WAIT) {
                            Ok(packet) => tracing::info!("Packet: {:?}", packet),
                            Err(_) => tracing::warn!("No reply within {:?}", REPLY_WAIT),
                        }
                        while let Ok(packet) = handle.packets().try_recv() {
                            tracing::info!("Packet: {:?}", packet);
                        }
                        Ok(())
                    }
                    WriteOutcome::Failed(e) => Err(e),
                    WriteOutcome::Superseded => Err(wireless_uart::UartError::Superseded),
                };
            }
            Ok(report) => tracing::debug!("Report for earlier {}: {:?}", report.job, report.outcome),
            Err(_) => return Err(wireless_uart::UartError::WriteTimeout(WAIT)),
        }
    }
}
