use anyhow::{Context, Result};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use fcmp_lib::constants::SERIAL_BAUD;
use fcmp_lib::mems::MemsDriver;
use fcmp_lib::port::SerialTransport;
use fcmp_lib::state::StateSnapshot;
use fcmp_lib::{Controller, FcmpError};

mod sim;

use sim::{SimPin, ToneGenerator, TracingSpi};

const REOPEN_BACKOFF: Duration = Duration::from_millis(500);

/// MEMS mirror board control loop, speaking FCMP over a serial link.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Serial device the host connects to (e.g., /dev/ttyACM0).
    #[arg(short, long)]
    port: String,
    /// Line rate of the serial link.
    #[arg(short, long, default_value_t = SERIAL_BAUD)]
    baud: u32,
    /// Control cycle period in microseconds.
    #[arg(long, default_value_t = 1000)]
    cycle_us: u64,
    /// Settle time after driver board power transitions, in milliseconds.
    #[arg(long, default_value_t = 1)]
    settle_ms: u64,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

fn setup_logging(log_file_path: Option<PathBuf>, verbosity: &Verbosity<InfoLevel>) -> Result<Option<WorkerGuard>> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_thread_ids(false)
        .without_time();

    let (file_layer, guard) = if let Some(ref path) = log_file_path {
        let log_file = File::create(path).with_context(|| format!("Failed to create log file at: {:?}", path))?;
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(log_file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    // INFO by default, DEBUG with -v, TRACE (SPI words, wire bytes) with -vv
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file_path {
        info!("Logging to file: {:?}", path);
    }

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file.clone(), &cli.verbose)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    let mut board = tokio::task::spawn_blocking(move || run_board(cli, flag));

    let result = tokio::select! {
        res = &mut board => res,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping control loop");
            shutdown.store(true, Ordering::Relaxed);
            board.await
        }
    };

    match result.context("Control loop task failed")? {
        Ok(snapshot) => {
            info!(state = %serde_json::to_string(&snapshot)?, "Final protocol state");
            Ok(())
        }
        Err(e) => {
            error!("Control loop failed: {:?}", e);
            Err(e)
        }
    }
}

/// Blocking control loop; runs until `shutdown` is raised.
fn run_board(cli: Cli, shutdown: Arc<AtomicBool>) -> Result<StateSnapshot> {
    let mut transport = SerialTransport::open(&cli.port, cli.baud)
        .with_context(|| format!("Failed to open serial port {}", cli.port))?;

    let actuator =
        MemsDriver::new(TracingSpi::default(), SimPin::default()).with_settle(Duration::from_millis(cli.settle_ms));
    let mut controller = Controller::new(actuator, ToneGenerator::default());
    controller.startup().context("Boot configuration failed")?;

    let period = Duration::from_micros(cli.cycle_us);
    info!(port = %transport.path(), baud = cli.baud, ?period, "Control loop running");

    while !shutdown.load(Ordering::Relaxed) {
        let started = Instant::now();
        match controller.cycle(&mut transport) {
            Ok(()) => {}
            Err(FcmpError::Io(_) | FcmpError::Serial(_)) => {
                if let Err(e) = transport.reopen() {
                    warn!(%e, "Serial port unavailable, retrying");
                    thread::sleep(REOPEN_BACKOFF);
                }
            }
            // Logged by the controller; dirty config bits are retried next cycle
            Err(_) => {}
        }
        if let Some(rest) = period.checked_sub(started.elapsed()) {
            thread::sleep(rest);
        }
    }

    let dropped = controller.session().dropped();
    if dropped > 0 {
        warn!(dropped, "Receive overflow dropped bytes during this run");
    }
    Ok(controller.state().snapshot())
}
