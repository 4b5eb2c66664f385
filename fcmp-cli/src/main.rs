use clap::{Parser, Subcommand};
use fcmp_lib::cobs::encode_to_vec;
use fcmp_lib::constants::{MAX_ENCODED, SERIAL_BAUD};
use fcmp_lib::pipeline::{ReceiveSession, Received};
use fcmp_lib::port::SerialTransport;
use fcmp_lib::{ByteTransport, Config, Message, Position};
use std::error::Error;
use std::time::Duration;
use tokio::time::{Instant, interval};
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Send FCMP commands to a MEMS mirror board")]
struct Args {
    /// Serial device of the board (e.g., /dev/ttyACM0)
    #[arg(short, long)]
    port: String,

    #[arg(short, long, default_value_t = SERIAL_BAUD)]
    baud: u32,

    /// How long to wait for replies
    #[arg(short, long, default_value = "500")]
    timeout_ms: u64,

    /// Keep printing frames until the timeout instead of stopping at the
    /// first ACK or REJ
    #[arg(short, long)]
    listen: bool,

    /// Print replies as JSON lines
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Nop,
    /// Read the configuration bits
    GetCfg,
    /// Write the configuration bits
    SetCfg {
        /// Raw 16-bit value, overrides the flags
        #[arg(long, value_parser = parse_u16)]
        raw: Option<u16>,
        #[arg(long)]
        mems: bool,
        #[arg(long)]
        strobe_sync: bool,
        #[arg(long)]
        lpf: bool,
        #[arg(long)]
        log: bool,
    },
    GetPos,
    /// Stage a position, one DAC code per channel
    SetPos { a: u16, b: u16, c: u16, d: u16 },
    GetLpf,
    /// Set the filter cutoff in Hz (0 leaves it unchanged)
    SetLpf { hz: u16 },
    /// Send a LOG frame; echoed while the LOG bit is set
    Log { text: String },
}

fn parse_u16(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid value '{s}': {e}"))
}

impl Command {
    fn message(&self) -> Message {
        match self {
            Command::Nop => Message::Nop,
            Command::GetCfg => Message::GetConfig,
            Command::SetCfg {
                raw: Some(bits), ..
            } => Message::SetConfig(Config::from_bits(*bits)),
            Command::SetCfg {
                raw: None,
                mems,
                strobe_sync,
                lpf,
                log,
            } => Message::SetConfig(
                Config::new()
                    .with_mems_en(*mems)
                    .with_strobe_sync(*strobe_sync)
                    .with_lpf(*lpf)
                    .with_log(*log),
            ),
            Command::GetPos => Message::GetPosition,
            Command::SetPos { a, b, c, d } => Message::SetPosition(Position::new(*a, *b, *c, *d)),
            Command::GetLpf => Message::GetFilter,
            Command::SetLpf { hz } => Message::SetFilter(*hz),
            Command::Log { text } => Message::log(text),
        }
    }
}

/// ACK and REJ end an exchange; LOG frames are diagnostics in between.
fn is_final(message: &Message) -> bool {
    !matches!(message, Message::Log(_) | Message::Generic { .. })
}

fn print_message(message: &Message, json: bool) -> Result<(), Box<dyn Error>> {
    if json {
        println!("{}", serde_json::to_string(message)?);
    } else {
        println!("{message}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(log_level).init();

    let mut port = SerialTransport::open(&args.port, args.baud)?;

    let request = args.command.message();
    let wire = encode_to_vec(&request.to_frame().to_bytes()?)?;
    debug!(wire = %hex::encode(&wire), "sending {}", request);
    port.write_all(&wire)?;

    let mut session = ReceiveSession::new();
    let mut buf = [0u8; MAX_ENCODED];
    let mut ticker = interval(Duration::from_millis(2));
    let deadline = Instant::now() + Duration::from_millis(args.timeout_ms);
    let mut replies = 0usize;

    while Instant::now() < deadline {
        ticker.tick().await;
        let room = session.space();
        let n = port.read_available(&mut buf[..room])?;
        session.push(&buf[..n]);

        while let Some(event) = session.poll() {
            match event {
                Received::Frame(frame) => {
                    let message = Message::try_from(frame)?;
                    print_message(&message, args.json)?;
                    replies += 1;
                    if is_final(&message) && !args.listen {
                        return Ok(());
                    }
                }
                Received::ChecksumError(residue) => warn!("Reply dropped, checksum residue 0x{residue:02X}"),
                Received::Runt(len) => warn!("Reply dropped, runt frame of {len} bytes"),
                Received::CodecError(err) => warn!("Reply dropped: {err}"),
            }
        }
    }

    if replies == 0 && !matches!(request, Message::Nop | Message::SetPosition(_)) {
        info!("No reply within {} ms", args.timeout_ms);
    }
    Ok(())
}
