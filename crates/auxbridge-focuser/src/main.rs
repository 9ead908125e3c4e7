use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use auxbridge_focuser::{Direction, Focuser, FocuserConfig, FocuserHandle, FocuserService};
use auxbridge_link::{Communicator, StreamTransport};
use auxbridge_protocol::{decode, from_hex, to_hex, Command, Target};
use clap::{ArgAction, Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Address of the WiFi serial bridge in access-point mode.
const DEFAULT_ADDR: &str = "192.168.4.1:2000";

/// How often `watch` re-reads the position or retries a lost connection.
const WATCH_REFRESH: Duration = Duration::from_secs(2);

#[derive(Debug, Parser)]
#[command(
    name = "auxbridge",
    author,
    version,
    about = "Control a Celestron focuser through an AUX serial bridge",
    long_about = None
)]
struct Cli {
    /// Serial bridge address (host:port)
    #[arg(short, long, default_value = DEFAULT_ADDR, global = true)]
    addr: String,

    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the per-attempt response timeout (milliseconds)
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Override the number of attempts per command
    #[arg(long, global = true)]
    retries: Option<u32>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the focuser firmware version
    Version,
    /// Print the current position
    Position,
    /// Move to an absolute position
    Goto { position: u32 },
    /// Start a continuous move
    Move {
        /// in or out
        direction: Direction,
        /// Motor speed 1-9
        #[arg(short, long)]
        speed: Option<u8>,
    },
    /// Stop the motor
    Stop,
    /// Move a number of steps from the current position
    Step { direction: Direction, steps: u32 },
    /// Show backlash compensation, or set it for one direction
    Backlash {
        /// Direction to show or set; both are shown when omitted
        direction: Option<Direction>,
        /// New value (0-99)
        #[arg(long, requires = "direction")]
        set: Option<u8>,
    },
    /// Send an arbitrary command and print the reply
    Raw {
        /// Destination device (name or code, e.g. focuser or 0x12)
        destination: Target,
        /// Command (name or code, e.g. get-position or 0x01)
        command: Command,
        /// Payload bytes in hex
        payload: Vec<String>,
        /// Do not wait for a reply
        #[arg(long)]
        blind: bool,
    },
    /// Connect and print state changes until interrupted
    Watch {
        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Decode a hex frame without connecting
    Decode { hex: Vec<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    auxbridge_metrics::describe_metrics();

    let config = load_config(&cli)?;

    if let Commands::Decode { hex } = &cli.command {
        return decode_frame(&hex.join(" "));
    }

    let transport = StreamTransport::connect(&cli.addr)
        .await
        .with_context(|| format!("cannot connect to {}", cli.addr))?;
    let mut focuser = Focuser::new(Communicator::with_config(transport, config.link.clone()));

    match cli.command {
        Commands::Version => {
            let version = focuser.firmware_version().await?;
            println!("{version}");
        }
        Commands::Position => {
            println!("{}", focuser.position().await?);
        }
        Commands::Goto { position } => {
            focuser.goto(position).await?;
            println!("moving to {position}");
        }
        Commands::Move { direction, speed } => {
            let speed = speed.unwrap_or(config.default_speed);
            focuser.move_at(direction, speed).await?;
            println!("moving {direction} at speed {speed}");
        }
        Commands::Stop => {
            focuser.stop().await?;
            println!("stopped");
        }
        Commands::Step { direction, steps } => {
            let from = focuser.position().await?;
            let target = focuser.step(direction, steps, from).await?;
            println!("moving from {from} to {target}");
        }
        Commands::Backlash { direction, set } => match (direction, set) {
            (Some(direction), Some(value)) => {
                focuser.set_backlash(direction, value).await?;
                println!("{direction}: {value}");
            }
            (Some(direction), None) => {
                println!("{direction}: {}", focuser.backlash(direction).await?);
            }
            (None, _) => {
                for direction in [Direction::In, Direction::Out] {
                    println!("{direction}: {}", focuser.backlash(direction).await?);
                }
            }
        },
        Commands::Raw {
            destination,
            command,
            payload,
            blind,
        } => {
            let payload = from_hex(&payload.join(" "))?;
            let aux = focuser.communicator_mut();
            if blind {
                aux.command_blind(destination, command, &payload).await?;
            } else {
                let reply = aux.send_command(destination, command, &payload).await?;
                println!("{}", to_hex(&reply));
            }
        }
        Commands::Watch { json } => {
            let (handle, _task) = FocuserService::spawn(focuser, config);
            watch(handle, json).await?;
        }
        Commands::Decode { .. } => {}
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<FocuserConfig> {
    let mut config = match &cli.config {
        Some(path) => FocuserConfig::load(path)?,
        None => FocuserConfig::default(),
    };
    if let Some(timeout_ms) = cli.timeout_ms {
        config.link.response_timeout_ms = timeout_ms;
    }
    if let Some(retries) = cli.retries {
        config.link.retry_count = retries;
    }
    config.validate()?;
    debug!(?config, "configuration");
    Ok(config)
}

fn decode_frame(hex: &str) -> Result<()> {
    let bytes = from_hex(hex)?;
    if bytes.is_empty() {
        bail!("no bytes to decode");
    }
    let frame = decode(&bytes)?;
    println!("{frame}");
    Ok(())
}

async fn watch(handle: FocuserHandle, json: bool) -> Result<()> {
    let mut events = handle.subscribe();
    let mut refresh = tokio::time::interval(WATCH_REFRESH);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) if json => println!("{}", serde_json::to_string(&event)?),
                Ok(event) => println!("{event:?}"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
                Err(RecvError::Closed) => break,
            },
            _ = refresh.tick() => {
                let state = handle.state();
                let result = if state.connected {
                    handle.position().await.map(|_| ())
                } else {
                    handle.connect().await.map(|_| ())
                };
                if let Err(e) = result {
                    debug!(error = %e, "refresh failed");
                }
            }
        }
    }
    Ok(())
}
