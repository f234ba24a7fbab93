//! HMI Console - line-oriented operator surface
//!
//! Runs the headless [`hmi_core::Console`] and drives it from stdin. Messages
//! from the console are printed to stdout; logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Defaults (gateway on localhost:8080)
//! hmi-console
//!
//! # Different gateway, auto-login
//! HMI_USERNAME=operator HMI_PASSWORD=op123 hmi-console --gateway-url http://plant:8080
//!
//! # Verbose logging
//! RUST_LOG=hmi_core=debug hmi-console
//! ```

mod surface;

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use hmi_core::{
    default_config_path, load_config_from_path, ConfigOverrides, Console, Credentials,
    OperatorEvent,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::surface::{parse_command, Input, Surface, HELP};

/// Channel capacity between the console and the surface
const MESSAGE_CAPACITY: usize = 256;

/// Channel capacity for operator input
const OPERATOR_CAPACITY: usize = 64;

/// Elevator HMI operator console
#[derive(Parser, Debug)]
#[command(name = "hmi-console")]
#[command(author, version, about = "Operator console for the elevator HMI gateway")]
struct Args {
    /// Configuration file (defaults to the XDG config location)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Gateway base address
    #[arg(long, env = "HMI_GATEWAY_URL", value_name = "URL")]
    gateway_url: Option<String>,

    /// Telemetry WebSocket address
    #[arg(long, env = "HMI_TELEMETRY_URL", value_name = "URL")]
    telemetry_url: Option<String>,

    /// Where the bearer token is persisted
    #[arg(long, env = "HMI_TOKEN_PATH", value_name = "FILE")]
    token_path: Option<PathBuf>,

    /// Sign in with this user at startup
    #[arg(long, env = "HMI_USERNAME", requires = "password")]
    username: Option<String>,

    /// Password for --username
    #[arg(long, env = "HMI_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "HMI_LOG_LEVEL")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(url) = &self.gateway_url {
            overrides = overrides.with_gateway_url(url);
        }
        if let Some(url) = &self.telemetry_url {
            overrides = overrides.with_telemetry_url(url);
        }
        if let Some(path) = &self.token_path {
            overrides = overrides.with_token_path(path.clone());
        }
        overrides
    }
}

/// Initialize logging on stderr so stdout stays with the surface
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("hmi_console={level},hmi_core={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Forward stdin lines to the console until EOF or `quit`
///
/// Runs on a plain thread; the stdin read blocks and cannot be cancelled.
fn read_operator_input(ops: &mpsc::Sender<OperatorEvent>, local: &mpsc::Sender<Input>) {
    for line in std::io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("stdin read failed: {}", e);
                break;
            }
        };
        match parse_command(&line) {
            Ok(Input::Event(event)) => {
                let quit = event == OperatorEvent::Quit;
                if ops.blocking_send(event).is_err() || quit {
                    return;
                }
            }
            Ok(Input::Empty) => {}
            Ok(other) => {
                if local.blocking_send(other).is_err() {
                    return;
                }
            }
            Err(e) => eprintln!("{e:#}"),
        }
    }
    debug!("stdin closed, quitting");
    let _ = ops.blocking_send(OperatorEvent::Quit);
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!("SIGTERM handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let mut config = load_config_from_path(args.config.clone().or_else(default_config_path))
        .context("Failed to load configuration")?;
    args.overrides().apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(
        gateway = %config.gateway_url,
        telemetry = %config.telemetry_url,
        source = ?config.source(),
        "Starting HMI console"
    );

    let (msg_tx, mut msg_rx) = mpsc::channel(MESSAGE_CAPACITY);
    let (op_tx, op_rx) = mpsc::channel(OPERATOR_CAPACITY);
    let (local_tx, mut local_rx) = mpsc::channel(8);

    let console = Console::from_config(&config, msg_tx).context("Failed to build console")?;
    let console_task = tokio::spawn(console.run(op_rx));

    if let (Some(username), Some(password)) = (args.username, args.password) {
        op_tx
            .send(OperatorEvent::Login(Credentials::new(username, password)))
            .await
            .context("Console stopped before login")?;
    }

    let stdin_ops = op_tx.clone();
    std::thread::Builder::new()
        .name("operator-input".into())
        .spawn(move || read_operator_input(&stdin_ops, &local_tx))
        .context("Failed to start input thread")?;

    let mut surface = Surface::new();
    let mut quitting = false;
    loop {
        tokio::select! {
            message = msg_rx.recv() => {
                let Some(message) = message else { break };
                for line in surface.render(message) {
                    println!("{line}");
                }
            }
            Some(input) = local_rx.recv() => match input {
                Input::Help => println!("{HELP}"),
                Input::Status => println!("{}", surface.status()),
                Input::Event(_) | Input::Empty => {}
            },
            result = tokio::signal::ctrl_c(), if !quitting => {
                if let Err(e) = result {
                    warn!("Ctrl-C handler failed: {}", e);
                }
                info!("Received interrupt, shutting down...");
                quitting = true;
                let _ = op_tx.send(OperatorEvent::Quit).await;
            }
            () = terminate(), if !quitting => {
                info!("Received SIGTERM, shutting down...");
                quitting = true;
                let _ = op_tx.send(OperatorEvent::Quit).await;
            }
        }
    }

    console_task.await.context("Console task failed")?;
    info!("HMI console stopped");
    Ok(())
}
