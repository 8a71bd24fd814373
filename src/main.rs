//! Gameprobe - Diagnostic UDP peer for a real-time game protocol
//!
//! Lets an operator interactively emit protocol messages (heartbeats,
//! moves, chat, actions, acks) toward a game server and observe raw
//! replies.

mod command;
mod config;
mod network;
mod protocol;

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use command::{Command, CommandError};
use config::Config;
use network::{resolve_host, Session, SessionConfig, SessionEvent};
use protocol::Inbound;

/// Gameprobe - diagnostic UDP peer for game protocol testing
#[derive(Parser)]
#[command(name = "gameprobe")]
#[command(author = "Gameprobe Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Send game protocol messages over UDP and inspect replies", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to a game server and open the interactive shell
    Run {
        /// Server host to send to
        #[arg(short, long)]
        server: Option<String>,

        /// Server port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show current configuration
    Config {
        /// Generate sample configuration
        #[arg(long)]
        generate: bool,

        /// Output path for generated config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show protocol information
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default().unwrap_or_default()
    };

    // Initialize logging
    let filter = if cli.verbose || config.general.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Run { server, port } => {
            run_shell(config, server, port).await?;
        }
        Commands::Config { generate, output } => {
            if generate {
                let sample = config::generate_sample_config();
                if let Some(path) = output {
                    std::fs::write(&path, &sample)?;
                    println!("Configuration written to: {}", path.display());
                } else {
                    println!("{}", sample);
                }
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
        Commands::Info => {
            print_protocol_info();
        }
    }

    Ok(())
}

/// Connect the session and run the interactive command loop
async fn run_shell(
    config: Config,
    server: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let host = server.unwrap_or(config.network.host.clone());
    let port = port.unwrap_or(config.network.port);
    let server_addr = resolve_host(&host, port).await?;

    let session_config =
        SessionConfig::default().with_receive_timeout_ms(config.network.receive_timeout_ms);
    let mut session = Session::connect(server_addr, session_config).await?;
    let mut event_rx = session.take_event_receiver().unwrap();

    session.start().await?;

    println!("\n========================================");
    println!("  Gameprobe Session Running");
    println!("========================================");
    println!("  Player ID: {}", session.player_id());
    println!("  Server:    {}", session.server_addr());
    println!("========================================");
    println!("\nCommands:");
    println!("  move <x> <y>  - Move player to position");
    println!("  chat <msg>    - Send chat message");
    println!("  attack        - Perform attack action");
    println!("  pickup        - Perform pickup action");
    println!("  heartbeat     - Send heartbeat");
    println!("  quit          - Exit client");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if handle_line(&mut session, &line).await {
                            break;
                        }
                        prompt();
                    }
                    // EOF on stdin quits gracefully
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!("stdin error: {}", e);
                        break;
                    }
                }
            }
            Some(event) = event_rx.recv() => {
                print_event(event);
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nInterrupted");
                break;
            }
        }
    }

    println!("Shutting down client...");
    session.stop().await;
    tracing::info!("Session closed");

    Ok(())
}

/// Parse and dispatch one input line. Returns true when the operator quit.
async fn handle_line(session: &mut Session, line: &str) -> bool {
    let parsed = match Command::parse(line) {
        Ok(parsed) => parsed,
        Err(CommandError::Empty) => return false,
        Err(e) => {
            println!("{}", e);
            return false;
        }
    };

    match command::dispatch(session, parsed).await {
        Ok(Some(confirmation)) => {
            println!("{}", confirmation);
            false
        }
        // Quit
        Ok(None) => true,
        Err(e) => {
            // Sends are independent; one failure never ends the session
            println!("Send failed: {}", e);
            false
        }
    }
}

/// Print a session event from the background receive loop
fn print_event(event: SessionEvent) {
    match event {
        SessionEvent::Datagram { inbound } => match inbound {
            Inbound::Text(text) => {
                println!("Received raw data: {}", text);
            }
            binary @ Inbound::Binary(_) => {
                println!("Received binary data: {}", binary);
                println!("Note: server replies use its binary serialization - shown as hex only");
            }
        },
        SessionEvent::RecvError { message } => {
            println!("Error receiving message: {}", message);
        }
    }
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

/// Print protocol information
fn print_protocol_info() {
    println!("Gameprobe Protocol Information");
    println!("==============================\n");

    println!("Default server: {}:{}", protocol::DEFAULT_HOST, protocol::DEFAULT_PORT);
    println!("Max datagram:   {} bytes", protocol::MAX_DATAGRAM_SIZE);
    println!("\nOutbound envelope (JSON, one datagram per message):");
    println!("  {{ \"sequence\": n, \"timestamp\": ms, \"message\": {{...}}, \"reliable\": bool }}");
    println!("\nMessage kinds:");
    println!("  Heartbeat, Ack                    (not reliable)");
    println!("  PlayerMove, Chat, PlayerAction    (reliable, advisory only)");
    println!("\nServer replies are not decoded; non-UTF-8 datagrams are shown as hex.");
}
