//! Fire Monitor
//!
//! Host-side monitor for a fire-detection sensor network. The panel
//! controller reports over a serial line; this tool tracks which of its
//! numbered areas are in alarm and draws them as a grid in the terminal.
//!
//! # Features
//!
//! - **Live Monitor**: Read controller messages from a USB serial port
//!   (requires `serial` feature and libudev on Linux)
//! - **Replay**: Feed a captured serial log through the same ingestion path
//! - **Message Grammars**: Versioned controller message templates
//! - **Event Journal**: Timestamped log of every alarm and reset
//!
//! # Usage
//!
//! ```bash
//! # Monitor the controller on a given port
//! fire-monitor monitor -p /dev/ttyUSB0
//!
//! # List available serial ports (requires serial feature)
//! fire-monitor serial list
//!
//! # Replay a capture without hardware
//! fire-monitor replay capture.log --chunk-size 16
//!
//! # Write a default configuration file
//! fire-monitor config generate -o fire-monitor.toml
//! ```

mod areas;
mod config;
mod error;
mod protocol;
mod render;
mod serial;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use areas::AreaStateStore;
use config::MonitorConfig;
use protocol::{get_grammar, grammar_names, MessageGrammar};
use render::TerminalRenderer;
use serial::{ReplaySource, SerialIngestor};

#[cfg(feature = "serial")]
use serial::{LinkState, PortConfig};

/// Fire Monitor
///
/// Tracks fire alarm state per area from panel controller messages
#[derive(Parser)]
#[command(name = "fire-monitor")]
#[command(author = "Prasanna Gautam")]
#[command(version = "0.1.0")]
#[command(about = "Serial monitor for fire-detection area panels")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor the panel controller (requires --features serial)
    #[cfg(feature = "serial")]
    Monitor {
        /// Serial port path (e.g., /dev/ttyUSB0)
        #[arg(short, long)]
        port: Option<String>,

        /// Baud rate
        #[arg(short, long)]
        baud: Option<u32>,

        /// Read timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Number of areas on the panel
        #[arg(short, long)]
        areas: Option<usize>,

        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Append events to this journal file
        #[arg(short, long)]
        log: Option<PathBuf>,
    },

    /// Serial port operations (requires --features serial)
    #[cfg(feature = "serial")]
    #[command(subcommand)]
    Serial(SerialCommands),

    /// Replay a captured serial log
    Replay {
        /// Capture file
        file: PathBuf,

        /// Bytes delivered per read
        #[arg(long, default_value_t = serial::replay::DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,

        /// Delay between reads in milliseconds
        #[arg(long, default_value_t = 0)]
        delay_ms: u64,

        /// Number of areas on the panel
        #[arg(short, long)]
        areas: Option<usize>,

        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Append events to this journal file
        #[arg(short, long)]
        log: Option<PathBuf>,
    },

    /// Configuration file operations
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Message grammar operations
    #[command(subcommand)]
    Grammar(GrammarCommands),
}

#[cfg(feature = "serial")]
#[derive(Subcommand)]
enum SerialCommands {
    /// List available serial ports
    List,

    /// Detect likely panel controller ports
    Detect,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Generate a default configuration file
    Generate {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the effective configuration
    Show {
        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum GrammarCommands {
    /// List message grammars
    List,

    /// Show the templates of a grammar
    Show {
        /// Grammar id (e.g., v1)
        grammar: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        #[cfg(feature = "serial")]
        Commands::Monitor {
            port,
            baud,
            timeout_ms,
            areas,
            config,
            log,
        } => {
            let mut cfg = MonitorConfig::load_or_default(config.as_deref())?;
            cfg.port = port.or(cfg.port);
            cfg.baud_rate = baud.unwrap_or(cfg.baud_rate);
            cfg.timeout_ms = timeout_ms.unwrap_or(cfg.timeout_ms);
            cfg.area_count = areas.unwrap_or(cfg.area_count);
            cfg.journal = log.or(cfg.journal);
            cfg.validate()?;

            handle_monitor(cfg).await
        }
        #[cfg(feature = "serial")]
        Commands::Serial(cmd) => handle_serial(cmd),
        Commands::Replay {
            file,
            chunk_size,
            delay_ms,
            areas,
            config,
            log,
        } => {
            let mut cfg = MonitorConfig::load_or_default(config.as_deref())?;
            cfg.area_count = areas.unwrap_or(cfg.area_count);
            cfg.journal = log.or(cfg.journal);
            cfg.validate()?;

            handle_replay(cfg, file, chunk_size, Duration::from_millis(delay_ms)).await
        }
        Commands::Config(cmd) => handle_config(cmd),
        Commands::Grammar(cmd) => handle_grammar(cmd),
    }
}

#[cfg(feature = "serial")]
async fn handle_monitor(cfg: MonitorConfig) -> Result<()> {
    let store = Arc::new(AreaStateStore::new(cfg.area_count));
    let mut ingestor = SerialIngestor::new(Arc::clone(&store), cfg.ingest_settings()?);

    let port_path = match cfg.port.clone() {
        Some(p) => Some(p),
        None => {
            let detected = serial::port::detect_controller_ports()?;
            match detected.first() {
                Some(p) => {
                    println!("{} Auto-detected: {}", "[OK]".green().bold(), p.path.white());
                    Some(p.path.clone())
                }
                None => {
                    eprintln!("{} No USB serial ports detected", "[ERROR]".red().bold());
                    eprintln!("Use -p to specify port manually");
                    None
                }
            }
        }
    };

    // A missing controller is not fatal: the panel stays up, disconnected
    if let Some(path) = port_path {
        let port_config = PortConfig::new(&path)
            .with_baud_rate(cfg.baud_rate)
            .with_timeout(cfg.timeout());

        match ingestor.open(&port_config) {
            Ok(()) => ingestor.start()?,
            Err(e) => log::error!("{}", e.report()),
        }
    }

    let renderer = TerminalRenderer::new(cfg.columns);
    render_until_interrupted(&store, &ingestor, &renderer, cfg.refresh()).await?;

    log::info!("Closing application...");
    tokio::task::spawn_blocking(move || ingestor.stop())
        .await
        .context("Read loop shutdown task failed")?;

    Ok(())
}

/// Redraw on every store or link change until Ctrl+C
#[cfg(feature = "serial")]
async fn render_until_interrupted(
    store: &AreaStateStore,
    ingestor: &SerialIngestor,
    renderer: &TerminalRenderer,
    refresh: Duration,
) -> Result<()> {
    let mut ticker = tokio::time::interval(refresh);
    let mut last_drawn: Option<(u64, LinkState)> = None;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                res.context("Failed to listen for Ctrl+C")?;
                println!("\n{}", "Stopping monitor...".yellow());
                return Ok(());
            }
            _ = ticker.tick() => {
                let (generation, areas) = store.snapshot_with_generation();
                let link = ingestor.link_state();
                if last_drawn != Some((generation, link)) {
                    renderer.draw(&areas, link);
                    last_drawn = Some((generation, link));
                }
            }
        }
    }
}

#[cfg(feature = "serial")]
fn handle_serial(cmd: SerialCommands) -> Result<()> {
    match cmd {
        SerialCommands::List => {
            serial::port::print_ports()?;
        }

        SerialCommands::Detect => {
            println!("{} Detecting panel controller ports...", "[*]".cyan().bold());

            let ports = serial::port::detect_controller_ports()?;

            if ports.is_empty() {
                println!("{}", "No USB-to-serial adapters detected".yellow());
                println!("\n{}", "Troubleshooting:".white().bold());
                println!("  1. Connect the panel controller");
                println!("  2. Check permissions: sudo usermod -aG dialout $USER");
                println!("  3. Check dmesg for connection events");
            } else {
                println!("\n{}", "Detected serial ports:".green().bold());
                for port in &ports {
                    println!("\n  {}", port.path.white().bold());
                    if let Some(ref prod) = port.product {
                        println!("    Product: {}", prod);
                    }
                    if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
                        println!("    VID:PID: {:04x}:{:04x}", vid, pid);
                    }
                }
                println!("\n{}", "To monitor:".cyan());
                println!("  fire-monitor monitor -p {}", ports[0].path.white());
            }
        }
    }

    Ok(())
}

async fn handle_replay(
    cfg: MonitorConfig,
    file: PathBuf,
    chunk_size: usize,
    delay: Duration,
) -> Result<()> {
    let source = ReplaySource::open(&file)
        .with_context(|| format!("Failed to read capture: {}", file.display()))?
        .with_chunk_size(chunk_size)
        .with_delay(delay);
    let total = source.remaining();

    println!(
        "{} Replaying {} ({} bytes, {} per read)",
        "[*]".cyan().bold(),
        file.display().to_string().white(),
        total,
        chunk_size.max(1)
    );

    let store = Arc::new(AreaStateStore::new(cfg.area_count));
    let mut ingestor = SerialIngestor::new(Arc::clone(&store), cfg.ingest_settings()?);
    ingestor.attach(Box::new(source));
    ingestor.start()?;

    let ingestor = tokio::task::spawn_blocking(move || {
        ingestor.wait();
        ingestor
    })
    .await
    .context("Replay task failed")?;

    let renderer = TerminalRenderer::new(cfg.columns).without_clear();
    renderer.draw(&store.snapshot(), ingestor.link_state());

    println!("{}", "--- Replay Summary ---".cyan().bold());
    println!("State changes: {}", store.generation());
    let alarms = store.active_alarms();
    if alarms.is_empty() {
        println!("Areas in alarm: {}", "none".green());
    } else {
        let ids: Vec<String> = alarms.iter().map(|id| id.to_string()).collect();
        println!("Areas in alarm: {}", ids.join(", ").red().bold());
    }
    if let Some(ref journal) = cfg.journal {
        println!("Journal: {}", journal.display().to_string().white());
    }

    Ok(())
}

fn handle_config(cmd: ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Generate { output } => {
            let text = MonitorConfig::default().to_toml()?;

            if let Some(path) = output {
                std::fs::write(&path, &text)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!(
                    "{} Default configuration written to {}",
                    "[OK]".green().bold(),
                    path.display()
                );
            } else {
                print!("{}", text);
            }
        }

        ConfigCommands::Show { config } => {
            let cfg = MonitorConfig::load_or_default(config.as_deref())?;
            print!("{}", cfg.to_toml()?);
        }
    }

    Ok(())
}

fn handle_grammar(cmd: GrammarCommands) -> Result<()> {
    match cmd {
        GrammarCommands::List => {
            println!("{}", "=".repeat(60));
            println!("{}", "Message Grammars".cyan().bold());
            println!("{}", "=".repeat(60));

            for name in grammar_names() {
                if let Some(grammar) = get_grammar(name) {
                    println!("\n  {}: {}", name.white().bold(), grammar.description);
                }
            }

            println!("\n{}", "=".repeat(60));
            println!(
                "Use {} to see the message templates",
                "fire-monitor grammar show <id>".cyan()
            );
        }

        GrammarCommands::Show { grammar } => {
            let grammar = get_grammar(&grammar).ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown grammar: {}. Use 'fire-monitor grammar list' to see available grammars.",
                    grammar
                )
            })?;

            print_grammar(grammar);
        }
    }

    Ok(())
}

fn print_grammar(grammar: &MessageGrammar) {
    println!("{}", "=".repeat(70));
    println!("{}", format!("Message Grammar: {}", grammar.id).cyan().bold());
    println!("{}", "=".repeat(70));

    println!("\n  Description: {}", grammar.description);
    println!("\n{}", "Templates:".white().bold());
    println!("  Reset all:  {:?}", grammar.reset_phrase);
    println!("  Area alarm: {:?} followed by the area number", grammar.alarm_prefix);
    println!("\n{}", "Example:".white().bold());
    println!("  {}", grammar.alarm_message(7).dimmed());
    println!("\n{}", "Matching is case-sensitive and ignores line breaks.".dimmed());

    println!("\n{}", "=".repeat(70));
}
