//! keycast - Consent-Gated Input Capture and Relay
//!
//! Captures local input events and relays them, after an explicit consent
//! step, to an isolated display surface through a narrow capability bridge.

mod capture;
mod config;
mod consent;
mod relay;
mod session;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use capture::StdinKeySource;
use config::Config;
use consent::TerminalPrompt;
use session::CaptureSession;

/// keycast - consent-gated input capture and relay
#[derive(Parser)]
#[command(name = "keycast")]
#[command(author = "Keycast Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Capture local input and relay it to a sandboxed display surface", long_about = None)]
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
    /// Run a capture session against the terminal
    Run,

    /// Show current configuration
    Config {
        /// Generate sample configuration
        #[arg(long)]
        generate: bool,

        /// Output path for generated config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show system information
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default().unwrap_or_default()
    };

    match cli.command {
        Commands::Run => {
            run_session(config).await?;
        }
        Commands::Config { generate, output } => {
            if generate {
                let sample = config::generate_sample_config()?;
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
            print_system_info(&config);
        }
    }

    Ok(())
}

/// Run one capture session against the controlling terminal
async fn run_session(config: Config) -> anyhow::Result<()> {
    let queue_capacity = config.capture.queue_capacity;
    let pointer_requested = config.capture.pointer_enabled;

    let mut session = CaptureSession::new(config);

    // The display surface: a console consumer registered through the bridge.
    let bridge = session.bridge();
    bridge.on_keyboard_event(|event| {
        println!("{:>8} ms  {}  {}", event.captured_at_ms, event.phase, event.key);
    });
    bridge.on_mouse_event(|event| {
        println!(
            "{:>8} ms  {}  ({}, {})",
            event.captured_at_ms, event.kind, event.x, event.y
        );
    });

    session.arm_keyboard(StdinKeySource::new(queue_capacity));
    if pointer_requested {
        tracing::warn!(
            "pointer capture is enabled in the config but this host has no pointer source; running keyboard only"
        );
    }

    println!("\n========================================");
    println!("  keycast Capture Session");
    println!("========================================");
    println!("  Session: {}", session.id());
    println!("========================================");

    let granted = session.negotiate(&TerminalPrompt::new()).await?;
    if !granted {
        println!("\nCapture denied. Nothing was captured.");
        session.shutdown().await;
        return Ok(());
    }

    println!("\nCapturing input. Press Ctrl+C to stop.\n");

    tokio::signal::ctrl_c().await?;

    println!("\nRevoking capture...");
    session.revoke();
    session.shutdown().await;
    tracing::info!("Session ended");

    Ok(())
}

/// Print system information
fn print_system_info(config: &Config) {
    println!("keycast System Information");
    println!("==========================\n");

    println!("Host: {}", config.general.name);
    println!(
        "Pointer modality: {}",
        if config.capture.pointer_enabled {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!("Move throttle: {} ms", config.capture.throttle_ms);
    println!("Sampling tick: {} ms", config.capture.tick_ms);

    println!("\nBuilt-in input sources:");
    println!("  - keyboard: terminal stdin (press/release pairs)");
    println!("  - pointer: none; hosts supply their own PointerSource");

    println!("\nCapture never starts before the consent prompt is answered.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        // Test that CLI parsing works
        let cli = Cli::try_parse_from(["keycast", "info"]);
        assert!(cli.is_ok());

        let cli = Cli::try_parse_from(["keycast", "config", "--generate"]);
        assert!(cli.is_ok());
    }
}
