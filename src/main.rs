//! ledger-channel command line.
//!
//! Loads a TOML configuration, connects to the configured node group and
//! runs one command against it.

use alloy::primitives::{Address, Bytes, U256};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use ledger_channel::config::loader::load_config;
use ledger_channel::config::ResourceResolver;
use ledger_channel::identity::{self, SignatureScheme};
use ledger_channel::lifecycle::signals::wait_for_shutdown_signal;
use ledger_channel::observability::logging::init_logging;
use ledger_channel::LedgerContext;

/// Interval between status refreshes in watch mode.
const WATCH_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "ledger-channel")]
#[command(about = "Channel client for a ledger node group", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "conf/ledger.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and print per-node status and the current block number
    Status {
        /// Keep printing until interrupted
        #[arg(long)]
        watch: bool,
    },
    /// Print the address of the configured signing identity
    Address,
    /// Sign and submit a transaction, then print its receipt
    Send {
        #[arg(long, value_parser = parse_address)]
        to: Address,
        #[arg(long, value_parser = parse_bytes)]
        data: Bytes,
        #[arg(long, value_parser = parse_u256, default_value = "0")]
        value: U256,
        #[arg(long, value_parser = parse_u256)]
        nonce: Option<U256>,
    },
}

fn parse_address(s: &str) -> Result<Address, String> {
    s.parse().map_err(|e| format!("invalid address: {}", e))
}

fn parse_bytes(s: &str) -> Result<Bytes, String> {
    s.parse().map_err(|e| format!("invalid hex data: {}", e))
}

fn parse_u256(s: &str) -> Result<U256, String> {
    s.parse().map_err(|e| format!("invalid number: {}", e))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    init_logging(&config.observability);

    tracing::info!(config = %cli.config.display(), "ledger-channel v0.1.0 starting");

    match cli.command {
        Commands::Address => {
            let scheme = SignatureScheme::try_from(config.system.encrypt_type)?;
            let resources = ResourceResolver::from_config(&config.resources);
            match identity::resolve(&config.system, scheme, &resources)? {
                Some(identity) => println!("{} ({})", identity.address(), scheme),
                None => eprintln!("No signing identity configured"),
            }
        }
        Commands::Status { watch } => {
            let context = LedgerContext::bootstrap(&config).await?;
            print_status(&context).await;
            if watch {
                let mut ticker = tokio::time::interval(WATCH_INTERVAL);
                ticker.tick().await;
                let signal = wait_for_shutdown_signal();
                tokio::pin!(signal);
                loop {
                    tokio::select! {
                        _ = &mut signal => break,
                        _ = ticker.tick() => print_status(&context).await,
                    }
                }
            }
            context.shutdown().await;
        }
        Commands::Send {
            to,
            data,
            value,
            nonce,
        } => {
            let context = LedgerContext::bootstrap(&config).await?;
            let outcome = context
                .dispatcher()
                .submit(Some(to), data, value, nonce)
                .await;
            context.shutdown().await;
            let receipt = outcome?;
            println!("{}", serde_json::to_string_pretty(&receipt)?);
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn print_status(context: &LedgerContext) {
    for status in context.status() {
        println!(
            "{:<24} {:?} (failures: {})",
            status.endpoint.to_string(),
            status.state,
            status.consecutive_failures
        );
    }
    match context.client().get_block_number().await {
        Ok(number) => println!("group {} block number: {}", context.client().group_id(), number),
        Err(e) => eprintln!("block number unavailable: {}", e),
    }
    if let Ok(version) = context.client().get_client_version().await {
        println!("node version: {}", version);
    }
}
