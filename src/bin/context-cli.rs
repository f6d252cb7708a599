use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use substrate_context::accounts::development_accounts;
use substrate_context::chain::{ApiOptions, ChainConnection, ChainConnector, ChainEvent, WsConnector};
use substrate_context::config::{load_config, validate_config};
use substrate_context::definitions::nft;
use substrate_context::resilience::ReconnectPolicy;

#[derive(Parser)]
#[command(name = "context-cli")]
#[command(about = "Inspection CLI for the Substrate context", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the NFT type definitions as codec JSON
    Types,
    /// Check that every referenced type is defined
    CheckTypes,
    /// Validate a config file and print the effective config
    Config { path: PathBuf },
    /// List the development accounts
    DevAccounts,
    /// Connect to a node and print its runtime facts
    ChainInfo {
        #[arg(short, long, default_value = "ws://127.0.0.1:9944")]
        endpoint: String,

        #[arg(short, long, default_value_t = 10)]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Types => {
            let definitions = nft::definitions()?;
            print_json(&serde_json::to_value(&definitions)?)?;
        }
        Commands::CheckTypes => {
            let types = nft::types()?;
            let unresolved = types.unresolved();
            if unresolved.is_empty() {
                println!("{} types, all references resolved", types.len());
            } else {
                eprintln!("Unresolved types: {}", unresolved.join(", "));
                std::process::exit(1);
            }
        }
        Commands::Config { path } => {
            let config = load_config(&path)?;
            if let Err(errors) = validate_config(&config) {
                for error in errors {
                    eprintln!("{}", error);
                }
                std::process::exit(1);
            }
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::DevAccounts => {
            for account in development_accounts() {
                println!(
                    "{:<8} {}",
                    account.meta.name.as_deref().unwrap_or_default(),
                    account.address
                );
            }
        }
        Commands::ChainInfo { endpoint, timeout_secs } => {
            chain_info(endpoint, Duration::from_secs(timeout_secs)).await?;
        }
    }

    Ok(())
}

async fn chain_info(endpoint: String, timeout: Duration) -> Result<(), Box<dyn std::error::Error>> {
    let options = ApiOptions {
        connect_timeout: timeout,
        request_timeout: timeout,
        reconnect: ReconnectPolicy::disabled(),
        ..ApiOptions::new(endpoint)
    };

    let connector: Arc<dyn ChainConnector> = Arc::new(WsConnector);
    let ChainConnection { api, mut events } = connector.open(&options)?;

    loop {
        match tokio::time::timeout(timeout * 2, events.recv()).await {
            Ok(Some(ChainEvent::Ready)) => break,
            Ok(Some(ChainEvent::Error(e))) => return Err(e.into()),
            Ok(Some(ChainEvent::Disconnected)) | Ok(None) => return Err("connection closed".into()),
            Ok(Some(ChainEvent::Connected)) => eprintln!("Connected to {}", api.endpoint()),
            Err(_) => return Err("timed out waiting for the node".into()),
        }
    }

    let runtime = api.runtime().ok_or("handshake finished without runtime info")?;
    print_json(&serde_json::json!({
        "endpoint": api.endpoint(),
        "runtime": runtime,
        "ss58Format": runtime.ss58_format(),
    }))?;
    Ok(())
}

fn print_json(value: &Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
