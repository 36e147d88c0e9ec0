//! Wallet Watch CLI
//!
//! Command-line interface for wallet records:
//! - Watch a record live in the terminal
//! - Create a wallet the way the dashboard form does
//! - Show or credit a stored record
//! - Check a running dashboard server

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wallet_watch::config::{generate_default_config, Config, StoreBackend};
use wallet_watch::creator::{CreateOutcome, CreatorConfig, RecordCreator};
use wallet_watch::record::{fields, Amount, WalletRecord};
use wallet_watch::store::{self, DocumentPath, DocumentStore, Fields};
use wallet_watch::view::{balance_text, revenue_text, MemoryView};
use wallet_watch::watcher::{RecordWatcher, ViewBindings, WatchHandle};

#[derive(Parser)]
#[command(name = "wallet-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Watch and manage wallet records")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: standard locations, then environment)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Dashboard server URL (for `status`)
    #[arg(long, default_value = "http://localhost:8090", global = true)]
    pub api_url: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Watch a record and print every change until Ctrl-C
    Watch {
        /// Record key (default: dashboard.watch_key)
        key: Option<String>,
    },

    /// Create (or replace) a wallet
    Create {
        /// Owner display name
        owner: String,
        /// Linked messaging id; becomes the record key
        linked_id: String,
    },

    /// Print a stored record
    Show {
        key: String,
    },

    /// Merge new balance and/or revenue into an existing record
    Credit {
        key: String,
        /// New coin balance
        #[arg(short, long)]
        balance: Option<i64>,
        /// New monthly revenue
        #[arg(short, long)]
        revenue: Option<f64>,
    },

    /// Show the status of a running dashboard server
    Status,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<Config, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    config.validate()?;

    if config.store.backend == StoreBackend::Memory {
        eprintln!("Note: using the in-memory store; nothing outlives this command.");
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wallet_watch=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Watch { key } => {
            let config = load_config(cli.config.as_ref())?;
            let key = key.unwrap_or_else(|| config.dashboard.watch_key.clone());
            let store = store::connect(&config.store)?;

            let bindings = ViewBindings {
                balance_element: config.dashboard.balance_element.clone(),
                income_element: config.dashboard.income_element.clone(),
            };
            let view = Arc::new(
                MemoryView::with_elements([
                    bindings.balance_element.clone(),
                    bindings.income_element.clone(),
                ])
                .echo(),
            );

            let watcher = RecordWatcher::new(
                Arc::clone(&store),
                view,
                config.store.collection.clone(),
                bindings,
            );
            let handle = watcher.watch(&key).await?;
            println!("Watching {}/{} (Ctrl-C to stop)", config.store.collection, key);

            let interrupted = tokio::select! {
                _ = tokio::signal::ctrl_c() => true,
                _ = wait_for_end(&handle) => false,
            };
            let result = if interrupted {
                handle.stop().await
            } else {
                handle.join().await
            };
            store.shutdown().await?;
            result?;
        }

        Commands::Create { owner, linked_id } => {
            let config = load_config(cli.config.as_ref())?;
            let store = store::connect(&config.store)?;
            let view = Arc::new(MemoryView::with_elements(Vec::<String>::new()).echo());

            let creator = RecordCreator::new(
                Arc::clone(&store),
                view,
                CreatorConfig::from_config(&config.store, &config.dashboard),
            );
            let outcome = creator.create_record(&owner, &linked_id).await;
            store.shutdown().await?;

            if !matches!(outcome, CreateOutcome::Created { .. }) {
                std::process::exit(1);
            }
        }

        Commands::Show { key } => {
            let config = load_config(cli.config.as_ref())?;
            let store = store::connect(&config.store)?;
            let path = DocumentPath::new(config.store.collection.as_str(), key.as_str())?;

            let snapshot = store.get(&path).await?;
            store.shutdown().await?;

            match snapshot.document {
                Some(document) => print_record(&WalletRecord::from_document(&document)),
                None => {
                    eprintln!("No record at {}", path);
                    std::process::exit(1);
                }
            }
        }

        Commands::Credit {
            key,
            balance,
            revenue,
        } => {
            if balance.is_none() && revenue.is_none() {
                eprintln!("Nothing to update: pass --balance and/or --revenue");
                std::process::exit(2);
            }

            let config = load_config(cli.config.as_ref())?;
            let store = store::connect(&config.store)?;
            let path = DocumentPath::new(config.store.collection.as_str(), key.as_str())?;

            let mut update = Fields::new();
            if let Some(balance) = balance {
                update.insert(fields::BALANCE.to_string(), Amount::Integer(balance).into());
            }
            if let Some(revenue) = revenue {
                update.insert(fields::MONTHLY_REVENUE.to_string(), Amount::Decimal(revenue).into());
            }

            let result = store.update(&path, update).await;
            store.shutdown().await?;
            result?;
            println!("Updated {}", path);
        }

        Commands::Status => {
            let client = reqwest::Client::new();
            let response = client
                .get(format!("{}/health", cli.api_url))
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let health: serde_json::Value = resp.json().await?;

                    println!("Wallet Watch v{}", env!("CARGO_PKG_VERSION"));
                    println!();
                    println!("Status:  {}", health["status"].as_str().unwrap_or("unknown"));
                    println!(
                        "Store:   {} ({})",
                        health["store"].as_str().unwrap_or("unknown"),
                        health["backend"].as_str().unwrap_or("unknown")
                    );
                    if let Some(watch) = health.get("watch") {
                        println!(
                            "Watch:   {} ({}, {} snapshots)",
                            watch["key"].as_str().unwrap_or("?"),
                            if watch["running"].as_bool().unwrap_or(false) {
                                "running"
                            } else {
                                "stopped"
                            },
                            watch["snapshots_received"].as_u64().unwrap_or(0)
                        );
                    }
                    println!(
                        "Clients: {}",
                        health["ws_connections"].as_u64().unwrap_or(0)
                    );
                    if let Some(uptime) = health["uptime_seconds"].as_u64() {
                        println!("Uptime:  {}", format_duration(uptime));
                    }
                }
                Ok(resp) => {
                    eprintln!("Server unhealthy: {}", resp.status());
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("Cannot connect to {}: {}", cli.api_url, e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Config { output } => {
            let config = generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

/// Resolves once the watch task has finished on its own
async fn wait_for_end(handle: &WatchHandle) {
    while handle.is_running() {
        tokio::time::sleep(std::time::Duration::from_millis(250)).await;
    }
}

fn print_record(record: &WalletRecord) {
    let text = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());

    println!("Key:       {}", record.key);
    println!("Owner:     {}", text(&record.owner));
    println!("Linked id: {}", text(&record.linked_id));
    println!("Balance:   {}", balance_text(record.balance));
    println!("Revenue:   {}", revenue_text(record.monthly_revenue));
    println!("Tier:      {}", text(&record.tier));
    println!("Parent:    {}", text(&record.parent_key));
    match record.created_at {
        Some(created) => println!("Created:   {}", created.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("Created:   -"),
    }
    if record.balance.is_zero() && record.monthly_revenue.is_zero() {
        println!();
        println!("(no coins or revenue yet)");
    }
}

fn format_duration(seconds: u64) -> String {
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let minutes = (seconds % 3600) / 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m {}s", minutes, seconds % 60)
    }
}
