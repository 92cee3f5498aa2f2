//! Bulkbuy - commerce API server
//!
//! Runs the Bulkbuy HTTP API: a hardened request pipeline in front of the
//! user, product, cart, order and search routes.

use bulkbuy_core::{BulkbuyConfig, InMemoryProductStore, ProductStore, Result};
use bulkbuy_infra::{bootstrap, init_logger, integrate, LoggerConfig, PgProductStore};
use bulkbuy_serve::{AppState, ServerBuilder};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "bulkbuy")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Bulkbuy commerce API server")]
#[command(long_about = r#"
Bulkbuy serves the commerce API behind a fixed request pipeline: security
headers, CORS, per-client rate limiting, body limits, input sanitization,
parameter pollution protection and compression.

Configuration comes from built-in defaults, an optional file (--config) and
BULKBUY__* environment variables, in that order.
"#)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format (json, pretty)
    #[arg(short, long, default_value = "pretty", global = true)]
    output: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Override the configured host
        #[arg(long)]
        host: Option<String>,

        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Load and validate configuration, then print it
    CheckConfig,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = BulkbuyConfig::load(cli.config.as_deref())?;

    let mut logger = LoggerConfig::from(&config.logging);
    if cli.verbose {
        logger.level = "debug".to_string();
    }
    if cli.output == "json" {
        logger.json_format = true;
    }
    init_logger(logger)?;

    match cli.command {
        Some(Commands::Serve { host, port }) => handle_serve(config, host, port).await,
        Some(Commands::CheckConfig) => handle_check_config(&config, &cli),
        Some(Commands::Version) => handle_version(&cli),
        None => handle_serve(config, None, None).await,
    }
}

async fn handle_serve(
    mut config: BulkbuyConfig,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    info!(
        "Starting Bulkbuy v{} in {} mode",
        env!("CARGO_PKG_VERSION"),
        config.mode
    );

    let products: Arc<dyn ProductStore> = match integrate(&config.database).await? {
        Some(pool) => {
            let store = PgProductStore::new(pool);
            match store.ensure_schema().await {
                Ok(()) => {
                    info!("Product catalog backed by PostgreSQL");
                    Arc::new(store)
                }
                Err(e) if config.database.fail_fast => return Err(e),
                Err(e) => {
                    warn!(error = %e, "Falling back to the in-memory product catalog");
                    Arc::new(InMemoryProductStore::new())
                }
            }
        }
        None => {
            warn!("Using the in-memory product catalog");
            Arc::new(InMemoryProductStore::new())
        }
    };
    let state = AppState::with_products(products);

    bootstrap(state.users.as_ref(), &config.super_admin).await;

    ServerBuilder::new()
        .config(config)
        .state(state)
        .build()
        .start()
        .await
}

fn handle_check_config(config: &BulkbuyConfig, cli: &Cli) -> Result<()> {
    match cli.output.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(config)?),
        _ => {
            println!("Configuration is valid");
            println!("  mode:        {}", config.mode);
            println!("  listen:      {}", config.bind_address());
            println!(
                "  rate limit:  {} requests / {}s under {}",
                config.rate_limit.max_requests,
                config.rate_limit.window_secs,
                config.rate_limit.path_prefix
            );
            println!("  body limit:  {} bytes", config.body_limit_bytes);
            println!(
                "  database:    {}",
                if config.database.url.is_some() {
                    "postgresql"
                } else {
                    "in-memory"
                }
            );
        }
    }
    Ok(())
}

fn handle_version(cli: &Cli) -> Result<()> {
    match cli.output.as_str() {
        "json" => {
            let info = serde_json::json!({
                "name": "bulkbuy",
                "version": env!("CARGO_PKG_VERSION"),
                "core": bulkbuy_core::VERSION,
                "serve": bulkbuy_serve::VERSION,
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        _ => {
            println!("{}", bulkbuy_core::version_info());
            println!("bulkbuy-serve v{}", bulkbuy_serve::VERSION);
        }
    }
    Ok(())
}
