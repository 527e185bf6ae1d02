//! # Stockline Agent
//!
//! Command-line host for the offline-first product synchronizer.
//!
//! ## Usage
//! ```text
//! stockline-agent add --name Pen --type Stationery --price 10 --tax 5 [--image pen.jpg]
//! stockline-agent list [--search pen]
//! stockline-agent refresh
//! stockline-agent drain
//! stockline-agent pending
//! stockline-agent notifications [--mark-viewed]
//! stockline-agent run
//!
//! Global: --config <file>  --connectivity auto|online|offline
//!         --data-dir <dir> --json
//! ```
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. init_tracing()            RUST_LOG or info,stockline=debug,sqlx=warn│
//! │  2. SyncConfig::load()        defaults → stockline.toml → STOCKLINE_*   │
//! │  3. CLI overrides             --connectivity, --data-dir                │
//! │  4. AppContext::build()       database, gateway, oracle, sink, trigger  │
//! │  5. run the subcommand        print report (text or JSON) to stdout     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Logs go to stderr so `--json` output can be piped.

mod commands;
mod error;

use std::fmt::Display;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use stockline_sync::{AppContext, ConnectivityMode, SyncConfig};

use crate::error::ApiResult;

// =============================================================================
// CLI
// =============================================================================

#[derive(Debug, Parser)]
#[command(name = "stockline-agent", version, about = "Offline-first product upload agent")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "STOCKLINE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Override connectivity detection
    #[arg(long, global = true)]
    connectivity: Option<ConnectivityMode>,

    /// Override the data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Add a product (uploads now, or queues while offline)
    Add {
        #[arg(long)]
        name: String,

        #[arg(long = "type")]
        product_type: String,

        #[arg(long)]
        price: f64,

        #[arg(long, default_value_t = 0.0)]
        tax: f64,

        /// JPEG to attach (path or file:// URI)
        #[arg(long)]
        image: Option<PathBuf>,
    },

    /// Show products (refreshes first when online)
    List {
        #[arg(long)]
        search: Option<String>,
    },

    /// Refresh the product cache from the server
    Refresh,

    /// Upload everything queued, once
    Drain,

    /// Show queued uploads
    Pending,

    /// Show upload notifications
    Notifications {
        /// Mark them all viewed afterwards
        #[arg(long)]
        mark_viewed: bool,
    },

    /// Run the background trigger until Ctrl-C
    Run,
}

// =============================================================================
// Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    init_tracing();

    let cli = Cli::parse();
    let json = cli.json;

    match execute(cli).await {
        Ok(output) => {
            if !output.is_empty() {
                println!("{output}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            debug!(code = ?err.code, "Command failed");
            if json {
                println!("{}", serde_json::to_string_pretty(&err)?);
            } else {
                eprintln!("Error: {err}");
            }
            Ok(ExitCode::from(err.code.exit_code()))
        }
    }
}

async fn execute(cli: Cli) -> ApiResult<String> {
    let mut config = SyncConfig::load(cli.config.clone())?;
    if let Some(mode) = cli.connectivity {
        config.connectivity.mode = mode;
    }
    if let Some(dir) = cli.data_dir.clone() {
        config.storage.data_dir = Some(dir);
    }
    debug!(mode = %config.connectivity.mode, "Configuration loaded");

    let mut ctx = AppContext::build(config).await?;
    let engine = ctx.engine().clone();
    let json = cli.json;

    let output = match cli.command {
        Command::Add {
            name,
            product_type,
            price,
            tax,
            image,
        } => render(commands::product::add(&engine, name, product_type, price, tax, image).await, json),
        Command::List { search } => render(commands::product::list(&engine, search).await, json),
        Command::Refresh => render(commands::product::refresh(&engine).await, json),
        Command::Drain => render(commands::sync::drain(&engine).await, json),
        Command::Pending => render(commands::sync::pending(&engine).await, json),
        Command::Notifications { mark_viewed } => {
            render(commands::notification::list(&engine, mark_viewed).await, json)
        }
        Command::Run => return commands::sync::run(&mut ctx).await.map(|_| String::new()),
    };

    ctx.shutdown().await;
    output
}

fn render<T: Serialize + Display>(result: ApiResult<T>, json: bool) -> ApiResult<String> {
    let value = result?;
    if json {
        Ok(serde_json::to_string_pretty(&value)?)
    } else {
        Ok(value.to_string())
    }
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=stockline=trace` - Trace for stockline crates only
/// - Default: `info,stockline=debug,sqlx=warn`
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,stockline=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
