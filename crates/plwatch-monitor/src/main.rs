//! plwatch - periodic P/L monitor entry point.

use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};
use plwatch_core::{ContextKey, PositionId, PositionPatch, Price};
use plwatch_monitor::{commands, AppConfig, Application};
use tracing::{info, warn};

/// Periodic profit/loss monitor with loss-to-profit alerts
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via PLWATCH_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Monitor every configured context until Ctrl-C
    Run,
    /// Edit tracked positions
    Position {
        #[command(subcommand)]
        action: PositionAction,
    },
    /// Compare tracked positions with the positions on the page
    Reconcile {
        context: String,
        /// Discovered count; read from the context's snapshot if omitted
        #[arg(long)]
        discovered: Option<usize>,
    },
    /// List contexts with tracked positions
    Contexts,
}

#[derive(Subcommand, Debug)]
enum PositionAction {
    /// Create or update a position
    Set {
        context: String,
        id: PositionId,
        /// Entry value per unit (negative = credit)
        #[arg(long, allow_hyphen_values = true)]
        entry: Option<Price>,
        /// Contract count (>= 1)
        #[arg(long)]
        size: Option<u32>,
        /// Include in the total
        #[arg(long, conflicts_with = "deselect")]
        select: bool,
        /// Exclude from the total
        #[arg(long)]
        deselect: bool,
    },
    /// Delete a position
    Remove { context: String, id: PositionId },
    /// Show tracked positions
    List { context: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = AppConfig::resolve_path(args.config);
    let config = AppConfig::load(&config_path)?;

    plwatch_telemetry::init_logging(&config.telemetry.log_filter)?;
    info!(config_path = %config_path, "plwatch v{}", env!("CARGO_PKG_VERSION"));
    if !Path::new(&config_path).exists() {
        warn!(path = %config_path, "Config file not found, using defaults");
    }

    match args.command {
        Command::Run => {
            let app = Application::new(config)?;
            app.run().await?;
        }
        Command::Position { action } => {
            let store = commands::open_store(&config)?;
            match action {
                PositionAction::Set {
                    context,
                    id,
                    entry,
                    size,
                    select,
                    deselect,
                } => {
                    let context = ContextKey::new(context)?;
                    let mut patch = PositionPatch::new();
                    if let Some(entry) = entry {
                        patch = patch.entry_cost(entry);
                    }
                    if let Some(size) = size {
                        patch = patch.size(size);
                    }
                    if select || deselect {
                        patch = patch.selected(select);
                    }
                    let position = commands::position_set(&store, &context, &id, &patch)?;
                    println!("{}", commands::format_position(&position));
                }
                PositionAction::Remove { context, id } => {
                    let context = ContextKey::new(context)?;
                    if commands::position_remove(&store, &context, &id)? {
                        println!("removed {id}");
                    } else {
                        println!("{id} not tracked");
                    }
                }
                PositionAction::List { context } => {
                    let context = ContextKey::new(context)?;
                    print!("{}", commands::position_list(&store, &context));
                }
            }
        }
        Command::Reconcile {
            context,
            discovered,
        } => {
            let store = commands::open_store(&config)?;
            let context = ContextKey::new(context)?;
            let result = commands::reconcile(&config, &store, &context, discovered)?;
            println!("{result}");
        }
        Command::Contexts => {
            let store = commands::open_store(&config)?;
            for context in commands::contexts(&store)? {
                println!("{context}");
            }
        }
    }

    Ok(())
}
