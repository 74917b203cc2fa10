//! # catalog
//!
//! Command-line front end for the offline-first product catalog.
//!
//! ```text
//! catalog [--config FILE] [--db FILE] [--offline] <COMMAND>
//!
//!   list      products in the local store
//!   show      one product by local id
//!   scan      look a barcode up (local, then server when online)
//!   add       create a product locally and queue it
//!   update    edit a product locally and queue it
//!   delete    delete a product locally and queue it
//!   pending   queued changes
//!   sync      run one push/pull attempt
//!   status    sync status snapshot
//!   reset     wipe the local store
//!   run       keep syncing in the background until Ctrl-C
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod context;

use context::AppContext;

#[derive(Parser)]
#[command(
    name = "catalog",
    about = "Offline-first product catalog",
    version = env!("CARGO_PKG_VERSION"),
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: platform config dir)
    #[arg(short, long, global = true, env = "CATALOG_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file, overrides the config
    #[arg(short, long, global = true)]
    db: Option<PathBuf>,

    /// Never contact the server
    #[arg(long, global = true)]
    offline: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "List products in the local store")]
    List {
        #[arg(short, long, help = "Only products whose name or barcode contains this")]
        search: Option<String>,

        #[arg(short, long, default_value = "50", help = "Maximum results when searching")]
        limit: u32,

        #[arg(long, help = "Output as JSON")]
        json: bool,
    },

    #[command(about = "Show one product")]
    Show {
        #[arg(help = "Local product id")]
        id: i64,

        #[arg(long, help = "Output as JSON")]
        json: bool,
    },

    #[command(about = "Look a product up by barcode")]
    Scan {
        barcode: String,

        #[arg(long, help = "Output as JSON")]
        json: bool,
    },

    #[command(about = "Add a product")]
    Add {
        #[arg(short, long)]
        name: String,

        #[arg(short, long, help = "Price in currency units, e.g. 19.99")]
        price: f64,

        #[arg(short, long)]
        barcode: String,

        #[arg(long)]
        description: Option<String>,
    },

    #[command(about = "Edit a product; omitted fields are left unchanged")]
    Update {
        id: i64,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        price: Option<f64>,

        #[arg(short, long)]
        barcode: Option<String>,

        #[arg(long, help = "New description; an empty string clears it")]
        description: Option<String>,
    },

    #[command(about = "Delete a product")]
    Delete { id: i64 },

    #[command(about = "Show queued changes")]
    Pending {
        #[arg(long, help = "Include already synced changes")]
        all: bool,

        #[arg(short, long, default_value = "20", help = "Maximum entries with --all")]
        limit: u32,
    },

    #[command(about = "Run one sync attempt now")]
    Sync,

    #[command(about = "Show sync status")]
    Status {
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },

    #[command(about = "Delete all local products, queued changes and sync state")]
    Reset {
        #[arg(long, help = "Confirm that unsynced changes may be lost")]
        yes: bool,
    },

    #[command(about = "Sync in the background until interrupted")]
    Run,
}

/// Initializes the tracing subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=catalog_sync=trace` - Trace the sync engine only
/// - Default: INFO, DEBUG for the catalog crates
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,catalog=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = catalog_sync::CatalogConfig::load(cli.config.clone())
        .context("Failed to load configuration")?;
    if let Some(db) = cli.db {
        config.database.path = Some(db);
    }

    let ctx = AppContext::open(config, cli.offline)
        .await
        .context("Failed to open the catalog")?;

    let result = match cli.command {
        Commands::List {
            search,
            limit,
            json,
        } => commands::product::list(&ctx, search.as_deref(), limit, json).await,
        Commands::Show { id, json } => commands::product::show(&ctx, id, json).await,
        Commands::Scan { barcode, json } => commands::product::scan(&ctx, &barcode, json).await,
        Commands::Add {
            name,
            price,
            barcode,
            description,
        } => commands::product::add(&ctx, name, price, barcode, description).await,
        Commands::Update {
            id,
            name,
            price,
            barcode,
            description,
        } => commands::product::update(&ctx, id, name, price, barcode, description).await,
        Commands::Delete { id } => commands::product::delete(&ctx, id).await,
        Commands::Pending { all, limit } => commands::sync::pending(&ctx, all, limit).await,
        Commands::Sync => commands::sync::sync_once(&ctx).await,
        Commands::Status { json } => commands::sync::status(&ctx, json).await,
        Commands::Reset { yes } => commands::sync::reset(&ctx, yes).await,
        Commands::Run => commands::sync::run(&ctx).await,
    };

    ctx.close().await;
    result
}
