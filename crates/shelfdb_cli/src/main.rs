//! ShelfDB CLI
//!
//! Command-line access to ShelfDB stores.
//!
//! # Commands
//!
//! - `set` / `get` / `delete` / `ttl` - Per-key operations
//! - `keys` - List the keys of a collection
//! - `delete-where` - Delete entries by key or value pattern
//! - `shrink` - Rewrite the log down to its live entries
//! - `inspect` - Display log statistics without opening the store

mod commands;

use clap::{Parser, Subcommand};
use shelfdb_core::{Handle, Mode, Options};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// ShelfDB command-line tools.
#[derive(Parser)]
#[command(name = "shelfdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store file
    #[arg(global = true, short, long, default_value = shelfdb_core::DEFAULT_FILE)]
    file: PathBuf,

    /// Persistence mode (memory, file)
    #[arg(global = true, short, long, default_value = "file")]
    mode: String,

    /// Collection to operate on
    #[arg(global = true, short, long, default_value = shelfdb_core::DEFAULT_COLLECTION)]
    collection: String,

    /// Output format (text, json)
    #[arg(global = true, long, default_value = "text")]
    format: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a value
    Set {
        /// Logical key
        key: String,

        /// Value to store
        value: String,

        /// Lifetime in seconds; omit for no expiration
        #[arg(short, long)]
        ttl: Option<u64>,
    },

    /// Print a value
    Get {
        /// Logical key
        key: String,
    },

    /// Delete a key
    Delete {
        /// Logical key
        key: String,

        /// Succeed even if the key does not exist
        #[arg(long)]
        if_exists: bool,
    },

    /// Print the remaining lifetime of a key
    Ttl {
        /// Logical key
        key: String,
    },

    /// List the keys of the collection
    Keys,

    /// Delete every entry whose key or value matches a glob
    DeleteWhere {
        /// Glob over the physical key (`collection:key`)
        #[arg(short, long)]
        key: Option<String>,

        /// Glob over the value
        #[arg(short = 'V', long)]
        value: Option<String>,
    },

    /// Rewrite the log down to its live entries
    Shrink,

    /// Display log statistics
    Inspect {
        /// Show per-collection key counts
        #[arg(long)]
        collections: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let json = cli.format == "json";

    match cli.command {
        Commands::Inspect { collections } => {
            commands::inspect::run(&cli.file, collections, json)?;
            return Ok(());
        }
        Commands::Version => {
            println!("ShelfDB CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("ShelfDB Core v{}", shelfdb_core::VERSION);
            return Ok(());
        }
        _ => {}
    }

    let mode: Mode = cli.mode.parse()?;
    let mut handle = Handle::open(
        Options::new()
            .file(&cli.file)
            .mode(mode)
            .collection(&cli.collection),
    )?;

    let outcome = match cli.command {
        Commands::Set { key, value, ttl } => commands::data::set(&handle, &key, &value, ttl, json),
        Commands::Get { key } => commands::data::get(&handle, &key, json),
        Commands::Delete { key, if_exists } => {
            commands::data::delete(&handle, &key, if_exists, json)
        }
        Commands::Ttl { key } => commands::data::ttl(&handle, &key, json),
        Commands::Keys => commands::data::keys(&handle, json),
        Commands::DeleteWhere { key, value } => {
            commands::data::delete_where(&handle, key.as_deref(), value.as_deref(), json)
        }
        Commands::Shrink => commands::shrink::run(&handle, json),
        Commands::Inspect { .. } | Commands::Version => Ok(()),
    };

    handle.close()?;
    outcome
}
