//! Forage CLI
//!
//! Command-line access to a Forage store kept on disk.
//!
//! # Commands
//!
//! - `drivers` - Show which drivers the on-disk host supports
//! - `get` / `set` / `remove` - Read, write and delete single values
//! - `keys` / `length` / `dump` - List the store's contents
//! - `clear` / `drop` - Remove data

mod commands;
mod error;
mod host;

use clap::{Parser, Subcommand};
use error::CliResult;
use forage_core::{Config, LocalForage};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Forage command-line storage tools.
#[derive(Parser)]
#[command(name = "forage")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the host's storage files
    #[arg(global = true, short, long, default_value = ".forage")]
    data_dir: PathBuf,

    /// Database name
    #[arg(global = true, short, long)]
    name: Option<String>,

    /// Store name
    #[arg(global = true, short, long)]
    store: Option<String>,

    /// Preferred driver, may be repeated in order of preference
    #[arg(global = true, long = "driver")]
    drivers: Vec<String>,

    /// JSON file with a configuration record
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show registered drivers and whether this host supports them
    Drivers {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the value stored under a key
    Get {
        /// Key to read
        key: String,
    },

    /// Store a JSON value under a key
    Set {
        /// Key to write
        key: String,
        /// Value as JSON
        value: String,
    },

    /// Remove a key
    Remove {
        /// Key to remove
        key: String,
    },

    /// List keys
    Keys,

    /// Count stored values
    Length,

    /// Remove every value in the store
    Clear,

    /// Print every entry as a JSON line
    Dump {
        /// Stop after this many entries
        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Delete the store, or the whole database with --database
    Drop {
        /// Drop every store in the database
        #[arg(long)]
        database: bool,
    },
}

impl Cli {
    fn config(&self) -> CliResult<Config> {
        let mut config = match &self.config {
            Some(path) => commands::load_config(path)?,
            None => Config::default(),
        };
        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        if let Some(store) = &self.store {
            config = config.store_name(store);
        }
        if !self.drivers.is_empty() {
            config.driver_order = Some(self.drivers.clone());
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
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

    let env = host::open(&cli.data_dir)?;
    let forage = LocalForage::with_config(env, cli.config()?)?;

    match cli.command {
        Commands::Drivers { format } => commands::drivers::run(&forage, &format)?,
        Commands::Get { key } => commands::items::get(&forage, &key).await?,
        Commands::Set { key, value } => commands::items::set(&forage, &key, &value).await?,
        Commands::Remove { key } => commands::items::remove(&forage, &key).await?,
        Commands::Keys => commands::items::keys(&forage).await?,
        Commands::Length => commands::items::length(&forage).await?,
        Commands::Clear => commands::items::clear(&forage).await?,
        Commands::Dump { limit } => commands::items::dump(&forage, limit).await?,
        Commands::Drop { database } => commands::items::drop(&forage, database).await?,
    }

    Ok(())
}
