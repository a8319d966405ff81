use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use mediastore::{FieldKind, ItemKey, PersistenceService, StoreConfig};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mediastore")]
#[command(about = "Inspect and edit the media metadata store")]
struct Cli {
    /// Backing file (defaults to $MEDIA_STORE_PATH or ~/.media_uploader/media_persistence.json)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print one field of an item
    Get { key: String, field: FieldKind },
    /// Validate and store one field of an item
    Set {
        key: String,
        field: FieldKind,
        value: String,
    },
    /// Remove one field of an item
    Clear { key: String, field: FieldKind },
    /// Remove every field of an item
    Remove { key: String },
    /// List stored item keys
    Keys,
    /// Print every valid field of an item
    Show { key: String },
    /// Print store statistics
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Remove items whose file no longer exists
    Cleanup,
    /// Check an item against the upload rules
    Check { key: String },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let service = match cli.store {
        Some(path) => PersistenceService::open(StoreConfig::new(&path))
            .with_context(|| format!("Failed to open store '{}'", path.display()))?,
        None => PersistenceService::open_default().context("Failed to open default store")?,
    };

    let outcome = run(&service, cli.command);
    service
        .shutdown()
        .with_context(|| format!("Failed to persist store '{}'", service.path().display()))?;
    outcome
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(service: &PersistenceService, command: Command) -> Result<()> {
    match command {
        Command::Get { key, field } => {
            let key = ItemKey::new(&key);
            match service.get_field(&key, field)? {
                Some(value) => println!("{}", value),
                None => return Err(anyhow!("No {} stored for '{}'", field, key)),
            }
        }
        Command::Set { key, field, value } => {
            let key = ItemKey::new(&key);
            service.save_field(&key, field, Some(&value))?;
            println!("Saved {} for {}", field, key);
        }
        Command::Clear { key, field } => {
            let key = ItemKey::new(&key);
            if service.clear_field(&key, field)? {
                println!("Cleared {} for {}", field, key);
            } else {
                println!("Nothing to clear");
            }
        }
        Command::Remove { key } => {
            let key = ItemKey::new(&key);
            if service.remove_item(&key)? {
                println!("Removed {}", key);
            } else {
                println!("No entry for {}", key);
            }
        }
        Command::Keys => {
            for key in service.keys()? {
                println!("{}", key);
            }
        }
        Command::Show { key } => {
            let key = ItemKey::new(&key);
            let fields = service.item_fields(&key)?;
            if fields.is_empty() {
                println!("No entry for {}", key);
            }
            for (field, value) in fields {
                println!("{:<16}{}", field, value);
            }
        }
        Command::Stats { json } => {
            let stats = service.get_statistics()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("{}", stats);
            }
        }
        Command::Cleanup => {
            let removed = service.cleanup_missing_files()?;
            println!("Removed {} entries", removed);
        }
        Command::Check { key } => {
            let key = ItemKey::new(&key);
            let violations = service.upload_readiness(&key)?;
            if violations.is_empty() {
                println!("{} is ready for upload", key);
            } else {
                for violation in &violations {
                    println!("{}: {}", violation.field, violation.message);
                }
                return Err(anyhow!("{} rule violation(s)", violations.len()));
            }
        }
    }
    Ok(())
}
