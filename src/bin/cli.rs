//! PageKV CLI
//!
//! Command-line interface for inspecting and editing a PageKV file.
//! Every invocation opens the file, runs one command and commits.

use clap::{Parser, Subcommand};
use pagekv::{Config, Engine, Entity, OpenMode};
use tracing_subscriber::{fmt, EnvFilter};

/// PageKV CLI
#[derive(Parser, Debug)]
#[command(name = "pagekv-cli")]
#[command(about = "CLI for the PageKV embedded key-value store")]
#[command(version)]
struct Args {
    /// Backing file
    #[arg(short, long, default_value = "./pagekv.db")]
    file: String,

    /// Fail instead of creating the file when it is missing
    #[arg(long)]
    no_create: bool,

    /// Skip fsync on commit
    #[arg(long)]
    no_sync: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a text value
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Set an integer value
    SetInt {
        /// The key to set
        key: String,

        /// The value to set
        #[arg(allow_hyphen_values = true)]
        value: i32,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Print every stored entry in key order
    Dump,

    /// Verify the tree and print its shape
    Stats,

    /// Delete the backing file
    Free,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,pagekv=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> pagekv::Result<()> {
    let open_mode = if args.no_create {
        OpenMode::Open
    } else {
        OpenMode::OpenOrCreate
    };
    let config = Config::builder()
        .path(&args.file)
        .open_mode(open_mode)
        .sync_on_commit(!args.no_sync)
        .build();

    let mut engine = Engine::open(config)?;

    match args.command {
        Commands::Get { key } => match engine.try_get(&key)? {
            Some(Entity::Int(v)) => println!("{}", v),
            Some(Entity::Text(s)) => println!("{}", s),
            None => println!("(not found)"),
        },
        Commands::Set { key, value } => {
            engine.insert(&key, &Entity::Text(value))?;
            println!("OK");
        }
        Commands::SetInt { key, value } => {
            engine.insert(&key, &Entity::Int(value))?;
            println!("OK");
        }
        Commands::Del { key } => {
            let removed = engine.delete(&key)?;
            println!("{}", if removed { "deleted" } else { "(not found)" });
        }
        Commands::Dump => {
            for (key, value) in engine.tree().entries()? {
                if key.is_null() {
                    continue;
                }
                // Strip the key terminator the engine appends.
                let raw = &key.as_bytes()[..key.len() - 1];
                let shown = match Entity::from_value(&value) {
                    Ok(Entity::Int(v)) => v.to_string(),
                    Ok(Entity::Text(s)) => format!("{:?}", s),
                    Err(_) => format!("<{} raw bytes>", value.len()),
                };
                println!("{} = {}", String::from_utf8_lossy(raw), shown);
            }
        }
        Commands::Stats => {
            let stats = engine.tree().check()?;
            println!("depth:   {}", stats.depth);
            println!("pages:   {}", stats.pages);
            println!("entries: {}", stats.entries.saturating_sub(1));
        }
        Commands::Free => {
            engine.free()?;
            println!("freed {}", args.file);
            return Ok(());
        }
    }

    engine.close()
}
