//! # Dugout CLI
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dugout init` | Create the SQLite database and run schema migrations |
//! | `dugout run` | Scrape today's batch of targets |
//! | `dugout diagnostic` | Scrape a fixed sample of targets, persist nothing |
//! | `dugout status` | Print scheduler coverage and recent sessions |
//! | `dugout recover` | Re-attempt targets absent from the store |
//! | `dugout cleanup` | Delete players with stat-value names |
//!
//! All commands accept a `--config` flag pointing to a TOML configuration
//! file. See `config/dugout.example.toml` for a full example.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use dugout::{cleanup, config, db, migrate, orchestrate, status};

#[derive(Parser)]
#[command(
    name = "dugout",
    about = "College baseball roster and statistics harvester",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/dugout.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables. Idempotent;
    /// running it multiple times is safe.
    Init,

    /// Scrape today's batch of targets.
    ///
    /// Initial phase works through the directory in tier order; steady state
    /// refreshes each target on its tier cadence. Targets that parse to zero
    /// players get a headless-browser retry at the end of the run.
    Run {
        /// Scrape even if the season has not started yet.
        #[arg(long)]
        force: bool,

        /// List the targets that would be scraped without fetching anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Scrape a fixed sample of targets covering the known platform
    /// variants and print what each yields. Persists nothing.
    Diagnostic,

    /// Print scheduler coverage and recent session history.
    Status,

    /// Re-attempt every target absent from the store.
    Recover {
        /// List recovery candidates without fetching anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete previously saved players whose name is a stat value.
    Cleanup,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.store.path).await?;
            migrate::run_migrations(&pool).await?;
            println!("Database initialized successfully.");
        }
        Commands::Run { force, dry_run } => {
            orchestrate::run(&cfg, force, dry_run).await?;
        }
        Commands::Diagnostic => {
            orchestrate::diagnostic(&cfg).await?;
        }
        Commands::Status => {
            status::status(&cfg).await?;
        }
        Commands::Recover { dry_run } => {
            orchestrate::recover(&cfg, dry_run).await?;
        }
        Commands::Cleanup => {
            cleanup::cleanup(&cfg).await?;
        }
    }

    Ok(())
}
