//! # Scriptorium CLI (`scrib`)
//!
//! The `scrib` binary drives the content pipeline end to end. It provides
//! commands for database initialization, pipeline runs, resumption of
//! checkpointed threads, thread inspection, and direct index probes.
//!
//! ## Usage
//!
//! ```bash
//! scrib --config ./config/scrib.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scrib init` | Create the SQLite database and run schema migrations |
//! | `scrib run <url>` | Run the full pipeline for a creator profile |
//! | `scrib resume <thread>` | Resume a checkpointed thread |
//! | `scrib status [thread]` | List threads, or show one thread in detail |
//! | `scrib search <collection> "<query>"` | Probe the vector index |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! scrib init --config ./config/scrib.toml
//!
//! # Plan four weeks of content for a channel
//! scrib run https://youtube.com/@somecreator \
//!     --items ./scraped/somecreator.json --posts-per-week 3 --weeks 4
//!
//! # Pick up where a failed run stopped
//! scrib resume youtube_somecreator_20250301120000
//!
//! # Inspect all threads
//! scrib status
//!
//! # Probe what the index knows about hooks
//! scrib search youtube_somecreator "hook patterns that retain viewers"
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use scriptorium::run::RunArgs;
use scriptorium::{config, migrate, run};

/// Scriptorium CLI: a resumable pipeline that turns a scraped creator
/// profile into a scheduled calendar of ready-to-film scripts.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/scrib.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "scrib",
    about = "Scriptorium — turn a scraped creator profile into a scheduled calendar of ready-to-film scripts",
    version,
    long_about = "Scriptorium ingests a creator's scraped posts and transcripts, indexes them \
    into a local vector store, plans a pillar-balanced content calendar grounded in that niche \
    context, writes a full script for every planned post, and compiles the result into a single \
    reviewable document. Runs checkpoint after every stage and can be resumed."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/scrib.toml`. Database, embedding, generation,
    /// and output settings are read from this file.
    #[arg(long, global = true, default_value = "./config/scrib.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (collections, chunks, checkpoints). Safe to run more than once.
    Init,

    /// Run the full pipeline for a creator profile URL.
    ///
    /// Extracts the profile's content, indexes it into the vector store,
    /// plans a calendar, writes one script per planned post, and compiles
    /// everything into a single document. State is checkpointed after
    /// every stage.
    Run {
        /// Profile URL (youtube.com, youtu.be, instagram.com, or tiktok.com).
        url: String,

        /// Path to a JSON file of pre-scraped profile items.
        #[arg(long)]
        items: Option<PathBuf>,

        /// Posts to schedule per week.
        #[arg(long, default_value_t = 3)]
        posts_per_week: u32,

        /// Number of weeks the calendar covers.
        #[arg(long, default_value_t = 4)]
        weeks: u32,

        /// First day of the calendar (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        start_date: Option<String>,

        /// Path to a script template file whose structure scripts should
        /// follow.
        #[arg(long)]
        template: Option<PathBuf>,

        /// Path to a brand/positioning context file fed to the strategist.
        #[arg(long)]
        context: Option<PathBuf>,

        /// Output formats, comma-separated (`markdown`, `pdf`).
        #[arg(long, value_delimiter = ',')]
        formats: Option<Vec<String>>,

        /// Directory for compiled documents. Defaults to the configured
        /// output directory.
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Thread id for this run. Defaults to
        /// `<platform>_<username>_<timestamp>`.
        #[arg(long)]
        thread: Option<String>,

        /// Maximum number of profile items to extract.
        #[arg(long)]
        limit: Option<usize>,

        /// Record a stage failure in the checkpoint and stop cleanly
        /// instead of returning an error without saving.
        #[arg(long)]
        fail_soft: bool,

        /// Treat retrieval failures as empty niche context instead of
        /// failing the stage.
        #[arg(long)]
        degraded_retrieval: bool,
    },

    /// Resume a checkpointed thread from its last completed stage.
    ///
    /// Loads the thread's saved state, clears any recorded failure, and
    /// re-runs from the step after the last completed one. Finished
    /// artifacts are reused, never regenerated.
    Resume {
        /// Thread id printed by `scrib run` (also shown by `scrib status`).
        thread: String,

        /// Path to a JSON file of pre-scraped profile items. Only needed
        /// when the thread resumes at the extract step.
        #[arg(long)]
        items: Option<PathBuf>,

        /// Record a stage failure in the checkpoint and stop cleanly
        /// instead of returning an error without saving.
        #[arg(long)]
        fail_soft: bool,

        /// Treat retrieval failures as empty niche context instead of
        /// failing the stage.
        #[arg(long)]
        degraded_retrieval: bool,
    },

    /// Show pipeline threads and their progress.
    Status {
        /// Thread id to show in detail. Omit to list all threads.
        thread: Option<String>,
    },

    /// Probe the vector index with a raw query.
    ///
    /// Embeds the query with the configured provider and prints the
    /// top-scoring chunks from the given collection.
    Search {
        /// Collection name, e.g. `youtube_somecreator`.
        collection: String,

        /// The search query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("scriptorium=info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Run {
            url,
            items,
            posts_per_week,
            weeks,
            start_date,
            template,
            context,
            formats,
            out_dir,
            thread,
            limit,
            fail_soft,
            degraded_retrieval,
        } => {
            run::run_pipeline(
                &cfg,
                RunArgs {
                    url,
                    items,
                    posts_per_week,
                    weeks,
                    start_date,
                    template,
                    context,
                    formats,
                    out_dir,
                    thread,
                    limit,
                    fail_soft,
                    degraded_retrieval,
                },
            )
            .await?;
        }
        Commands::Resume {
            thread,
            items,
            fail_soft,
            degraded_retrieval,
        } => {
            run::run_resume(&cfg, &thread, items, fail_soft, degraded_retrieval).await?;
        }
        Commands::Status { thread } => {
            run::run_status(&cfg, thread.as_deref()).await?;
        }
        Commands::Search {
            collection,
            query,
            limit,
        } => {
            run::run_search(&cfg, &collection, &query, limit).await?;
        }
    }

    Ok(())
}
