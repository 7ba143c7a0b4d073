//! CLI command bodies for the `scrib` binary.
//!
//! Each function here wires live providers out of the [`Config`], drives the
//! pipeline or queries the stores, and prints a plain-text summary to stdout.
//! Stage code never prints; all terminal output for the CLI lives in this
//! module.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};

use crate::checkpoint::{CheckpointStore, SqliteCheckpointStore};
use crate::compiler::MarkdownRenderer;
use crate::config::Config;
use crate::db;
use crate::embedding::create_embedding_provider;
use crate::extraction::{detect_platform, extract_username, JsonFileExtractor};
use crate::generation::create_generation_provider;
use crate::models::CalendarConfig;
use crate::pipeline::{Pipeline, PipelineOptions, PipelineRequest, Providers};
use crate::state::{PipelineState, Step};
use crate::vector::{SqliteVectorStore, VectorStore};

/// Everything `scrib run` collects from the command line.
///
/// Kept as a plain struct so the clap layer stays in `main.rs`.
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub url: String,
    pub items: Option<PathBuf>,
    pub posts_per_week: u32,
    pub weeks: u32,
    pub start_date: Option<String>,
    pub template: Option<PathBuf>,
    pub context: Option<PathBuf>,
    pub formats: Option<Vec<String>>,
    pub out_dir: Option<PathBuf>,
    pub thread: Option<String>,
    pub limit: Option<usize>,
    pub fail_soft: bool,
    pub degraded_retrieval: bool,
}

/// Run the full pipeline for a profile URL under a new thread.
pub async fn run_pipeline(config: &Config, args: RunArgs) -> Result<()> {
    let platform = detect_platform(&args.url)?;
    let username = extract_username(&args.url, platform);

    if args.posts_per_week == 0 {
        bail!("--posts-per-week must be >= 1");
    }
    if args.weeks == 0 {
        bail!("--weeks must be >= 1");
    }

    let items_path = match args.items {
        Some(ref path) => path.clone(),
        None => bail!(
            "No extraction backend is configured for live scraping. \
             Provide --items <file> with pre-scraped profile JSON."
        ),
    };

    let start_date = match args.start_date.as_deref() {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .with_context(|| format!("Invalid --start-date '{}'. Expected YYYY-MM-DD.", raw))?,
        None => Utc::now().date_naive(),
    };

    let template = read_optional_file(args.template.as_deref(), "template")?;
    let user_context = read_optional_file(args.context.as_deref(), "context")?;

    let thread_id = args.thread.clone().unwrap_or_else(|| {
        format!(
            "{}_{}_{}",
            platform.as_str(),
            username,
            Utc::now().format("%Y%m%d%H%M%S")
        )
    });

    let pool = db::connect(config).await?;

    let providers = Providers {
        extraction: Arc::new(JsonFileExtractor::new(items_path)),
        embedding: Arc::from(create_embedding_provider(&config.embedding)?),
        generation: Arc::from(create_generation_provider(&config.generation)?),
        vectors: Arc::new(SqliteVectorStore::new(pool.clone())),
        checkpoints: Arc::new(SqliteCheckpointStore::new(pool.clone())),
        renderer: Arc::new(MarkdownRenderer::new()),
    };

    let options = PipelineOptions {
        fail_soft: args.fail_soft,
        degraded_retrieval: args.degraded_retrieval,
        chunk_words: config.chunking.max_words,
        retrieval: config.retrieval.clone(),
    };

    let request = PipelineRequest {
        thread_id,
        url: args.url.clone(),
        calendar: CalendarConfig::new(args.posts_per_week, args.weeks, start_date),
        template,
        user_context,
        output_dir: args.out_dir.unwrap_or_else(|| config.output.dir.clone()),
        output_formats: args.formats.unwrap_or_else(|| config.output.formats.clone()),
        extraction_limit: args.limit.unwrap_or(config.extraction.limit),
    };

    let pipeline = Pipeline::new(providers, options);
    let state = pipeline.run(request).await?;

    pool.close().await;

    print_summary("run", &state);

    if let Some(message) = &state.error {
        bail!(
            "pipeline failed at step '{}': {}",
            state.current_step.as_str(),
            message
        );
    }

    println!("ok");
    Ok(())
}

/// Resume a checkpointed thread from its last completed stage.
pub async fn run_resume(
    config: &Config,
    thread: &str,
    items: Option<PathBuf>,
    fail_soft: bool,
    degraded_retrieval: bool,
) -> Result<()> {
    let pool = db::connect(config).await?;
    let checkpoints = SqliteCheckpointStore::new(pool.clone());

    // A thread waiting at extract needs profile data on hand again; every
    // later stage replays from checkpointed artifacts.
    let existing = match checkpoints.load(thread).await? {
        Some(state) => state,
        None => {
            pool.close().await;
            bail!("No checkpoint found for thread {}", thread);
        }
    };
    if existing.current_step == Step::Extract && items.is_none() {
        pool.close().await;
        bail!(
            "Thread {} resumes at step 'extract'. \
             Provide --items <file> with pre-scraped profile JSON.",
            thread
        );
    }

    let providers = Providers {
        extraction: Arc::new(JsonFileExtractor::new(items.unwrap_or_default())),
        embedding: Arc::from(create_embedding_provider(&config.embedding)?),
        generation: Arc::from(create_generation_provider(&config.generation)?),
        vectors: Arc::new(SqliteVectorStore::new(pool.clone())),
        checkpoints: Arc::new(checkpoints),
        renderer: Arc::new(MarkdownRenderer::new()),
    };

    let options = PipelineOptions {
        fail_soft,
        degraded_retrieval,
        chunk_words: config.chunking.max_words,
        retrieval: config.retrieval.clone(),
    };

    let pipeline = Pipeline::new(providers, options);
    let state = pipeline.resume(thread).await?;

    pool.close().await;

    print_summary("resume", &state);

    if let Some(message) = &state.error {
        bail!(
            "pipeline failed at step '{}': {}",
            state.current_step.as_str(),
            message
        );
    }

    println!("ok");
    Ok(())
}

/// Show all threads, or one thread in detail.
pub async fn run_status(config: &Config, thread: Option<&str>) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteCheckpointStore::new(pool.clone());

    match thread {
        None => {
            let threads = store.list().await?;
            if threads.is_empty() {
                println!("No threads yet. Start one with `scrib run <url>`.");
            } else {
                println!(
                    "{:<40} {:<10} {:<12} {}",
                    "THREAD", "STATUS", "STEP", "UPDATED"
                );
                println!("{}", "-".repeat(80));
                for t in &threads {
                    println!(
                        "{:<40} {:<10} {:<12} {}",
                        t.thread_id,
                        t.status().as_str(),
                        t.step.as_str(),
                        format_ts(t.updated_at)
                    );
                }
            }
        }
        Some(id) => {
            let state = match store.load(id).await? {
                Some(state) => state,
                None => {
                    pool.close().await;
                    bail!("No checkpoint found for thread {}", id);
                }
            };
            print_thread_detail(&state);
        }
    }

    pool.close().await;
    Ok(())
}

/// Probe the vector index directly: embed the query and print the top hits.
pub async fn run_search(
    config: &Config,
    collection: &str,
    query: &str,
    limit: usize,
) -> Result<()> {
    let embedding = create_embedding_provider(&config.embedding)?;
    let vectors = embedding.embed(&[query.to_string()]).await?;
    let vector = match vectors.first() {
        Some(vector) => vector,
        None => bail!("Embedding provider returned no vector for the query"),
    };

    let pool = db::connect(config).await?;
    let store = SqliteVectorStore::new(pool.clone());
    let hits = store.search(collection, vector, limit).await?;
    pool.close().await;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    println!("Found {} result(s)", hits.len());
    println!();
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.2}] {} ({})",
            i + 1,
            hit.score,
            hit.chunk.title.as_deref().unwrap_or("(untitled)"),
            hit.chunk.kind.as_str()
        );
        let excerpt: String = hit.chunk.text.chars().take(160).collect();
        println!("   {}", excerpt.replace('\n', " "));
    }

    Ok(())
}

fn read_optional_file(path: Option<&std::path::Path>, what: &str) -> Result<Option<String>> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {} file: {}", what, path.display()))?;
            Ok(Some(content))
        }
        None => Ok(None),
    }
}

/// Print the per-stage artifact counts for a finished (or stopped) run.
fn print_summary(verb: &str, state: &PipelineState) {
    println!("{} {}", verb, state.thread_id);
    if let Some(extraction) = &state.extraction {
        println!(
            "  profile: {} @{}",
            extraction.platform, extraction.username
        );
        println!("  items extracted: {}", extraction.items.len());
    }
    if let Some(index) = &state.index_result {
        println!(
            "  chunks indexed: {} (collection {})",
            index.chunks_indexed, index.collection_name
        );
    }
    if let Some(calendar) = &state.calendar {
        println!("  briefs planned: {}", calendar.briefs.len());
    }
    if let Some(writer) = &state.writer_result {
        println!("  scripts written: {}", writer.scripts.len());
    }
    if let Some(compiled) = &state.compiler_result {
        if let Some(path) = &compiled.markdown_path {
            println!("  document: {}", path.display());
        }
    }
}

fn print_thread_detail(state: &PipelineState) {
    println!("--- Thread ---");
    println!("thread:       {}", state.thread_id);
    println!("url:          {}", state.url);
    println!("status:       {}", state.status().as_str());
    println!("step:         {}", state.current_step.as_str());
    if let Some(error) = &state.error {
        println!("error:        {}", error);
    }
    println!(
        "schedule:     {} posts/week for {} weeks from {}",
        state.calendar_config.posts_per_week,
        state.calendar_config.period_weeks,
        state.calendar_config.start_date
    );
    println!();

    println!("--- Artifacts ---");
    match &state.extraction {
        Some(e) => println!(
            "extraction:   {} items from {} @{}",
            e.items.len(),
            e.platform,
            e.username
        ),
        None => println!("extraction:   (pending)"),
    }
    match &state.index_result {
        Some(i) => println!(
            "index:        {} chunks in {}",
            i.chunks_indexed, i.collection_name
        ),
        None => println!("index:        (pending)"),
    }
    match &state.calendar {
        Some(c) => println!("calendar:     {} briefs", c.briefs.len()),
        None => println!("calendar:     (pending)"),
    }
    match &state.writer_result {
        Some(w) => println!("scripts:      {}", w.scripts.len()),
        None => println!("scripts:      (pending)"),
    }
    match &state.compiler_result {
        Some(c) => match &c.markdown_path {
            Some(p) => println!("document:     {}", p.display()),
            None => println!("document:     compiled, no markdown output"),
        },
        None => println!("document:     (pending)"),
    }
}

/// Format a Unix timestamp for table display.
fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
