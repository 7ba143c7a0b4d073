//! End-to-end pipeline tests over in-memory providers.
//!
//! These drive the real orchestrator (stage order, checkpointing, resumption,
//! failure modes) with deterministic doubles at the network edges. Nothing
//! here talks to a model or an embedding endpoint; the only filesystem use is
//! a tempdir for the compiled document.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tempfile::TempDir;

use scriptorium::checkpoint::{CheckpointStore, InMemoryCheckpointStore};
use scriptorium::compiler::MarkdownRenderer;
use scriptorium::embedding::EmbeddingProvider;
use scriptorium::extraction::ExtractionProvider;
use scriptorium::generation::GenerationProvider;
use scriptorium::models::{CalendarConfig, ContentItem, ExtractionResult, Platform};
use scriptorium::pipeline::{Pipeline, PipelineOptions, PipelineRequest, Providers};
use scriptorium::state::{RunStatus, Step};
use scriptorium::strategist;
use scriptorium::vector::InMemoryVectorStore;

// ============================================================
// Test doubles
// ============================================================

/// Extraction double returning a fixed profile; counts calls so tests can
/// prove a resumed run reuses the checkpointed result.
struct StaticExtractor {
    result: ExtractionResult,
    calls: AtomicUsize,
}

impl StaticExtractor {
    fn new(result: ExtractionResult) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ExtractionProvider for StaticExtractor {
    async fn extract(&self, _url: &str, limit: usize) -> anyhow::Result<ExtractionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut result = self.result.clone();
        result.items.truncate(limit);
        Ok(result)
    }
}

/// Deterministic embedding: spreads byte values over a fixed-width vector.
struct HashEmbedding;

#[async_trait]
impl EmbeddingProvider for HashEmbedding {
    fn model_name(&self) -> &str {
        "hash-test"
    }

    fn dims(&self) -> usize {
        8
    }

    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0f32; 8];
                for (i, byte) in text.bytes().enumerate() {
                    vector[i % 8] += (byte % 31) as f32 / 31.0;
                }
                vector
            })
            .collect())
    }
}

/// Generation double that answers calendar JSON to the strategist and a
/// fixed script JSON to the writer.
struct PlannerWriterGeneration {
    calendar_json: String,
    script_json: String,
    calls: AtomicUsize,
}

impl PlannerWriterGeneration {
    fn new(config: &CalendarConfig) -> Self {
        Self {
            calendar_json: calendar_json(config),
            script_json: script_json(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl GenerationProvider for PlannerWriterGeneration {
    fn model_name(&self) -> &str {
        "planner-writer-test"
    }

    async fn generate(&self, _prompt: &str, system_instruction: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if system_instruction.contains("strategist") {
            Ok(self.calendar_json.clone())
        } else {
            Ok(self.script_json.clone())
        }
    }
}

/// Generation double that always fails, like an unreachable backend.
struct OfflineGeneration;

#[async_trait]
impl GenerationProvider for OfflineGeneration {
    fn model_name(&self) -> &str {
        "offline-test"
    }

    async fn generate(&self, _prompt: &str, _system_instruction: &str) -> anyhow::Result<String> {
        anyhow::bail!("connection refused")
    }
}

/// Generation double where planning works but script writing is down.
struct PlannerOnlyGeneration {
    calendar_json: String,
}

#[async_trait]
impl GenerationProvider for PlannerOnlyGeneration {
    fn model_name(&self) -> &str {
        "planner-only-test"
    }

    async fn generate(&self, _prompt: &str, system_instruction: &str) -> anyhow::Result<String> {
        if system_instruction.contains("strategist") {
            Ok(self.calendar_json.clone())
        } else {
            anyhow::bail!("model overloaded")
        }
    }
}

// ============================================================
// Fixtures
// ============================================================

fn youtube_item(n: usize) -> ContentItem {
    ContentItem {
        platform: Platform::Youtube,
        title: Some(format!("How I grew video {}", n)),
        description: format!("Breakdown number {} of what worked on the channel.", n),
        transcript: Some(format!(
            "Today we are looking at strategy {}. The first thing that moved the \
             needle was posting consistently and opening every video with a question.",
            n
        )),
        url: format!("https://youtube.com/watch?v=vid{}", n),
        views: Some(10_000 + n as u64),
        likes: Some(800 + n as u64),
        comments: Some(90),
        shares: None,
        hashtags: vec!["growth".to_string()],
        published_at: Some(Utc::now()),
        content_type: "video".to_string(),
        duration_secs: Some(540.0),
    }
}

fn instagram_item(n: usize) -> ContentItem {
    ContentItem {
        platform: Platform::Instagram,
        title: None,
        description: format!("Carousel {}: three hooks that doubled saves this month.", n),
        transcript: None,
        url: format!("https://instagram.com/p/post{}", n),
        views: None,
        likes: Some(450),
        comments: Some(12),
        shares: Some(30),
        hashtags: vec!["hooks".to_string(), "content".to_string()],
        published_at: Some(Utc::now()),
        content_type: "carousel".to_string(),
        duration_secs: None,
    }
}

/// Ten items: eight transcript-bearing videos and two plain posts.
fn profile() -> ExtractionResult {
    let mut items: Vec<ContentItem> = (1..=8).map(youtube_item).collect();
    items.push(instagram_item(1));
    items.push(instagram_item(2));
    ExtractionResult {
        source_url: "https://youtube.com/@creator".to_string(),
        platform: Platform::Youtube,
        username: "creator".to_string(),
        items,
        extracted_at: Utc::now(),
    }
}

/// A calendar response that satisfies the strict parser for `config`: one
/// brief per scheduled date, contiguous days, pillar targets from the split.
fn calendar_json(config: &CalendarConfig) -> String {
    let dates = strategist::schedule_dates(config);
    let (virality, authority, _sales) = strategist::pillar_split(dates.len() as u32);
    let briefs: Vec<serde_json::Value> = dates
        .iter()
        .enumerate()
        .map(|(i, date)| {
            let pillar = if (i as u32) < virality {
                "virality"
            } else if (i as u32) < virality + authority {
                "authority"
            } else {
                "sales"
            };
            serde_json::json!({
                "day": i + 1,
                "date": date.format("%Y-%m-%d").to_string(),
                "pillar": pillar,
                "topic": format!("Topic {}", i + 1),
                "angle": "Contrarian breakdown",
                "hook": format!("Nobody talks about topic {}", i + 1),
                "objective": "Grow reach",
                "content_type": "video",
                "reference_data": ["posting consistently moved the needle"]
            })
        })
        .collect();
    serde_json::json!({
        "strategy_summary": "Lead with virality, back it with authority, close with sales.",
        "briefs": briefs
    })
    .to_string()
}

fn script_json() -> String {
    serde_json::json!({
        "hook": "Stop scrolling: this one habit doubled my views",
        "sections": [
            {
                "title": "The setup",
                "content": "Here is where most people go wrong.",
                "notes": "tight framing"
            },
            {
                "title": "The shift",
                "content": "Change one variable at a time and measure.",
                "notes": ""
            },
            {
                "title": "The payoff",
                "content": "This is what the numbers looked like after.",
                "notes": "show screen"
            }
        ],
        "cta": "Share this with one creator who needs it",
        "retention_tips": ["cut every 3 seconds", "tease the payoff early"],
        "strategic_justification": "Matches the proven curiosity-gap pattern."
    })
    .to_string()
}

fn providers(
    extraction: Arc<StaticExtractor>,
    generation: Arc<dyn GenerationProvider>,
    vectors: Arc<InMemoryVectorStore>,
    checkpoints: Arc<InMemoryCheckpointStore>,
) -> Providers {
    Providers {
        extraction,
        embedding: Arc::new(HashEmbedding),
        generation,
        vectors,
        checkpoints,
        renderer: Arc::new(MarkdownRenderer::new()),
    }
}

fn options() -> PipelineOptions {
    PipelineOptions {
        fail_soft: false,
        degraded_retrieval: false,
        chunk_words: 80,
        retrieval: Default::default(),
    }
}

fn request(thread_id: &str, output_dir: &std::path::Path, config: &CalendarConfig) -> PipelineRequest {
    PipelineRequest {
        thread_id: thread_id.to_string(),
        url: "https://youtube.com/@creator".to_string(),
        calendar: config.clone(),
        template: None,
        user_context: None,
        output_dir: output_dir.to_path_buf(),
        output_formats: vec!["markdown".to_string()],
        extraction_limit: 50,
    }
}

// ============================================================
// Tests
// ============================================================

#[tokio::test]
async fn test_full_pipeline_produces_document() {
    let out = TempDir::new().unwrap();
    let config = CalendarConfig::new(3, 2, NaiveDate::from_ymd_opt(2025, 1, 6).unwrap());

    let extractor = Arc::new(StaticExtractor::new(profile()));
    let generation = Arc::new(PlannerWriterGeneration::new(&config));
    let vectors = Arc::new(InMemoryVectorStore::new());
    let checkpoints = Arc::new(InMemoryCheckpointStore::new());

    let pipeline = Pipeline::new(
        providers(
            extractor.clone(),
            generation.clone(),
            vectors.clone(),
            checkpoints.clone(),
        ),
        options(),
    );

    let state = pipeline
        .run(request("youtube_creator_e2e", out.path(), &config))
        .await
        .unwrap();

    assert_eq!(state.current_step, Step::Done);
    assert_eq!(state.status(), RunStatus::Done);
    assert!(state.error.is_none());

    let extraction = state.extraction.as_ref().unwrap();
    assert_eq!(extraction.items.len(), 10);

    let index = state.index_result.as_ref().unwrap();
    assert_eq!(index.collection_name, "youtube_creator");
    // Eight transcript videos chunk to metadata + transcript, two plain
    // posts to one chunk each.
    assert_eq!(index.chunks_indexed, 18);
    assert_eq!(vectors.len("youtube_creator"), 18);

    let calendar = state.calendar.as_ref().unwrap();
    assert_eq!(calendar.briefs.len(), 6);
    assert_eq!(
        calendar.briefs.iter().map(|b| b.day).collect::<Vec<_>>(),
        vec![1, 2, 3, 4, 5, 6]
    );
    assert_eq!(calendar.pillar_distribution.values().sum::<u32>(), 6);

    let writer = state.writer_result.as_ref().unwrap();
    assert_eq!(writer.scripts.len(), 6);
    // Scripts stay in brief order and carry full section bodies.
    for (i, script) in writer.scripts.iter().enumerate() {
        assert_eq!(script.brief.day as usize, i + 1);
        assert_eq!(script.sections.len(), 3);
    }

    // One strategist call, then one writer call per brief.
    assert_eq!(generation.calls.load(Ordering::SeqCst), 7);

    let compiled = state.compiler_result.as_ref().unwrap();
    let path = compiled.markdown_path.as_ref().unwrap();
    assert!(path.exists());
    let doc = std::fs::read_to_string(path).unwrap();
    assert!(doc.contains("# Content Plan: @creator"));
    assert!(doc.contains("## Calendar"));
    assert!(doc.contains("Stop scrolling"));

    let threads = checkpoints.list().await.unwrap();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].status(), RunStatus::Done);

    // Running the same thread again is refused.
    let err = pipeline
        .run(request("youtube_creator_e2e", out.path(), &config))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already complete"));

    // Resuming a done thread hands back the stored state untouched.
    let resumed = pipeline.resume("youtube_creator_e2e").await.unwrap();
    assert_eq!(resumed.status(), RunStatus::Done);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_fail_soft_records_failure_and_resume_completes() {
    let out = TempDir::new().unwrap();
    let config = CalendarConfig::new(3, 2, NaiveDate::from_ymd_opt(2025, 1, 6).unwrap());

    let extractor = Arc::new(StaticExtractor::new(profile()));
    let vectors = Arc::new(InMemoryVectorStore::new());
    let checkpoints = Arc::new(InMemoryCheckpointStore::new());

    // First run: generation backend down, fail-soft keeps the checkpoint.
    let mut opts = options();
    opts.fail_soft = true;
    let broken = Pipeline::new(
        providers(
            extractor.clone(),
            Arc::new(OfflineGeneration),
            vectors.clone(),
            checkpoints.clone(),
        ),
        opts,
    );
    let state = broken
        .run(request("thread_soft", out.path(), &config))
        .await
        .unwrap();

    assert_eq!(state.status(), RunStatus::Failed);
    assert_eq!(state.current_step, Step::Strategize);
    assert!(state.error.as_ref().unwrap().contains("strategy failed"));
    // Work done before the failure is checkpointed.
    assert!(state.extraction.is_some());
    assert!(state.index_result.is_some());
    assert!(state.calendar.is_none());

    // Starting the same thread over is refused while it sits failed.
    let err = broken
        .run(request("thread_soft", out.path(), &config))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("resume it instead"));

    // Second pipeline over the same stores with a healthy backend. The
    // resume finishes the thread without re-running extraction.
    let generation = Arc::new(PlannerWriterGeneration::new(&config));
    let healthy = Pipeline::new(
        providers(
            extractor.clone(),
            generation,
            vectors.clone(),
            checkpoints.clone(),
        ),
        options(),
    );
    let resumed = healthy.resume("thread_soft").await.unwrap();

    assert_eq!(resumed.status(), RunStatus::Done);
    assert!(resumed.error.is_none());
    assert_eq!(resumed.writer_result.as_ref().unwrap().scripts.len(), 6);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    assert!(resumed
        .compiler_result
        .as_ref()
        .unwrap()
        .markdown_path
        .as_ref()
        .unwrap()
        .exists());
}

#[tokio::test]
async fn test_fail_hard_keeps_previous_checkpoint_as_resume_point() {
    let out = TempDir::new().unwrap();
    let config = CalendarConfig::new(2, 1, NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());

    let extractor = Arc::new(StaticExtractor::new(profile()));
    let vectors = Arc::new(InMemoryVectorStore::new());
    let checkpoints = Arc::new(InMemoryCheckpointStore::new());

    let broken = Pipeline::new(
        providers(
            extractor.clone(),
            Arc::new(OfflineGeneration),
            vectors.clone(),
            checkpoints.clone(),
        ),
        options(),
    );
    let err = broken
        .run(request("thread_hard", out.path(), &config))
        .await
        .unwrap_err();
    assert!(err
        .to_string()
        .contains("pipeline failed at step 'strategize'"));

    // The stored state still points at the failed step with no error
    // recorded; the last save happened after indexing.
    let stored = checkpoints.load("thread_hard").await.unwrap().unwrap();
    assert_eq!(stored.current_step, Step::Strategize);
    assert!(stored.error.is_none());
    assert_eq!(stored.status(), RunStatus::Pending);
    assert!(stored.index_result.is_some());
    assert!(stored.calendar.is_none());

    // Resume picks up at strategize with a healthy backend.
    let generation = Arc::new(PlannerWriterGeneration::new(&config));
    let healthy = Pipeline::new(
        providers(
            extractor.clone(),
            generation,
            vectors.clone(),
            checkpoints.clone(),
        ),
        options(),
    );
    let resumed = healthy.resume("thread_hard").await.unwrap();

    assert_eq!(resumed.status(), RunStatus::Done);
    assert_eq!(resumed.calendar.as_ref().unwrap().briefs.len(), 2);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_writer_degrades_to_placeholders_without_failing_the_run() {
    let out = TempDir::new().unwrap();
    let config = CalendarConfig::new(2, 1, NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());

    let pipeline = Pipeline::new(
        providers(
            Arc::new(StaticExtractor::new(profile())),
            Arc::new(PlannerOnlyGeneration {
                calendar_json: calendar_json(&config),
            }),
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(InMemoryCheckpointStore::new()),
        ),
        options(),
    );

    let state = pipeline
        .run(request("thread_placeholder", out.path(), &config))
        .await
        .unwrap();

    assert_eq!(state.status(), RunStatus::Done);
    let scripts = &state.writer_result.as_ref().unwrap().scripts;
    assert_eq!(scripts.len(), 2);
    for script in scripts {
        assert_eq!(script.sections.len(), 1);
        assert_eq!(script.sections[0].title, "Generation failed");
        // The placeholder leans on the brief's own hook.
        assert_eq!(script.hook, script.brief.hook);
    }
    // The document still compiles around the placeholders.
    assert!(state
        .compiler_result
        .as_ref()
        .unwrap()
        .markdown_path
        .is_some());
}

#[tokio::test]
async fn test_resume_unknown_thread_errors() {
    let pipeline = Pipeline::new(
        providers(
            Arc::new(StaticExtractor::new(profile())),
            Arc::new(OfflineGeneration),
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(InMemoryCheckpointStore::new()),
        ),
        options(),
    );
    let err = pipeline.resume("never_started").await.unwrap_err();
    assert!(err.to_string().contains("No checkpoint found"));
}
