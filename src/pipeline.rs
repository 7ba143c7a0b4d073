//! Pipeline orchestrator: drives the stage sequence with durable
//! checkpoints and resumption.
//!
//! The driver loop runs one stage at a time, merges the stage's outcome
//! into the state, and checkpoints before touching the next stage. Two
//! failure modes exist:
//!
//! - **fail-soft** (default for interactive runs): a stage failure is
//!   recorded into the state and checkpointed; the driver halts with the
//!   partial state inspectable and resumable.
//! - **fail-hard**: the failure propagates immediately without touching
//!   the checkpoint, leaving the last good checkpoint as the resume
//!   point.
//!
//! Resuming a thread continues from the first incomplete stage and reuses
//! every checkpointed artifact verbatim; completed stages are never
//! re-entered.

use std::sync::Arc;

use tracing::info;

use crate::checkpoint::CheckpointStore;
use crate::compiler::{self, DocumentRenderer};
use crate::config::RetrievalConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{PipelineError, Result};
use crate::extraction::ExtractionProvider;
use crate::generation::GenerationProvider;
use crate::indexer;
use crate::models::CalendarConfig;
use crate::retrieval::ContextAggregator;
use crate::state::{PipelineState, RunStatus, StageOutcome, Step};
use crate::strategist;
use crate::vector::VectorStore;
use crate::writer;

/// The injected provider set the orchestrator drives.
#[derive(Clone)]
pub struct Providers {
    pub extraction: Arc<dyn ExtractionProvider>,
    pub embedding: Arc<dyn EmbeddingProvider>,
    pub generation: Arc<dyn GenerationProvider>,
    pub vectors: Arc<dyn VectorStore>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub renderer: Arc<dyn DocumentRenderer>,
}

/// Knobs that shape a run without being part of its durable state.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Record stage failures into the state instead of propagating.
    pub fail_soft: bool,
    /// Treat retrieval failures as empty context instead of aborting.
    pub degraded_retrieval: bool,
    /// Word budget per chunk.
    pub chunk_words: usize,
    pub retrieval: RetrievalConfig,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            fail_soft: false,
            degraded_retrieval: false,
            chunk_words: 500,
            retrieval: RetrievalConfig::default(),
        }
    }
}

/// Inputs for a new pipeline thread.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub thread_id: String,
    pub url: String,
    pub calendar: CalendarConfig,
    pub template: Option<String>,
    pub user_context: Option<String>,
    pub output_dir: std::path::PathBuf,
    pub output_formats: Vec<String>,
    pub extraction_limit: usize,
}

/// The orchestrator itself.
pub struct Pipeline {
    providers: Providers,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(providers: Providers, options: PipelineOptions) -> Self {
        Self { providers, options }
    }

    /// Start a new thread and drive it as far as it will go.
    ///
    /// Refuses to start a thread id that already has a checkpoint: a
    /// pending or failed thread must be resumed (re-running completed
    /// stages against a fresh scrape would silently diverge from the
    /// artifacts already generated), and a done thread has nothing left
    /// to do.
    pub async fn run(&self, request: PipelineRequest) -> Result<PipelineState> {
        if let Some(existing) = self.load(&request.thread_id).await? {
            return Err(match existing.status() {
                RunStatus::Done => PipelineError::checkpoint(format!(
                    "Thread {} is already complete",
                    request.thread_id
                )),
                RunStatus::Pending | RunStatus::Failed => PipelineError::checkpoint(format!(
                    "Thread {} already exists at step '{}'; resume it instead of starting over",
                    request.thread_id, existing.current_step
                )),
            });
        }

        let mut state = PipelineState::new(
            request.thread_id,
            request.url,
            request.calendar,
            request.template,
            request.user_context,
            request.output_dir,
            request.output_formats,
            request.extraction_limit,
        );
        self.save(&state).await?;

        info!(thread = %state.thread_id, url = %state.url, "pipeline started");
        self.drive(&mut state).await?;
        Ok(state)
    }

    /// Resume a checkpointed thread from its first incomplete stage.
    ///
    /// A thread already at `done` is returned as-is. A failed thread has
    /// its error cleared and its recorded step retried; every artifact
    /// from completed stages is reused verbatim.
    pub async fn resume(&self, thread_id: &str) -> Result<PipelineState> {
        let mut state = self.load(thread_id).await?.ok_or_else(|| {
            PipelineError::checkpoint(format!("No checkpoint found for thread {}", thread_id))
        })?;

        if state.status() == RunStatus::Done {
            return Ok(state);
        }

        state.clear_error();
        info!(thread = %thread_id, step = %state.current_step, "pipeline resumed");
        self.drive(&mut state).await?;
        Ok(state)
    }

    async fn drive(&self, state: &mut PipelineState) -> Result<()> {
        while state.current_step != Step::Done {
            if state.error.is_some() {
                break;
            }

            let step = state.current_step;
            info!(thread = %state.thread_id, step = %step, "running stage");

            match self.execute(step, state).await {
                Ok(outcome) => {
                    state.apply(outcome);
                    self.save(state).await?;
                }
                Err(e) => {
                    if self.options.fail_soft {
                        state.apply(StageOutcome::Failed {
                            step,
                            message: e.to_string(),
                        });
                        self.save(state).await?;
                    } else {
                        // The last checkpoint still shows the previous
                        // completed step, which is the resume point
                        return Err(PipelineError::at_step(step, &e));
                    }
                }
            }
        }

        Ok(())
    }

    async fn execute(&self, step: Step, state: &PipelineState) -> Result<StageOutcome> {
        match step {
            Step::Extract => {
                let result = self
                    .providers
                    .extraction
                    .extract(&state.url, state.extraction_limit)
                    .await
                    .map_err(|e| PipelineError::extraction(format!("{:#}", e)))?;
                Ok(StageOutcome::Extracted(result))
            }
            Step::Index => {
                let extraction = state
                    .extraction
                    .as_ref()
                    .ok_or_else(|| PipelineError::indexing("no extraction result in state"))?;
                let result = indexer::run_indexer(
                    self.providers.embedding.as_ref(),
                    self.providers.vectors.as_ref(),
                    extraction,
                    self.options.chunk_words,
                )
                .await?;
                Ok(StageOutcome::Indexed(result))
            }
            Step::Strategize => {
                let index = state
                    .index_result
                    .as_ref()
                    .ok_or_else(|| PipelineError::strategy("no index result in state"))?;
                let aggregator = self.aggregator();
                let calendar = strategist::generate_calendar(
                    self.providers.generation.as_ref(),
                    &aggregator,
                    index,
                    &state.calendar_config,
                    state.user_context.as_deref(),
                    &self.options.retrieval,
                )
                .await?;
                Ok(StageOutcome::Planned(calendar))
            }
            Step::Write => {
                let calendar = state
                    .calendar
                    .as_ref()
                    .ok_or_else(|| PipelineError::writer("no calendar in state"))?;
                let index = state
                    .index_result
                    .as_ref()
                    .ok_or_else(|| PipelineError::writer("no index result in state"))?;
                let aggregator = self.aggregator();
                let result = writer::run_writer(
                    self.providers.generation.as_ref(),
                    &aggregator,
                    calendar,
                    &index.collection_name,
                    state.template.as_deref(),
                    self.options.retrieval.script_context_limit,
                )
                .await?;
                Ok(StageOutcome::Written(result))
            }
            Step::Compile => {
                let writer_result = state
                    .writer_result
                    .as_ref()
                    .ok_or_else(|| PipelineError::compilation("no writer result in state"))?;
                let compiled = compiler::run_compiler(
                    self.providers.renderer.as_ref(),
                    writer_result,
                    &state.output_dir,
                    &state.output_formats,
                )?;
                Ok(StageOutcome::Compiled(compiled))
            }
            Step::Done => unreachable!("drive loop exits before executing a terminal step"),
        }
    }

    fn aggregator(&self) -> ContextAggregator<'_> {
        ContextAggregator::with_degraded(
            self.providers.embedding.as_ref(),
            self.providers.vectors.as_ref(),
            self.options.degraded_retrieval,
        )
    }

    async fn load(&self, thread_id: &str) -> Result<Option<PipelineState>> {
        self.providers
            .checkpoints
            .load(thread_id)
            .await
            .map_err(|e| PipelineError::checkpoint(format!("{:#}", e)))
    }

    async fn save(&self, state: &PipelineState) -> Result<()> {
        self.providers
            .checkpoints
            .save(&state.thread_id, state)
            .await
            .map_err(|e| PipelineError::checkpoint(format!("{:#}", e)))
    }
}
