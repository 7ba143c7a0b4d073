//! Pipeline state machine types.
//!
//! [`Step`] names the stages `extract → index → strategize → write →
//! compile → done`; [`PipelineState`] is the fully-typed bag threaded
//! through the driver and checkpointed after every transition. A run is in
//! the absorbing failed state when [`PipelineState::error`] is set, with
//! `current_step` still naming the stage that could not complete.
//!
//! Stages never touch the checkpoint store themselves: they produce a
//! [`StageOutcome`] and the driver merges it with [`PipelineState::apply`].

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::{
    CalendarConfig, CompilerResult, ContentCalendar, ExtractionResult, IndexResult, WriterResult,
};

/// A pipeline stage, or the `done` terminal marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Extract,
    Index,
    Strategize,
    Write,
    Compile,
    Done,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Extract => "extract",
            Step::Index => "index",
            Step::Strategize => "strategize",
            Step::Write => "write",
            Step::Compile => "compile",
            Step::Done => "done",
        }
    }

    /// The stage that runs after this one completes.
    pub fn next(&self) -> Step {
        match self {
            Step::Extract => Step::Index,
            Step::Index => Step::Strategize,
            Step::Strategize => Step::Write,
            Step::Write => Step::Compile,
            Step::Compile => Step::Done,
            Step::Done => Step::Done,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "extract" => Ok(Step::Extract),
            "index" => Ok(Step::Index),
            "strategize" => Ok(Step::Strategize),
            "write" => Ok(Step::Write),
            "compile" => Ok(Step::Compile),
            "done" => Ok(Step::Done),
            other => Err(format!("unknown step: '{}'", other)),
        }
    }
}

/// Where a run currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// At least one stage still has to run.
    Pending,
    /// Compilation succeeded.
    Done,
    /// A stage failed and the error was recorded. Absorbing until the thread
    /// is explicitly resumed.
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Done => "done",
            RunStatus::Failed => "failed",
        }
    }
}

/// The delta a stage hands back to the driver.
///
/// Success carries the stage payload; failure carries the step and message
/// so the skip-remaining-stages behavior is a visible control-flow branch
/// rather than implicit propagation.
#[derive(Debug, Clone)]
pub enum StageOutcome {
    Extracted(ExtractionResult),
    Indexed(IndexResult),
    Planned(ContentCalendar),
    Written(WriterResult),
    Compiled(CompilerResult),
    Failed { step: Step, message: String },
}

/// The durable, fully-typed state of one pipeline thread.
///
/// Inputs are captured at creation so a resumed run needs no arguments
/// beyond the thread id. Stage outputs are `Option` because they exist only
/// once their stage has completed; `current_step` always names the first
/// stage that has not completed yet (or `done`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub thread_id: String,

    // Inputs
    pub url: String,
    pub calendar_config: CalendarConfig,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub user_context: Option<String>,
    pub output_dir: PathBuf,
    pub output_formats: Vec<String>,
    pub extraction_limit: usize,

    // Stage outputs
    #[serde(default)]
    pub extraction: Option<ExtractionResult>,
    #[serde(default)]
    pub index_result: Option<IndexResult>,
    #[serde(default)]
    pub calendar: Option<ContentCalendar>,
    #[serde(default)]
    pub writer_result: Option<WriterResult>,
    #[serde(default)]
    pub compiler_result: Option<CompilerResult>,

    // Control
    pub current_step: Step,
    #[serde(default)]
    pub error: Option<String>,
}

impl PipelineState {
    /// Fresh state for a new thread, positioned before the first stage.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        thread_id: impl Into<String>,
        url: impl Into<String>,
        calendar_config: CalendarConfig,
        template: Option<String>,
        user_context: Option<String>,
        output_dir: PathBuf,
        output_formats: Vec<String>,
        extraction_limit: usize,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            url: url.into(),
            calendar_config,
            template,
            user_context,
            output_dir,
            output_formats,
            extraction_limit,
            extraction: None,
            index_result: None,
            calendar: None,
            writer_result: None,
            compiler_result: None,
            current_step: Step::Extract,
            error: None,
        }
    }

    pub fn status(&self) -> RunStatus {
        if self.error.is_some() {
            RunStatus::Failed
        } else if self.current_step == Step::Done {
            RunStatus::Done
        } else {
            RunStatus::Pending
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status() != RunStatus::Pending
    }

    /// Merge a stage outcome into the state.
    ///
    /// Success stores the payload and advances `current_step`; failure
    /// records the message against the failing step without advancing.
    pub fn apply(&mut self, outcome: StageOutcome) {
        match outcome {
            StageOutcome::Extracted(res) => {
                self.extraction = Some(res);
                self.current_step = Step::Extract.next();
            }
            StageOutcome::Indexed(res) => {
                self.index_result = Some(res);
                self.current_step = Step::Index.next();
            }
            StageOutcome::Planned(cal) => {
                self.calendar = Some(cal);
                self.current_step = Step::Strategize.next();
            }
            StageOutcome::Written(res) => {
                self.writer_result = Some(res);
                self.current_step = Step::Write.next();
            }
            StageOutcome::Compiled(res) => {
                self.compiler_result = Some(res);
                self.current_step = Step::Compile.next();
            }
            StageOutcome::Failed { step, message } => {
                self.current_step = step;
                self.error = Some(message);
            }
        }
    }

    /// Clear a recorded failure so the failing stage can be retried.
    /// Completed stage outputs stay untouched.
    pub fn clear_error(&mut self) {
        self.error = None;
    }
}
