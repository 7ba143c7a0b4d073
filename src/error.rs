//! Error types for the pipeline stages.
//!
//! Stage code returns [`PipelineError`] via `thiserror`; the CLI and the
//! provider HTTP edges use `anyhow` and are wrapped at the stage boundary.

use std::path::PathBuf;

use crate::state::Step;

/// Top-level error type for all pipeline operations.
///
/// Each stage has its own variant so a failure always names the part of the
/// run that stopped. Writer errors are special: they are contained per brief
/// (one retry, then a placeholder script) and only surface here when the
/// whole batch cannot run at all.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Profile scraping / extraction provider error.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// Chunking, embedding, or vector-store error while building the index.
    #[error("indexing failed: {0}")]
    Indexing(String),

    /// Embedding or vector-search error while aggregating niche context.
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    /// Calendar generation or parse error. Fatal, never retried.
    #[error("strategy failed: {0}")]
    Strategy(String),

    /// Script batch error that could not be degraded to placeholders.
    #[error("script generation failed: {0}")]
    Writer(String),

    /// Document rendering error.
    #[error("compilation failed: {0}")]
    Compilation(String),

    /// Checkpoint store error (load/save of pipeline state).
    #[error("checkpoint failed: {0}")]
    Checkpoint(String),

    /// A stage failure wrapped with the step it occurred at. This is what
    /// the driver returns to the caller in fail-hard mode.
    #[error("pipeline failed at step '{step}': {message}")]
    Stage { step: String, message: String },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the stage code.
pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// Create an extraction error from any displayable message.
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction(msg.into())
    }

    /// Create an indexing error from any displayable message.
    pub fn indexing(msg: impl Into<String>) -> Self {
        Self::Indexing(msg.into())
    }

    /// Create a retrieval error from any displayable message.
    pub fn retrieval(msg: impl Into<String>) -> Self {
        Self::Retrieval(msg.into())
    }

    /// Create a strategy error from any displayable message.
    pub fn strategy(msg: impl Into<String>) -> Self {
        Self::Strategy(msg.into())
    }

    /// Create a writer error from any displayable message.
    pub fn writer(msg: impl Into<String>) -> Self {
        Self::Writer(msg.into())
    }

    /// Create a compilation error from any displayable message.
    pub fn compilation(msg: impl Into<String>) -> Self {
        Self::Compilation(msg.into())
    }

    /// Create a checkpoint error from any displayable message.
    pub fn checkpoint(msg: impl Into<String>) -> Self {
        Self::Checkpoint(msg.into())
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a stage error with the step it occurred at.
    pub fn at_step(step: Step, source: &PipelineError) -> Self {
        Self::Stage {
            step: step.as_str().to_string(),
            message: source.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_formatting() {
        let err = PipelineError::strategy("calendar response was not valid JSON");
        assert_eq!(
            err.to_string(),
            "strategy failed: calendar response was not valid JSON"
        );

        let err = PipelineError::at_step(Step::Strategize, &err);
        assert_eq!(
            err.to_string(),
            "pipeline failed at step 'strategize': strategy failed: calendar response was not valid JSON"
        );
    }
}
