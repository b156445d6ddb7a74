//! Error types for pipeline stages.
//!
//! Two families:
//! - `PipelineError`: a stage could not do its job (unreadable input, invalid record, I/O).
//! - `RunnerError`: a heavy runner (model, encoder, external tool) either is not installed
//!   or failed at runtime. Callers pick the degraded path on `Unavailable` and decide
//!   per stage what to do on `Failed`.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeline stages.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors raised by pipeline stages to their immediate caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot open video source {path}: {detail}")]
    SourceUnavailable { path: PathBuf, detail: String },

    #[error("cannot decode image {path}: {detail}")]
    InvalidImage { path: PathBuf, detail: String },

    #[error("invalid scene record: {0}")]
    InvalidRecord(String),

    #[error("{stage} failed: {detail}")]
    StageFailed { stage: &'static str, detail: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image encoding error: {0}")]
    Image(#[from] image::ImageError),
}

impl PipelineError {
    pub fn source_unavailable(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            path: path.into(),
            detail: detail.into(),
        }
    }

    pub fn invalid_image(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::InvalidImage {
            path: path.into(),
            detail: detail.into(),
        }
    }

    pub fn stage_failed(stage: &'static str, detail: impl Into<String>) -> Self {
        Self::StageFailed {
            stage,
            detail: detail.into(),
        }
    }
}

/// Outcome of a heavy runner call that did not produce its artifact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunnerError {
    /// The dependency is missing (feature disabled, model file absent, tool not installed).
    #[error("dependency unavailable: {0}")]
    Unavailable(String),

    /// The dependency is present but the call failed.
    #[error("runtime failure: {0}")]
    Failed(String),
}

impl RunnerError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self::Failed(detail.into())
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<std::io::Error> for RunnerError {
    fn from(err: std::io::Error) -> Self {
        Self::Failed(err.to_string())
    }
}

impl From<image::ImageError> for RunnerError {
    fn from(err: image::ImageError) -> Self {
        Self::Failed(err.to_string())
    }
}
