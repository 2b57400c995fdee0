use std::fmt;

use aggregator_core::{FailureKind, ProgressEvent, RunReport};

use crate::pipeline::PipelineError;

/// How a chapter request is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchStrategy {
    /// Browser-like request carrying the session cookies.
    Primary,
    /// Separate client without cookies and with plain headers. Used for the
    /// rest of a run once the remote starts answering with challenges.
    Fallback,
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStrategy::Primary => write!(f, "primary"),
            FetchStrategy::Fallback => write!(f, "fallback"),
        }
    }
}

/// Events emitted while a pipeline run is in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    Progress(ProgressEvent),
    /// First challenge of the run; the run now uses [`FetchStrategy::Fallback`].
    ChallengeDetected { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Pipeline(PipelineEvent),
    RunFinished(Result<RunReport, PipelineError>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    /// Decoded page markup.
    pub body: String,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub original_url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub encoding_label: String,
    pub byte_len: u64,
    pub strategy: FetchStrategy,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "Download cancelled by user")
    }
}
