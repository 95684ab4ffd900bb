use thiserror::Error;

use crate::backend::BackendError;

/// Engine-level error type.
///
/// Only two things ever cross the orchestrator boundary as errors: a rejected
/// profile fetch and a transport failure during the markup refetch. Everything
/// else degrades to an empty result at the call site.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Backend error: {0}")]
    Backend(BackendError),

    #[error("Page fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Page markup unavailable: {0}")]
    Markup(String),
}

impl From<BackendError> for AgentError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unauthorized => AgentError::Unauthorized,
            other => AgentError::Backend(other),
        }
    }
}

impl AgentError {
    /// Stable machine-readable code, sent back over the relay to the popup.
    pub fn code(&self) -> &'static str {
        match self {
            AgentError::Unauthorized => "UNAUTHORIZED",
            AgentError::Backend(_) => "BACKEND_ERROR",
            AgentError::Fetch(_) => "FETCH_ERROR",
            AgentError::Markup(_) => "MARKUP_UNAVAILABLE",
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AgentError::Unauthorized)
    }
}
