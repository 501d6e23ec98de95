use thiserror::Error;

/// Everything a view can report back to the user.
///
/// Secondary fetches (usage history pages, sync status) never produce one of
/// these for the user; they log and fall back to an "unknown" display instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Rejected locally, before any request was sent.
    #[error("{0}")]
    Validation(String),
    /// The service answered with `success = false`.
    #[error("{0}")]
    Logical(String),
    /// The service could not be reached or answered with something unreadable.
    #[error("{0}")]
    Transport(String),
}

impl QueryError {
    pub fn validation(message: impl Into<String>) -> Self {
        QueryError::Validation(message.into())
    }

    pub fn logical(message: impl Into<String>) -> Self {
        QueryError::Logical(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        QueryError::Transport(message.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::Validation(_) => "validation",
            QueryError::Logical(_) => "logical",
            QueryError::Transport(_) => "transport",
        }
    }

    /// Validation problems are surfaced as blocking warnings.
    pub fn is_blocking(&self) -> bool {
        matches!(self, QueryError::Validation(_))
    }

    pub fn message(&self) -> &str {
        match self {
            QueryError::Validation(m) | QueryError::Logical(m) | QueryError::Transport(m) => m,
        }
    }
}
