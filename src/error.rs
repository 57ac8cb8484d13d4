use thiserror::Error;

/// Failures of the remote store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Goal not found: {0}")]
    NotFound(String),

    #[error("Atomic update of goal {id} gave up after {attempts} conflicting attempts")]
    Contention { id: String, attempts: usize },

    #[error("Store connection lock poisoned")]
    Poisoned,

    #[error("Could not prepare store directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced to whoever drives the goal repository.
#[derive(Debug, Error)]
pub enum GoalError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GoalError {
    pub fn validation(message: impl Into<String>) -> Self {
        GoalError::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, GoalError::Validation(_))
    }
}

/// Errors of the analytics forwarders. None of these reach the writer.
#[derive(Debug, Error)]
pub enum ForwarderError {
    #[error("Forwarder configuration missing: {0}")]
    ConfigMissing(&'static str),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server error: HTTP {status} - {body}")]
    Status { status: u16, body: String },

    #[error("Token acquisition failed: {0}")]
    TokenAcquisition(String),
}
