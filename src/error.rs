use thiserror::Error;

/// Failure taxonomy for the messaging core.
///
/// Validation is checked at the entry of every public operation, before any
/// write. Storage failures from an individual write surface unchanged; the
/// core never retries on its own.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),
}

impl ChatError {
    pub fn is_validation(&self) -> bool {
        matches!(self, ChatError::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ChatError::NotFound(_))
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
