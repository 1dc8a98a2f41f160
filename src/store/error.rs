use thiserror::Error;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Caller-supplied data violates a field constraint.
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("reading {id} not found")]
    NotFound { id: i64 },

    /// The database rejected the operation or could not be reached.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl StoreError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether a caller may reasonably retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
