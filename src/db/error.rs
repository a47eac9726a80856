//! Store error taxonomy
//!
//! Repositories report exactly two failure kinds. "Row not found" is never an
//! error; it is an `Ok(None)` from the lookup methods.

/// Error returned by session and user repositories
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A row with the same unique key already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The store could not be reached or failed to execute the statement
    #[error("Store unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
}

/// Result alias for repository operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::Conflict(db_err.message().to_string());
            }
        }
        StoreError::Unavailable(err.into())
    }
}

impl StoreError {
    /// Whether this error reports a duplicate key
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}
