// Central Error Type for the Coordination Layer

use thiserror::Error;

/// Coordination-layer error type.
///
/// Variants fall into four groups: state violations (operation in the wrong
/// Unit of Work state), lookup failures (unknown or duplicate names),
/// compatibility rejections (raised before any driver I/O), and driver-level
/// failures passed through unmodified.
#[derive(Error, Debug)]
pub enum CoreError {
    // State violations
    #[error("Unit of Work is not active")]
    NotActive,

    #[error("Unit of Work is already active")]
    AlreadyActive,

    #[error("Unit of Work is rollback-only")]
    RollbackOnly,

    // Lookup failures
    #[error("Savepoint already exists: {0}")]
    DuplicateSavepoint(String),

    #[error("Savepoint not found: {0}")]
    SavepointNotFound(String),

    #[error("Repository already registered: {0}")]
    DuplicateRepository(String),

    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("No repositories requested")]
    EmptyBundle,

    // Compatibility rejections
    #[error("Incompatible repositories: {left} and {right}")]
    IncompatibleRepositories { left: String, right: String },

    #[error("Engine mismatch: expected {expected}, got {actual}")]
    EngineMismatch { expected: String, actual: String },

    // Driver-level and infrastructure failures
    #[error("Optimistic lock conflict: {0}")]
    Conflict(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

// From implementation for infra crates (to avoid circular dependency)
impl From<String> for CoreError {
    fn from(err: String) -> Self {
        CoreError::Driver(err)
    }
}
