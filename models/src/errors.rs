use std::io;
pub use thiserror::Error;
use uuid::Error as UuidError;
use anyhow::Error as AnyhowError;
use serde_json::Error as SerdeJsonError;
use serde::{Serialize, Deserialize};
use crate::identifiers::Identifier;

#[derive(Debug, Serialize, Deserialize, Error, Clone)]
pub enum GraphError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Invalid query: {0}")]
    QueryError(String), // Error during query parsing or execution logic
    #[error("Storage error: {0}")]
    StorageError(String), // General storage operation error
    #[error("Invalid Request: {0}")]
    InvalidRequest(String),
    #[error("graph does not exist: {0}")]
    GraphMissing(String), // Raised by the store when the graph object is absent; consumed by the gateway retry
    #[error("graph operation failed: {0}")]
    GraphOperation(String), // Query still failing after the one-shot missing-graph recovery
    #[error("entity with identifier {0} was not found")]
    NotFound(String),
    #[error("partial failure: {succeeded} succeeded, {failed} failed")]
    PartialFailure { succeeded: usize, failed: usize },
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("An internal error occurred: {0}")]
    InternalError(String),
    #[error("Validation error: {0}")]
    Validation(ValidationError),
    #[error("UUID parsing or generation error: {0}")]
    Uuid(String),
}

// Implement the From trait for &str
impl From<&str> for GraphError {
    fn from(error: &str) -> Self {
        GraphError::InvalidRequest(error.to_string())
    }
}

// Implement From for serde_json::Error
impl From<SerdeJsonError> for GraphError {
    fn from(err: SerdeJsonError) -> Self {
        GraphError::SerializationError(format!("JSON serialization error: {}", err))
    }
}

// Implement From for anyhow::Error
impl From<AnyhowError> for GraphError {
    fn from(err: AnyhowError) -> Self {
        GraphError::StorageError(format!("Underlying storage operation failed: {}", err))
    }
}

// Implement From for io::Error
impl From<io::Error> for GraphError {
    fn from(err: io::Error) -> Self {
        GraphError::Io(format!("IO error: {}", err))
    }
}

// Implement From for UuidError
impl From<UuidError> for GraphError {
    fn from(err: UuidError) -> Self {
        GraphError::Uuid(format!("UUID error: {}", err))
    }
}

// Implement From for ValidationError
impl From<ValidationError> for GraphError {
    fn from(err: ValidationError) -> Self {
        GraphError::Validation(err)
    }
}

impl GraphError {
    /// True when the underlying cause is the graph object not existing yet.
    pub fn is_graph_missing(&self) -> bool {
        matches!(self, GraphError::GraphMissing(_))
    }
}

#[derive(Debug, Serialize, Deserialize, Error, PartialEq, Clone)]
pub enum ValidationError {
    #[error("invalid value provided")]
    InvalidValue,
    #[error("identifier '{0}' is invalid")]
    InvalidIdentifier(String),
    #[error("identifier has invalid length")]
    InvalidIdentifierLength,
    #[error("property with name {0} not found")]
    PropertyNotFound(Identifier),
    #[error("missing property value for {0}")]
    MissingPropertyValue(Identifier),
    #[error("invalid value for property {0}")]
    InvalidPropertyValue(Identifier),
    #[error("invalid urgency level: {0}")]
    InvalidUrgencyLevel(String),
}

/// A type alias for a `Result` that returns a `GraphError` on failure.
pub type GraphResult<T> = Result<T, GraphError>;

/// A type alias for a `Result` that returns a `ValidationError` on failure.
pub type ValidationResult<T> = Result<T, ValidationError>;
