//! Error types for the workflow engine.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::{generation::GenerationError, workspace::StorageError};

/// Comprehensive error type for all engine operations.
#[derive(Error, Debug)]
pub enum WaymarkError {
    /// The composite cancellation signal fired.
    #[error("Operation cancelled")]
    Cancelled,
    /// Content generation failed after the resilience layer gave up
    #[error("Content generation failed: {0}")]
    Generation(GenerationError),
    /// Workspace storage errors
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// A spawned command exited unsuccessfully
    #[error("Command `{command}` exited with code {exit_code}\n{output}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        output: String,
    },
    /// A spawned command could not be started or awaited
    #[error("Failed to run command `{command}`: {source}")]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    /// Plan failed validation
    #[error("Invalid plan at step {step}: {reason}")]
    InvalidPlan { step: usize, reason: String },
    /// Generated output could not be used
    #[error("Malformed generated content for '{path}': {reason}")]
    MalformedOutput { path: String, reason: String },
    /// Database connection or query errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: rusqlite::Error,
    },
    /// Change set not found for the given ID
    #[error("Change set with ID {id} not found")]
    ChangeSetNotFound { id: u64 },
    /// File system operation errors
    #[error("File system error at path '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        source: std::io::Error,
    },
    /// XDG directory specification errors
    #[error("XDG directory error: {0}")]
    XdgDirectory(String),
    /// Serialization/deserialization errors
    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
    /// The host's interaction surface failed to answer
    #[error("Interaction failed: {message}")]
    Interaction { message: String },
}

impl From<GenerationError> for WaymarkError {
    fn from(error: GenerationError) -> Self {
        match error {
            GenerationError::Cancelled => WaymarkError::Cancelled,
            other => WaymarkError::Generation(other),
        }
    }
}

/// Builder for creating database errors with optional context.
pub struct DatabaseErrorBuilder {
    message: String,
}

impl DatabaseErrorBuilder {
    /// Create a new database error builder with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Build the error with the given source.
    pub fn with_source(self, source: rusqlite::Error) -> WaymarkError {
        WaymarkError::Database {
            message: self.message,
            source,
        }
    }
}

/// Builder for creating plan validation errors.
pub struct InvalidPlanBuilder {
    step: usize,
}

impl InvalidPlanBuilder {
    /// Create a new invalid plan error builder for a 1-based step number.
    pub fn new(step: usize) -> Self {
        Self { step }
    }

    /// Build the error with the given reason.
    pub fn with_reason(self, reason: impl Into<String>) -> WaymarkError {
        WaymarkError::InvalidPlan {
            step: self.step,
            reason: reason.into(),
        }
    }
}

impl WaymarkError {
    /// Creates a builder for database errors.
    pub fn database(message: impl Into<String>) -> DatabaseErrorBuilder {
        DatabaseErrorBuilder::new(message)
    }

    /// Creates a builder for plan validation errors.
    ///
    /// Step `0` refers to the plan as a whole.
    pub fn invalid_plan(step: usize) -> InvalidPlanBuilder {
        InvalidPlanBuilder::new(step)
    }

    /// Returns true for the dedicated cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WaymarkError::Cancelled)
    }
}

/// Extension trait for Result to provide concise error mapping with
/// anyhow-style context.
pub trait ResultExt<T, E> {
    /// Add context to any error type, converting to WaymarkError.
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static;
}

/// Specialized extension trait for database-related Results.
pub trait DatabaseResultExt<T> {
    /// Map database errors with a message.
    fn db_context(self, message: &str) -> Result<T>;
}

impl<T, E> ResultExt<T, E> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| WaymarkError::Configuration {
            message: format!("{}: {}", context, e),
        })
    }
}

impl<T> DatabaseResultExt<T> for std::result::Result<T, rusqlite::Error> {
    fn db_context(self, message: &str) -> Result<T> {
        self.map_err(|e| WaymarkError::database(message).with_source(e))
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, WaymarkError>;
