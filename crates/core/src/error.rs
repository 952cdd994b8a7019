//! Error types for Loreforge
//!
//! This module provides unified error handling across the schema engine,
//! including validation errors, formula errors, link-graph errors, IO errors
//! and serialization errors.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for Loreforge
#[derive(Debug, Error)]
pub enum EngineError {
    // ========================================================================
    // Validation Errors
    // ========================================================================
    /// General validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity type validation failed
    #[error("Entity type validation failed for '{entity_type}': {message}")]
    EntityTypeValidation {
        entity_type: String,
        message: String,
    },

    /// Link validation failed
    #[error("Link validation failed: {0}")]
    LinkValidation(String),

    /// Computed fields depend on each other in a loop
    #[error("Circular dependency detected: {}", path.join(" -> "))]
    CircularDependency { path: Vec<String> },

    // ========================================================================
    // Formula Errors
    // ========================================================================
    /// The formula guard refused the expression
    #[error("Formula rejected: {reason}")]
    FormulaRejected { reason: String },

    /// Parsing or evaluating an accepted expression failed
    #[error("Formula evaluation failed: {0}")]
    FormulaEvaluation(String),

    // ========================================================================
    // Not Found Errors
    // ========================================================================
    /// Entity not found
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    /// Entity type not found
    #[error("Entity type not found: {0}")]
    EntityTypeNotFound(String),

    /// Link not found
    #[error("Link not found: {0}")]
    LinkNotFound(String),

    /// Type library file not found
    #[error("Type library not found at path: {0}")]
    LibraryNotFound(PathBuf),

    // ========================================================================
    // Duplicate Errors
    // ========================================================================
    /// Source already links to the target with the same relationship type
    #[error("Duplicate relationship '{relationship}' from '{from}' to '{to}'")]
    DuplicateRelationship {
        from: String,
        to: String,
        relationship: String,
    },

    // ========================================================================
    // IO Errors
    // ========================================================================
    /// File IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File read error
    #[error("Failed to read file '{path}': {message}")]
    FileRead { path: PathBuf, message: String },

    /// File write error
    #[error("Failed to write file '{path}': {message}")]
    FileWrite { path: PathBuf, message: String },

    /// Directory creation failed
    #[error("Failed to create directory '{path}': {message}")]
    DirectoryCreate { path: PathBuf, message: String },

    // ========================================================================
    // Serialization Errors
    // ========================================================================
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    /// Invalid library file format
    #[error("Invalid library file format: {0}")]
    InvalidLibraryFormat(String),

    /// Schema version newer than this build understands
    #[error("Schema version mismatch: expected at most {expected}, found {found}")]
    SchemaVersionMismatch { expected: u32, found: u32 },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Generic error with context
    #[error("{context}: {message}")]
    WithContext { context: String, message: String },
}

impl EngineError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    /// Create an entity type validation error
    pub fn entity_type_validation(entity_type: impl Into<String>, msg: impl Into<String>) -> Self {
        EngineError::EntityTypeValidation {
            entity_type: entity_type.into(),
            message: msg.into(),
        }
    }

    /// Create a formula rejection
    pub fn formula_rejected(reason: impl Into<String>) -> Self {
        EngineError::FormulaRejected {
            reason: reason.into(),
        }
    }

    /// Create a formula evaluation error
    pub fn formula_evaluation(msg: impl Into<String>) -> Self {
        EngineError::FormulaEvaluation(msg.into())
    }

    /// Create an error with context
    pub fn with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        EngineError::WithContext {
            context: context.into(),
            message: msg.into(),
        }
    }

    /// Check if this error is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EngineError::Validation(_)
                | EngineError::EntityTypeValidation { .. }
                | EngineError::LinkValidation(_)
                | EngineError::CircularDependency { .. }
        )
    }

    /// Check if this error came out of formula checking or evaluation
    pub fn is_formula(&self) -> bool {
        matches!(
            self,
            EngineError::FormulaRejected { .. } | EngineError::FormulaEvaluation(_)
        )
    }

    /// Check if this error is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::EntityNotFound(_)
                | EngineError::EntityTypeNotFound(_)
                | EngineError::LinkNotFound(_)
                | EngineError::LibraryNotFound(_)
        )
    }

    /// Check if this error is an IO error
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            EngineError::Io(_)
                | EngineError::FileRead { .. }
                | EngineError::FileWrite { .. }
                | EngineError::DirectoryCreate { .. }
        )
    }
}

/// Result type alias using EngineError
pub type EngineResult<T> = Result<T, EngineError>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn with_context<C: Into<String>>(self, context: C) -> EngineResult<T>;
}

impl<T, E: Into<EngineError>> ResultExt<T> for Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> EngineResult<T> {
        self.map_err(|e| {
            let err: EngineError = e.into();
            EngineError::WithContext {
                context: context.into(),
                message: err.to_string(),
            }
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
