//! Core traits for Loreforge
//!
//! This module defines the traits that schema types implement to provide
//! consistent behavior for validation and persistence.

use crate::error::{EngineError, EngineResult};
use serde::{Serialize, de::DeserializeOwned};

// ============================================================================
// Validatable Trait
// ============================================================================

/// Trait for types that can be validated
///
/// Types implementing this trait can check their internal consistency
/// and return validation errors if the state is invalid.
///
/// # Example
///
/// ```rust,ignore
/// use loreforge_core::{EngineError, EngineResult, Validatable};
///
/// struct Tag {
///     name: String,
/// }
///
/// impl Validatable for Tag {
///     fn validate(&self) -> EngineResult<()> {
///         if self.name.is_empty() {
///             return Err(EngineError::validation("Tag name cannot be empty"));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Validatable {
    /// Validate the current state of the object
    ///
    /// Returns `Ok(())` if valid, or an `EngineError` describing the problem.
    fn validate(&self) -> EngineResult<()>;

    /// Check if the object is valid without returning error details
    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Get all validation errors (for types that can have multiple errors)
    fn validation_errors(&self) -> Vec<String> {
        match self.validate() {
            Ok(()) => vec![],
            Err(e) => vec![e.to_string()],
        }
    }
}

// ============================================================================
// Persistable Trait
// ============================================================================

/// Trait for types that can be serialized to and deserialized from files
///
/// Types implementing this trait can be saved to and loaded from
/// JSON documents on disk.
pub trait Persistable: Serialize + DeserializeOwned + Sized {
    /// Get the file extension for this type (without the dot)
    fn file_extension() -> &'static str;

    /// Get the schema version for migration purposes
    fn schema_version() -> u32 {
        1
    }

    /// Save to a JSON string
    fn to_json(&self) -> EngineResult<String> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }

    /// Load from a JSON string
    fn from_json(json: &str) -> EngineResult<Self> {
        serde_json::from_str(json).map_err(Into::into)
    }

    /// Save to a file
    fn save_to_file(&self, path: &std::path::Path) -> EngineResult<()> {
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|e| EngineError::FileWrite {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load from a file
    fn load_from_file(path: &std::path::Path) -> EngineResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| EngineError::FileRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_json(&json)
    }
}

// ============================================================================
// Tests
// ============================================================================
