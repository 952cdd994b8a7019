//! # Loreforge Core
//!
//! Core types, traits, and error handling for Loreforge.
//!
//! This crate provides the foundational building blocks shared by the schema
//! engine and the command-line tool:
//!
//! - **Types**: the field-type registry (`FieldType`), field values
//!   (`FieldValue`) and computed-field output types (`OutputType`)
//! - **Traits**: `Validatable` for self-checking definitions
//! - **Errors**: unified error handling with `EngineError` and `EngineResult`
//!

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use error::{EngineError, EngineResult, ResultExt};
pub use traits::Validatable;
pub use types::{FieldType, FieldValue, FieldValues, OutputType, normalize_field_type};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
