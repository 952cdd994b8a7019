//! # Loreforge Schema
//!
//! This crate holds the schema layer of Loreforge: entity type definitions,
//! their field definitions, the validators that guard them, and the formula
//! engine behind computed fields.
//!
//! ## Core Concepts
//!
//! - **Entity type**: a category of campaign object (NPC, faction, ...) with
//!   its own field schema
//! - **Field definition**: one attribute slot within an entity type
//! - **Computed field**: a field derived from other fields by a formula with
//!   `{fieldKey}` placeholders
//! - **Link**: a typed, optionally bidirectional relationship between two
//!   entities
//! - **Type library**: a file of custom entity types that can be shared
//!

// Module declarations
pub mod dependency;
pub mod entity_type;
pub mod field;
pub mod formula;
pub mod links;
pub mod serialization;
pub mod validation;

// Re-export commonly used types at crate root
pub use dependency::{CircularDependencyReport, detect_circular_dependencies, evaluation_order};
pub use entity_type::{
    BUILT_IN_TYPE_KEYS, EntityTypeDefinition, built_in_entity_type, built_in_entity_types,
    is_built_in_type_key, suggest_type_key,
};
pub use field::{ComputedFieldConfig, FieldDefinition};
pub use formula::{
    FormulaCheck, RecomputeOutcome, evaluate_computed_field, recompute_computed_fields,
    validate_computed_field_formula, validate_formula_for_eval,
};
pub use links::{Entity, EntityLink, EntityMetadata, EntityStore, LinkRequest, LinkStrength};
pub use serialization::{TypeLibrary, load_libraries_from_dir, load_library, save_library};
pub use validation::{
    EntityTypeRule, EntityTypeValidator, ValidationError, ValidationErrorCode, ValidationResult,
    ValidationWarning, validate_entity_type_definition, validate_field_definition,
    validate_type_key_uniqueness,
};

// Re-export core types that are commonly used with schemas
pub use loreforge_core::{
    EngineError, EngineResult, FieldType, FieldValue, FieldValues, OutputType,
    normalize_field_type,
};

/// Current schema version for type library files
pub const SCHEMA_VERSION: u32 = 1;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Prelude Module
// ============================================================================

/// Convenient re-exports for common usage
pub mod prelude {
    pub use crate::{
        ComputedFieldConfig,
        EngineError,
        EngineResult,
        Entity,
        EntityStore,
        EntityTypeDefinition,
        FieldDefinition,
        FieldType,
        FieldValue,
        FieldValues,
        LinkRequest,
        OutputType,
        ValidationResult,
        // Operations
        evaluate_computed_field,
        validate_entity_type_definition,
        validate_field_definition,
        validate_formula_for_eval,
    };
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_schema_version() {
        assert_eq!(super::SCHEMA_VERSION, 1);
    }

    #[test]
    fn test_encounter_difficulty_end_to_end() {
        let encounter = super::built_in_entity_type("encounter").unwrap();
        let difficulty = encounter.field("difficulty").unwrap();
        let config = difficulty.computed_config.as_ref().unwrap();

        let values: FieldValues = [
            ("enemy_count".to_string(), FieldValue::from(3)),
            ("enemy_cr".to_string(), FieldValue::from(1.5)),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            evaluate_computed_field(config, &values).unwrap(),
            Some(FieldValue::Number(4.5))
        );
    }
}
