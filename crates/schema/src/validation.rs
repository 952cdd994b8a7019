//! Validation rules and utilities for Loreforge schemas
//!
//! This module validates field definitions and entity type definitions
//! before they are saved. Validators never stop at the first problem: every
//! violation found is collected so an editor can show them all at once.

use crate::dependency::detect_circular_dependencies;
use crate::entity_type::{EntityTypeDefinition, is_built_in_type_key};
use crate::field::FieldDefinition;
use crate::formula::validate_computed_field_formula;
use loreforge_core::{EngineError, EngineResult, FieldType, Validatable};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

// ============================================================================
// ValidationResult
// ============================================================================

/// Result of a validation operation
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    /// Whether the validation passed
    pub valid: bool,

    /// List of errors (empty if valid)
    pub errors: Vec<ValidationError>,

    /// List of warnings (non-fatal issues)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    /// Create a successful validation result
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Create a failed validation result with an error
    pub fn error(error: ValidationError) -> Self {
        Self {
            valid: false,
            errors: vec![error],
            warnings: Vec::new(),
        }
    }

    /// Add an error to the result
    pub fn add_error(&mut self, error: ValidationError) {
        self.valid = false;
        self.errors.push(error);
    }

    /// Add a warning to the result
    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Merge another validation result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        if !other.valid {
            self.valid = false;
        }
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Check if there are any errors
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Check if there are any warnings
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Error messages in the order they were found
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.message.clone()).collect()
    }

    /// Convert to EngineResult (fails if any errors)
    pub fn to_result(self) -> EngineResult<()> {
        if self.valid {
            Ok(())
        } else {
            Err(EngineError::validation(self.messages().join("; ")))
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::ok()
    }
}

// ============================================================================
// ValidationError
// ============================================================================

/// A validation error
#[derive(Debug, Clone, Serialize)]
pub struct ValidationError {
    /// Error code for programmatic handling
    pub code: ValidationErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Path to the problematic element (e.g., "fields.hp")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Suggested fix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationError {
    /// Create a new validation error
    pub fn new(code: ValidationErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
            suggestion: None,
        }
    }

    /// Add a path to the error
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add a suggestion to the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(path) = &self.path {
            write!(f, "[{}] {}", path, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

// ============================================================================
// ValidationErrorCode
// ============================================================================

/// Error codes for validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorCode {
    // Type key errors
    MissingTypeKey,
    TypeKeyHasSpaces,
    TypeKeyNotLowercase,
    TypeKeyInvalidStart,
    TypeKeyInvalidCharacters,
    BuiltInTypeConflict,
    DuplicateTypeKey,

    // Type metadata errors
    MissingLabel,
    MissingPluralLabel,
    MissingIcon,
    MissingColor,

    // Field errors
    MissingFieldKey,
    FieldKeyHasSpaces,
    FieldKeyInvalidStart,
    FieldKeyInvalidCharacters,
    DuplicateFieldKey,
    MissingFieldLabel,
    MissingFieldType,
    InvalidFieldType,
    MissingOptions,
    EmptyOption,
    DuplicateOption,
    MissingEntityTypes,

    // Computed field errors
    MissingComputedConfig,
    MissingFormula,
    EmptyFormula,
    MissingDependencies,
    MissingOutputType,
    CircularDependency,

    // Formula structure errors
    UnbalancedBraces,
    InvalidPlaceholder,
    UndefinedFieldReference,
    UnusedDependency,
    UndeclaredDependency,
    UnbalancedParentheses,
}

// ============================================================================
// ValidationWarning
// ============================================================================

/// A validation warning (non-fatal issue)
#[derive(Debug, Clone, Serialize)]
pub struct ValidationWarning {
    /// Warning code
    pub code: ValidationWarningCode,

    /// Human-readable warning message
    pub message: String,

    /// Path to the element
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ValidationWarning {
    /// Create a new warning
    pub fn new(code: ValidationWarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
        }
    }

    /// Add a path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(path) = &self.path {
            write!(f, "[{}] Warning: {}", path, self.message)
        } else {
            write!(f, "Warning: {}", self.message)
        }
    }
}

/// Warning codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationWarningCode {
    DuplicateFieldOrder,
    NonContiguousFieldOrder,
}

// ============================================================================
// Field definitions
// ============================================================================

/// Validate a single field definition
pub fn validate_field_definition(field: &FieldDefinition) -> ValidationResult {
    let mut result = ValidationResult::ok();
    let path = field_path(field);

    check_field_key(&field.key, &path, &mut result);

    if field.label.trim().is_empty() {
        result.add_error(
            ValidationError::new(ValidationErrorCode::MissingFieldLabel, "Field label is required")
                .with_path(&path),
        );
    }

    match &field.field_type {
        None => result.add_error(
            ValidationError::new(ValidationErrorCode::MissingFieldType, "Field type is required")
                .with_path(&path),
        ),
        Some(FieldType::Unknown(raw)) if raw.trim().is_empty() => result.add_error(
            ValidationError::new(ValidationErrorCode::MissingFieldType, "Field type is required")
                .with_path(&path),
        ),
        Some(FieldType::Unknown(raw)) => result.add_error(
            ValidationError::new(
                ValidationErrorCode::InvalidFieldType,
                format!("Invalid field type: {}", raw),
            )
            .with_path(&path)
            .with_suggestion(format!(
                "Use one of: {}",
                FieldType::all()
                    .iter()
                    .map(FieldType::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        ),
        Some(ty) if ty.requires_options() => check_options(field, &path, &mut result),
        Some(ty) if ty.requires_entity_types() => {
            if field.entity_types.as_ref().is_none_or(Vec::is_empty) {
                result.add_error(
                    ValidationError::new(
                        ValidationErrorCode::MissingEntityTypes,
                        "Entity reference fields must specify at least one entity type",
                    )
                    .with_path(&path),
                );
            }
        }
        Some(FieldType::Computed) => check_computed_config(field, &path, &mut result),
        Some(_) => {}
    }

    result
}

fn field_path(field: &FieldDefinition) -> String {
    if field.key.is_empty() {
        "fields".to_string()
    } else {
        format!("fields.{}", field.key)
    }
}

fn check_field_key(key: &str, path: &str, result: &mut ValidationResult) {
    if key.is_empty() {
        result.add_error(
            ValidationError::new(ValidationErrorCode::MissingFieldKey, "Field key is required")
                .with_path(path),
        );
        return;
    }

    let has_spaces = key.contains(char::is_whitespace);
    if has_spaces {
        result.add_error(
            ValidationError::new(
                ValidationErrorCode::FieldKeyHasSpaces,
                "Field key cannot contain spaces",
            )
            .with_path(path)
            .with_suggestion(format!("Try '{}'", key.split_whitespace().collect::<Vec<_>>().join("_"))),
        );
    }

    let starts_with_letter = key.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    if !starts_with_letter {
        result.add_error(
            ValidationError::new(
                ValidationErrorCode::FieldKeyInvalidStart,
                "Field key must start with a letter",
            )
            .with_path(path),
        );
    }

    let valid_chars = key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !has_spaces && starts_with_letter && !valid_chars {
        result.add_error(
            ValidationError::new(
                ValidationErrorCode::FieldKeyInvalidCharacters,
                "Field key can only contain letters, numbers, and underscores",
            )
            .with_path(path),
        );
    }
}

fn check_options(field: &FieldDefinition, path: &str, result: &mut ValidationResult) {
    let options = match &field.options {
        Some(options) if !options.is_empty() => options,
        _ => {
            result.add_error(
                ValidationError::new(
                    ValidationErrorCode::MissingOptions,
                    "Select fields must have at least one option",
                )
                .with_path(path),
            );
            return;
        }
    };

    if options.iter().any(|o| o.trim().is_empty()) {
        result.add_error(
            ValidationError::new(ValidationErrorCode::EmptyOption, "Option values cannot be empty")
                .with_path(path),
        );
    }

    let mut seen = HashSet::new();
    if let Some(duplicate) = options.iter().find(|o| !seen.insert(o.as_str())) {
        result.add_error(
            ValidationError::new(
                ValidationErrorCode::DuplicateOption,
                format!("Duplicate option: {}", duplicate),
            )
            .with_path(path),
        );
    }
}

fn check_computed_config(field: &FieldDefinition, path: &str, result: &mut ValidationResult) {
    let Some(config) = &field.computed_config else {
        result.add_error(
            ValidationError::new(
                ValidationErrorCode::MissingComputedConfig,
                "Computed fields must have a computed configuration",
            )
            .with_path(path),
        );
        return;
    };

    match config.formula.as_deref() {
        None => result.add_error(
            ValidationError::new(
                ValidationErrorCode::MissingFormula,
                "Computed field formula is required",
            )
            .with_path(path),
        ),
        Some(formula) if formula.trim().is_empty() => result.add_error(
            ValidationError::new(
                ValidationErrorCode::EmptyFormula,
                "Computed field formula cannot be empty",
            )
            .with_path(path),
        ),
        Some(_) => {}
    }

    if config.dependencies.is_none() {
        result.add_error(
            ValidationError::new(
                ValidationErrorCode::MissingDependencies,
                "Computed field must have a dependencies array",
            )
            .with_path(path),
        );
    }

    if config.output_type.as_ref().is_none_or(|t| t.as_str().is_empty()) {
        result.add_error(
            ValidationError::new(
                ValidationErrorCode::MissingOutputType,
                "Computed field output type is required",
            )
            .with_path(path)
            .with_suggestion("Use one of: text, number, boolean"),
        );
    }
}

impl Validatable for FieldDefinition {
    fn validate(&self) -> EngineResult<()> {
        validate_field_definition(self).to_result()
    }

    fn validation_errors(&self) -> Vec<String> {
        validate_field_definition(self).messages()
    }
}

// ============================================================================
// Type keys
// ============================================================================

/// Check a type key against built-in keys and existing custom types
pub fn validate_type_key_uniqueness(
    key: &str,
    existing: &[EntityTypeDefinition],
) -> ValidationResult {
    check_key_uniqueness(key, existing.iter().map(|t| t.type_key.as_str()))
}

fn check_key_uniqueness<'a>(key: &str, mut existing: impl Iterator<Item = &'a str>) -> ValidationResult {
    let mut result = ValidationResult::ok();

    if is_built_in_type_key(key) {
        result.add_error(
            ValidationError::new(
                ValidationErrorCode::BuiltInTypeConflict,
                format!("Type key \"{}\" conflicts with a built-in type", key),
            )
            .with_path("type")
            .with_suggestion("Clone the built-in type instead, or choose another key"),
        );
    }

    if existing.any(|k| k == key) {
        result.add_error(
            ValidationError::new(
                ValidationErrorCode::DuplicateTypeKey,
                format!("Type key \"{}\" is already in use", key),
            )
            .with_path("type"),
        );
    }

    result
}

fn check_type_key_format(key: &str, result: &mut ValidationResult) {
    if key.is_empty() {
        result.add_error(
            ValidationError::new(ValidationErrorCode::MissingTypeKey, "Type key is required")
                .with_path("type"),
        );
        return;
    }

    let has_spaces = key.contains(char::is_whitespace);
    if has_spaces {
        result.add_error(
            ValidationError::new(
                ValidationErrorCode::TypeKeyHasSpaces,
                "Type key cannot contain spaces",
            )
            .with_path("type"),
        );
    }

    let is_lowercase = key == key.to_lowercase();
    if !is_lowercase {
        result.add_error(
            ValidationError::new(
                ValidationErrorCode::TypeKeyNotLowercase,
                "Type key must be lowercase",
            )
            .with_path("type")
            .with_suggestion(format!("Try '{}'", key.to_lowercase())),
        );
    }

    let starts_with_letter = key.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    if !starts_with_letter {
        result.add_error(
            ValidationError::new(
                ValidationErrorCode::TypeKeyInvalidStart,
                "Type key must start with a letter",
            )
            .with_path("type"),
        );
    }

    let valid_chars = key
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if !has_spaces && is_lowercase && starts_with_letter && !valid_chars {
        result.add_error(
            ValidationError::new(
                ValidationErrorCode::TypeKeyInvalidCharacters,
                "Type key can only contain lowercase letters, numbers, hyphens, and underscores",
            )
            .with_path("type"),
        );
    }
}

// ============================================================================
// EntityTypeRule Trait
// ============================================================================

/// One check applied to an entity type definition
pub trait EntityTypeRule {
    /// Get the rule name
    fn name(&self) -> &'static str;

    /// Get the rule description
    fn description(&self) -> &'static str;

    /// Validate a definition and return the result
    fn validate(&self, definition: &EntityTypeDefinition) -> ValidationResult;
}

// ============================================================================
// EntityTypeValidator
// ============================================================================

/// Entity type validator that runs multiple rules
#[derive(Default)]
pub struct EntityTypeValidator {
    rules: Vec<Box<dyn EntityTypeRule>>,
}

impl EntityTypeValidator {
    /// Create a validator without rules
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Create a validator with the standard rules
    ///
    /// `existing` are the custom types already defined. When re-validating a
    /// type that is being edited, leave that type out of the list.
    pub fn with_default_rules(existing: &[EntityTypeDefinition]) -> Self {
        let mut validator = Self::new();
        validator.add_rule(Box::new(TypeKeyRule::new(existing)));
        validator.add_rule(Box::new(TypeMetadataRule));
        validator.add_rule(Box::new(FieldDefinitionsRule));
        validator.add_rule(Box::new(CircularDependencyRule));
        validator
    }

    /// Standard rules plus formula cross-checks for computed fields
    pub fn strict(existing: &[EntityTypeDefinition]) -> Self {
        let mut validator = Self::with_default_rules(existing);
        validator.add_rule(Box::new(FormulaReferencesRule));
        validator
    }

    /// Add a validation rule
    pub fn add_rule(&mut self, rule: Box<dyn EntityTypeRule>) {
        self.rules.push(rule);
    }

    /// Names of the configured rules, in run order
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Validate a definition with all rules
    pub fn validate(&self, definition: &EntityTypeDefinition) -> ValidationResult {
        let mut result = ValidationResult::ok();

        for rule in &self.rules {
            let rule_result = rule.validate(definition);
            if !rule_result.valid {
                tracing::debug!(
                    rule = rule.name(),
                    type_key = %definition.type_key,
                    errors = rule_result.errors.len(),
                    "rule failed"
                );
            }
            result.merge(rule_result);
        }

        result
    }

    /// Validate and return Result
    pub fn validate_result(&self, definition: &EntityTypeDefinition) -> EngineResult<()> {
        let result = self.validate(definition);
        if result.valid {
            Ok(())
        } else {
            Err(EngineError::entity_type_validation(
                &definition.type_key,
                result.messages().join("; "),
            ))
        }
    }
}

/// Validate an entity type definition against the existing custom types
pub fn validate_entity_type_definition(
    definition: &EntityTypeDefinition,
    existing: &[EntityTypeDefinition],
) -> ValidationResult {
    EntityTypeValidator::with_default_rules(existing).validate(definition)
}

// ============================================================================
// Built-in Rules
// ============================================================================

/// Rule: type key format and uniqueness
pub struct TypeKeyRule {
    existing_keys: Vec<String>,
}

impl TypeKeyRule {
    pub fn new(existing: &[EntityTypeDefinition]) -> Self {
        Self {
            existing_keys: existing.iter().map(|t| t.type_key.clone()).collect(),
        }
    }
}

impl EntityTypeRule for TypeKeyRule {
    fn name(&self) -> &'static str {
        "type_key"
    }

    fn description(&self) -> &'static str {
        "Validates the type key format and that it is not already taken"
    }

    fn validate(&self, definition: &EntityTypeDefinition) -> ValidationResult {
        let mut result = ValidationResult::ok();
        let key = definition.type_key.as_str();

        check_type_key_format(key, &mut result);
        if !key.is_empty() {
            result.merge(check_key_uniqueness(
                key,
                self.existing_keys.iter().map(String::as_str),
            ));
        }

        result
    }
}

/// Rule: display metadata
pub struct TypeMetadataRule;

impl EntityTypeRule for TypeMetadataRule {
    fn name(&self) -> &'static str {
        "type_metadata"
    }

    fn description(&self) -> &'static str {
        "Validates that labels, icon and colour are set"
    }

    fn validate(&self, definition: &EntityTypeDefinition) -> ValidationResult {
        let mut result = ValidationResult::ok();

        let required = [
            (&definition.label, ValidationErrorCode::MissingLabel, "label", "Label is required"),
            (
                &definition.label_plural,
                ValidationErrorCode::MissingPluralLabel,
                "labelPlural",
                "Plural label is required",
            ),
            (&definition.icon, ValidationErrorCode::MissingIcon, "icon", "Icon is required"),
            (&definition.color, ValidationErrorCode::MissingColor, "color", "Color is required"),
        ];

        for (value, code, path, message) in required {
            if value.trim().is_empty() {
                result.add_error(ValidationError::new(code, message).with_path(path));
            }
        }

        result
    }
}

/// Rule: field definitions
pub struct FieldDefinitionsRule;

impl EntityTypeRule for FieldDefinitionsRule {
    fn name(&self) -> &'static str {
        "field_definitions"
    }

    fn description(&self) -> &'static str {
        "Validates each field and that field keys are unique"
    }

    fn validate(&self, definition: &EntityTypeDefinition) -> ValidationResult {
        let mut result = ValidationResult::ok();
        let Some(fields) = &definition.field_definitions else {
            return result;
        };

        let mut seen = HashSet::new();
        let mut reported = HashSet::new();
        for field in fields {
            if field.key.is_empty() {
                continue;
            }
            if !seen.insert(field.key.as_str()) && reported.insert(field.key.as_str()) {
                result.add_error(
                    ValidationError::new(
                        ValidationErrorCode::DuplicateFieldKey,
                        format!("Duplicate field key: {}", field.key),
                    )
                    .with_path(format!("fields.{}", field.key)),
                );
            }
        }

        for field in fields {
            result.merge(validate_field_definition(field));
        }

        check_field_order(fields, &mut result);
        result
    }
}

/// Orders should be unique and run 1..=n; both are conventions, so they warn
fn check_field_order(fields: &[FieldDefinition], result: &mut ValidationResult) {
    if fields.is_empty() {
        return;
    }

    let mut by_order: BTreeMap<i32, Vec<&str>> = BTreeMap::new();
    for field in fields {
        by_order.entry(field.order).or_default().push(field.key.as_str());
    }

    for (order, keys) in &by_order {
        if keys.len() > 1 {
            result.add_warning(
                ValidationWarning::new(
                    ValidationWarningCode::DuplicateFieldOrder,
                    format!("Fields {} share order {}", keys.join(", "), order),
                )
                .with_path("fields"),
            );
        }
    }

    let contiguous = by_order.keys().copied().eq(1..=by_order.len() as i32);
    if !contiguous {
        result.add_warning(
            ValidationWarning::new(
                ValidationWarningCode::NonContiguousFieldOrder,
                "Field order values are not contiguous from 1",
            )
            .with_path("fields"),
        );
    }
}

/// Rule: no dependency cycles between computed fields
pub struct CircularDependencyRule;

impl EntityTypeRule for CircularDependencyRule {
    fn name(&self) -> &'static str {
        "circular_dependencies"
    }

    fn description(&self) -> &'static str {
        "Validates that computed fields do not depend on each other in a loop"
    }

    fn validate(&self, definition: &EntityTypeDefinition) -> ValidationResult {
        let Some(fields) = &definition.field_definitions else {
            return ValidationResult::ok();
        };

        let report = detect_circular_dependencies(fields);
        match report.describe() {
            Some(path) => ValidationResult::error(
                ValidationError::new(
                    ValidationErrorCode::CircularDependency,
                    format!("Circular dependency detected: {}", path),
                )
                .with_path("fields"),
            ),
            None => ValidationResult::ok(),
        }
    }
}

/// Rule: computed formulas agree with their dependencies and the field list
pub struct FormulaReferencesRule;

impl EntityTypeRule for FormulaReferencesRule {
    fn name(&self) -> &'static str {
        "formula_references"
    }

    fn description(&self) -> &'static str {
        "Validates placeholders and dependencies of computed formulas"
    }

    fn validate(&self, definition: &EntityTypeDefinition) -> ValidationResult {
        let mut result = ValidationResult::ok();
        let all_keys = definition.field_keys();

        for field in definition.fields().iter().filter(|f| f.is_computed()) {
            let Some(config) = &field.computed_config else {
                continue;
            };
            if config.formula().trim().is_empty() {
                continue;
            }

            let formula_result =
                validate_computed_field_formula(config.formula(), config.dependency_keys(), &all_keys);
            for error in formula_result.errors {
                let path = match &error.path {
                    Some(inner) => format!("fields.{}.{}", field.key, inner),
                    None => format!("fields.{}", field.key),
                };
                result.add_error(error.with_path(path));
            }
        }

        result
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity_type::{built_in_entity_types, suggest_type_key};
    use crate::field::ComputedFieldConfig;
    use loreforge_core::OutputType;
    use proptest::prelude::*;

    fn valid_type() -> EntityTypeDefinition {
        EntityTypeDefinition::new("ship", "Ship", "Ships")
            .with_appearance("sailing", "blue")
            .with_field(FieldDefinition::new("name", "Name", FieldType::Text).required())
            .with_field(FieldDefinition::new("crew", "Crew", FieldType::Number))
            .with_field(FieldDefinition::computed(
                "crew_label",
                "Crew label",
                ComputedFieldConfig::new("{name} ({crew} crew)", ["name", "crew"], OutputType::Text),
            ))
    }

    fn computed(key: &str, deps: &[&str]) -> FieldDefinition {
        let formula = deps
            .iter()
            .map(|d| format!("{{{}}}", d))
            .collect::<Vec<_>>()
            .join(" + ");
        FieldDefinition::computed(
            key,
            key,
            ComputedFieldConfig::new(formula, deps.iter().copied(), OutputType::Number),
        )
    }

    #[test]
    fn test_validation_result_merge() {
        let mut result = ValidationResult::ok();
        result.merge(ValidationResult::error(ValidationError::new(
            ValidationErrorCode::MissingLabel,
            "Label is required",
        )));
        assert!(!result.valid);
        assert!(result.has_errors());
        assert_eq!(result.messages(), vec!["Label is required"]);
        assert!(result.to_result().is_err());
    }

    #[test]
    fn test_validation_error_display() {
        let error = ValidationError::new(ValidationErrorCode::EmptyOption, "Option values cannot be empty")
            .with_path("fields.mood");
        assert_eq!(error.to_string(), "[fields.mood] Option values cannot be empty");
    }

    // ------------------------------------------------------------------------
    // Field definitions
    // ------------------------------------------------------------------------

    #[test]
    fn test_valid_field() {
        let field = FieldDefinition::new("hit_points", "Hit points", FieldType::Number);
        assert!(validate_field_definition(&field).valid);
        assert!(field.is_valid());
    }

    #[test]
    fn test_empty_field_accumulates_errors() {
        let result = validate_field_definition(&FieldDefinition::default());
        assert_eq!(
            result.messages(),
            vec![
                "Field key is required",
                "Field label is required",
                "Field type is required"
            ]
        );
    }

    #[test]
    fn test_field_key_violations_are_distinct() {
        let spaces = FieldDefinition::new("hit points", "HP", FieldType::Number);
        assert_eq!(
            validate_field_definition(&spaces).messages(),
            vec!["Field key cannot contain spaces"]
        );

        let digit = FieldDefinition::new("1st", "First", FieldType::Text);
        assert_eq!(
            validate_field_definition(&digit).messages(),
            vec!["Field key must start with a letter"]
        );

        let dash = FieldDefinition::new("hit-points", "HP", FieldType::Number);
        assert_eq!(
            validate_field_definition(&dash).messages(),
            vec!["Field key can only contain letters, numbers, and underscores"]
        );
    }

    #[test]
    fn test_invalid_field_type() {
        let field = FieldDefinition::new("mood", "Mood", FieldType::Unknown("emoji".into()));
        let result = validate_field_definition(&field);
        assert_eq!(result.messages(), vec!["Invalid field type: emoji"]);
        assert!(result.errors[0].suggestion.is_some());
    }

    #[test]
    fn test_select_options() {
        let none = FieldDefinition::new("mood", "Mood", FieldType::Select);
        assert_eq!(
            validate_field_definition(&none).messages(),
            vec!["Select fields must have at least one option"]
        );

        let bad = FieldDefinition::select("mood", "Mood", ["calm", "", "angry", "calm", "angry"]);
        assert_eq!(
            validate_field_definition(&bad).messages(),
            vec!["Option values cannot be empty", "Duplicate option: calm"]
        );

        let multi = FieldDefinition::new("traits", "Traits", FieldType::MultiSelect)
            .with_options(Vec::<String>::new());
        assert!(!validate_field_definition(&multi).valid);
    }

    #[test]
    fn test_entity_ref_targets() {
        let field = FieldDefinition::new("home", "Home", FieldType::EntityRef);
        assert_eq!(
            validate_field_definition(&field).messages(),
            vec!["Entity reference fields must specify at least one entity type"]
        );

        let field = FieldDefinition::entity_ref("allies", "Allies", ["npc"]);
        assert!(validate_field_definition(&field).valid);
    }

    #[test]
    fn test_computed_config_checks() {
        let no_config = FieldDefinition::new("total", "Total", FieldType::Computed);
        assert_eq!(
            validate_field_definition(&no_config).messages(),
            vec!["Computed fields must have a computed configuration"]
        );

        let mut bare = no_config.clone();
        bare.computed_config = Some(ComputedFieldConfig::default());
        assert_eq!(
            validate_field_definition(&bare).messages(),
            vec![
                "Computed field formula is required",
                "Computed field must have a dependencies array",
                "Computed field output type is required"
            ]
        );

        let mut empty_formula = no_config.clone();
        empty_formula.computed_config = Some(ComputedFieldConfig::new(
            "",
            Vec::<String>::new(),
            OutputType::Number,
        ));
        assert_eq!(
            validate_field_definition(&empty_formula).messages(),
            vec!["Computed field formula cannot be empty"]
        );
    }

    // ------------------------------------------------------------------------
    // Entity types
    // ------------------------------------------------------------------------

    #[test]
    fn test_valid_entity_type() {
        let result = validate_entity_type_definition(&valid_type(), &[]);
        assert!(result.valid, "{:?}", result.messages());
        assert!(!result.has_warnings());
    }

    #[test]
    fn test_type_key_violations_are_distinct() {
        let cases = [
            ("", "Type key is required"),
            ("war ship", "Type key cannot contain spaces"),
            ("Warship", "Type key must be lowercase"),
            ("9ship", "Type key must start with a letter"),
            (
                "ship!",
                "Type key can only contain lowercase letters, numbers, hyphens, and underscores",
            ),
        ];
        for (key, message) in cases {
            let mut def = valid_type();
            def.type_key = key.to_string();
            let result = validate_entity_type_definition(&def, &[]);
            assert_eq!(result.messages(), vec![message], "key '{}'", key);
        }

        let mut def = valid_type();
        def.type_key = "sea-ship_2".to_string();
        assert!(validate_entity_type_definition(&def, &[]).valid);
    }

    #[test]
    fn test_key_conflicts_are_worded_differently() {
        let mut def = valid_type();
        def.type_key = "npc".to_string();
        assert_eq!(
            validate_entity_type_definition(&def, &[]).messages(),
            vec!["Type key \"npc\" conflicts with a built-in type"]
        );

        let existing = vec![valid_type()];
        assert_eq!(
            validate_entity_type_definition(&valid_type(), &existing).messages(),
            vec!["Type key \"ship\" is already in use"]
        );

        // exact match only
        let mut def = valid_type();
        def.type_key = "npcs".to_string();
        assert!(validate_entity_type_definition(&def, &existing).valid);
    }

    #[test]
    fn test_type_key_uniqueness() {
        assert!(validate_type_key_uniqueness("ship", &[]).valid);
        assert!(!validate_type_key_uniqueness("faction", &[]).valid);
        assert!(!validate_type_key_uniqueness("ship", &[valid_type()]).valid);
    }

    #[test]
    fn test_missing_metadata_accumulates() {
        let def = EntityTypeDefinition {
            type_key: "ship".to_string(),
            ..Default::default()
        };
        assert_eq!(
            validate_entity_type_definition(&def, &[]).messages(),
            vec![
                "Label is required",
                "Plural label is required",
                "Icon is required",
                "Color is required"
            ]
        );
    }

    #[test]
    fn test_field_errors_are_flattened() {
        let def = valid_type()
            .with_field(FieldDefinition::new("crew", "Crew again", FieldType::Number))
            .with_field(FieldDefinition::new("mood", "", FieldType::Select));
        assert_eq!(
            validate_entity_type_definition(&def, &[]).messages(),
            vec![
                "Duplicate field key: crew",
                "Field label is required",
                "Select fields must have at least one option"
            ]
        );
    }

    #[test]
    fn test_cycle_is_reported_once() {
        let def = valid_type()
            .with_field(computed("fieldA", &["fieldB"]))
            .with_field(computed("fieldB", &["fieldA"]));
        assert_eq!(
            validate_entity_type_definition(&def, &[]).messages(),
            vec!["Circular dependency detected: fieldA -> fieldB -> fieldA"]
        );
    }

    #[test]
    fn test_order_warnings() {
        let def = EntityTypeDefinition::new("ship", "Ship", "Ships")
            .with_field(FieldDefinition::new("a", "A", FieldType::Text).with_order(1))
            .with_field(FieldDefinition::new("b", "B", FieldType::Text).with_order(1))
            .with_field(FieldDefinition::new("c", "C", FieldType::Text).with_order(5));
        let result = validate_entity_type_definition(&def, &[]);
        assert!(result.valid);
        let codes: Vec<_> = result.warnings.iter().map(|w| w.code).collect();
        assert_eq!(
            codes,
            vec![
                ValidationWarningCode::DuplicateFieldOrder,
                ValidationWarningCode::NonContiguousFieldOrder
            ]
        );
    }

    #[test]
    fn test_strict_mode_checks_formulas() {
        let def = valid_type().with_field(FieldDefinition::computed(
            "odd",
            "Odd",
            ComputedFieldConfig::new("{ghost} * 2", ["crew"], OutputType::Number),
        ));
        assert!(validate_entity_type_definition(&def, &[]).valid);

        let result = EntityTypeValidator::strict(&[]).validate(&def);
        assert_eq!(
            result.messages(),
            vec![
                "Formula references undefined field: ghost",
                "Dependency 'crew' is not used in formula",
                "Formula uses field 'ghost' that is not listed in dependencies"
            ]
        );
        assert_eq!(result.errors[0].path.as_deref(), Some("fields.odd.ghost"));
    }

    #[test]
    fn test_validator_rule_names() {
        assert_eq!(
            EntityTypeValidator::strict(&[]).rule_names(),
            vec![
                "type_key",
                "type_metadata",
                "field_definitions",
                "circular_dependencies",
                "formula_references"
            ]
        );
    }

    #[test]
    fn test_validate_result_names_the_type() {
        let validator = EntityTypeValidator::with_default_rules(&[]);
        assert!(validator.validate_result(&valid_type()).is_ok());

        let mut def = valid_type();
        def.label = String::new();
        let err = validator.validate_result(&def).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "Entity type validation failed for 'ship': Label is required"
        );
    }

    #[test]
    fn test_cloned_built_ins_validate() {
        let mut existing: Vec<EntityTypeDefinition> = Vec::new();
        for built_in in built_in_entity_types() {
            let mut copy = built_in.clone_as_custom();
            assert_eq!(copy.type_key, "");
            assert!(!copy.is_built_in);
            assert!(copy.label.ends_with(" (Copy)"));

            copy.type_key = suggest_type_key(&copy.label, &existing);
            let result = EntityTypeValidator::strict(&existing).validate(&copy);
            assert!(result.valid, "{}: {:?}", copy.type_key, result.messages());
            existing.push(copy);
        }
    }

    proptest! {
        #[test]
        fn prop_clone_with_fresh_key_is_valid(
            index in 0usize..11,
            suffix in "[a-z][a-z0-9_]{0,8}",
        ) {
            let built_ins = built_in_entity_types();
            let mut copy = built_ins[index].clone_as_custom();
            copy.type_key = format!("custom_{}", suffix);
            let result = validate_entity_type_definition(&copy, &[]);
            prop_assert!(result.valid, "{:?}", result.messages());
        }

        #[test]
        fn prop_built_in_keys_always_conflict(index in 0usize..11) {
            let built_ins = built_in_entity_types();
            let mut def = valid_type();
            def.type_key = built_ins[index].type_key.clone();
            let result = validate_entity_type_definition(&def, &[]);
            prop_assert!(!result.valid);
            prop_assert!(result.errors.iter().any(|e| e.code == ValidationErrorCode::BuiltInTypeConflict));
        }
    }
}
