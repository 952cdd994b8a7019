//! Definition-time formula checks
//!
//! Run when a user authors a computed field: every placeholder must name a
//! known field, placeholders and declared dependencies must be the same set,
//! and braces and parentheses must balance.

use super::PLACEHOLDER;
use crate::validation::{ValidationError, ValidationErrorCode, ValidationResult};
use std::collections::HashSet;

/// Placeholder keys in first-occurrence order, without duplicates
pub fn extract_placeholders(formula: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    PLACEHOLDER
        .captures_iter(formula)
        .map(|caps| caps[1].to_string())
        .filter(|key| seen.insert(key.clone()))
        .collect()
}

/// Cross-check a formula against its dependencies and the available fields
///
/// Errors accumulate; an unbalanced brace count is the only failure that
/// stops the placeholder checks.
pub fn validate_computed_field_formula(
    formula: &str,
    dependencies: &[String],
    all_field_keys: &[String],
) -> ValidationResult {
    let mut result = ValidationResult::ok();

    let opening = formula.matches('{').count();
    let closing = formula.matches('}').count();
    if opening != closing {
        result.add_error(ValidationError::new(
            ValidationErrorCode::UnbalancedBraces,
            "Unbalanced braces in formula",
        ));
        return result;
    }

    let mut placeholders: Vec<String> = Vec::new();
    for key in extract_placeholders(formula) {
        if key.is_empty() || key.chars().any(char::is_whitespace) {
            result.add_error(ValidationError::new(
                ValidationErrorCode::InvalidPlaceholder,
                format!("Invalid placeholder syntax: {{{}}}", key),
            ));
            continue;
        }
        placeholders.push(key);
    }

    for key in &placeholders {
        if !all_field_keys.contains(key) {
            result.add_error(
                ValidationError::new(
                    ValidationErrorCode::UndefinedFieldReference,
                    format!("Formula references undefined field: {}", key),
                )
                .with_path(key),
            );
        }
    }

    for dependency in dependencies {
        if !placeholders.contains(dependency) {
            result.add_error(
                ValidationError::new(
                    ValidationErrorCode::UnusedDependency,
                    format!("Dependency '{}' is not used in formula", dependency),
                )
                .with_suggestion(format!(
                    "Reference it as {{{}}} or remove it from dependencies",
                    dependency
                )),
            );
        }
    }

    for key in &placeholders {
        if !dependencies.contains(key) {
            result.add_error(
                ValidationError::new(
                    ValidationErrorCode::UndeclaredDependency,
                    format!(
                        "Formula uses field '{}' that is not listed in dependencies",
                        key
                    ),
                )
                .with_suggestion(format!("Add '{}' to dependencies", key)),
            );
        }
    }

    if formula.matches('(').count() != formula.matches(')').count() {
        result.add_error(ValidationError::new(
            ValidationErrorCode::UnbalancedParentheses,
            "Unbalanced parentheses in formula",
        ));
    }

    result
}
