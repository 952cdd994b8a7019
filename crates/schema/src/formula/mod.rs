//! Computed-field formulas
//!
//! A formula is either a string template (`"{first} {last}"`) or an
//! expression over field values (`"{hp} > 0"`). This module holds the
//! definition-time structural check, the evaluation-time guard, the
//! expression parser and interpreter, and whole-entity recomputation.

pub mod ast;
pub mod evaluator;
pub mod guard;
pub mod parser;
pub mod recompute;
pub mod structure;

use regex::Regex;
use std::sync::LazyLock;

/// `{fieldKey}` placeholder; group 1 is the raw key text
pub(crate) static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}]*)\}").expect("placeholder pattern"));

/// Characters that turn a formula into an expression
const EXPRESSION_CHARS: &[char] = &['+', '-', '*', '/', '<', '>', '=', '!', '(', ')'];

/// The formula with every placeholder removed
pub fn strip_placeholders(formula: &str) -> String {
    PLACEHOLDER.replace_all(formula, "").into_owned()
}

/// Whether the formula is a string template rather than an expression
///
/// Only the text outside placeholders counts, so `"{first} {last}"` is a
/// template and `"{hp} > 0"` is not.
pub fn is_string_template(formula: &str) -> bool {
    !strip_placeholders(formula).contains(EXPRESSION_CHARS)
}

/// Parse the formula with every placeholder bound to `0`
pub fn check_syntax(formula: &str) -> Result<(), SyntaxError> {
    parse(&PLACEHOLDER.replace_all(formula, "0")).map(|_| ())
}

pub use evaluator::evaluate_computed_field;
pub use guard::{FormulaCheck, validate_formula_for_eval};
pub use parser::{SyntaxError, parse};
pub use recompute::{RecomputeOutcome, recompute_computed_fields};
pub use structure::{extract_placeholders, validate_computed_field_formula};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_detection() {
        assert!(is_string_template("{first} {last}"));
        assert!(is_string_template("Level {level} {class}"));
        assert!(!is_string_template("{hp} > 0"));
        assert!(!is_string_template("({a})"));
        // operators inside a placeholder do not count
        assert!(is_string_template("{a-b}"));
    }

    #[test]
    fn test_strip_placeholders() {
        assert_eq!(strip_placeholders("{a} + {b} * 2"), " +  * 2");
    }

    #[test]
    fn test_check_syntax() {
        assert!(check_syntax("({a} + {b}) / 2").is_ok());
        assert!(check_syntax("{a} +").is_err());
        assert!(matches!(
            check_syntax("{a} + bonus"),
            Err(SyntaxError::UnknownIdentifier(_))
        ));
    }
}
