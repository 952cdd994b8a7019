//! Formula guard
//!
//! Every expression is screened here before it reaches the parser. The guard
//! refuses anything that looks like more than arithmetic, comparison or
//! boolean logic: comments, template literals, keywords, calls, property and
//! index access, literals with brackets, statement separators and assignment.
//!
//! Checks run in a fixed order and the first match decides the error, so each
//! rejection names the category of construct that was found.

use loreforge_core::{EngineError, EngineResult};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

// ============================================================================
// Patterns
// ============================================================================

static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"//|(?s:/\*.*?\*/)").expect("comment pattern"));

static ARROW_FUNCTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"=>").expect("arrow pattern"));

static FUNCTION_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bfunction\b").expect("function keyword pattern"));

static CONTROL_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(new|class|import|if|else|for|while|do|switch|case|break|continue|try|catch|finally|throw|with)\b",
    )
    .expect("control keyword pattern")
});

static FUNCTION_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_$][A-Za-z0-9_$]*\(").expect("call pattern"));

static PROPERTY_ACCESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_]\.[A-Za-z_$]").expect("property pattern"));

static BRACKET_ACCESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_$][A-Za-z0-9_$]*\s*\[").expect("index pattern"));

static BRACKETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\[\]{}]").expect("bracket pattern"));

static RESTRICTED_IDENTIFIERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(return|var|let|const|eval|this|window|document|process|global|globalThis|async|await|yield|delete|typeof|void|in|instanceof|debugger|require|module|exports|prototype|constructor|__proto__)\b",
    )
    .expect("restricted identifier pattern")
});

static COMPOUND_ASSIGNMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[+\-*/%]=").expect("compound assignment pattern"));

// ============================================================================
// FormulaCheck
// ============================================================================

/// Outcome of screening one expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaCheck {
    pub is_valid: bool,

    /// The accepted expression, unchanged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sanitized: Option<String>,

    /// Why the expression was refused
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FormulaCheck {
    fn accept(expr: &str) -> Self {
        Self {
            is_valid: true,
            sanitized: Some(expr.to_string()),
            error: None,
        }
    }

    fn reject(error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            sanitized: None,
            error: Some(error.into()),
        }
    }

    /// Convert into a result carrying the sanitized expression
    pub fn into_result(self) -> EngineResult<String> {
        if self.is_valid {
            Ok(self.sanitized.unwrap_or_default())
        } else {
            Err(EngineError::formula_rejected(
                self.error.unwrap_or_else(|| "Formula rejected".to_string()),
            ))
        }
    }
}

// ============================================================================
// Guard
// ============================================================================

/// Screen an expression before evaluation
pub fn validate_formula_for_eval(expr: &str) -> FormulaCheck {
    if expr.trim().is_empty() {
        return FormulaCheck::accept(expr);
    }

    if expr.contains('`') {
        return FormulaCheck::reject("Template literals are not allowed in formulas");
    }
    if COMMENT.is_match(expr) {
        return FormulaCheck::reject("Comments are not allowed in formulas");
    }
    if ARROW_FUNCTION.is_match(expr) {
        return FormulaCheck::reject("Arrow functions are not allowed in formulas");
    }

    if FUNCTION_KEYWORD.is_match(expr) {
        return FormulaCheck::reject("Keyword 'function' is not allowed in formulas");
    }
    if let Some(caps) = CONTROL_KEYWORDS.captures(expr) {
        return FormulaCheck::reject(format!(
            "Keyword '{}' is not allowed in formulas",
            &caps[1]
        ));
    }

    if FUNCTION_CALL.is_match(expr) {
        return FormulaCheck::reject("Function calls are not allowed in formulas");
    }
    if PROPERTY_ACCESS.is_match(expr) {
        return FormulaCheck::reject("Property access is not allowed in formulas");
    }
    if BRACKET_ACCESS.is_match(expr) {
        return FormulaCheck::reject("Bracket notation access is not allowed in formulas");
    }
    if BRACKETS.is_match(expr) {
        return FormulaCheck::reject("Array and object literals are not allowed in formulas");
    }

    if let Some(caps) = RESTRICTED_IDENTIFIERS.captures(expr) {
        return FormulaCheck::reject(format!(
            "Restricted identifier '{}' is not allowed in formulas",
            &caps[1]
        ));
    }

    if expr.contains(';') {
        return FormulaCheck::reject("Semicolons are not allowed in formulas");
    }

    if COMPOUND_ASSIGNMENT.is_match(expr) {
        return FormulaCheck::reject("Compound assignment is not allowed in formulas");
    }
    if has_bare_assignment(expr) {
        return FormulaCheck::reject("Assignment is not allowed in formulas");
    }

    FormulaCheck::accept(expr)
}

/// An `=` that is not part of `==`, `===`, `!=`, `<=` or `>=`
fn has_bare_assignment(expr: &str) -> bool {
    let chars: Vec<char> = expr.chars().collect();
    chars.iter().enumerate().any(|(i, &c)| {
        if c != '=' {
            return false;
        }
        let prev = if i > 0 { Some(chars[i - 1]) } else { None };
        let next = chars.get(i + 1).copied();
        !matches!(prev, Some('<' | '>' | '!' | '=')) && next != Some('=')
    })
}

// ============================================================================
// Tests
// ============================================================================
