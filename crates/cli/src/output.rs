//! Terminal output helpers
//!
//! Human output goes to stdout with colour; `--json` swaps every report for a
//! pretty-printed JSON document.

use colored::Colorize;
use loreforge_schema::{ValidationError, ValidationResult, ValidationWarning};
use serde::Serialize;

/// Print a value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    println!("{s}");
    Ok(())
}

pub fn success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

pub fn failure(msg: &str) {
    println!("{} {}", "✗".red().bold(), msg);
}

/// Report a fatal error on stderr
pub fn error(err: &dyn std::fmt::Display) {
    eprintln!("{} {:#}", "error:".red().bold(), err);
}

/// Indented detail line under a status line
pub fn detail(msg: &str) {
    println!("    {}", msg);
}

pub fn heading(msg: &str) {
    println!("{}", msg.bold());
}

/// Print the errors and warnings of one validation result
pub fn validation_report(subject: &str, result: &ValidationResult) {
    if result.valid {
        success(subject);
    } else {
        failure(subject);
    }
    for error in &result.errors {
        detail(&format_error(error));
    }
    for warning in &result.warnings {
        detail(&format_warning(warning));
    }
}

fn format_error(error: &ValidationError) -> String {
    let mut line = match &error.path {
        Some(path) => format!("{} {}", path.dimmed(), error.message),
        None => error.message.clone(),
    };
    if let Some(suggestion) = &error.suggestion {
        line.push_str(&format!(" ({})", suggestion.italic()));
    }
    line
}

fn format_warning(warning: &ValidationWarning) -> String {
    let message = format!("warning: {}", warning.message).yellow();
    match &warning.path {
        Some(path) => format!("{} {}", path.dimmed(), message),
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loreforge_schema::ValidationErrorCode;

    #[test]
    fn test_format_error_includes_path_and_suggestion() {
        colored::control::set_override(false);
        let error = ValidationError::new(ValidationErrorCode::DuplicateTypeKey, "taken")
            .with_path("type")
            .with_suggestion("try ship_2");
        assert_eq!(format_error(&error), "type taken (try ship_2)");
    }

    #[test]
    fn test_json_output_is_serializable() {
        assert!(print_json(&ValidationResult::ok()).is_ok());
    }
}
