//! Computed-field evaluation
//!
//! Missing inputs are not errors: a computed field whose dependencies are not
//! all set evaluates to `None` and simply renders blank. Guard rejections and
//! parse failures are errors and reach the caller.

use super::guard::validate_formula_for_eval;
use super::{PLACEHOLDER, is_string_template, strip_placeholders};
use super::parser::parse;
use crate::field::ComputedFieldConfig;
use loreforge_core::types::format_number;
use loreforge_core::{EngineResult, FieldValue, FieldValues, OutputType};
use regex::Captures;

/// Evaluate a computed field against the entity's current values
pub fn evaluate_computed_field(
    config: &ComputedFieldConfig,
    fields: &FieldValues,
) -> EngineResult<Option<FieldValue>> {
    let formula = config.formula();
    if formula.is_empty() {
        return Ok(Some(FieldValue::Text(String::new())));
    }

    let dependencies = config.dependency_keys();
    let missing = dependencies
        .iter()
        .find(|dep| fields.get(*dep).is_none_or(FieldValue::is_null));
    if let Some(dep) = missing {
        tracing::debug!(formula, dependency = %dep, "dependency not set, skipping evaluation");
        return Ok(None);
    }

    if !dependencies.is_empty() && !PLACEHOLDER.is_match(formula) {
        tracing::debug!(formula, "dependencies declared but formula has no placeholders");
        return Ok(None);
    }

    let raw = if is_string_template(formula) {
        FieldValue::Text(substitute(formula, fields, FieldValue::to_display_string))
    } else {
        evaluate_expression(&strip_placeholders(formula), formula, fields)?
    };

    Ok(Some(coerce(raw, config.output_type.as_ref())))
}

fn evaluate_expression(
    skeleton: &str,
    formula: &str,
    fields: &FieldValues,
) -> EngineResult<FieldValue> {
    if let Err(err) = validate_formula_for_eval(skeleton).into_result() {
        tracing::warn!(formula, error = %err, "formula rejected");
        return Err(err);
    }

    // Field values end up inside the expression, so the guard runs again
    let substituted = substitute(formula, fields, to_literal);
    let expression = match validate_formula_for_eval(&substituted).into_result() {
        Ok(expression) => expression,
        Err(err) => {
            tracing::warn!(formula, error = %err, "substituted formula rejected");
            return Err(err);
        }
    };

    let ast = parse(&expression)?;
    let value = ast.eval();
    tracing::debug!(formula, expression = %expression, result = %value, "formula evaluated");
    Ok(value)
}

/// Replace known placeholders; unknown ones are left as written
fn substitute(formula: &str, fields: &FieldValues, render: fn(&FieldValue) -> String) -> String {
    PLACEHOLDER
        .replace_all(formula, |caps: &Captures| match fields.get(&caps[1]) {
            Some(value) => render(value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Render a value as an expression literal
fn to_literal(value: &FieldValue) -> String {
    match value {
        FieldValue::Null => "null".to_string(),
        FieldValue::Boolean(v) => v.to_string(),
        FieldValue::Number(v) => format_number(*v),
        FieldValue::Text(v) => quote(v),
        FieldValue::List(items) => quote(&items.join(",")),
    }
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Coerce a raw result to the declared output type
fn coerce(value: FieldValue, output_type: Option<&OutputType>) -> FieldValue {
    match output_type {
        Some(OutputType::Number) => FieldValue::Number(value.to_number()),
        Some(OutputType::Text) => FieldValue::Text(value.to_display_string()),
        Some(OutputType::Boolean) => FieldValue::Boolean(value.is_truthy()),
        Some(OutputType::Other(_)) | None => value,
    }
}
