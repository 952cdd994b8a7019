//! Core types used throughout Loreforge
//!
//! This module contains the field-type registry, the value union stored in
//! entity fields, and the output types a computed field can declare.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Field Types
// ============================================================================

/// Field types available to entity-type definitions
///
/// Unrecognised tags are kept in `Unknown` so they survive deserialization
/// and can be reported by the definition validator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    /// Single-line text
    Text,
    /// Multi-line plain text
    Textarea,
    /// Formatted text (sanitised HTML)
    Richtext,
    /// Numeric value
    Number,
    /// True/false toggle
    Boolean,
    /// One value from a fixed option list
    Select,
    /// Several values from a fixed option list
    MultiSelect,
    /// Free-form tag list
    Tags,
    /// Link to a single entity
    EntityRef,
    /// Links to several entities
    EntityRefs,
    /// Calendar date
    Date,
    /// Web address
    Url,
    /// Image reference
    Image,
    /// Value derived from other fields through a formula
    Computed,
    /// Tag not present in the registry
    Unknown(String),
}

impl FieldType {
    /// Canonical tag string
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Text => "text",
            FieldType::Textarea => "textarea",
            FieldType::Richtext => "richtext",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Select => "select",
            FieldType::MultiSelect => "multi-select",
            FieldType::Tags => "tags",
            FieldType::EntityRef => "entity-ref",
            FieldType::EntityRefs => "entity-refs",
            FieldType::Date => "date",
            FieldType::Url => "url",
            FieldType::Image => "image",
            FieldType::Computed => "computed",
            FieldType::Unknown(raw) => raw,
        }
    }

    /// Human-readable name
    pub fn label(&self) -> &'static str {
        match self {
            FieldType::Text => "Short Text",
            FieldType::Textarea => "Long Text",
            FieldType::Richtext => "Rich Text",
            FieldType::Number => "Number",
            FieldType::Boolean => "Yes/No",
            FieldType::Select => "Dropdown",
            FieldType::MultiSelect => "Multi-Select",
            FieldType::Tags => "Tags",
            FieldType::EntityRef => "Entity Link",
            FieldType::EntityRefs => "Entity Links",
            FieldType::Date => "Date",
            FieldType::Url => "URL",
            FieldType::Image => "Image",
            FieldType::Computed => "Computed",
            FieldType::Unknown(_) => "Unknown",
        }
    }

    /// Short description shown in type pickers
    pub fn description(&self) -> &'static str {
        match self {
            FieldType::Text => "A single line of text",
            FieldType::Textarea => "Several lines of plain text",
            FieldType::Richtext => "Formatted text with headings, lists and links",
            FieldType::Number => "A whole or decimal number",
            FieldType::Boolean => "A yes/no checkbox",
            FieldType::Select => "Pick one value from a list",
            FieldType::MultiSelect => "Pick several values from a list",
            FieldType::Tags => "Free-form labels",
            FieldType::EntityRef => "A link to another entity",
            FieldType::EntityRefs => "Links to several other entities",
            FieldType::Date => "A calendar date",
            FieldType::Url => "A web address",
            FieldType::Image => "An image or portrait",
            FieldType::Computed => "Derived from other fields by a formula",
            FieldType::Unknown(_) => "Unrecognised field type",
        }
    }

    /// Whether the type is part of the registry
    pub fn is_known(&self) -> bool {
        !matches!(self, FieldType::Unknown(_))
    }

    /// Select-style types need an option list
    pub fn requires_options(&self) -> bool {
        matches!(self, FieldType::Select | FieldType::MultiSelect)
    }

    /// Reference types need a target entity-type list
    pub fn requires_entity_types(&self) -> bool {
        matches!(self, FieldType::EntityRef | FieldType::EntityRefs)
    }

    /// Types whose values are lists
    pub fn is_multi_valued(&self) -> bool {
        matches!(
            self,
            FieldType::MultiSelect | FieldType::Tags | FieldType::EntityRefs
        )
    }

    /// All registered field types
    pub fn all() -> &'static [FieldType] {
        &[
            FieldType::Text,
            FieldType::Textarea,
            FieldType::Richtext,
            FieldType::Number,
            FieldType::Boolean,
            FieldType::Select,
            FieldType::MultiSelect,
            FieldType::Tags,
            FieldType::EntityRef,
            FieldType::EntityRefs,
            FieldType::Date,
            FieldType::Url,
            FieldType::Image,
            FieldType::Computed,
        ]
    }
}

/// Map a raw type tag to its canonical field type
///
/// Legacy aliases are matched case-insensitively; any other input passes
/// through unchanged and ends up in `FieldType::Unknown` when it is not a
/// canonical tag.
pub fn normalize_field_type(raw: &str) -> FieldType {
    match raw.to_ascii_lowercase().as_str() {
        "short-text" => return FieldType::Text,
        "long-text" => return FieldType::Textarea,
        _ => {}
    }

    FieldType::all()
        .iter()
        .find(|t| t.as_str() == raw)
        .cloned()
        .unwrap_or_else(|| FieldType::Unknown(raw.to_string()))
}

impl From<String> for FieldType {
    fn from(raw: String) -> Self {
        normalize_field_type(&raw)
    }
}

impl From<&str> for FieldType {
    fn from(raw: &str) -> Self {
        normalize_field_type(raw)
    }
}

impl From<FieldType> for String {
    fn from(t: FieldType) -> Self {
        t.as_str().to_string()
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Output Types
// ============================================================================

/// Declared result type of a computed field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OutputType {
    Text,
    Number,
    Boolean,
    /// Any other tag; results pass through uncoerced
    Other(String),
}

impl OutputType {
    /// Tag string
    pub fn as_str(&self) -> &str {
        match self {
            OutputType::Text => "text",
            OutputType::Number => "number",
            OutputType::Boolean => "boolean",
            OutputType::Other(raw) => raw,
        }
    }
}

impl From<String> for OutputType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "text" => OutputType::Text,
            "number" => OutputType::Number,
            "boolean" => OutputType::Boolean,
            _ => OutputType::Other(raw),
        }
    }
}

impl From<&str> for OutputType {
    fn from(raw: &str) -> Self {
        OutputType::from(raw.to_string())
    }
}

impl From<OutputType> for String {
    fn from(t: OutputType) -> Self {
        t.as_str().to_string()
    }
}

impl std::fmt::Display for OutputType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Field Values
// ============================================================================

/// Value stored in an entity field
///
/// A key missing from a [`FieldValues`] map is the "not set" state; `Null`
/// is an explicit empty value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Null,
    Boolean(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

/// Field key to value mapping for one entity
pub type FieldValues = BTreeMap<String, FieldValue>;

impl FieldValue {
    /// Check if null
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Try to get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// String form used by string templates (`String(value)` semantics)
    pub fn to_display_string(&self) -> String {
        match self {
            FieldValue::Null => "null".to_string(),
            FieldValue::Boolean(v) => v.to_string(),
            FieldValue::Number(v) => format_number(*v),
            FieldValue::Text(v) => v.clone(),
            FieldValue::List(items) => items.join(","),
        }
    }

    /// Numeric coercion (`Number(value)` semantics)
    pub fn to_number(&self) -> f64 {
        match self {
            FieldValue::Null => 0.0,
            FieldValue::Boolean(v) => {
                if *v {
                    1.0
                } else {
                    0.0
                }
            }
            FieldValue::Number(v) => *v,
            FieldValue::Text(v) => parse_number(v),
            FieldValue::List(items) => match items.as_slice() {
                [] => 0.0,
                [single] => parse_number(single),
                _ => f64::NAN,
            },
        }
    }

    /// Truthiness (`Boolean(value)` semantics)
    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Null => false,
            FieldValue::Boolean(v) => *v,
            FieldValue::Number(v) => *v != 0.0 && !v.is_nan(),
            FieldValue::Text(v) => !v.is_empty(),
            FieldValue::List(_) => true,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Number(v as f64)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Number(v as f64)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(v: Vec<String>) -> Self {
        FieldValue::List(v)
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

// ============================================================================
// Number Helpers
// ============================================================================

/// Format a number the way a browser prints it
///
/// Whole numbers drop the fractional part, non-finite values use
/// `NaN` / `Infinity`, and magnitudes from 1e21 up or below 1e-6 switch to
/// exponent form.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.abs() >= 1e21 || n.abs() < 1e-6 {
        let formatted = format!("{:e}", n);
        return match formatted.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
            _ => formatted,
        };
    }
    format!("{}", n)
}

/// Parse text into a number with `Number(text)` semantics
///
/// Blank text is zero; anything unparseable is `NaN`.
pub fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    let lower = trimmed.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        return i64::from_str_radix(hex, 16)
            .map(|v| v as f64)
            .unwrap_or(f64::NAN);
    }

    // Rust accepts "inf" and "nan" spellings that browsers do not
    if lower.contains("inf") || lower.contains("nan") {
        return f64::NAN;
    }

    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_canonical_tags() {
        for t in FieldType::all() {
            assert_eq!(&normalize_field_type(t.as_str()), t);
        }
        assert_eq!(FieldType::all().len(), 14);
    }

    #[test]
    fn test_normalize_aliases() {
        assert_eq!(normalize_field_type("short-text"), FieldType::Text);
        assert_eq!(normalize_field_type("Short-Text"), FieldType::Text);
        assert_eq!(normalize_field_type("long-text"), FieldType::Textarea);
        assert_eq!(normalize_field_type("LONG-TEXT"), FieldType::Textarea);
    }

    #[test]
    fn test_normalize_unknown_passes_through() {
        let t = normalize_field_type("hologram");
        assert_eq!(t, FieldType::Unknown("hologram".to_string()));
        assert_eq!(t.as_str(), "hologram");
        assert!(!t.is_known());

        // canonical tags are case-sensitive
        assert!(!normalize_field_type("TEXT").is_known());
    }

    #[test]
    fn test_field_type_metadata() {
        assert!(FieldType::Select.requires_options());
        assert!(FieldType::MultiSelect.requires_options());
        assert!(!FieldType::Tags.requires_options());
        assert!(FieldType::EntityRefs.requires_entity_types());
        assert!(FieldType::EntityRefs.is_multi_valued());
        assert_eq!(FieldType::Computed.label(), "Computed");
    }

    #[test]
    fn test_field_type_serde() {
        let json = serde_json::to_string(&FieldType::MultiSelect).unwrap();
        assert_eq!(json, "\"multi-select\"");

        let t: FieldType = serde_json::from_str("\"long-text\"").unwrap();
        assert_eq!(t, FieldType::Textarea);
    }

    #[test]
    fn test_output_type_tags() {
        assert_eq!(OutputType::from("number"), OutputType::Number);
        assert_eq!(
            OutputType::from("currency"),
            OutputType::Other("currency".to_string())
        );
        assert_eq!(OutputType::Boolean.to_string(), "boolean");
    }

    #[test]
    fn test_field_value_display_string() {
        assert_eq!(FieldValue::from(5).to_display_string(), "5");
        assert_eq!(FieldValue::from(2.5).to_display_string(), "2.5");
        assert_eq!(FieldValue::from(true).to_display_string(), "true");
        assert_eq!(FieldValue::Null.to_display_string(), "null");
        assert_eq!(
            FieldValue::List(vec!["a".into(), "b".into()]).to_display_string(),
            "a,b"
        );
    }

    #[test]
    fn test_field_value_untagged_serde() {
        let values: FieldValues =
            serde_json::from_str(r#"{"a": 2, "b": "x", "c": true, "d": null, "e": ["p"]}"#)
                .unwrap();
        assert_eq!(values["a"], FieldValue::Number(2.0));
        assert_eq!(values["b"], FieldValue::Text("x".into()));
        assert_eq!(values["c"], FieldValue::Boolean(true));
        assert_eq!(values["d"], FieldValue::Null);
        assert_eq!(values["e"], FieldValue::List(vec!["p".into()]));
    }

    #[test]
    fn test_to_number() {
        assert_eq!(FieldValue::from(" 42 ").to_number(), 42.0);
        assert_eq!(FieldValue::from("").to_number(), 0.0);
        assert_eq!(FieldValue::from(true).to_number(), 1.0);
        assert!(FieldValue::from("abc").to_number().is_nan());
        assert!(FieldValue::from("inf").to_number().is_nan());
        assert_eq!(FieldValue::from("Infinity").to_number(), f64::INFINITY);
        assert_eq!(FieldValue::from("0x10").to_number(), 16.0);
    }

    #[test]
    fn test_truthiness() {
        assert!(!FieldValue::from(0).is_truthy());
        assert!(!FieldValue::Number(f64::NAN).is_truthy());
        assert!(!FieldValue::from("").is_truthy());
        assert!(FieldValue::from("0").is_truthy());
        assert!(!FieldValue::Null.is_truthy());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(5.0), "5");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(1e-7), "1e-7");
        assert_eq!(format_number(-1.5e-7), "-1.5e-7");
        assert_eq!(format_number(1e-6), "0.000001");
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(raw in "[a-zA-Z-]{0,16}") {
            let once = normalize_field_type(&raw);
            let twice = normalize_field_type(once.as_str());
            prop_assert_eq!(once, twice);
        }
    }
}
