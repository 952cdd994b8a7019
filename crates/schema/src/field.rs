//! Field definitions for entity types
//!
//! This module contains the `FieldDefinition` struct and the configuration
//! carried by computed fields. Most members are optional so that half-built
//! definitions coming from an editor form can be validated as they are.

use loreforge_core::{FieldType, FieldValue, OutputType};
use serde::{Deserialize, Serialize};

// ============================================================================
// FieldDefinition
// ============================================================================

/// One user-configurable attribute of an entity type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    /// Identifier, unique within the entity type
    #[serde(default)]
    pub key: String,

    /// Display name
    #[serde(default)]
    pub label: String,

    /// Field type tag
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,

    /// Whether a value must be supplied
    #[serde(default)]
    pub required: bool,

    /// Choices for select / multi-select fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,

    /// Target entity types for entity-ref / entity-refs fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_types: Option<Vec<String>>,

    /// Formula configuration, only for computed fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computed_config: Option<ComputedFieldConfig>,

    /// Display order (lower numbers appear first)
    #[serde(default)]
    pub order: i32,

    /// Hint shown under the input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,

    /// Placeholder shown in an empty input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    /// Value used when a new entity is created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<FieldValue>,
}

impl FieldDefinition {
    /// Create a new field with the given key, label and type
    pub fn new(key: impl Into<String>, label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            field_type: Some(field_type),
            ..Default::default()
        }
    }

    /// Create a select field
    pub fn select<I, S>(key: impl Into<String>, label: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(key, label, FieldType::Select).with_options(options)
    }

    /// Create an entity-ref field pointing at the given entity types
    pub fn entity_ref<I, S>(key: impl Into<String>, label: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(key, label, FieldType::EntityRef).with_entity_types(targets)
    }

    /// Create a computed field
    pub fn computed(
        key: impl Into<String>,
        label: impl Into<String>,
        config: ComputedFieldConfig,
    ) -> Self {
        let mut field = Self::new(key, label, FieldType::Computed);
        field.computed_config = Some(config);
        field
    }

    // ========================================================================
    // Builder methods
    // ========================================================================

    /// Mark the field as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the display order
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Set the option list
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    /// Set the target entity types of a reference field
    pub fn with_entity_types<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entity_types = Some(targets.into_iter().map(Into::into).collect());
        self
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Whether this is a computed field
    pub fn is_computed(&self) -> bool {
        matches!(self.field_type, Some(FieldType::Computed))
    }

    /// Declared dependencies of a computed field (empty otherwise)
    pub fn dependencies(&self) -> &[String] {
        self.computed_config
            .as_ref()
            .and_then(|c| c.dependencies.as_deref())
            .unwrap_or(&[])
    }
}

// ============================================================================
// ComputedFieldConfig
// ============================================================================

/// Formula configuration of a computed field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ComputedFieldConfig {
    /// Formula with `{fieldKey}` placeholders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,

    /// Field keys the formula reads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,

    /// Declared result type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_type: Option<OutputType>,
}

impl ComputedFieldConfig {
    /// Create a complete configuration
    pub fn new<I, S>(formula: impl Into<String>, dependencies: I, output_type: OutputType) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            formula: Some(formula.into()),
            dependencies: Some(dependencies.into_iter().map(Into::into).collect()),
            output_type: Some(output_type),
        }
    }

    /// Formula text, empty when unset
    pub fn formula(&self) -> &str {
        self.formula.as_deref().unwrap_or("")
    }

    /// Dependency keys, empty when unset
    pub fn dependency_keys(&self) -> &[String] {
        self.dependencies.as_deref().unwrap_or(&[])
    }
}
