//! Whole-entity recomputation
//!
//! Computed fields are evaluated in dependency order so a computed field can
//! read another one. A failing field is recorded and set to `Null`; the rest
//! of the entity still gets its values.

use super::evaluator::evaluate_computed_field;
use crate::dependency::evaluation_order;
use crate::field::FieldDefinition;
use loreforge_core::{FieldValue, FieldValues};
use std::collections::BTreeMap;

/// Values after recomputation, plus the fields that failed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecomputeOutcome {
    /// Input values with every computed field overwritten
    pub values: FieldValues,

    /// Error message per failed computed field
    pub errors: BTreeMap<String, String>,
}

impl RecomputeOutcome {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Recompute every computed field of an entity
pub fn recompute_computed_fields(
    fields: &[FieldDefinition],
    values: &FieldValues,
) -> RecomputeOutcome {
    let mut outcome = RecomputeOutcome {
        values: values.clone(),
        errors: BTreeMap::new(),
    };

    let order = match evaluation_order(fields) {
        Ok(order) => order,
        Err(err) => {
            tracing::warn!(error = %err, "refusing to recompute fields");
            for field in fields.iter().filter(|f| f.is_computed()) {
                outcome.values.insert(field.key.clone(), FieldValue::Null);
                outcome.errors.insert(field.key.clone(), err.to_string());
            }
            return outcome;
        }
    };

    for key in order {
        let Some(config) = fields
            .iter()
            .find(|f| f.key == key)
            .and_then(|f| f.computed_config.as_ref())
        else {
            outcome.values.insert(key, FieldValue::Null);
            continue;
        };

        match evaluate_computed_field(config, &outcome.values) {
            Ok(value) => {
                outcome.values.insert(key, value.unwrap_or_default());
            }
            Err(err) => {
                tracing::debug!(field = %key, error = %err, "computed field failed");
                outcome.values.insert(key.clone(), FieldValue::Null);
                outcome.errors.insert(key, err.to_string());
            }
        }
    }

    outcome
}
