//! Subcommand implementations
//!
//! Each command prints its own report and returns whether it succeeded; only
//! I/O and setup failures come back as errors.

use crate::config::Config;
use crate::output;
use anyhow::{Context, bail};
use colored::Colorize;
use loreforge_core::{EngineError, FieldValue, FieldValues, OutputType};
use loreforge_schema::formula::{self, FormulaCheck};
use loreforge_schema::serialization::{default_file_name, ensure_extension};
use loreforge_schema::{
    ComputedFieldConfig, EntityTypeDefinition, EntityTypeValidator, TypeLibrary,
    ValidationResult, built_in_entity_type, built_in_entity_types, evaluate_computed_field,
    load_libraries_from_dir, load_library, save_library, suggest_type_key,
    validate_computed_field_formula,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

// ============================================================================
// Shared helpers
// ============================================================================

fn library_path(explicit: Option<PathBuf>, config: &Config) -> Option<PathBuf> {
    explicit.or_else(|| config.library.path.clone())
}

/// Load a single library file or every library under a directory
fn load_libraries(path: &Path) -> anyhow::Result<Vec<TypeLibrary>> {
    if path.is_dir() {
        Ok(load_libraries_from_dir(path)?)
    } else {
        let library = load_library(path)
            .with_context(|| format!("failed to load type library {}", path.display()))?;
        Ok(vec![library])
    }
}

fn validator(strict: bool, existing: &[EntityTypeDefinition]) -> EntityTypeValidator {
    if strict {
        EntityTypeValidator::strict(existing)
    } else {
        EntityTypeValidator::with_default_rules(existing)
    }
}

// ============================================================================
// validate
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TypeReport {
    type_key: String,
    library: String,
    result: ValidationResult,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidateReport {
    path: PathBuf,
    strict: bool,
    checked: usize,
    invalid: usize,
    types: Vec<TypeReport>,
}

/// Validate every custom type found at `path`
///
/// Types are checked against each other across all loaded libraries, so a key
/// used twice is reported on both types.
pub fn validate(
    path: Option<PathBuf>,
    strict: bool,
    config: &Config,
    json: bool,
) -> anyhow::Result<bool> {
    let Some(path) = library_path(path, config) else {
        bail!("no library path given and none configured under [library]");
    };
    let libraries = load_libraries(&path)?;

    let types: Vec<(&str, &EntityTypeDefinition)> = libraries
        .iter()
        .flat_map(|l| l.custom_types.iter().map(move |t| (l.name.as_str(), t)))
        .collect();

    let reports: Vec<TypeReport> = types
        .iter()
        .enumerate()
        .map(|(i, (library, definition))| {
            let others: Vec<EntityTypeDefinition> = types
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, (_, t))| (*t).clone())
                .collect();
            TypeReport {
                type_key: definition.type_key.clone(),
                library: library.to_string(),
                result: validator(strict, &others).validate(definition),
            }
        })
        .collect();

    let invalid = reports.iter().filter(|r| !r.result.valid).count();
    tracing::info!(path = %path.display(), checked = reports.len(), invalid, "validation finished");

    if json {
        output::print_json(&ValidateReport {
            path,
            strict,
            checked: reports.len(),
            invalid,
            types: reports,
        })?;
    } else {
        for report in &reports {
            let key = if report.type_key.is_empty() {
                "<no key>"
            } else {
                report.type_key.as_str()
            };
            output::validation_report(
                &format!("{} {}", key, format!("[{}]", report.library).dimmed()),
                &report.result,
            );
        }
        println!();
        let summary = format!("{} types checked, {} invalid", reports.len(), invalid);
        if invalid == 0 {
            println!("{}", summary.green().bold());
        } else {
            println!("{}", summary.red().bold());
        }
    }

    Ok(invalid == 0)
}

// ============================================================================
// check-formula
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FormulaReport {
    formula: String,
    template: bool,
    placeholders: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    guard: Option<FormulaCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    syntax_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    structure: Option<ValidationResult>,
    valid: bool,
}

/// Screen a formula the way authoring and evaluation would
///
/// Expressions go through the evaluation guard and the parser. When `deps`
/// or `fields` is given, the definition-time structure check runs too.
pub fn check_formula(
    formula: &str,
    deps: Option<Vec<String>>,
    fields: Option<Vec<String>>,
    json: bool,
) -> anyhow::Result<bool> {
    let placeholders = formula::extract_placeholders(formula);
    let template = formula::is_string_template(formula);

    let mut guard = None;
    let mut syntax_error = None;
    if !template {
        let check = formula::validate_formula_for_eval(&formula::strip_placeholders(formula));
        if check.is_valid {
            syntax_error = formula::check_syntax(formula).err().map(|e| e.to_string());
        }
        guard = Some(check);
    }

    let structure = if deps.is_some() || fields.is_some() {
        let deps = deps.unwrap_or_else(|| placeholders.clone());
        let fields = fields.unwrap_or_else(|| {
            let mut all = deps.clone();
            all.extend(placeholders.iter().filter(|p| !deps.contains(p)).cloned());
            all
        });
        Some(validate_computed_field_formula(formula, &deps, &fields))
    } else {
        None
    };

    let valid = guard.as_ref().is_none_or(|g| g.is_valid)
        && syntax_error.is_none()
        && structure.as_ref().is_none_or(|s| s.valid);

    let report = FormulaReport {
        formula: formula.to_string(),
        template,
        placeholders,
        guard,
        syntax_error,
        structure,
        valid,
    };

    if json {
        output::print_json(&report)?;
        return Ok(valid);
    }

    output::heading(&report.formula);
    let kind = if report.template {
        "string template"
    } else {
        "expression"
    };
    output::detail(&format!("kind: {}", kind));
    if !report.placeholders.is_empty() {
        output::detail(&format!("placeholders: {}", report.placeholders.join(", ")));
    }

    if let Some(check) = &report.guard {
        match &check.error {
            Some(error) => output::failure(&format!("rejected: {}", error)),
            None => output::success("passes the evaluation guard"),
        }
    }
    if let Some(error) = &report.syntax_error {
        output::failure(&format!("syntax error: {}", error));
    }
    if let Some(structure) = &report.structure {
        output::validation_report("placeholders and dependencies", structure);
    }

    Ok(valid)
}

// ============================================================================
// eval
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EvalReport {
    formula: String,
    dependencies: Vec<String>,
    value: Option<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Evaluate a formula against `values`
///
/// Dependencies default to the formula's placeholders. A missing input is a
/// blank result, not a failure.
pub fn eval(
    formula: &str,
    values: Vec<(String, FieldValue)>,
    deps: Option<Vec<String>>,
    output_type: Option<String>,
    json: bool,
) -> anyhow::Result<bool> {
    let values: FieldValues = values.into_iter().collect();
    let dependencies = deps.unwrap_or_else(|| formula::extract_placeholders(formula));
    let config = ComputedFieldConfig {
        formula: Some(formula.to_string()),
        dependencies: Some(dependencies.clone()),
        output_type: output_type.map(OutputType::from),
    };

    let (value, error) = match evaluate_computed_field(&config, &values) {
        Ok(value) => (value, None),
        Err(err) => (None, Some(err.to_string())),
    };
    let ok = error.is_none();

    if json {
        output::print_json(&EvalReport {
            formula: formula.to_string(),
            dependencies,
            value,
            error,
        })?;
        return Ok(ok);
    }

    match (value, error) {
        (_, Some(error)) => output::failure(&error),
        (Some(value), None) => println!("{}", value),
        (None, None) => println!("{}", "(blank: an input is missing)".dimmed()),
    }
    Ok(ok)
}

// ============================================================================
// types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TypeRow {
    type_key: String,
    label: String,
    label_plural: String,
    is_built_in: bool,
    fields: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    library: Option<String>,
}

impl TypeRow {
    fn new(definition: &EntityTypeDefinition, library: Option<&str>) -> Self {
        Self {
            type_key: definition.type_key.clone(),
            label: definition.label.clone(),
            label_plural: definition.label_plural.clone(),
            is_built_in: definition.is_built_in,
            fields: definition.fields().len(),
            library: library.map(str::to_string),
        }
    }
}

/// List the built-in types followed by any library types
pub fn types(library: Option<PathBuf>, config: &Config, json: bool) -> anyhow::Result<bool> {
    let mut rows: Vec<TypeRow> = built_in_entity_types()
        .iter()
        .map(|t| TypeRow::new(t, None))
        .collect();

    if let Some(path) = library_path(library, config) {
        for library in load_libraries(&path)? {
            rows.extend(
                library
                    .custom_types
                    .iter()
                    .map(|t| TypeRow::new(t, Some(&library.name))),
            );
        }
    }

    if json {
        output::print_json(&rows)?;
        return Ok(true);
    }

    output::heading("Built-in types");
    for row in rows.iter().filter(|r| r.library.is_none()) {
        print_type_row(row);
    }

    let custom: Vec<&TypeRow> = rows.iter().filter(|r| r.library.is_some()).collect();
    if !custom.is_empty() {
        println!();
        output::heading("Custom types");
        for row in custom {
            print_type_row(row);
        }
    }

    Ok(true)
}

fn print_type_row(row: &TypeRow) {
    let source = row
        .library
        .as_deref()
        .map(|l| format!(" [{}]", l))
        .unwrap_or_default();
    println!(
        "  {:<18} {} ({} fields){}",
        row.type_key.cyan(),
        row.label_plural,
        row.fields,
        source.dimmed()
    );
}

// ============================================================================
// clone
// ============================================================================

/// Arguments of the `clone` command
#[derive(Debug, Clone, Default)]
pub struct CloneOptions {
    pub source: String,
    pub key: Option<String>,
    pub label: Option<String>,
    pub plural: Option<String>,
    pub out: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CloneReport {
    path: PathBuf,
    definition: Option<EntityTypeDefinition>,
    result: ValidationResult,
}

/// Resolve where a cloned type is written
fn clone_target(out: Option<PathBuf>, config: &Config) -> anyhow::Result<PathBuf> {
    let Some(path) = library_path(out, config) else {
        bail!("no output library given (use --out or set [library] path)");
    };
    if path.is_dir() {
        Ok(path.join(default_file_name("custom types")))
    } else {
        Ok(ensure_extension(path))
    }
}

/// Copy a built-in type into a type library
///
/// The copy is validated against the types already in the library and only
/// written when it passes.
pub fn clone_type(options: CloneOptions, config: &Config, json: bool) -> anyhow::Result<bool> {
    let source = built_in_entity_type(&options.source)
        .ok_or_else(|| EngineError::EntityTypeNotFound(options.source.clone()))
        .context("run `loreforge types` to list the built-in types")?;

    let path = clone_target(options.out, config)?;
    let mut library = if path.exists() {
        load_library(&path)?
    } else {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        TypeLibrary::new(name)
    };

    let mut definition = source.clone_as_custom();
    if let Some(label) = options.label {
        definition.label = label;
    }
    if let Some(plural) = options.plural {
        definition.label_plural = plural;
    }
    definition.type_key = options
        .key
        .unwrap_or_else(|| suggest_type_key(&definition.label, &library.custom_types));

    let result = validator(config.validation.strict, &library.custom_types).validate(&definition);
    let ok = result.valid;

    if ok {
        library.custom_types.push(definition.clone());
        save_library(&library, &path)?;
    }

    if json {
        output::print_json(&CloneReport {
            path,
            definition: ok.then_some(definition),
            result,
        })?;
        return Ok(ok);
    }

    output::validation_report(
        &format!("{} from {}", definition.type_key, options.source),
        &result,
    );
    if ok {
        output::detail(&format!("written to {}", path.display()));
    }
    Ok(ok)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_with_library(path: &Path) -> Config {
        let mut config = Config::default();
        config.library.path = Some(path.to_path_buf());
        config
    }

    #[test]
    fn test_clone_then_validate() {
        let dir = TempDir::new().unwrap();
        let config = config_with_library(&dir.path().join("homebrew.lfl"));

        let cloned = clone_type(
            CloneOptions {
                source: "npc".into(),
                label: Some("Merchant".into()),
                plural: Some("Merchants".into()),
                ..Default::default()
            },
            &config,
            true,
        )
        .unwrap();
        assert!(cloned);

        let library = load_library(dir.path().join("homebrew.lfl")).unwrap();
        assert_eq!(library.name, "homebrew");
        assert_eq!(library.custom_types.len(), 1);
        assert_eq!(library.custom_types[0].type_key, "merchant");
        assert!(!library.custom_types[0].is_built_in);

        assert!(validate(None, true, &config, true).unwrap());
    }

    #[test]
    fn test_clone_suggests_free_key() {
        let dir = TempDir::new().unwrap();
        let config = config_with_library(&dir.path().join("lib.lfl"));
        let options = CloneOptions {
            source: "faction".into(),
            label: Some("Guild".into()),
            ..Default::default()
        };

        assert!(clone_type(options.clone(), &config, true).unwrap());
        assert!(clone_type(options, &config, true).unwrap());

        let library = load_library(dir.path().join("lib.lfl")).unwrap();
        let keys: Vec<&str> = library
            .custom_types
            .iter()
            .map(|t| t.type_key.as_str())
            .collect();
        assert_eq!(keys, vec!["guild", "guild_2"]);
    }

    #[test]
    fn test_clone_rejects_built_in_key() {
        let dir = TempDir::new().unwrap();
        let config = config_with_library(&dir.path().join("lib.lfl"));
        let ok = clone_type(
            CloneOptions {
                source: "npc".into(),
                key: Some("npc".into()),
                ..Default::default()
            },
            &config,
            true,
        )
        .unwrap();
        assert!(!ok);
        assert!(!dir.path().join("lib.lfl").exists());
    }

    #[test]
    fn test_clone_unknown_source() {
        let dir = TempDir::new().unwrap();
        let config = config_with_library(&dir.path().join("lib.lfl"));
        let options = CloneOptions {
            source: "dragon".into(),
            ..Default::default()
        };
        let err = clone_type(options, &config, true).unwrap_err();
        let cause = err.downcast_ref::<EngineError>().unwrap();
        assert!(cause.is_not_found());
        assert!(!dir.path().join("lib.lfl").exists());
    }

    #[test]
    fn test_validate_reports_duplicate_keys_across_libraries() {
        let dir = TempDir::new().unwrap();
        let ship = EntityTypeDefinition::new("ship", "Ship", "Ships").with_appearance("sailing", "blue");
        save_library(&TypeLibrary::new("a").with_type(ship.clone()), dir.path().join("a.lfl")).unwrap();
        save_library(&TypeLibrary::new("b").with_type(ship), dir.path().join("b.lfl")).unwrap();

        assert!(!validate(Some(dir.path().to_path_buf()), false, &Config::default(), true).unwrap());
    }

    #[test]
    fn test_validate_without_path() {
        assert!(validate(None, false, &Config::default(), true).is_err());
    }

    #[test]
    fn test_check_formula() {
        assert!(check_formula("{a} + {b}", None, None, true).unwrap());
        assert!(check_formula("{first} {last}", None, None, true).unwrap());
        assert!(!check_formula("{x}; alert(1)", None, None, true).unwrap());
        assert!(!check_formula("{a} +", None, None, true).unwrap());
        assert!(
            !check_formula("{a} + {b}", Some(vec!["a".into()]), None, true).unwrap()
        );
        assert!(
            check_formula("{a} * 2", None, Some(vec!["a".into(), "b".into()]), true).unwrap()
        );
    }

    #[test]
    fn test_eval() {
        let values = vec![
            ("a".to_string(), FieldValue::Number(2.0)),
            ("b".to_string(), FieldValue::Number(3.0)),
        ];
        assert!(eval("{a} + {b}", values, None, Some("number".into()), true).unwrap());
        assert!(eval("{a} + {b}", Vec::new(), None, None, true).unwrap());
        assert!(!eval("{a} + this", vec![("a".into(), 1.into())], None, None, true).unwrap());
    }

    #[test]
    fn test_types_with_library() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lib.lfl");
        save_library(
            &TypeLibrary::new("lib").with_type(
                EntityTypeDefinition::new("ship", "Ship", "Ships").with_appearance("sailing", "blue"),
            ),
            &path,
        )
        .unwrap();
        assert!(types(Some(path), &Config::default(), true).unwrap());
    }
}
