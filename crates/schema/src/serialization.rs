//! Saving and loading custom type libraries
//!
//! A type library is a JSON file holding a set of custom entity types so they
//! can be shared between campaigns. Files carry a schema version and are
//! migrated on load.

use crate::SCHEMA_VERSION;
use crate::entity_type::EntityTypeDefinition;
use crate::validation::{ValidationResult, validate_entity_type_definition};
use chrono::{DateTime, Utc};
use loreforge_core::{EngineError, EngineResult, traits::Persistable};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// ============================================================================
// Constants
// ============================================================================

/// File extension for type libraries
pub const LIBRARY_EXTENSION: &str = "lfl";

// ============================================================================
// TypeLibrary
// ============================================================================

/// A shareable set of custom entity types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeLibrary {
    /// Schema version for migration purposes
    pub schema_version: u32,

    /// Library name
    #[serde(default)]
    pub name: String,

    /// The custom types
    #[serde(default)]
    pub custom_types: Vec<EntityTypeDefinition>,

    /// When the library was written
    #[serde(default = "Utc::now")]
    pub exported_at: DateTime<Utc>,
}

impl TypeLibrary {
    /// Create an empty library
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            name: name.into(),
            custom_types: Vec::new(),
            exported_at: Utc::now(),
        }
    }

    /// Add a type
    pub fn with_type(mut self, definition: EntityTypeDefinition) -> Self {
        self.custom_types.push(definition);
        self
    }

    /// Look up a type by key
    pub fn get(&self, type_key: &str) -> Option<&EntityTypeDefinition> {
        self.custom_types.iter().find(|t| t.type_key == type_key)
    }

    /// Validate every type against the other types in the library
    pub fn validate_all(&self) -> Vec<(String, ValidationResult)> {
        self.custom_types
            .iter()
            .enumerate()
            .map(|(i, definition)| {
                let others: Vec<EntityTypeDefinition> = self
                    .custom_types
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, t)| t.clone())
                    .collect();
                (
                    definition.type_key.clone(),
                    validate_entity_type_definition(definition, &others),
                )
            })
            .collect()
    }

    /// Check if migration is needed
    pub fn needs_migration(&self) -> bool {
        self.schema_version < SCHEMA_VERSION
    }

    /// Migrate to the latest schema version
    pub fn migrate(&mut self) -> EngineResult<()> {
        if self.schema_version > SCHEMA_VERSION {
            return Err(EngineError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION,
                found: self.schema_version,
            });
        }
        while self.schema_version < SCHEMA_VERSION {
            self.migrate_one_version();
        }
        Ok(())
    }

    fn migrate_one_version(&mut self) {
        match self.schema_version {
            // version 0 files predate the built-in flag being stripped on export
            0 => {
                for definition in &mut self.custom_types {
                    definition.is_built_in = false;
                }
                self.schema_version = 1;
            }
            _ => self.schema_version = SCHEMA_VERSION,
        }
    }
}

impl Persistable for TypeLibrary {
    fn file_extension() -> &'static str {
        LIBRARY_EXTENSION
    }

    fn schema_version() -> u32 {
        SCHEMA_VERSION
    }
}

// ============================================================================
// Save / Load
// ============================================================================

/// Save a library, creating parent directories as needed
pub fn save_library(library: &TypeLibrary, path: impl AsRef<Path>) -> EngineResult<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| EngineError::DirectoryCreate {
                path: parent.to_path_buf(),
                message: e.to_string(),
            })?;
        }
    }

    library.save_to_file(path)?;
    tracing::info!(
        path = %path.display(),
        types = library.custom_types.len(),
        "type library saved"
    );
    Ok(())
}

/// Load a library from a file
pub fn load_library(path: impl AsRef<Path>) -> EngineResult<TypeLibrary> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(EngineError::LibraryNotFound(path.to_path_buf()));
    }

    let json = std::fs::read_to_string(path).map_err(|e| EngineError::FileRead {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut library = load_library_from_string(&json).map_err(|e| match e {
        EngineError::JsonSerialization(je) => {
            EngineError::InvalidLibraryFormat(format!("{}: {}", path.display(), je))
        }
        other => other,
    })?;

    if library.name.is_empty() {
        library.name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
    }

    tracing::info!(
        path = %path.display(),
        types = library.custom_types.len(),
        "type library loaded"
    );
    Ok(library)
}

/// Load a library from a JSON string
pub fn load_library_from_string(json: &str) -> EngineResult<TypeLibrary> {
    let mut library = TypeLibrary::from_json(json)?;
    if library.needs_migration() {
        tracing::info!(
            from = library.schema_version,
            to = SCHEMA_VERSION,
            "migrating type library"
        );
    }
    library.migrate()?;
    Ok(library)
}

/// Load every library file under a directory, in path order
///
/// Files that fail to load are logged and skipped.
pub fn load_libraries_from_dir(dir: impl AsRef<Path>) -> EngineResult<Vec<TypeLibrary>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(EngineError::LibraryNotFound(dir.to_path_buf()));
    }

    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && is_library_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    paths.sort();

    let mut libraries = Vec::with_capacity(paths.len());
    for path in paths {
        match load_library(&path) {
            Ok(library) => libraries.push(library),
            Err(err) => tracing::warn!(path = %path.display(), error = %err, "skipping type library"),
        }
    }
    Ok(libraries)
}

// ============================================================================
// Utility Functions
// ============================================================================

/// Whether a path has the library extension
pub fn is_library_file(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .is_some_and(|e| e == LIBRARY_EXTENSION)
}

/// Default file name for a library
pub fn default_file_name(library_name: &str) -> String {
    let safe_name: String = library_name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!("{}.{}", safe_name.to_lowercase(), LIBRARY_EXTENSION)
}

/// Ensure a path has the library extension
pub fn ensure_extension(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if is_library_file(path) {
        path.to_path_buf()
    } else {
        path.with_extension(LIBRARY_EXTENSION)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldDefinition;
    use loreforge_core::FieldType;
    use tempfile::TempDir;

    fn sample_library() -> TypeLibrary {
        TypeLibrary::new("Seafaring").with_type(
            EntityTypeDefinition::new("ship", "Ship", "Ships")
                .with_appearance("sailing", "blue")
                .with_field(FieldDefinition::new("crew", "Crew", FieldType::Number)),
        )
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("sea.lfl");

        save_library(&sample_library(), &path).unwrap();
        let loaded = load_library(&path).unwrap();

        assert_eq!(loaded.name, "Seafaring");
        assert_eq!(loaded.schema_version, SCHEMA_VERSION);
        assert_eq!(loaded.custom_types, sample_library().custom_types);
    }

    #[test]
    fn test_missing_file() {
        let err = load_library("/definitely/not/here.lfl").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.lfl");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load_library(&path),
            Err(EngineError::InvalidLibraryFormat(_))
        ));
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let json = r#"{"schemaVersion": 99, "customTypes": []}"#;
        assert!(matches!(
            load_library_from_string(json),
            Err(EngineError::SchemaVersionMismatch { found: 99, .. })
        ));
    }

    #[test]
    fn test_version_zero_migration() {
        let json = r#"{
            "schemaVersion": 0,
            "customTypes": [
                {"type": "ship", "label": "Ship", "labelPlural": "Ships",
                 "icon": "sailing", "color": "blue", "isBuiltIn": true,
                 "fieldDefinitions": [{"key": "crew", "label": "Crew", "type": "short-text"}]}
            ]
        }"#;
        let library = load_library_from_string(json).unwrap();
        assert_eq!(library.schema_version, SCHEMA_VERSION);
        assert!(!library.custom_types[0].is_built_in);
        assert_eq!(
            library.custom_types[0].fields()[0].field_type,
            Some(FieldType::Text)
        );
    }

    #[test]
    fn test_load_libraries_from_dir() {
        let dir = TempDir::new().unwrap();
        save_library(&sample_library(), dir.path().join("b.lfl")).unwrap();
        save_library(&TypeLibrary::new("Empty"), dir.path().join("sub").join("a.lfl")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        std::fs::write(dir.path().join("bad.lfl"), "nope").unwrap();

        let libraries = load_libraries_from_dir(dir.path()).unwrap();
        let names: Vec<&str> = libraries.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Seafaring", "Empty"]);
    }

    #[test]
    fn test_validate_all_checks_against_siblings() {
        let library = sample_library().with_type(
            EntityTypeDefinition::new("ship", "Boat", "Boats").with_appearance("sailing", "blue"),
        );
        let results = library.validate_all();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(_, r)| !r.valid));
        assert_eq!(
            results[0].1.messages(),
            vec!["Type key \"ship\" is already in use"]
        );
    }

    #[test]
    fn test_file_names() {
        assert_eq!(default_file_name("Sea Faring"), "sea_faring.lfl");
        assert_eq!(ensure_extension("types"), PathBuf::from("types.lfl"));
        assert_eq!(ensure_extension("types.lfl"), PathBuf::from("types.lfl"));
        assert!(is_library_file("a/b.lfl"));
        assert!(!is_library_file("a/b.json"));
    }
}
