//! Entity type definitions
//!
//! An entity type is the schema for one category of campaign object (NPCs,
//! locations, factions, ...). Built-in types ship with the tool and are only
//! ever used as cloning sources; custom types are created by users and go
//! through the validator before they are stored.

use crate::field::{ComputedFieldConfig, FieldDefinition};
use heck::ToSnakeCase;
use loreforge_core::{FieldType, OutputType};
use serde::{Deserialize, Serialize};

// ============================================================================
// Built-in Keys
// ============================================================================

/// Type keys reserved by the built-in entity types
pub const BUILT_IN_TYPE_KEYS: &[&str] = &[
    "character",
    "npc",
    "location",
    "faction",
    "item",
    "encounter",
    "session",
    "deity",
    "timeline_event",
    "world_rule",
    "player_profile",
];

/// Whether the key belongs to a built-in type (exact, case-sensitive match)
pub fn is_built_in_type_key(key: &str) -> bool {
    BUILT_IN_TYPE_KEYS.contains(&key)
}

// ============================================================================
// EntityTypeDefinition
// ============================================================================

/// Schema for one category of entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EntityTypeDefinition {
    /// Unique lowercase key
    #[serde(default, rename = "type")]
    pub type_key: String,

    /// Singular display name
    #[serde(default)]
    pub label: String,

    /// Plural display name
    #[serde(default)]
    pub label_plural: String,

    /// Icon identifier
    #[serde(default)]
    pub icon: String,

    /// Colour identifier
    #[serde(default)]
    pub color: String,

    /// Built-in types are immutable
    #[serde(default)]
    pub is_built_in: bool,

    /// Field schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_definitions: Option<Vec<FieldDefinition>>,

    /// Relationship types offered when instantiating
    #[serde(default)]
    pub default_relationships: Vec<String>,
}

impl EntityTypeDefinition {
    /// Create a new custom type
    pub fn new(
        type_key: impl Into<String>,
        label: impl Into<String>,
        label_plural: impl Into<String>,
    ) -> Self {
        Self {
            type_key: type_key.into(),
            label: label.into(),
            label_plural: label_plural.into(),
            icon: "category".to_string(),
            color: "slate".to_string(),
            is_built_in: false,
            field_definitions: Some(Vec::new()),
            default_relationships: Vec::new(),
        }
    }

    // ========================================================================
    // Builder methods
    // ========================================================================

    /// Set icon and colour
    pub fn with_appearance(mut self, icon: impl Into<String>, color: impl Into<String>) -> Self {
        self.icon = icon.into();
        self.color = color.into();
        self
    }

    /// Append a field, assigning the next order when none was set
    pub fn with_field(mut self, mut field: FieldDefinition) -> Self {
        let fields = self.field_definitions.get_or_insert_with(Vec::new);
        if field.order == 0 {
            field.order = fields.len() as i32 + 1;
        }
        fields.push(field);
        self
    }

    /// Add a default relationship type
    pub fn with_default_relationship(mut self, relationship: impl Into<String>) -> Self {
        self.default_relationships.push(relationship.into());
        self
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Field definitions (empty when unset)
    pub fn fields(&self) -> &[FieldDefinition] {
        self.field_definitions.as_deref().unwrap_or(&[])
    }

    /// Look up a field by key
    pub fn field(&self, key: &str) -> Option<&FieldDefinition> {
        self.fields().iter().find(|f| f.key == key)
    }

    /// Fields sorted by display order
    pub fn fields_in_order(&self) -> Vec<&FieldDefinition> {
        let mut fields: Vec<&FieldDefinition> = self.fields().iter().collect();
        fields.sort_by_key(|f| f.order);
        fields
    }

    /// Keys of every field, in definition order
    pub fn field_keys(&self) -> Vec<String> {
        self.fields().iter().map(|f| f.key.clone()).collect()
    }

    /// Copy this type as an editable custom type
    ///
    /// The copy has an empty key which the caller must fill in before the
    /// definition can pass validation.
    pub fn clone_as_custom(&self) -> Self {
        Self {
            type_key: String::new(),
            label: format!("{} (Copy)", self.label),
            label_plural: format!("{} (Copy)", self.label_plural),
            is_built_in: false,
            ..self.clone()
        }
    }
}

// ============================================================================
// Key Suggestions
// ============================================================================

/// Suggest a free type key for a label
///
/// The label is converted to snake_case and stripped down to the type key
/// charset; collisions with built-in or existing keys get a numeric suffix.
pub fn suggest_type_key(label: &str, existing: &[EntityTypeDefinition]) -> String {
    let snake = label.to_snake_case();
    let cleaned: String = snake
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-')
        .collect();
    let trimmed = cleaned.trim_start_matches(|c: char| !c.is_ascii_lowercase());
    let base = if trimmed.is_empty() {
        "custom_type".to_string()
    } else {
        trimmed.to_string()
    };

    let taken = |key: &str| is_built_in_type_key(key) || existing.iter().any(|t| t.type_key == key);

    if !taken(&base) {
        return base;
    }

    let mut n = 2;
    loop {
        let candidate = format!("{}_{}", base, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

// ============================================================================
// Built-in Catalogue
// ============================================================================

fn built_in(
    key: &str,
    label: &str,
    plural: &str,
    icon: &str,
    color: &str,
    fields: Vec<FieldDefinition>,
    relationships: &[&str],
) -> EntityTypeDefinition {
    let mut def = EntityTypeDefinition::new(key, label, plural).with_appearance(icon, color);
    def.is_built_in = true;
    for field in fields {
        def = def.with_field(field);
    }
    for rel in relationships {
        def = def.with_default_relationship(*rel);
    }
    def
}

/// The entity types that ship with the tool
pub fn built_in_entity_types() -> Vec<EntityTypeDefinition> {
    vec![
        built_in(
            "character",
            "Player Character",
            "Player Characters",
            "person",
            "blue",
            vec![
                FieldDefinition::new("player_name", "Player", FieldType::Text).required(),
                FieldDefinition::new("concept", "Concept", FieldType::Text),
                FieldDefinition::new("background", "Background", FieldType::Richtext),
                FieldDefinition::new("goals", "Goals", FieldType::Textarea),
                FieldDefinition::select("status", "Status", ["active", "retired", "deceased"]),
            ],
            &["knows", "member_of"],
        ),
        built_in(
            "npc",
            "NPC",
            "NPCs",
            "groups",
            "amber",
            vec![
                FieldDefinition::new("role", "Role", FieldType::Text),
                FieldDefinition::new("personality", "Personality", FieldType::Textarea),
                FieldDefinition::new("motivation", "Motivation", FieldType::Textarea),
                FieldDefinition::new("secrets", "Secrets", FieldType::Richtext),
                FieldDefinition::select(
                    "disposition",
                    "Disposition",
                    ["friendly", "neutral", "hostile"],
                ),
                FieldDefinition::entity_ref("faction", "Faction", ["faction"]),
            ],
            &["knows", "allied_with", "enemy_of"],
        ),
        built_in(
            "location",
            "Location",
            "Locations",
            "map",
            "green",
            vec![
                FieldDefinition::new("region", "Region", FieldType::Text),
                FieldDefinition::new("atmosphere", "Atmosphere", FieldType::Textarea),
                FieldDefinition::new("features", "Notable Features", FieldType::Richtext),
                FieldDefinition::entity_ref("parent", "Located In", ["location"]),
                FieldDefinition::new("map_image", "Map", FieldType::Image),
            ],
            &["located_in", "controlled_by"],
        ),
        built_in(
            "faction",
            "Faction",
            "Factions",
            "flag",
            "red",
            vec![
                FieldDefinition::new("goals", "Goals", FieldType::Textarea),
                FieldDefinition::new("resources", "Resources", FieldType::Textarea),
                FieldDefinition::new("values", "Values", FieldType::Tags),
                FieldDefinition::entity_ref("leader", "Leader", ["npc", "character"]),
                FieldDefinition::select(
                    "influence",
                    "Influence",
                    ["local", "regional", "national", "global"],
                ),
            ],
            &["allied_with", "enemy_of", "controls"],
        ),
        built_in(
            "item",
            "Item",
            "Items",
            "diamond",
            "purple",
            vec![
                FieldDefinition::new("item_type", "Type", FieldType::Text),
                FieldDefinition::select(
                    "rarity",
                    "Rarity",
                    ["common", "uncommon", "rare", "legendary"],
                ),
                FieldDefinition::new("properties", "Properties", FieldType::Richtext),
                FieldDefinition::entity_ref("owner", "Owner", ["character", "npc"]),
            ],
            &["owned_by"],
        ),
        built_in(
            "encounter",
            "Encounter",
            "Encounters",
            "swords",
            "orange",
            vec![
                FieldDefinition::select("encounter_type", "Type", ["combat", "social", "exploration"]),
                FieldDefinition::new("enemy_count", "Enemies", FieldType::Number),
                FieldDefinition::new("enemy_cr", "Challenge Rating", FieldType::Number),
                FieldDefinition::computed(
                    "difficulty",
                    "Difficulty Score",
                    ComputedFieldConfig::new(
                        "{enemy_count} * {enemy_cr}",
                        ["enemy_count", "enemy_cr"],
                        OutputType::Number,
                    ),
                ),
                FieldDefinition::entity_ref("location", "Location", ["location"]),
            ],
            &["takes_place_at"],
        ),
        built_in(
            "session",
            "Session",
            "Sessions",
            "calendar",
            "teal",
            vec![
                FieldDefinition::new("session_number", "Session Number", FieldType::Number)
                    .required(),
                FieldDefinition::new("date", "Date Played", FieldType::Date),
                FieldDefinition::new("summary", "Summary", FieldType::Richtext),
                FieldDefinition::new("xp_awarded", "XP Awarded", FieldType::Number),
            ],
            &["features"],
        ),
        built_in(
            "deity",
            "Deity",
            "Deities",
            "sun",
            "yellow",
            vec![
                FieldDefinition::new("domains", "Domains", FieldType::Tags),
                FieldDefinition::new("symbol", "Holy Symbol", FieldType::Text),
                FieldDefinition::select(
                    "alignment",
                    "Alignment",
                    ["good", "neutral", "evil"],
                ),
                FieldDefinition::new("dogma", "Dogma", FieldType::Richtext),
            ],
            &["worshipped_by"],
        ),
        built_in(
            "timeline_event",
            "Timeline Event",
            "Timeline Events",
            "history",
            "indigo",
            vec![
                FieldDefinition::new("event_date", "When", FieldType::Text).required(),
                FieldDefinition::new("description", "What Happened", FieldType::Richtext),
                FieldDefinition::new("participants", "Participants", FieldType::EntityRefs)
                    .with_entity_types(["character", "npc", "faction"]),
            ],
            &["involves"],
        ),
        built_in(
            "world_rule",
            "World Rule",
            "World Rules",
            "gavel",
            "gray",
            vec![
                FieldDefinition::select("category", "Category", ["magic", "society", "physics", "other"]),
                FieldDefinition::new("rule", "Rule", FieldType::Richtext).required(),
                FieldDefinition::new("exceptions", "Exceptions", FieldType::Textarea),
            ],
            &[],
        ),
        built_in(
            "player_profile",
            "Player Profile",
            "Player Profiles",
            "badge",
            "cyan",
            vec![
                FieldDefinition::new("preferred_name", "Preferred Name", FieldType::Text)
                    .required(),
                FieldDefinition::new("play_style", "Play Style", FieldType::Tags),
                FieldDefinition::new("boundaries", "Lines & Veils", FieldType::Textarea),
                FieldDefinition::new("contact", "Contact", FieldType::Url),
            ],
            &["plays"],
        ),
    ]
}

/// Look up a built-in type by key
pub fn built_in_entity_type(key: &str) -> Option<EntityTypeDefinition> {
    built_in_entity_types().into_iter().find(|t| t.type_key == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_built_in_catalogue_matches_reserved_keys() {
        let types = built_in_entity_types();
        let keys: Vec<&str> = types.iter().map(|t| t.type_key.as_str()).collect();
        assert_eq!(keys, BUILT_IN_TYPE_KEYS);
        assert!(types.iter().all(|t| t.is_built_in));
    }

    #[test]
    fn test_with_field_assigns_contiguous_order() {
        let def = EntityTypeDefinition::new("ship", "Ship", "Ships")
            .with_field(FieldDefinition::new("name", "Name", FieldType::Text))
            .with_field(FieldDefinition::new("crew", "Crew", FieldType::Number));
        let orders: Vec<i32> = def.fields().iter().map(|f| f.order).collect();
        assert_eq!(orders, vec![1, 2]);
    }

    #[test]
    fn test_fields_in_order() {
        let def = EntityTypeDefinition::new("ship", "Ship", "Ships")
            .with_field(FieldDefinition::new("b", "B", FieldType::Text).with_order(2))
            .with_field(FieldDefinition::new("a", "A", FieldType::Text).with_order(1));
        let keys: Vec<&str> = def.fields_in_order().iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_clone_as_custom() {
        let npc = built_in_entity_type("npc").unwrap();
        let copy = npc.clone_as_custom();
        assert_eq!(copy.label, "NPC (Copy)");
        assert_eq!(copy.label_plural, "NPCs (Copy)");
        assert!(copy.type_key.is_empty());
        assert!(!copy.is_built_in);
        assert_eq!(copy.fields(), npc.fields());
    }

    #[test]
    fn test_suggest_type_key() {
        assert_eq!(suggest_type_key("Star Ship", &[]), "star_ship");
        assert_eq!(suggest_type_key("NPC", &[]), "npc_2");
        assert_eq!(suggest_type_key("42 Rumours", &[]), "rumours");
        assert_eq!(suggest_type_key("!!!", &[]), "custom_type");

        let existing = vec![EntityTypeDefinition::new("ship", "Ship", "Ships")];
        assert_eq!(suggest_type_key("Ship", &existing), "ship_2");
    }
}
