//! Entities and the links between them
//!
//! Links are stored on their source entity. A bidirectional link is mirrored
//! by a second link stored on the target, named by the reverse relationship
//! when one is given. `EntityStore` keeps both halves in step.

use crate::entity_type::EntityTypeDefinition;
use crate::formula::{RecomputeOutcome, recompute_computed_fields};
use chrono::{DateTime, Utc};
use loreforge_core::{EngineError, EngineResult, FieldValue, FieldValues};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

// ============================================================================
// Metadata
// ============================================================================

/// Free-form annotations on an entity or a link
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Narrative tension, 0.0 to 1.0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tension: Option<f64>,
}

/// How strong a link is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStrength {
    Weak,
    Moderate,
    Strong,
}

// ============================================================================
// Entity
// ============================================================================

/// A campaign object: an instance of an entity type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: Uuid,
    pub name: String,

    /// Key of the entity type this is an instance of
    #[serde(rename = "type")]
    pub entity_type: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub fields: FieldValues,

    /// Outgoing links
    #[serde(default)]
    pub links: Vec<EntityLink>,

    #[serde(default)]
    pub metadata: EntityMetadata,

    #[serde(default = "default_true")]
    pub player_visible: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl Entity {
    /// Create a new entity with no fields or links
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            entity_type: entity_type.into(),
            description: String::new(),
            fields: FieldValues::new(),
            links: Vec::new(),
            metadata: EntityMetadata::default(),
            player_visible: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set a field value
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Hide from players
    pub fn hidden(mut self) -> Self {
        self.player_visible = false;
        self
    }

    /// Outgoing link to `target` with `relationship`, if any
    pub fn link_to(&self, target: Uuid, relationship: &str) -> Option<&EntityLink> {
        self.links
            .iter()
            .find(|l| l.target_id == target && l.relationship == relationship)
    }

    /// Update the modification timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// ============================================================================
// EntityLink
// ============================================================================

/// One directed link, stored on its source entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityLink {
    pub id: Uuid,
    pub target_id: Uuid,

    /// Relationship type, e.g. "allied_with"
    pub relationship: String,

    pub bidirectional: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<LinkStrength>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EntityMetadata>,

    /// Relationship type of the mirrored link on the target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverse_relationship: Option<String>,

    #[serde(default = "default_true")]
    pub player_visible: bool,

    /// ID of the mirrored half on the target, when this store created one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
}

impl EntityLink {
    /// Relationship name used by the mirrored half of a bidirectional link
    pub fn mirrored_relationship(&self) -> &str {
        self.reverse_relationship
            .as_deref()
            .unwrap_or(&self.relationship)
    }
}

/// Parameters for [`EntityStore::add_link`]
#[derive(Debug, Clone)]
pub struct LinkRequest {
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub relationship: String,
    pub bidirectional: bool,
    pub notes: Option<String>,
    pub strength: Option<LinkStrength>,
    pub metadata: Option<EntityMetadata>,
    pub reverse_relationship: Option<String>,
    pub player_visible: bool,
}

impl LinkRequest {
    /// A one-way, player-visible link
    pub fn new(source_id: Uuid, target_id: Uuid, relationship: impl Into<String>) -> Self {
        Self {
            source_id,
            target_id,
            relationship: relationship.into(),
            bidirectional: false,
            notes: None,
            strength: None,
            metadata: None,
            reverse_relationship: None,
            player_visible: true,
        }
    }

    /// Mirror the link on the target
    pub fn bidirectional(mut self) -> Self {
        self.bidirectional = true;
        self
    }

    /// Mirror the link on the target under another relationship name
    pub fn with_reverse(mut self, relationship: impl Into<String>) -> Self {
        self.bidirectional = true;
        self.reverse_relationship = Some(relationship.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_strength(mut self, strength: LinkStrength) -> Self {
        self.strength = Some(strength);
        self
    }

    pub fn with_metadata(mut self, metadata: EntityMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Hide from players
    pub fn hidden(mut self) -> Self {
        self.player_visible = false;
        self
    }
}

// ============================================================================
// EntityStore
// ============================================================================

/// In-memory entity collection
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    entities: HashMap<Uuid, Entity>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Entity Management
    // ========================================================================

    /// Add an entity to the store
    pub fn add_entity(&mut self, entity: Entity) -> Uuid {
        let id = entity.id;
        tracing::info!(%id, name = %entity.name, entity_type = %entity.entity_type, "entity added");
        self.entities.insert(id, entity);
        id
    }

    /// Remove an entity and every link pointing at it
    pub fn remove_entity(&mut self, id: Uuid) -> Option<Entity> {
        let removed = self.entities.remove(&id)?;
        for entity in self.entities.values_mut() {
            let before = entity.links.len();
            entity.links.retain(|l| l.target_id != id);
            if entity.links.len() != before {
                entity.touch();
            }
        }
        tracing::info!(%id, name = %removed.name, "entity removed");
        Some(removed)
    }

    /// Get an entity by ID
    pub fn get_by_id(&self, id: Uuid) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Entities of one type, sorted by name
    pub fn entities_of_type(&self, entity_type: &str) -> Vec<&Entity> {
        let mut found: Vec<&Entity> = self
            .entities
            .values()
            .filter(|e| e.entity_type == entity_type)
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Recompute an entity's computed fields and store the results
    pub fn recompute_entity(
        &mut self,
        id: Uuid,
        definition: &EntityTypeDefinition,
    ) -> EngineResult<RecomputeOutcome> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or_else(|| EngineError::EntityNotFound(id.to_string()))?;
        let outcome = recompute_computed_fields(definition.fields(), &entity.fields);
        entity.fields = outcome.values.clone();
        entity.touch();
        Ok(outcome)
    }

    // ========================================================================
    // Link Management
    // ========================================================================

    /// Link two entities
    ///
    /// Fails if either entity is missing, the link points at its own source,
    /// or the source already has a link of the same relationship type to the
    /// target. A bidirectional link also adds the mirrored link on the target
    /// unless the target already has it.
    pub fn add_link(&mut self, request: LinkRequest) -> EngineResult<Uuid> {
        let relationship = request.relationship.trim().to_string();
        if relationship.is_empty() {
            return Err(EngineError::LinkValidation(
                "Relationship type is required".to_string(),
            ));
        }
        if request.source_id == request.target_id {
            return Err(EngineError::LinkValidation(
                "An entity cannot link to itself".to_string(),
            ));
        }

        let source = self.require(request.source_id)?;
        let target = self.require(request.target_id)?;

        if source.link_to(request.target_id, &relationship).is_some() {
            return Err(EngineError::DuplicateRelationship {
                from: source.name.clone(),
                to: target.name.clone(),
                relationship,
            });
        }

        let now = Utc::now();
        let mut link = EntityLink {
            id: Uuid::new_v4(),
            target_id: request.target_id,
            relationship,
            bidirectional: request.bidirectional,
            notes: request.notes,
            strength: request.strength,
            metadata: request.metadata,
            reverse_relationship: request
                .reverse_relationship
                .filter(|r| !r.trim().is_empty()),
            player_visible: request.player_visible,
            mirror_id: None,
            created_at: now,
        };
        let link_id = link.id;

        if link.bidirectional {
            let reverse = link.mirrored_relationship().to_string();
            let target = self.require_mut(request.target_id)?;
            // an existing reverse link stays independent of this one
            if target.link_to(request.source_id, &reverse).is_none() {
                let mirror = EntityLink {
                    id: Uuid::new_v4(),
                    target_id: request.source_id,
                    relationship: reverse,
                    reverse_relationship: Some(link.relationship.clone()),
                    mirror_id: Some(link_id),
                    ..link.clone()
                };
                link.mirror_id = Some(mirror.id);
                target.links.push(mirror);
                target.touch();
            }
        }

        tracing::info!(
            source = %request.source_id,
            target = %request.target_id,
            relationship = %link.relationship,
            bidirectional = link.bidirectional,
            "link added"
        );

        let source = self.require_mut(request.source_id)?;
        source.links.push(link);
        source.touch();
        Ok(link_id)
    }

    /// Remove a link, and the mirrored half this store created for it
    pub fn remove_link(&mut self, source_id: Uuid, link_id: Uuid) -> EngineResult<EntityLink> {
        let source = self.require_mut(source_id)?;
        let index = source
            .links
            .iter()
            .position(|l| l.id == link_id)
            .ok_or_else(|| EngineError::LinkNotFound(link_id.to_string()))?;
        let link = source.links.remove(index);
        source.touch();

        if let Some(mirror_id) = link.mirror_id {
            if let Some(target) = self.entities.get_mut(&link.target_id) {
                let before = target.links.len();
                target.links.retain(|l| l.id != mirror_id);
                if target.links.len() != before {
                    target.touch();
                }
            }
        }

        tracing::info!(%source_id, %link_id, relationship = %link.relationship, "link removed");
        Ok(link)
    }

    /// Outgoing links of an entity
    pub fn links_from(&self, id: Uuid) -> &[EntityLink] {
        self.entities
            .get(&id)
            .map(|e| e.links.as_slice())
            .unwrap_or(&[])
    }

    /// Incoming links of an entity, with their source IDs
    pub fn links_to(&self, id: Uuid) -> Vec<(Uuid, &EntityLink)> {
        let mut found: Vec<(Uuid, &EntityLink)> = self
            .entities
            .values()
            .flat_map(|e| {
                e.links
                    .iter()
                    .filter(move |l| l.target_id == id)
                    .map(move |l| (e.id, l))
            })
            .collect();
        found.sort_by_key(|(_, l)| l.created_at);
        found
    }

    /// Entities linked from `id`, optionally restricted to one relationship type
    pub fn related_entities(&self, id: Uuid, relationship: Option<&str>) -> Vec<&Entity> {
        let mut seen = HashSet::new();
        self.links_from(id)
            .iter()
            .filter(|l| relationship.is_none_or(|r| l.relationship == r))
            .filter(|l| seen.insert(l.target_id))
            .filter_map(|l| self.entities.get(&l.target_id))
            .collect()
    }

    fn require(&self, id: Uuid) -> EngineResult<&Entity> {
        self.entities
            .get(&id)
            .ok_or_else(|| EngineError::EntityNotFound(id.to_string()))
    }

    fn require_mut(&mut self, id: Uuid) -> EngineResult<&mut Entity> {
        self.entities
            .get_mut(&id)
            .ok_or_else(|| EngineError::EntityNotFound(id.to_string()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity_type::built_in_entity_type;

    fn store_with_two() -> (EntityStore, Uuid, Uuid) {
        let mut store = EntityStore::new();
        let aria = store.add_entity(Entity::new("Aria", "npc"));
        let hand = store.add_entity(Entity::new("Red Hand", "faction"));
        (store, aria, hand)
    }

    #[test]
    fn test_one_way_link() {
        let (mut store, aria, hand) = store_with_two();
        let link_id = store
            .add_link(LinkRequest::new(aria, hand, "member_of").with_strength(LinkStrength::Strong))
            .unwrap();

        assert_eq!(store.links_from(aria).len(), 1);
        assert_eq!(store.links_from(aria)[0].id, link_id);
        assert!(store.links_from(hand).is_empty());

        let incoming = store.links_to(hand);
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].0, aria);
    }

    #[test]
    fn test_link_carries_notes_and_metadata() {
        let (mut store, aria, hand) = store_with_two();
        let metadata = EntityMetadata {
            tags: vec!["secret".into()],
            tension: Some(0.8),
        };
        store
            .add_link(
                LinkRequest::new(aria, hand, "spies_on")
                    .with_notes("Reports to the queen")
                    .with_metadata(metadata.clone())
                    .with_reverse("watched_by")
                    .hidden(),
            )
            .unwrap();

        let link = &store.links_from(aria)[0];
        assert_eq!(link.notes.as_deref(), Some("Reports to the queen"));
        assert_eq!(link.metadata.as_ref(), Some(&metadata));
        assert!(!link.player_visible);

        // the mirror shares the annotations
        let mirror = &store.links_from(hand)[0];
        assert_eq!(mirror.relationship, "watched_by");
        assert_eq!(mirror.notes, link.notes);
        assert!(!mirror.player_visible);
    }

    #[test]
    fn test_bidirectional_link_creates_mirror() {
        let (mut store, aria, hand) = store_with_two();
        store
            .add_link(LinkRequest::new(aria, hand, "leads").with_reverse("led_by"))
            .unwrap();

        let mirror = store.get_by_id(hand).unwrap().link_to(aria, "led_by").unwrap();
        assert!(mirror.bidirectional);
        assert_eq!(mirror.reverse_relationship.as_deref(), Some("leads"));

        // same relationship name when no reverse is given
        let bard = store.add_entity(Entity::new("Bard", "npc"));
        store
            .add_link(LinkRequest::new(aria, bard, "knows").bidirectional())
            .unwrap();
        assert!(store.get_by_id(bard).unwrap().link_to(aria, "knows").is_some());
    }

    #[test]
    fn test_existing_mirror_is_not_duplicated() {
        let (mut store, aria, hand) = store_with_two();
        store.add_link(LinkRequest::new(hand, aria, "knows")).unwrap();
        store
            .add_link(LinkRequest::new(aria, hand, "knows").bidirectional())
            .unwrap();
        assert_eq!(store.links_from(hand).len(), 1);
    }

    #[test]
    fn test_duplicate_relationship_rejected() {
        let (mut store, aria, hand) = store_with_two();
        store.add_link(LinkRequest::new(aria, hand, "member_of")).unwrap();
        let err = store
            .add_link(LinkRequest::new(aria, hand, "member_of"))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Duplicate relationship 'member_of' from 'Aria' to 'Red Hand'"
        );

        // a different relationship type is fine
        store.add_link(LinkRequest::new(aria, hand, "enemy_of")).unwrap();
        assert_eq!(store.links_from(aria).len(), 2);
    }

    #[test]
    fn test_invalid_links() {
        let (mut store, aria, hand) = store_with_two();
        assert!(store.add_link(LinkRequest::new(aria, aria, "knows")).is_err());
        assert!(store.add_link(LinkRequest::new(aria, hand, "  ")).is_err());
        let err = store
            .add_link(LinkRequest::new(aria, Uuid::new_v4(), "knows"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_remove_link_removes_mirror() {
        let (mut store, aria, hand) = store_with_two();
        let link_id = store
            .add_link(LinkRequest::new(aria, hand, "leads").with_reverse("led_by"))
            .unwrap();
        let removed = store.remove_link(aria, link_id).unwrap();
        assert_eq!(removed.relationship, "leads");
        assert!(store.links_from(aria).is_empty());
        assert!(store.links_from(hand).is_empty());

        assert!(store.remove_link(aria, link_id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_remove_link_from_mirror_side() {
        let (mut store, aria, hand) = store_with_two();
        store
            .add_link(LinkRequest::new(aria, hand, "knows").bidirectional())
            .unwrap();
        let mirror_id = store.links_from(hand)[0].id;
        store.remove_link(hand, mirror_id).unwrap();
        assert!(store.links_from(aria).is_empty());
        assert!(store.links_from(hand).is_empty());
    }

    #[test]
    fn test_remove_link_keeps_independent_reverse_link() {
        let (mut store, aria, hand) = store_with_two();
        let own = store.add_link(LinkRequest::new(hand, aria, "knows")).unwrap();
        let link_id = store
            .add_link(LinkRequest::new(aria, hand, "knows").bidirectional())
            .unwrap();
        assert_eq!(store.links_from(aria)[0].mirror_id, None);

        store.remove_link(aria, link_id).unwrap();
        assert_eq!(store.links_from(hand).len(), 1);
        assert_eq!(store.links_from(hand)[0].id, own);
    }

    #[test]
    fn test_remove_entity_drops_inbound_links() {
        let (mut store, aria, hand) = store_with_two();
        store.add_link(LinkRequest::new(aria, hand, "member_of")).unwrap();
        store.remove_entity(hand).unwrap();
        assert!(store.links_from(aria).is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_related_entities_filter() {
        let (mut store, aria, hand) = store_with_two();
        let bard = store.add_entity(Entity::new("Bard", "npc"));
        store.add_link(LinkRequest::new(aria, hand, "member_of")).unwrap();
        store.add_link(LinkRequest::new(aria, hand, "enemy_of")).unwrap();
        store.add_link(LinkRequest::new(aria, bard, "knows")).unwrap();

        assert_eq!(store.related_entities(aria, None).len(), 2);
        let known: Vec<&str> = store
            .related_entities(aria, Some("knows"))
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(known, vec!["Bard"]);
    }

    #[test]
    fn test_entities_of_type_sorted() {
        let (mut store, _, _) = store_with_two();
        store.add_entity(Entity::new("Zed", "npc"));
        store.add_entity(Entity::new("Bard", "npc"));
        let names: Vec<&str> = store
            .entities_of_type("npc")
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, vec!["Aria", "Bard", "Zed"]);
    }

    #[test]
    fn test_recompute_entity() {
        let encounter = built_in_entity_type("encounter").unwrap();
        let mut store = EntityStore::new();
        let id = store.add_entity(
            Entity::new("Bridge Ambush", "encounter")
                .with_field("enemy_count", 4)
                .with_field("enemy_cr", 2),
        );
        let outcome = store.recompute_entity(id, &encounter).unwrap();
        assert!(outcome.is_clean());
        assert_eq!(
            store.get_by_id(id).unwrap().fields["difficulty"],
            FieldValue::Number(8.0)
        );
    }
}
