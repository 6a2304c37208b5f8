//! Label and relation registration, attribute interning, and the schema
//! metadata layout consumed by an external serializer.
//!
//! Labels and relations get dense, never-recycled ids in registration
//! order. Attribute names are interned once, process-wide per graph, into
//! dense [`AttributeId`]s; each schema store records which attribute
//! names its entities have used.

use crate::ids::{AttributeId, LabelId, RelationId};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Persistent metadata for one label or relation schema:
/// `(id, name, attribute count, attribute names)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    pub id: i32,
    pub name: String,
    pub attributes: Vec<String>,
}

impl Store {
    fn new(id: i32, name: &str) -> Self {
        Store {
            id,
            name: name.to_string(),
            attributes: Vec::new(),
        }
    }
}

/// Global attribute-name interner.
///
/// Reads go through the lock-free map; the name table is only written
/// under its lock when a fresh attribute appears.
#[derive(Debug, Default)]
pub struct AttributeInterner {
    ids: DashMap<String, AttributeId>,
    names: RwLock<Vec<String>>,
}

impl AttributeInterner {
    pub fn new() -> Self {
        AttributeInterner::default()
    }

    /// Intern `name`, returning its dense id.
    pub fn intern(&self, name: &str) -> AttributeId {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        let mut names = self.names.write();
        // recheck under the write lock
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        let id = names.len() as AttributeId;
        names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    /// Lookup without interning.
    pub fn get(&self, name: &str) -> Option<AttributeId> {
        self.ids.get(name).map(|id| *id)
    }

    pub fn name(&self, id: AttributeId) -> Option<String> {
        self.names.read().get(id as usize).cloned()
    }

    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Name registries for labels and relations.
#[derive(Debug, Default)]
pub struct GraphSchema {
    labels: Vec<Store>,
    relations: Vec<Store>,
    label_ids: HashMap<String, LabelId>,
    relation_ids: HashMap<String, RelationId>,
    pub attributes: AttributeInterner,
}

impl GraphSchema {
    pub fn new() -> Self {
        GraphSchema::default()
    }

    /// Register a label name; idempotent.
    pub fn add_label(&mut self, name: &str) -> LabelId {
        if let Some(&id) = self.label_ids.get(name) {
            return id;
        }
        let id = self.labels.len() as LabelId;
        self.labels.push(Store::new(id, name));
        self.label_ids.insert(name.to_string(), id);
        id
    }

    /// Register a relation name; idempotent.
    pub fn add_relation(&mut self, name: &str) -> RelationId {
        if let Some(&id) = self.relation_ids.get(name) {
            return id;
        }
        let id = self.relations.len() as RelationId;
        self.relations.push(Store::new(id, name));
        self.relation_ids.insert(name.to_string(), id);
        id
    }

    pub fn label_id(&self, name: &str) -> Option<LabelId> {
        self.label_ids.get(name).copied()
    }

    pub fn relation_id(&self, name: &str) -> Option<RelationId> {
        self.relation_ids.get(name).copied()
    }

    pub fn label_store(&self, id: LabelId) -> Option<&Store> {
        usize::try_from(id).ok().and_then(|i| self.labels.get(i))
    }

    pub fn relation_store(&self, id: RelationId) -> Option<&Store> {
        usize::try_from(id).ok().and_then(|i| self.relations.get(i))
    }

    /// Record that entities of the given label schema use an attribute.
    pub fn note_label_attribute(&mut self, id: LabelId, name: &str) {
        if let Some(store) = usize::try_from(id).ok().and_then(|i| self.labels.get_mut(i)) {
            if !store.attributes.iter().any(|a| a == name) {
                store.attributes.push(name.to_string());
            }
        }
    }

    /// Record that edges of the given relation schema use an attribute.
    pub fn note_relation_attribute(&mut self, id: RelationId, name: &str) {
        if let Some(store) = usize::try_from(id)
            .ok()
            .and_then(|i| self.relations.get_mut(i))
        {
            if !store.attributes.iter().any(|a| a == name) {
                store.attributes.push(name.to_string());
            }
        }
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    /// The serializable layout for one graph: name, label stores,
    /// relation stores. Matrices themselves are never persisted; they are
    /// rebuilt from entity iteration.
    pub fn layout(&self, graph_name: &str) -> SchemaLayout {
        SchemaLayout {
            name: graph_name.to_string(),
            label_count: self.labels.len(),
            relation_count: self.relations.len(),
            labels: self.labels.clone(),
            relations: self.relations.clone(),
        }
    }
}

/// Snapshot of a graph's schema metadata for the host serializer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaLayout {
    pub name: String,
    pub label_count: usize,
    pub relation_count: usize,
    pub labels: Vec<Store>,
    pub relations: Vec<Store>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_ids_in_registration_order() {
        let mut schema = GraphSchema::new();
        assert_eq!(schema.add_label("Person"), 0);
        assert_eq!(schema.add_label("City"), 1);
        assert_eq!(schema.add_label("Person"), 0);
        assert_eq!(schema.add_relation("KNOWS"), 0);
        assert_eq!(schema.label_id("City"), Some(1));
        assert_eq!(schema.relation_id("LIVES_IN"), None);
    }

    #[test]
    fn test_attribute_interning_is_stable() {
        let interner = AttributeInterner::new();
        let a = interner.intern("age");
        let b = interner.intern("name");
        assert_eq!(interner.intern("age"), a);
        assert_ne!(a, b);
        assert_eq!(interner.name(b).as_deref(), Some("name"));
    }

    #[test]
    fn test_layout_round_trips_through_json() {
        let mut schema = GraphSchema::new();
        schema.add_label("Person");
        schema.add_relation("KNOWS");
        schema.note_label_attribute(0, "age");

        let layout = schema.layout("social");
        let json = serde_json::to_string(&layout).unwrap();
        let back: SchemaLayout = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "social");
        assert_eq!(back.labels[0].attributes, vec!["age"]);
    }
}
