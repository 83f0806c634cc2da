//! Model decoder interface.
//!
//! The graph builder only talks to a model through [`ModelDecoder`]: entity
//! enumeration, lookup by id, type membership, positional field metadata and
//! inverse relationships. [`IfcModel`] implements it over a parsed STEP file.

mod ifc;

#[cfg(test)]
pub(crate) mod fixture;

pub use ifc::IfcModel;
pub use crate::schema::FieldKind;

use std::fmt;

use serde_json::Value;

use crate::error::Result;

/// Where an entity without a native identifier lives inside its owner.
///
/// Inline values (for example `IFCLABEL('x')` in a select-typed attribute)
/// have no `#id`; their location is what makes them the same entity across
/// repeated lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Origin {
    pub owner: u64,
    pub field: usize,
    pub member: Option<usize>,
}

/// Lightweight entity handle handed out by a decoder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entity {
    /// Native identifier; 0 when the entity has none
    pub id: u64,
    /// Concrete type name in schema casing
    pub type_name: String,
    pub origin: Option<Origin>,
}

impl Entity {
    pub fn new(id: u64, type_name: impl Into<String>) -> Self {
        Self {
            id,
            type_name: type_name.into(),
            origin: None,
        }
    }

    pub fn inline(type_name: impl Into<String>, origin: Origin) -> Self {
        Self {
            id: 0,
            type_name: type_name.into(),
            origin: Some(origin),
        }
    }

    pub fn has_native_id(&self) -> bool {
        self.id != 0
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_native_id() {
            write!(f, "#{}={}", self.id, self.type_name)
        } else {
            write!(f, "{}", self.type_name)
        }
    }
}

/// A field value, tagged by kind once by the decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Simple(Value),
    EntityReference(Option<Entity>),
    AggregateOfEntityReferences(Vec<Option<Entity>>),
    Derived,
}

/// One positional field of an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
}

impl Field {
    pub fn kind(&self) -> FieldKind {
        match self.value {
            FieldValue::Simple(_) => FieldKind::Simple,
            FieldValue::EntityReference(_) => FieldKind::EntityReference,
            FieldValue::AggregateOfEntityReferences(_) => FieldKind::AggregateOfEntityReferences,
            FieldValue::Derived => FieldKind::Derived,
        }
    }
}

/// Read access to a decoded building model.
pub trait ModelDecoder {
    /// Every entity identifier, in the decoder's native enumeration order
    fn entity_ids(&self) -> Vec<u64>;

    /// Canonical handle for an identifier
    fn by_id(&self, id: u64) -> Option<Entity>;

    /// Whether the entity's type is `type_name` or one of its subtypes
    fn is_a(&self, entity: &Entity, type_name: &str) -> bool;

    /// Every type name reachable from the model's type system, supertypes included
    fn types_with_super(&self) -> &[String];

    fn field_count(&self, entity: &Entity) -> usize;

    /// Metadata and value of the field at `index`
    fn field(&self, entity: &Entity, index: usize) -> Result<Field>;

    /// Inverse relationship roles exposed by the entity's type
    fn inverse_names(&self, entity: &Entity) -> Vec<String>;

    /// Ids of the entities related to `entity` through `role`
    fn inverse(&self, entity: &Entity, role: &str) -> Vec<u64>;
}
