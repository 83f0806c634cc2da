//! In-memory [`ModelDecoder`] for graph tests.

use std::collections::HashMap;

use serde_json::Value;

use super::{Entity, Field, FieldValue, ModelDecoder, Origin};
use crate::error::{IfcGraphError, Result};

#[derive(Debug, Clone)]
enum Slot {
    Simple(Value),
    Reference(Option<u64>),
    Inline(String, Value),
    Aggregate(Vec<Option<u64>>),
    Derived,
    Broken,
}

#[derive(Debug, Clone, Default)]
struct Record {
    type_name: String,
    fields: Vec<(String, Slot)>,
    inverses: Vec<(String, Vec<u64>)>,
}

/// Builder-style decoder: entities, fields and inverse roles are declared
/// explicitly, so tests control every answer the materializer sees.
#[derive(Debug, Clone, Default)]
pub(crate) struct FixtureModel {
    order: Vec<u64>,
    records: HashMap<u64, Record>,
    parents: HashMap<String, String>,
    types: Vec<String>,
}

impl FixtureModel {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Declare `child` as a direct subtype of `parent`.
    pub(crate) fn subtype(mut self, child: &str, parent: &str) -> Self {
        self.parents.insert(child.to_string(), parent.to_string());
        self
    }

    pub(crate) fn entity(mut self, id: u64, type_name: &str) -> Self {
        self.order.push(id);
        self.records.insert(
            id,
            Record {
                type_name: type_name.to_string(),
                ..Record::default()
            },
        );
        self.refresh_types();
        self
    }

    pub(crate) fn simple(self, id: u64, name: &str, value: Value) -> Self {
        self.push(id, name, Slot::Simple(value))
    }

    pub(crate) fn reference(self, id: u64, name: &str, target: Option<u64>) -> Self {
        self.push(id, name, Slot::Reference(target))
    }

    /// A typed value without a native id, e.g. `IFCLABEL('x')`.
    pub(crate) fn inline(self, id: u64, name: &str, type_name: &str, value: Value) -> Self {
        self.push(id, name, Slot::Inline(type_name.to_string(), value))
    }

    pub(crate) fn aggregate(self, id: u64, name: &str, members: Vec<Option<u64>>) -> Self {
        self.push(id, name, Slot::Aggregate(members))
    }

    pub(crate) fn derived(self, id: u64, name: &str) -> Self {
        self.push(id, name, Slot::Derived)
    }

    /// A field whose metadata lookup fails.
    pub(crate) fn broken(self, id: u64, name: &str) -> Self {
        self.push(id, name, Slot::Broken)
    }

    pub(crate) fn inverse(mut self, id: u64, role: &str, related: Vec<u64>) -> Self {
        if let Some(record) = self.records.get_mut(&id) {
            record.inverses.push((role.to_string(), related));
        }
        self
    }

    fn push(mut self, id: u64, name: &str, slot: Slot) -> Self {
        if let Some(record) = self.records.get_mut(&id) {
            record.fields.push((name.to_string(), slot));
        }
        self
    }

    fn chain(&self, type_name: &str) -> Vec<String> {
        let mut chain = vec![type_name.to_string()];
        let mut cursor = type_name;
        while let Some(parent) = self.parents.get(cursor) {
            chain.push(parent.clone());
            cursor = parent;
        }
        chain
    }

    fn refresh_types(&mut self) {
        let mut types = Vec::new();
        for record in self.records.values() {
            for t in self.chain(&record.type_name).into_iter().rev() {
                if !types.contains(&t) {
                    types.push(t);
                }
            }
        }
        types.sort();
        self.types = types;
    }

    fn inline_value(&self, origin: Origin) -> Option<&Value> {
        let record = self.records.get(&origin.owner)?;
        match &record.fields.get(origin.field)?.1 {
            Slot::Inline(_, value) => Some(value),
            _ => None,
        }
    }
}

impl ModelDecoder for FixtureModel {
    fn entity_ids(&self) -> Vec<u64> {
        self.order.clone()
    }

    fn by_id(&self, id: u64) -> Option<Entity> {
        self.records
            .get(&id)
            .map(|r| Entity::new(id, r.type_name.clone()))
    }

    fn is_a(&self, entity: &Entity, type_name: &str) -> bool {
        self.chain(&entity.type_name)
            .iter()
            .any(|t| t.eq_ignore_ascii_case(type_name))
    }

    fn types_with_super(&self) -> &[String] {
        &self.types
    }

    fn field_count(&self, entity: &Entity) -> usize {
        match entity.origin {
            Some(_) if !entity.has_native_id() => 1,
            _ => self
                .records
                .get(&entity.id)
                .map(|r| r.fields.len())
                .unwrap_or(0),
        }
    }

    fn field(&self, entity: &Entity, index: usize) -> Result<Field> {
        let malformed = |reason: &str| IfcGraphError::MalformedEntity {
            id: entity.id,
            index,
            reason: reason.to_string(),
        };

        if let (false, Some(origin)) = (entity.has_native_id(), entity.origin) {
            let value = self
                .inline_value(origin)
                .filter(|_| index == 0)
                .ok_or_else(|| malformed("no inline value"))?;
            return Ok(Field {
                name: "wrappedValue".to_string(),
                value: FieldValue::Simple(value.clone()),
            });
        }

        let record = self.records.get(&entity.id).ok_or_else(|| malformed("unknown entity"))?;
        let (name, slot) = record.fields.get(index).ok_or_else(|| malformed("index out of range"))?;
        let lookup = |target: &Option<u64>| -> Result<Option<Entity>> {
            match target {
                None => Ok(None),
                Some(t) => self
                    .by_id(*t)
                    .map(Some)
                    .ok_or_else(|| malformed("dangling reference")),
            }
        };

        let value = match slot {
            Slot::Simple(v) => FieldValue::Simple(v.clone()),
            Slot::Reference(target) => FieldValue::EntityReference(lookup(target)?),
            Slot::Inline(type_name, _) => FieldValue::EntityReference(Some(Entity::inline(
                type_name.clone(),
                Origin {
                    owner: entity.id,
                    field: index,
                    member: None,
                },
            ))),
            Slot::Aggregate(members) => FieldValue::AggregateOfEntityReferences(
                members.iter().map(lookup).collect::<Result<Vec<_>>>()?,
            ),
            Slot::Derived => FieldValue::Derived,
            Slot::Broken => return Err(malformed("metadata unavailable")),
        };

        Ok(Field {
            name: name.clone(),
            value,
        })
    }

    fn inverse_names(&self, entity: &Entity) -> Vec<String> {
        self.records
            .get(&entity.id)
            .map(|r| r.inverses.iter().map(|(role, _)| role.clone()).collect())
            .unwrap_or_default()
    }

    fn inverse(&self, entity: &Entity, role: &str) -> Vec<u64> {
        self.records
            .get(&entity.id)
            .and_then(|r| r.inverses.iter().find(|(name, _)| name == role))
            .map(|(_, ids)| ids.clone())
            .unwrap_or_default()
    }
}
