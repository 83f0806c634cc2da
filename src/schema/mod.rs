//! Entity type hierarchy and attribute metadata.
//!
//! A schema document lists entity types with their supertype, their own
//! explicit attributes (each tagged with a [`FieldKind`]) and their inverse
//! attributes. Lookups flatten the supertype chain so callers always see the
//! full positional attribute list of a concrete type.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IfcGraphError, Result};

const IFC4_CORE: &str = include_str!("ifc4_core.json");

/// How a positional field participates in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    /// Scalar or aggregate of scalars; becomes a node attribute
    Simple,
    /// Single entity instance; becomes an edge
    EntityReference,
    /// Aggregate of entity instances; becomes one edge per member
    AggregateOfEntityReferences,
    /// Value computed by the schema; never stored
    Derived,
}

impl FieldKind {
    /// Compound and derived fields are edge-only (never node attributes).
    pub fn is_edge_only(self) -> bool {
        !matches!(self, FieldKind::Simple)
    }
}

/// An explicit attribute declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDef {
    pub name: String,
    pub kind: FieldKind,
}

/// An inverse attribute: `name` on this entity collects every `entity`
/// instance whose `attribute` refers to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InverseDef {
    pub name: String,
    pub entity: String,
    pub attribute: String,
}

/// An entity type declaration as written in the schema document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDef {
    pub name: String,
    #[serde(default)]
    pub supertype: Option<String>,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub attributes: Vec<AttributeDef>,
    /// Inherited attributes redeclared as DERIVE in this subtype
    #[serde(default)]
    pub derived: Vec<String>,
    #[serde(default)]
    pub inverses: Vec<InverseDef>,
}

#[derive(Debug, Deserialize)]
struct SchemaDocument {
    name: String,
    #[serde(default)]
    defined_types: Vec<String>,
    entities: Vec<EntityDef>,
}

/// A validated schema with precomputed flattened attribute lists.
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    entities: Vec<EntityDef>,
    by_upper: HashMap<String, usize>,
    supertype_of: Vec<Option<usize>>,
    defined_types: HashMap<String, String>,
    attributes: Vec<Vec<AttributeDef>>,
    inverses: Vec<Vec<InverseDef>>,
}

impl Schema {
    /// The embedded IFC4 core subset
    pub fn ifc4_core() -> Result<Self> {
        Self::from_json(IFC4_CORE)
    }

    /// Load a schema document from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let schema = Self::from_json(&content)?;
        log::info!(
            "Loaded schema {} ({} entity types) from {}",
            schema.name,
            schema.entities.len(),
            path.display()
        );
        Ok(schema)
    }

    /// Parse and validate a schema document
    pub fn from_json(content: &str) -> Result<Self> {
        let doc: SchemaDocument = serde_json::from_str(content)
            .map_err(|e| IfcGraphError::Schema(format!("invalid schema document: {}", e)))?;

        let mut by_upper = HashMap::with_capacity(doc.entities.len());
        for (idx, entity) in doc.entities.iter().enumerate() {
            if by_upper.insert(entity.name.to_ascii_uppercase(), idx).is_some() {
                return Err(IfcGraphError::Schema(format!(
                    "entity {} declared twice",
                    entity.name
                )));
            }
        }

        let mut supertype_of = Vec::with_capacity(doc.entities.len());
        for entity in &doc.entities {
            let parent = match &entity.supertype {
                Some(name) => Some(*by_upper.get(&name.to_ascii_uppercase()).ok_or_else(|| {
                    IfcGraphError::Schema(format!(
                        "{}: unknown supertype {}",
                        entity.name, name
                    ))
                })?),
                None => None,
            };
            supertype_of.push(parent);
        }

        let defined_types = doc
            .defined_types
            .iter()
            .map(|t| (t.to_ascii_uppercase(), t.clone()))
            .collect();

        let mut schema = Schema {
            name: doc.name,
            entities: doc.entities,
            by_upper,
            supertype_of,
            defined_types,
            attributes: Vec::new(),
            inverses: Vec::new(),
        };
        schema.flatten()?;
        schema.validate_inverses()?;
        Ok(schema)
    }

    /// Compute supertype-first attribute and inverse lists for every entity.
    fn flatten(&mut self) -> Result<()> {
        let count = self.entities.len();
        let mut attributes: Vec<Option<Vec<AttributeDef>>> = vec![None; count];
        let mut inverses: Vec<Option<Vec<InverseDef>>> = vec![None; count];

        for idx in 0..count {
            // Chain from root to idx; a chain longer than the entity count is a cycle.
            let mut chain = vec![idx];
            let mut cursor = self.supertype_of[idx];
            while let Some(parent) = cursor {
                if chain.len() > count {
                    return Err(IfcGraphError::Schema(format!(
                        "supertype cycle involving {}",
                        self.entities[idx].name
                    )));
                }
                chain.push(parent);
                cursor = self.supertype_of[parent];
            }
            chain.reverse();

            let mut attrs: Vec<AttributeDef> = Vec::new();
            let mut invs: Vec<InverseDef> = Vec::new();
            for &level in &chain {
                let def = &self.entities[level];
                for derived in &def.derived {
                    let slot = attrs.iter_mut().find(|a| &a.name == derived).ok_or_else(|| {
                        IfcGraphError::Schema(format!(
                            "{}: derived attribute {} is not inherited",
                            def.name, derived
                        ))
                    })?;
                    slot.kind = FieldKind::Derived;
                }
                attrs.extend(def.attributes.iter().cloned());
                invs.extend(def.inverses.iter().cloned());
            }
            attributes[idx] = Some(attrs);
            inverses[idx] = Some(invs);
        }

        self.attributes = attributes.into_iter().map(Option::unwrap_or_default).collect();
        self.inverses = inverses.into_iter().map(Option::unwrap_or_default).collect();
        Ok(())
    }

    fn validate_inverses(&self) -> Result<()> {
        for entity in &self.entities {
            for inverse in &entity.inverses {
                let source = self.attributes(&inverse.entity).ok_or_else(|| {
                    IfcGraphError::Schema(format!(
                        "{}.{}: unknown source entity {}",
                        entity.name, inverse.name, inverse.entity
                    ))
                })?;
                let attr = source.iter().find(|a| a.name == inverse.attribute).ok_or_else(|| {
                    IfcGraphError::Schema(format!(
                        "{}.{}: {} has no attribute {}",
                        entity.name, inverse.name, inverse.entity, inverse.attribute
                    ))
                })?;
                if !matches!(
                    attr.kind,
                    FieldKind::EntityReference | FieldKind::AggregateOfEntityReferences
                ) {
                    return Err(IfcGraphError::Schema(format!(
                        "{}.{}: {}.{} is not an entity reference",
                        entity.name, inverse.name, inverse.entity, inverse.attribute
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn index_of(&self, type_name: &str) -> Option<usize> {
        self.by_upper.get(&type_name.to_ascii_uppercase()).copied()
    }

    pub fn entity(&self, type_name: &str) -> Option<&EntityDef> {
        self.index_of(type_name).map(|idx| &self.entities[idx])
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.index_of(type_name).is_some()
    }

    /// Entity type names in declaration order
    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.iter().map(|e| e.name.as_str())
    }

    /// Schema casing for an entity or defined type name (`IFCWALL` → `IfcWall`).
    pub fn canonical_name(&self, type_name: &str) -> Option<&str> {
        let upper = type_name.to_ascii_uppercase();
        if let Some(&idx) = self.by_upper.get(&upper) {
            return Some(&self.entities[idx].name);
        }
        self.defined_types.get(&upper).map(|s| s.as_str())
    }

    /// The type itself followed by its supertypes up to the root
    pub fn supertypes(&self, type_name: &str) -> Vec<&str> {
        let mut chain = Vec::new();
        let mut cursor = self.index_of(type_name);
        while let Some(idx) = cursor {
            chain.push(self.entities[idx].name.as_str());
            cursor = self.supertype_of[idx];
        }
        chain
    }

    /// Number of supertypes above this type (0 for roots)
    pub fn depth(&self, type_name: &str) -> Option<usize> {
        let chain = self.supertypes(type_name);
        if chain.is_empty() {
            None
        } else {
            Some(chain.len() - 1)
        }
    }

    pub fn is_subtype_of(&self, type_name: &str, ancestor: &str) -> bool {
        let Some(target) = self.index_of(ancestor) else {
            return false;
        };
        let mut cursor = self.index_of(type_name);
        while let Some(idx) = cursor {
            if idx == target {
                return true;
            }
            cursor = self.supertype_of[idx];
        }
        false
    }

    /// Full positional attribute list (supertype attributes first)
    pub fn attributes(&self, type_name: &str) -> Option<&[AttributeDef]> {
        self.index_of(type_name).map(|idx| self.attributes[idx].as_slice())
    }

    /// Inverse attributes visible on this type (supertype inverses first)
    pub fn inverses(&self, type_name: &str) -> Option<&[InverseDef]> {
        self.index_of(type_name).map(|idx| self.inverses[idx].as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ifc4_core_loads() {
        let schema = Schema::ifc4_core().unwrap();
        assert_eq!(schema.name(), "IFC4");
        assert!(schema.contains("IfcProject"));
        assert!(schema.contains("IFCOWNERHISTORY"));
    }

    #[test]
    fn test_flattened_attributes_supertype_first() {
        let schema = Schema::ifc4_core().unwrap();
        let names: Vec<&str> = schema
            .attributes("IfcWall")
            .unwrap()
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "GlobalId",
                "OwnerHistory",
                "Name",
                "Description",
                "ObjectType",
                "ObjectPlacement",
                "Representation",
                "Tag",
                "PredefinedType"
            ]
        );
    }

    #[test]
    fn test_derived_override() {
        let schema = Schema::ifc4_core().unwrap();
        let attrs = schema.attributes("IfcSIUnit").unwrap();
        assert_eq!(attrs[0].name, "Dimensions");
        assert_eq!(attrs[0].kind, FieldKind::Derived);
        // Parent keeps the explicit declaration
        let parent = schema.attributes("IfcNamedUnit").unwrap();
        assert_eq!(parent[0].kind, FieldKind::EntityReference);
    }

    #[test]
    fn test_subtype_and_supertypes() {
        let schema = Schema::ifc4_core().unwrap();
        assert!(schema.is_subtype_of("IFCWALLSTANDARDCASE", "IfcProduct"));
        assert!(schema.is_subtype_of("IfcWall", "IfcWall"));
        assert!(!schema.is_subtype_of("IfcWall", "IfcSlab"));
        assert!(!schema.is_subtype_of("IfcUnknown", "IfcRoot"));
        assert_eq!(
            schema.supertypes("IfcProject"),
            vec!["IfcProject", "IfcContext", "IfcObjectDefinition", "IfcRoot"]
        );
        assert_eq!(schema.depth("IfcRoot"), Some(0));
        assert_eq!(schema.depth("IfcNope"), None);
    }

    #[test]
    fn test_inverses_flattened() {
        let schema = Schema::ifc4_core().unwrap();
        let names: Vec<&str> = schema
            .inverses("IfcBuildingStorey")
            .unwrap()
            .iter()
            .map(|i| i.name.as_str())
            .collect();
        assert!(names.contains(&"IsDecomposedBy"));
        assert!(names.contains(&"ContainsElements"));
        assert!(names.contains(&"IsDefinedBy"));
        assert_eq!(names[0], "Nests");
    }

    #[test]
    fn test_canonical_name() {
        let schema = Schema::ifc4_core().unwrap();
        assert_eq!(schema.canonical_name("IFCWALL"), Some("IfcWall"));
        assert_eq!(schema.canonical_name("IFCLABEL"), Some("IfcLabel"));
        assert_eq!(schema.canonical_name("IFCFOO"), None);
    }

    #[test]
    fn test_unknown_supertype_rejected() {
        let doc = r#"{"name":"X","entities":[{"name":"A","supertype":"B"}]}"#;
        let err = Schema::from_json(doc).unwrap_err();
        assert!(err.to_string().contains("unknown supertype"));
    }

    #[test]
    fn test_supertype_cycle_rejected() {
        let doc = r#"{"name":"X","entities":[
            {"name":"A","supertype":"B"},
            {"name":"B","supertype":"A"}
        ]}"#;
        let err = Schema::from_json(doc).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_inverse_must_target_reference() {
        let doc = r#"{"name":"X","entities":[
            {"name":"A","inverses":[{"name":"Inv","entity":"B","attribute":"Label"}]},
            {"name":"B","attributes":[{"name":"Label","kind":"simple"}]}
        ]}"#;
        let err = Schema::from_json(doc).unwrap_err();
        assert!(err.to_string().contains("not an entity reference"));
    }

    #[test]
    fn test_derived_must_be_inherited() {
        let doc = r#"{"name":"X","entities":[
            {"name":"A","derived":["Missing"]}
        ]}"#;
        assert!(Schema::from_json(doc).is_err());
    }
}
