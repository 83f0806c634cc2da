//! Node records for single entities.

use serde_json::Map;

use super::identity::IdentityResolver;
use super::NodeRecord;
use crate::error::Result;
use crate::model::{Entity, FieldValue, ModelDecoder};

/// Record keys that field names must not overwrite.
pub const RESERVED_KEYS: [&str; 3] = ["id", "name", "labels"];

/// Build the node record of `entity`.
///
/// Simple fields become attributes in declaration order; entity references,
/// aggregates of references and derived fields are left to edges. With
/// `include_hierarchy`, `labels` lists every type in the decoder's hierarchy
/// the entity satisfies; otherwise it holds the concrete type alone.
///
/// The result depends only on the entity and the decoder, apart from the
/// surrogate key of an entity without a native id, which `ids` pins on
/// first use.
pub fn describe<D: ModelDecoder + ?Sized>(
    entity: &Entity,
    decoder: &D,
    include_hierarchy: bool,
    ids: &mut IdentityResolver,
) -> Result<NodeRecord> {
    let id = ids.resolve(entity)?;

    let mut labels: Vec<String> = if include_hierarchy {
        decoder
            .types_with_super()
            .iter()
            .filter(|t| decoder.is_a(entity, t))
            .cloned()
            .collect()
    } else {
        Vec::new()
    };
    if labels.is_empty() {
        labels.push(entity.type_name.clone());
    }

    let mut attributes = Map::new();
    for index in 0..decoder.field_count(entity) {
        let field = decoder.field(entity, index)?;
        let FieldValue::Simple(value) = field.value else {
            continue;
        };
        if RESERVED_KEYS.contains(&field.name.as_str()) {
            log::warn!(
                "{}: field {} collides with a reserved key, skipped",
                entity,
                field.name
            );
            continue;
        }
        attributes.entry(field.name).or_insert(value);
    }

    Ok(NodeRecord {
        id,
        name: entity.type_name.clone(),
        labels,
        attributes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IfcGraphError;
    use crate::graph::identity::SequentialAllocator;
    use crate::graph::NodeKey;
    use crate::model::fixture::FixtureModel;
    use serde_json::json;

    fn wall_model() -> FixtureModel {
        FixtureModel::new()
            .subtype("IfcWall", "IfcBuildingElement")
            .subtype("IfcBuildingElement", "IfcElement")
            .subtype("IfcSlab", "IfcBuildingElement")
            .entity(5, "IfcOwnerHistory")
            .entity(7, "IfcLocalPlacement")
            .entity(12, "IfcWall")
            .simple(12, "GlobalId", json!("2O2Fr$t4X7Zf8NOew3FLOH"))
            .reference(12, "OwnerHistory", Some(5))
            .simple(12, "Name", json!("Wall-001"))
            .simple(12, "Description", json!(null))
            .reference(12, "ObjectPlacement", Some(7))
            .aggregate(12, "Items", vec![Some(7), None])
            .derived(12, "Dim")
            .inline(12, "Width", "IfcLengthMeasure", json!(0.3))
    }

    fn resolver() -> IdentityResolver {
        IdentityResolver::new(Box::new(SequentialAllocator::default()))
    }

    #[test]
    fn test_simple_fields_become_attributes() {
        let model = wall_model();
        let wall = model.by_id(12).unwrap();
        let record = describe(&wall, &model, false, &mut resolver()).unwrap();

        assert_eq!(record.id, NodeKey::Native(12));
        assert_eq!(record.name, "IfcWall");
        assert_eq!(record.labels, vec!["IfcWall"]);
        let keys: Vec<&str> = record.attributes.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["GlobalId", "Name", "Description"]);
        assert_eq!(record.attributes["Name"], json!("Wall-001"));
    }

    #[test]
    fn test_no_compound_leakage() {
        let model = wall_model();
        let wall = model.by_id(12).unwrap();
        let record = describe(&wall, &model, true, &mut resolver()).unwrap();
        for key in ["OwnerHistory", "ObjectPlacement", "Items", "Dim", "Width"] {
            assert!(!record.attributes.contains_key(key), "{} leaked", key);
        }
    }

    #[test]
    fn test_hierarchy_labels() {
        let model = wall_model();
        let wall = model.by_id(12).unwrap();
        let record = describe(&wall, &model, true, &mut resolver()).unwrap();
        assert_eq!(record.labels, vec!["IfcBuildingElement", "IfcElement", "IfcWall"]);
        assert!(!record.labels.contains(&"IfcSlab".to_string()));
    }

    #[test]
    fn test_describe_is_idempotent() {
        let model = wall_model();
        let wall = model.by_id(12).unwrap();
        let mut ids = resolver();
        let first = describe(&wall, &model, true, &mut ids).unwrap();
        let second = describe(&wall, &model, true, &mut ids).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_inline_entity_surrogate_is_pinned() {
        let model = wall_model();
        let wall = model.by_id(12).unwrap();
        let FieldValue::EntityReference(Some(width)) = model.field(&wall, 7).unwrap().value else {
            panic!("expected inline entity");
        };
        let mut ids = resolver();
        let first = describe(&width, &model, true, &mut ids).unwrap();
        let second = describe(&width, &model, true, &mut ids).unwrap();
        assert_eq!(first.id, NodeKey::Surrogate("s1".to_string()));
        assert_eq!(first, second);
        // Defined types are outside the entity hierarchy
        assert_eq!(first.labels, vec!["IfcLengthMeasure"]);
        assert_eq!(first.attributes["wrappedValue"], json!(0.3));
    }

    #[test]
    fn test_reserved_keys_not_overwritten() {
        let model = FixtureModel::new()
            .entity(1, "IfcCustom")
            .simple(1, "name", json!("shadow"))
            .simple(1, "id", json!(99))
            .simple(1, "Tag", json!("T"));
        let entity = model.by_id(1).unwrap();
        let record = describe(&entity, &model, false, &mut resolver()).unwrap();
        assert_eq!(record.name, "IfcCustom");
        assert_eq!(record.id, NodeKey::Native(1));
        assert_eq!(record.attributes.len(), 1);
    }

    #[test]
    fn test_malformed_field_propagates() {
        let model = FixtureModel::new()
            .entity(1, "IfcWall")
            .simple(1, "GlobalId", json!("x"))
            .broken(1, "Name");
        let entity = model.by_id(1).unwrap();
        let err = describe(&entity, &model, false, &mut resolver()).unwrap_err();
        assert!(matches!(err, IfcGraphError::MalformedEntity { id: 1, index: 1, .. }));
    }
}
