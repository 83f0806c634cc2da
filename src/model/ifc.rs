//! [`ModelDecoder`] over a parsed STEP file and a [`Schema`].

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde_json::Value;

use super::{Entity, Field, FieldKind, FieldValue, ModelDecoder, Origin};
use crate::error::{IfcGraphError, Result};
use crate::schema::Schema;
use crate::step::{Parameter, StepFile, StepHeader};

/// Field name of the single attribute of an inline typed value.
const WRAPPED_VALUE: &str = "wrappedValue";

#[derive(Debug, Clone)]
struct ResolvedInstance {
    type_name: String,
    known: bool,
    params: Vec<Parameter>,
}

#[derive(Debug, Clone)]
struct ReverseLink {
    source: u64,
    attribute: String,
}

/// A building model decoded from STEP text.
#[derive(Debug, Clone)]
pub struct IfcModel {
    header: StepHeader,
    schema: Schema,
    strict: bool,
    ids: Vec<u64>,
    instances: HashMap<u64, ResolvedInstance>,
    reverse: HashMap<u64, Vec<ReverseLink>>,
    types_with_super: Vec<String>,
}

impl IfcModel {
    /// Read, parse and index a STEP file
    pub fn open(path: &Path, schema: Schema, strict: bool) -> Result<Self> {
        let step = StepFile::open(path)?;
        Ok(Self::new(step, schema, strict))
    }

    /// Index a parsed STEP file against `schema`.
    ///
    /// With `strict`, fields of entity types the schema does not declare fail
    /// with `MalformedEntity`; otherwise they are exposed as `arg<i>` with a
    /// kind inferred from the raw parameter.
    pub fn new(step: StepFile, schema: Schema, strict: bool) -> Self {
        let declared = step.header.schema_identifiers();
        if !declared.is_empty() && !declared.iter().any(|s| s.eq_ignore_ascii_case(schema.name())) {
            log::warn!(
                "File declares schema {:?}, decoding with {}",
                declared,
                schema.name()
            );
        }

        let mut ids = Vec::with_capacity(step.len());
        let mut instances = HashMap::with_capacity(step.len());
        let mut unknown_types: Vec<String> = Vec::new();

        for raw in step.instances() {
            let resolved = if raw.is_complex() {
                // Order parts root-first so concatenated parameters follow the
                // flattened attribute order of the most specific part.
                let mut parts: Vec<_> = raw.parts.iter().collect();
                parts.sort_by_key(|p| schema.depth(&p.type_name).unwrap_or(0));
                let leaf = parts.last().map(|p| p.type_name.as_str()).unwrap_or("");
                log::debug!("Complex instance #{} decoded as {}", raw.id, leaf);
                ResolvedInstance {
                    type_name: canonical(&schema, leaf),
                    known: schema.contains(leaf),
                    params: parts.iter().flat_map(|p| p.params.iter().cloned()).collect(),
                }
            } else {
                let type_name = raw.type_name();
                ResolvedInstance {
                    type_name: canonical(&schema, type_name),
                    known: schema.contains(type_name),
                    params: raw.parts.first().map(|p| p.params.clone()).unwrap_or_default(),
                }
            };
            if !resolved.known && !unknown_types.contains(&resolved.type_name) {
                unknown_types.push(resolved.type_name.clone());
            }
            ids.push(raw.id);
            instances.insert(raw.id, resolved);
        }

        if !unknown_types.is_empty() {
            log::warn!(
                "{} entity types not declared in schema {} ({})",
                unknown_types.len(),
                schema.name(),
                if strict { "strict: their fields will fail" } else { "lenient: fields inferred" }
            );
        }

        let reverse = build_reverse_index(&schema, &ids, &instances);
        let types_with_super = collect_types(&schema, &instances, &unknown_types);

        log::info!(
            "Indexed {} instances ({} types, {} referenced targets)",
            ids.len(),
            types_with_super.len(),
            reverse.len()
        );

        Self {
            header: step.header,
            schema,
            strict,
            ids,
            instances,
            reverse,
            types_with_super,
        }
    }

    pub fn header(&self) -> &StepHeader {
        &self.header
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn instance(&self, id: u64, index: usize) -> Result<&ResolvedInstance> {
        self.instances.get(&id).ok_or_else(|| IfcGraphError::MalformedEntity {
            id,
            index,
            reason: "no such instance".to_string(),
        })
    }

    fn inline_field(&self, entity: &Entity, index: usize) -> Result<Field> {
        let malformed = |reason: String| IfcGraphError::MalformedEntity {
            id: entity.id,
            index,
            reason,
        };
        let origin = entity
            .origin
            .ok_or_else(|| malformed("entity has neither an id nor an origin".to_string()))?;
        if index != 0 {
            return Err(malformed(format!("{} has a single value", entity.type_name)));
        }
        let owner = self.instance(origin.owner, origin.field)?;
        let param = owner
            .params
            .get(origin.field)
            .ok_or_else(|| malformed(format!("origin field {} out of range", origin.field)))?;
        let value = match origin.member {
            None => param,
            Some(member) => *flatten_members(param)
                .get(member)
                .ok_or_else(|| malformed(format!("origin member {} out of range", member)))?,
        };
        match value {
            Parameter::Typed { params, .. } => Ok(Field {
                name: WRAPPED_VALUE.to_string(),
                value: FieldValue::Simple(typed_to_json(params)),
            }),
            other => Err(malformed(format!("origin does not hold a typed value: {}", other))),
        }
    }

    fn reference(
        &self,
        owner: u64,
        index: usize,
        member: Option<usize>,
        param: &Parameter,
    ) -> Result<Option<Entity>> {
        match param {
            Parameter::Null => Ok(None),
            Parameter::Ref(target) => self
                .by_id(*target)
                .map(Some)
                .ok_or_else(|| IfcGraphError::MalformedEntity {
                    id: owner,
                    index,
                    reason: format!("dangling reference #{}", target),
                }),
            Parameter::Typed { name, .. } => Ok(Some(Entity::inline(
                canonical(&self.schema, name),
                Origin {
                    owner,
                    field: index,
                    member,
                },
            ))),
            other => Err(IfcGraphError::MalformedEntity {
                id: owner,
                index,
                reason: format!("expected entity reference, found {}", other),
            }),
        }
    }
}

impl ModelDecoder for IfcModel {
    fn entity_ids(&self) -> Vec<u64> {
        self.ids.clone()
    }

    fn by_id(&self, id: u64) -> Option<Entity> {
        self.instances
            .get(&id)
            .map(|inst| Entity::new(id, inst.type_name.clone()))
    }

    fn is_a(&self, entity: &Entity, type_name: &str) -> bool {
        entity.type_name.eq_ignore_ascii_case(type_name)
            || self.schema.is_subtype_of(&entity.type_name, type_name)
    }

    fn types_with_super(&self) -> &[String] {
        &self.types_with_super
    }

    fn field_count(&self, entity: &Entity) -> usize {
        if !entity.has_native_id() {
            return usize::from(entity.origin.is_some());
        }
        self.instances
            .get(&entity.id)
            .map(|inst| inst.params.len())
            .unwrap_or(0)
    }

    fn field(&self, entity: &Entity, index: usize) -> Result<Field> {
        if !entity.has_native_id() {
            return self.inline_field(entity, index);
        }

        let inst = self.instance(entity.id, index)?;
        let param = inst.params.get(index).ok_or_else(|| IfcGraphError::MalformedEntity {
            id: entity.id,
            index,
            reason: format!("{} has only {} parameters", inst.type_name, inst.params.len()),
        })?;

        let (name, kind) = if inst.known {
            let attrs = self.schema.attributes(&inst.type_name).unwrap_or(&[]);
            let attr = attrs.get(index).ok_or_else(|| IfcGraphError::MalformedEntity {
                id: entity.id,
                index,
                reason: format!("{} declares only {} attributes", inst.type_name, attrs.len()),
            })?;
            (attr.name.clone(), attr.kind)
        } else if self.strict {
            return Err(IfcGraphError::MalformedEntity {
                id: entity.id,
                index,
                reason: format!("type {} is not in schema {}", inst.type_name, self.schema.name()),
            });
        } else {
            (format!("arg{}", index), infer_kind(param))
        };

        if matches!(param, Parameter::Derived) {
            return Ok(Field {
                name,
                value: FieldValue::Derived,
            });
        }

        let value = match kind {
            FieldKind::Simple => FieldValue::Simple(to_json(param)),
            FieldKind::Derived => FieldValue::Derived,
            FieldKind::EntityReference => {
                FieldValue::EntityReference(self.reference(entity.id, index, None, param)?)
            }
            FieldKind::AggregateOfEntityReferences => match param {
                Parameter::Null => FieldValue::AggregateOfEntityReferences(Vec::new()),
                Parameter::List(_) => {
                    let members = flatten_members(param)
                        .into_iter()
                        .enumerate()
                        .map(|(member, p)| self.reference(entity.id, index, Some(member), p))
                        .collect::<Result<Vec<_>>>()?;
                    FieldValue::AggregateOfEntityReferences(members)
                }
                other => {
                    return Err(IfcGraphError::MalformedEntity {
                        id: entity.id,
                        index,
                        reason: format!("expected aggregate, found {}", other),
                    })
                }
            },
        };

        Ok(Field { name, value })
    }

    fn inverse_names(&self, entity: &Entity) -> Vec<String> {
        if !entity.has_native_id() {
            return Vec::new();
        }
        self.schema
            .inverses(&entity.type_name)
            .map(|invs| invs.iter().map(|i| i.name.clone()).collect())
            .unwrap_or_default()
    }

    fn inverse(&self, entity: &Entity, role: &str) -> Vec<u64> {
        let Some(def) = self
            .schema
            .inverses(&entity.type_name)
            .and_then(|invs| invs.iter().find(|i| i.name == role))
        else {
            return Vec::new();
        };
        let Some(links) = self.reverse.get(&entity.id) else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        links
            .iter()
            .filter(|link| link.attribute == def.attribute)
            .filter(|link| {
                self.instances
                    .get(&link.source)
                    .is_some_and(|src| self.schema.is_subtype_of(&src.type_name, &def.entity))
            })
            .filter(|link| seen.insert(link.source))
            .map(|link| link.source)
            .collect()
    }
}

fn canonical(schema: &Schema, type_name: &str) -> String {
    schema
        .canonical_name(type_name)
        .map(str::to_string)
        .unwrap_or_else(|| type_name.to_string())
}

/// Every forward reference in the model, keyed by target, in file order.
fn build_reverse_index(
    schema: &Schema,
    ids: &[u64],
    instances: &HashMap<u64, ResolvedInstance>,
) -> HashMap<u64, Vec<ReverseLink>> {
    let mut reverse: HashMap<u64, Vec<ReverseLink>> = HashMap::new();
    let mut targets = Vec::new();

    for id in ids {
        let Some(inst) = instances.get(id) else { continue };
        if !inst.known {
            continue;
        }
        let attrs = schema.attributes(&inst.type_name).unwrap_or(&[]);
        for (attr, param) in attrs.iter().zip(&inst.params) {
            if !matches!(
                attr.kind,
                FieldKind::EntityReference | FieldKind::AggregateOfEntityReferences
            ) {
                continue;
            }
            targets.clear();
            param.collect_refs(&mut targets);
            for target in &targets {
                reverse.entry(*target).or_default().push(ReverseLink {
                    source: *id,
                    attribute: attr.name.clone(),
                });
            }
        }
    }

    reverse
}

/// Instance types plus all their supertypes, in schema declaration order,
/// followed by undeclared types in order of first appearance.
fn collect_types(
    schema: &Schema,
    instances: &HashMap<u64, ResolvedInstance>,
    unknown_types: &[String],
) -> Vec<String> {
    let mut present: HashSet<&str> = HashSet::new();
    for inst in instances.values().filter(|i| i.known) {
        present.extend(schema.supertypes(&inst.type_name));
    }
    let mut types: Vec<String> = schema
        .entity_names()
        .filter(|name| present.contains(name))
        .map(str::to_string)
        .collect();
    types.extend(unknown_types.iter().cloned());
    types
}

/// Leaf members of an aggregate, nested lists flattened in order.
fn flatten_members(param: &Parameter) -> Vec<&Parameter> {
    fn walk<'a>(param: &'a Parameter, out: &mut Vec<&'a Parameter>) {
        match param {
            Parameter::List(items) => items.iter().for_each(|p| walk(p, out)),
            other => out.push(other),
        }
    }
    let mut out = Vec::new();
    if let Parameter::List(items) = param {
        items.iter().for_each(|p| walk(p, &mut out));
    }
    out
}

fn infer_kind(param: &Parameter) -> FieldKind {
    match param {
        Parameter::Derived => FieldKind::Derived,
        Parameter::Ref(_) => FieldKind::EntityReference,
        Parameter::List(_) => {
            let members = flatten_members(param);
            let all_refs = members
                .iter()
                .all(|p| matches!(p, Parameter::Ref(_) | Parameter::Null));
            if all_refs && members.iter().any(|p| matches!(p, Parameter::Ref(_))) {
                FieldKind::AggregateOfEntityReferences
            } else {
                FieldKind::Simple
            }
        }
        _ => FieldKind::Simple,
    }
}

fn typed_to_json(params: &[Parameter]) -> Value {
    match params {
        [single] => to_json(single),
        many => Value::Array(many.iter().map(to_json).collect()),
    }
}

/// Raw parameter as a node attribute value.
fn to_json(param: &Parameter) -> Value {
    match param {
        Parameter::Null | Parameter::Derived => Value::Null,
        Parameter::Integer(i) => Value::from(*i),
        Parameter::Real(r) => serde_json::Number::from_f64(*r)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Parameter::String(s) => Value::String(s.clone()),
        Parameter::Enum(e) => match e.as_str() {
            "T" => Value::Bool(true),
            "F" => Value::Bool(false),
            "U" => Value::String("UNKNOWN".to_string()),
            other => Value::String(other.to_string()),
        },
        Parameter::Binary(b) => Value::String(b.clone()),
        Parameter::Ref(id) => Value::String(format!("#{}", id)),
        Parameter::List(items) => Value::Array(items.iter().map(to_json).collect()),
        Parameter::Typed { params, .. } => typed_to_json(params),
    }
}
