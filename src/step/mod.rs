//! ISO 10303-21 ("STEP physical file") reader.
//!
//! Reads the clear-text encoding used by IFC exports into a header and an
//! ordered list of raw instances. No schema knowledge lives here: parameters
//! stay untyped until the model layer maps them onto declared attributes.

mod lexer;
mod parser;

pub use parser::parse_step;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::error::{IfcGraphError, Result};

/// A single untyped parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    /// `$` (unset optional value)
    Null,
    /// `*` (value derived by the schema)
    Derived,
    Integer(i64),
    Real(f64),
    String(String),
    /// `.NAME.` without the dots
    Enum(String),
    /// `"..."` hex payload
    Binary(String),
    /// `#id`
    Ref(u64),
    List(Vec<Parameter>),
    /// Typed value such as `IFCLABEL('x')`
    Typed { name: String, params: Vec<Parameter> },
}

impl Parameter {
    /// Collect every instance reference in this parameter, recursing into lists
    /// and typed values.
    pub fn collect_refs(&self, out: &mut Vec<u64>) {
        match self {
            Parameter::Ref(id) => out.push(*id),
            Parameter::List(items) => items.iter().for_each(|p| p.collect_refs(out)),
            Parameter::Typed { params, .. } => params.iter().for_each(|p| p.collect_refs(out)),
            _ => {}
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parameter::Null => write!(f, "$"),
            Parameter::Derived => write!(f, "*"),
            Parameter::Integer(i) => write!(f, "{}", i),
            Parameter::Real(r) => write!(f, "{:?}", r),
            Parameter::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Parameter::Enum(e) => write!(f, ".{}.", e),
            Parameter::Binary(b) => write!(f, "\"{}\"", b),
            Parameter::Ref(id) => write!(f, "#{}", id),
            Parameter::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Parameter::Typed { name, params } => {
                write!(f, "{}", name)?;
                write!(f, "{}", Parameter::List(params.clone()))
            }
        }
    }
}

/// One `NAME(params)` record inside a complex instance.
#[derive(Debug, Clone, PartialEq)]
pub struct InstancePart {
    pub type_name: String,
    pub params: Vec<Parameter>,
}

/// A data-section instance (`#id=...;`).
#[derive(Debug, Clone, PartialEq)]
pub struct RawInstance {
    pub id: u64,
    /// One part for simple instances, several for complex (`#id=(A()B());`).
    pub parts: Vec<InstancePart>,
    /// Line the instance starts on, for diagnostics.
    pub line: usize,
}

impl RawInstance {
    pub fn is_complex(&self) -> bool {
        self.parts.len() > 1
    }

    /// Upper-case type name of a simple instance (first part of a complex one).
    pub fn type_name(&self) -> &str {
        self.parts.first().map(|p| p.type_name.as_str()).unwrap_or("")
    }
}

/// Header section entries (`FILE_DESCRIPTION`, `FILE_NAME`, `FILE_SCHEMA`, ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepHeader {
    pub entries: Vec<InstancePart>,
}

impl StepHeader {
    pub fn entry(&self, name: &str) -> Option<&InstancePart> {
        self.entries
            .iter()
            .find(|e| e.type_name.eq_ignore_ascii_case(name))
    }

    /// Schema identifiers declared by `FILE_SCHEMA`, e.g. `["IFC4"]`.
    pub fn schema_identifiers(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(entry) = self.entry("FILE_SCHEMA") {
            for param in &entry.params {
                collect_strings(param, &mut out);
            }
        }
        out
    }
}

fn collect_strings(param: &Parameter, out: &mut Vec<String>) {
    match param {
        Parameter::String(s) => out.push(s.clone()),
        Parameter::List(items) => items.iter().for_each(|p| collect_strings(p, out)),
        _ => {}
    }
}

/// A parsed STEP file. Instances keep file order.
#[derive(Debug, Clone, Default)]
pub struct StepFile {
    pub header: StepHeader,
    instances: Vec<RawInstance>,
    index: HashMap<u64, usize>,
}

impl StepFile {
    pub(crate) fn from_parts(header: StepHeader, instances: Vec<RawInstance>) -> Result<Self> {
        let mut index = HashMap::with_capacity(instances.len());
        for (pos, inst) in instances.iter().enumerate() {
            if index.insert(inst.id, pos).is_some() {
                return Err(IfcGraphError::Parse(format!(
                    "duplicate instance id #{} at line {}",
                    inst.id, inst.line
                )));
            }
        }
        Ok(Self {
            header,
            instances,
            index,
        })
    }

    /// Read and parse a STEP file from disk
    pub fn open(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        log::debug!("Read {} bytes from {}", content.len(), path.display());
        parse_step(&content)
    }

    pub fn instances(&self) -> &[RawInstance] {
        &self.instances
    }

    pub fn get(&self, id: u64) -> Option<&RawInstance> {
        self.index.get(&id).map(|&pos| &self.instances[pos])
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
