//! Node identifiers for entities.
//!
//! Entities with a native id keep it. Entities without one get a surrogate
//! from an [`IdAllocator`], pinned to the entity's [`Origin`] so every
//! reference to the same inline value lands on the same node.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use super::NodeKey;
use crate::error::{IfcGraphError, Result};
use crate::model::{Entity, Origin};

/// Source of fresh surrogate identifiers.
pub trait IdAllocator: Send {
    fn allocate(&mut self) -> String;
}

/// Random UUID v4 surrogates
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidAllocator;

impl IdAllocator for UuidAllocator {
    fn allocate(&mut self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Deterministic `<prefix><n>` surrogates, starting at 1.
#[derive(Debug, Clone)]
pub struct SequentialAllocator {
    prefix: String,
    next: u64,
}

impl SequentialAllocator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }
}

impl Default for SequentialAllocator {
    fn default() -> Self {
        Self::new("s")
    }
}

impl IdAllocator for SequentialAllocator {
    fn allocate(&mut self) -> String {
        let id = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        id
    }
}

/// Saved resolver state, see [`IdentityResolver::checkpoint`].
#[derive(Debug, Clone)]
pub struct ResolverCheckpoint {
    pinned: HashMap<Origin, String>,
    issued: HashSet<String>,
}

/// Maps entities to node keys for the duration of one run.
pub struct IdentityResolver {
    allocator: Box<dyn IdAllocator>,
    pinned: HashMap<Origin, String>,
    issued: HashSet<String>,
}

impl IdentityResolver {
    pub fn new(allocator: Box<dyn IdAllocator>) -> Self {
        Self {
            allocator,
            pinned: HashMap::new(),
            issued: HashSet::new(),
        }
    }

    /// Node key for `entity`, allocating a surrogate on first sight.
    pub fn resolve(&mut self, entity: &Entity) -> Result<NodeKey> {
        if entity.has_native_id() {
            return Ok(NodeKey::Native(entity.id));
        }

        match entity.origin {
            Some(origin) => {
                if let Some(existing) = self.pinned.get(&origin) {
                    return Ok(NodeKey::Surrogate(existing.clone()));
                }
                let surrogate = self.fresh()?;
                self.pinned.insert(origin, surrogate.clone());
                Ok(NodeKey::Surrogate(surrogate))
            }
            None => {
                log::debug!("{} has neither id nor origin, surrogate not pinned", entity);
                Ok(NodeKey::Surrogate(self.fresh()?))
            }
        }
    }

    fn fresh(&mut self) -> Result<String> {
        let surrogate = self.allocator.allocate();
        if surrogate.is_empty() || surrogate.chars().any(char::is_whitespace) {
            return Err(IfcGraphError::Encoding(format!(
                "allocator produced unusable surrogate {:?}",
                surrogate
            )));
        }
        if surrogate.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IfcGraphError::Encoding(format!(
                "surrogate {} is indistinguishable from a native id",
                surrogate
            )));
        }
        if !self.issued.insert(surrogate.clone()) {
            return Err(IfcGraphError::Encoding(format!(
                "surrogate {} issued twice",
                surrogate
            )));
        }
        Ok(surrogate)
    }

    /// Number of surrogates handed out so far
    pub fn issued(&self) -> usize {
        self.issued.len()
    }

    pub fn checkpoint(&self) -> ResolverCheckpoint {
        ResolverCheckpoint {
            pinned: self.pinned.clone(),
            issued: self.issued.clone(),
        }
    }

    pub fn rollback(&mut self, checkpoint: ResolverCheckpoint) {
        self.pinned = checkpoint.pinned;
        self.issued = checkpoint.issued;
    }
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::new(Box::new(UuidAllocator))
    }
}
