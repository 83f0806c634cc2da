//! Whole-model traversal into an [`IfcGraph`].

use serde::Serialize;

use super::describe::describe;
use super::identity::{IdAllocator, IdentityResolver, UuidAllocator};
use super::policy::ExclusionPolicy;
use super::{IfcGraph, NodeKey};
use crate::error::{IfcGraphError, Result};
use crate::model::{Entity, FieldValue, ModelDecoder};

/// Knobs for one build.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
    /// Label nodes with their full supertype set
    pub include_hierarchy: bool,
    pub policy: ExclusionPolicy,
    /// Log an info line every N entities (0 disables)
    pub progress_every: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            include_hierarchy: false,
            policy: ExclusionPolicy::default(),
            progress_every: 1000,
        }
    }
}

/// Counters from the last successful build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    pub entities: usize,
    pub nodes_added: usize,
    pub edges_added: usize,
    pub forward_edges: usize,
    pub inverse_edges: usize,
    pub suppressed: usize,
}

/// Drives the traversal: one node per entity, forward edges for references
/// and aggregates, inverse edges for back-references.
pub struct GraphMaterializer {
    options: BuildOptions,
    ids: IdentityResolver,
    stats: BuildStats,
}

impl GraphMaterializer {
    pub fn new(options: BuildOptions) -> Self {
        Self::with_allocator(options, Box::new(UuidAllocator))
    }

    pub fn with_allocator(options: BuildOptions, allocator: Box<dyn IdAllocator>) -> Self {
        Self {
            options,
            ids: IdentityResolver::new(allocator),
            stats: BuildStats::default(),
        }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn stats(&self) -> BuildStats {
        self.stats
    }

    /// Add every entity of `decoder` to `graph`.
    ///
    /// A member listed more than once in an aggregate yields a single edge.
    ///
    /// On error `graph` is put back exactly as it was passed in.
    pub fn build<'g, D: ModelDecoder + ?Sized>(
        &mut self,
        graph: &'g mut IfcGraph,
        decoder: &D,
    ) -> Result<&'g mut IfcGraph> {
        let snapshot = graph.clone();
        let checkpoint = self.ids.checkpoint();

        match self.traverse(graph, decoder) {
            Ok(stats) => {
                log::info!(
                    "Built graph: {} entities, {} nodes added, {} edges added ({} forward, {} inverse), {} references suppressed",
                    stats.entities,
                    stats.nodes_added,
                    stats.edges_added,
                    stats.forward_edges,
                    stats.inverse_edges,
                    stats.suppressed
                );
                self.stats = stats;
                Ok(graph)
            }
            Err(e) => {
                log::error!("Graph build aborted: {}", e);
                *graph = snapshot;
                self.ids.rollback(checkpoint);
                Err(e)
            }
        }
    }

    fn traverse<D: ModelDecoder + ?Sized>(
        &mut self,
        graph: &mut IfcGraph,
        decoder: &D,
    ) -> Result<BuildStats> {
        let mut stats = BuildStats::default();
        let ids = decoder.entity_ids();
        let total = ids.len();

        for (pos, id) in ids.into_iter().enumerate() {
            let entity = decoder.by_id(id).ok_or_else(|| IfcGraphError::MalformedEntity {
                id,
                index: 0,
                reason: "enumerated id cannot be looked up".to_string(),
            })?;
            log::debug!("[{}/{}] {}", pos + 1, total, entity);

            let source = self.insert(graph, decoder, &entity, &mut stats)?;

            for index in 0..decoder.field_count(&entity) {
                let field = decoder.field(&entity, index)?;
                match field.value {
                    FieldValue::EntityReference(Some(target)) => {
                        if self.options.policy.skips(&entity.type_name, &target.type_name) {
                            stats.suppressed += 1;
                            continue;
                        }
                        let key = self.insert(graph, decoder, &target, &mut stats)?;
                        if graph.add_edge(&source, &key, &field.name)? {
                            stats.edges_added += 1;
                            stats.forward_edges += 1;
                        }
                    }
                    FieldValue::AggregateOfEntityReferences(members) => {
                        for member in members.into_iter().flatten() {
                            let key = self.insert(graph, decoder, &member, &mut stats)?;
                            if graph.add_edge(&source, &key, &field.name)? {
                                stats.edges_added += 1;
                                stats.forward_edges += 1;
                            }
                        }
                    }
                    FieldValue::EntityReference(None)
                    | FieldValue::Simple(_)
                    | FieldValue::Derived => {}
                }
            }

            for role in decoder.inverse_names(&entity) {
                for related_id in decoder.inverse(&entity, &role) {
                    let related = decoder.by_id(related_id).ok_or_else(|| {
                        IfcGraphError::UnresolvableReference {
                            id: entity.id,
                            role: role.clone(),
                            target: related_id,
                        }
                    })?;
                    let key = self.insert(graph, decoder, &related, &mut stats)?;
                    if graph.add_edge(&source, &key, &role)? {
                        stats.edges_added += 1;
                        stats.inverse_edges += 1;
                    }
                }
            }

            stats.entities += 1;
            if self.options.progress_every > 0 && stats.entities % self.options.progress_every == 0 {
                log::info!(
                    "Progress: {}/{} entities, {} nodes, {} edges",
                    stats.entities,
                    total,
                    graph.node_count(),
                    graph.edge_count()
                );
            }
        }

        Ok(stats)
    }

    /// Describe and insert-if-absent; returns the node key either way.
    fn insert<D: ModelDecoder + ?Sized>(
        &mut self,
        graph: &mut IfcGraph,
        decoder: &D,
        entity: &Entity,
        stats: &mut BuildStats,
    ) -> Result<NodeKey> {
        let record = describe(entity, decoder, self.options.include_hierarchy, &mut self.ids)?;
        let key = record.id.clone();
        match graph.node(&key) {
            None => {
                graph.add_node(record);
                stats.nodes_added += 1;
            }
            Some(existing) if *existing != record => {
                log::warn!(
                    "Node {} already present with different attributes, keeping the first",
                    key
                );
            }
            Some(_) => {}
        }
        Ok(key)
    }
}

impl Default for GraphMaterializer {
    fn default() -> Self {
        Self::new(BuildOptions::default())
    }
}

/// Build a fresh graph from `decoder`.
pub fn build_graph<D: ModelDecoder + ?Sized>(decoder: &D, options: BuildOptions) -> Result<IfcGraph> {
    let mut graph = IfcGraph::new();
    GraphMaterializer::new(options).build(&mut graph, decoder)?;
    Ok(graph)
}
