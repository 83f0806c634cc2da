//! Read access to stored graphs.

use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;

use super::Db;
use crate::error::{IfcGraphError, Result};
use crate::graph::{IfcGraph, NodeKey, NodeRecord};

/// One row of the `graphs` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphSummary {
    pub graph_id: String,
    pub source_path: String,
    pub source_hash: String,
    pub schema_name: String,
    pub include_hierarchy: bool,
    pub node_count: usize,
    pub edge_count: usize,
    pub built_at: String,
}

const SUMMARY_COLUMNS: &str = "graph_id, source_path, source_hash, schema_name, \
     include_hierarchy, node_count, edge_count, built_at";

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<GraphSummary> {
    Ok(GraphSummary {
        graph_id: row.get(0)?,
        source_path: row.get(1)?,
        source_hash: row.get(2)?,
        schema_name: row.get(3)?,
        include_hierarchy: row.get(4)?,
        node_count: row.get::<_, i64>(5)? as usize,
        edge_count: row.get::<_, i64>(6)? as usize,
        built_at: row.get(7)?,
    })
}

/// All stored graphs ordered by source path
pub async fn list_graphs(db: &Db) -> Result<Vec<GraphSummary>> {
    db.with_connection(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM graphs ORDER BY source_path",
            SUMMARY_COLUMNS
        ))?;
        let rows = stmt.query_map([], summary_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    })
    .await
}

/// Summary of the graph built from `source_path`, if any
pub async fn find_graph(db: &Db, source_path: &str) -> Result<Option<GraphSummary>> {
    let source_path = source_path.to_string();
    db.with_connection(move |conn| {
        let summary = conn
            .query_row(
                &format!("SELECT {} FROM graphs WHERE source_path = ?1", SUMMARY_COLUMNS),
                params![source_path],
                summary_from_row,
            )
            .optional()?;
        Ok(summary)
    })
    .await
}

/// Rebuild a stored graph with its original node and edge order.
pub async fn load_graph(db: &Db, graph_id: &str) -> Result<IfcGraph> {
    let graph_id = graph_id.to_string();
    db.with_connection(move |conn| {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM graphs WHERE graph_id = ?1)",
            params![graph_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(IfcGraphError::GraphNotFound(graph_id.clone()));
        }

        let mut graph = IfcGraph::new();

        let mut stmt = conn.prepare(
            "SELECT record_json FROM graph_nodes WHERE graph_id = ?1 ORDER BY position",
        )?;
        let rows = stmt.query_map(params![graph_id], |row| row.get::<_, String>(0))?;
        for row in rows {
            let record: NodeRecord = serde_json::from_str(&row?)?;
            graph.add_node(record);
        }

        let mut stmt = conn.prepare(
            "SELECT source_key, target_key, edge_type FROM graph_edges \
             WHERE graph_id = ?1 ORDER BY position",
        )?;
        let rows = stmt.query_map(params![graph_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        for row in rows {
            let (source, target, kind) = row?;
            let source: NodeKey = source.parse()?;
            let target: NodeKey = target.parse()?;
            graph.add_edge(&source, &target, &kind)?;
        }

        log::debug!(
            "Loaded graph {} ({} nodes, {} edges)",
            graph_id,
            graph.node_count(),
            graph.edge_count()
        );
        Ok(graph)
    })
    .await
}
