use rusqlite::params;
use chrono::Utc;
use crate::error::Result;
use crate::db::Db;
use crate::graph::IfcGraph;
use super::metadata::{graph_id, normalize_path};

/// Provenance of a stored graph
#[derive(Debug, Clone)]
pub struct GraphSource<'a> {
    pub source_path: &'a str,
    pub source_hash: &'a str,
    pub schema_name: &'a str,
    pub include_hierarchy: bool,
}

/// Insert or replace the graph built from `source.source_path`.
///
/// Returns the graph id (SHA256 hash of the source path). A previous graph
/// for the same path is removed first; its nodes and edges go with it via
/// foreign key CASCADE. Everything happens in one transaction.
pub async fn insert_graph(db: &Db, source: &GraphSource<'_>, graph: &IfcGraph) -> Result<String> {
    let source_path = normalize_path(source.source_path);
    let id = graph_id(&source_path);

    let mut nodes = Vec::with_capacity(graph.node_count());
    for node in graph.nodes() {
        nodes.push((node.id.to_string(), node.name.clone(), serde_json::to_string(node)?));
    }
    let edges: Vec<(String, String, String)> = graph
        .edges()
        .map(|(s, t, e)| (s.to_string(), t.to_string(), e.kind.clone()))
        .collect();

    let row = (
        id.clone(),
        source_path,
        source.source_hash.to_string(),
        source.schema_name.to_string(),
        source.include_hierarchy,
        Utc::now().to_rfc3339(),
    );

    db.with_connection(move |conn| {
        let (graph_id, source_path, source_hash, schema_name, include_hierarchy, built_at) = row;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM graphs WHERE source_path = ?1", params![source_path])?;
        tx.execute(
            r#"
            INSERT INTO graphs (
                graph_id, source_path, source_hash, schema_name,
                include_hierarchy, node_count, edge_count, built_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                graph_id,
                source_path,
                source_hash,
                schema_name,
                include_hierarchy,
                nodes.len() as i64,
                edges.len() as i64,
                built_at,
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO graph_nodes (graph_id, position, node_key, type_name, record_json) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (position, (key, type_name, json)) in nodes.iter().enumerate() {
                stmt.execute(params![graph_id, position as i64, key, type_name, json])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO graph_edges (graph_id, position, source_key, target_key, edge_type) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (position, (source, target, kind)) in edges.iter().enumerate() {
                stmt.execute(params![graph_id, position as i64, source, target, kind])?;
            }
        }

        tx.commit()?;
        log::debug!(
            "Stored graph {} for {} ({} nodes, {} edges)",
            graph_id,
            source_path,
            nodes.len(),
            edges.len()
        );
        Ok(())
    })
    .await?;

    Ok(id)
}
