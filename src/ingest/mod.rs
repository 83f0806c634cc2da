//! Batch ingestion of IFC models into the SQLite store.

pub mod walker;
pub mod metadata;
pub mod db_writer;
pub mod incremental;

pub use walker::{ModelFile, discover_models};
pub use incremental::{
    ModelClassification, classify_models, delete_graphs, find_deleted_graphs, get_existing_hashes,
};
pub use metadata::{compute_file_hash, graph_id, normalize_path};
pub use db_writer::{insert_graph, GraphSource};

use tokio::task;

use crate::db::Db;
use crate::error::{IfcGraphError, Result};
use crate::graph::{build_graph, BuildOptions};
use crate::model::IfcModel;
use crate::schema::Schema;

/// What one ingested model produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub graph_id: String,
    pub node_count: usize,
    pub edge_count: usize,
}

/// Parse one model, build its graph and store it.
///
/// Parsing and traversal run on the blocking pool; the store only ever sees a
/// finished graph.
pub async fn ingest_model(
    db: &Db,
    file: &ModelFile,
    schema: &Schema,
    strict: bool,
    options: &BuildOptions,
) -> Result<IngestOutcome> {
    let source_hash = compute_file_hash(&file.absolute_path)?;

    let path = file.absolute_path.clone();
    let model_schema = schema.clone();
    let build_options = options.clone();
    let graph = task::spawn_blocking(move || {
        let model = IfcModel::open(&path, model_schema, strict)?;
        build_graph(&model, build_options)
    })
    .await
    .map_err(|e| IfcGraphError::Io(std::io::Error::other(format!("build task failed: {}", e))))??;

    let source = GraphSource {
        source_path: &file.relative_path,
        source_hash: &source_hash,
        schema_name: schema.name(),
        include_hierarchy: options.include_hierarchy,
    };
    let graph_id = insert_graph(db, &source, &graph).await?;

    Ok(IngestOutcome {
        graph_id,
        node_count: graph.node_count(),
        edge_count: graph.edge_count(),
    })
}
