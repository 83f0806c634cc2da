//! Incremental ingestion: skip models whose content hash matches the stored graph.

use std::collections::{HashMap, HashSet};

use crate::db::Db;
use crate::error::{IfcGraphError, Result};
use crate::ingest::{compute_file_hash, ModelFile};

/// Discovered models split by what the store already holds.
#[derive(Debug, Default)]
pub struct ModelClassification {
    /// No stored graph for this path
    pub new_models: Vec<ModelFile>,
    /// Stored graph built from different content
    pub modified_models: Vec<ModelFile>,
    pub unchanged_models: Vec<ModelFile>,
}

impl ModelClassification {
    /// New and modified models, in that order
    pub fn pending(self) -> Vec<ModelFile> {
        self.new_models.into_iter().chain(self.modified_models).collect()
    }
}

/// Map of stored `source_path` to `source_hash`.
pub async fn get_existing_hashes(db: &Db) -> Result<HashMap<String, String>> {
    db.with_connection(|conn| {
        let mut stmt = conn.prepare("SELECT source_path, source_hash FROM graphs")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut map = HashMap::new();
        for row in rows {
            let (path, hash) = row?;
            map.insert(path, hash);
        }
        Ok::<HashMap<String, String>, IfcGraphError>(map)
    })
    .await
}

/// Hash each model and compare with `existing_hashes`.
pub fn classify_models(
    files: &[ModelFile],
    existing_hashes: &HashMap<String, String>,
) -> Result<ModelClassification> {
    let mut classification = ModelClassification::default();

    for file in files {
        let current_hash = compute_file_hash(&file.absolute_path)?;
        match existing_hashes.get(&file.relative_path) {
            None => classification.new_models.push(file.clone()),
            Some(stored) if stored != &current_hash => classification.modified_models.push(file.clone()),
            Some(_) => classification.unchanged_models.push(file.clone()),
        }
    }

    Ok(classification)
}

/// Stored source paths that are no longer on disk.
pub async fn find_deleted_graphs(db: &Db, existing_files: &HashSet<String>) -> Result<Vec<String>> {
    let stored: Vec<String> = db
        .with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT source_path FROM graphs ORDER BY source_path")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut paths = Vec::new();
            for row in rows {
                paths.push(row?);
            }
            Ok::<Vec<String>, IfcGraphError>(paths)
        })
        .await?;

    Ok(stored
        .into_iter()
        .filter(|p| !existing_files.contains(p))
        .collect())
}

/// Delete graphs by source path; nodes and edges cascade.
///
/// Returns the number of graphs removed.
pub async fn delete_graphs(db: &Db, source_paths: &[String]) -> Result<usize> {
    if source_paths.is_empty() {
        return Ok(0);
    }

    let paths = source_paths.to_vec();
    db.with_connection(move |conn| {
        let tx = conn.transaction()?;
        let mut removed = 0;
        for path in &paths {
            removed += tx.execute("DELETE FROM graphs WHERE source_path = ?1", rusqlite::params![path])?;
        }
        tx.commit()?;
        Ok::<usize, IfcGraphError>(removed)
    })
    .await
}
