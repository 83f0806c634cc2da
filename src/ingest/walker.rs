use walkdir::WalkDir;
use std::path::{Path, PathBuf};
use crate::error::{IfcGraphError, Result};

use super::metadata::normalize_path;

/// A model file found under the models root
#[derive(Debug, Clone)]
pub struct ModelFile {
    /// Path relative to the root, `/`-separated
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub file_size: u64,
    pub modified: std::time::SystemTime,
}

/// Recursively find `.ifc` files (case-insensitive extension) under `root`.
///
/// Results are sorted by relative path so batch runs are reproducible.
pub fn discover_models(root: &Path) -> Result<Vec<ModelFile>> {
    if !root.is_dir() {
        return Err(IfcGraphError::InvalidInput(format!(
            "models root is not a directory: {}",
            root.display()
        )));
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let is_ifc = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("ifc"));
        if !is_ifc {
            continue;
        }

        let metadata = std::fs::metadata(path)?;
        let relative = path.strip_prefix(root).map_err(|_| {
            IfcGraphError::InvalidInput(format!(
                "Failed to compute relative path for: {}",
                path.display()
            ))
        })?;

        files.push(ModelFile {
            relative_path: normalize_path(&relative.to_string_lossy()),
            absolute_path: path.to_path_buf(),
            file_size: metadata.len(),
            modified: metadata.modified()?,
        });
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    log::info!("Discovered {} model files in {}", files.len(), root.display());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use std::fs;

    #[test]
    fn test_discover_models() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("site-a/building-1")).unwrap();
        fs::write(root.join("house.ifc"), "ISO-10303-21;").unwrap();
        fs::write(root.join("site-a/building-1/arch.IFC"), "ISO-10303-21;").unwrap();
        fs::write(root.join("site-a/notes.txt"), "not a model").unwrap();
        fs::write(root.join("site-a/model.ifczip"), b"PK\x03\x04").unwrap();

        let files = discover_models(root).unwrap();

        let paths: Vec<&str> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["house.ifc", "site-a/building-1/arch.IFC"]);
        assert_eq!(files[0].file_size, 13);
    }

    #[test]
    fn test_discover_models_empty() {
        let temp_dir = TempDir::new().unwrap();
        assert!(discover_models(temp_dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_discover_models_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        assert!(discover_models(&temp_dir.path().join("nope")).is_err());
    }
}
