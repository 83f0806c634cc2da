use sha2::{Sha256, Digest};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use crate::error::Result;

/// SHA-256 of the file contents, lowercase hex
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    std::io::copy(&mut reader, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Stable graph id for a source path: SHA-256 of the normalized path.
pub fn graph_id(relative_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_path(relative_path).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Forward slashes, no leading `./`
pub fn normalize_path(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    normalized
        .strip_prefix("./")
        .map(str::to_string)
        .unwrap_or(normalized)
}
