use thiserror::Error;

/// Main error type for IFC-Graph
#[derive(Error, Debug)]
pub enum IfcGraphError {
    /// Decoder metadata for a field is inconsistent or missing
    #[error("Malformed entity #{id}: field {index}: {reason}")]
    MalformedEntity {
        id: u64,
        index: usize,
        reason: String,
    },

    /// An inverse relationship points at an id the decoder cannot resolve
    #[error("Unresolvable reference: #{target} (role {role} on #{id})")]
    UnresolvableReference {
        id: u64,
        role: String,
        target: u64,
    },

    /// Surrogate identifier generation produced an unusable value
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// STEP or edge list syntax errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Schema document errors
    #[error("Schema error: {0}")]
    Schema(String),

    /// Stored graph not found
    #[error("Graph not found: {0}")]
    GraphNotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl IfcGraphError {
    /// Whether this error aborts a graph build
    pub fn is_build_fatal(&self) -> bool {
        matches!(
            self,
            IfcGraphError::MalformedEntity { .. }
                | IfcGraphError::UnresolvableReference { .. }
                | IfcGraphError::Encoding(_)
        )
    }
}

/// Convenient Result type using IfcGraphError
pub type Result<T> = std::result::Result<T, IfcGraphError>;
