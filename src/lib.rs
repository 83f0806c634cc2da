pub mod config;
pub mod error;
pub mod step;
pub mod schema;
pub mod model;
pub mod graph;
pub mod render;
pub mod db;
pub mod ingest;

pub use config::Config;
pub use error::{IfcGraphError, Result};
pub use graph::{build_graph, BuildOptions, GraphMaterializer, IfcGraph, NodeKey, NodeRecord};
pub use model::{IfcModel, ModelDecoder};
pub use schema::Schema;
