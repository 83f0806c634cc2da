//! Line-oriented text form of an [`IfcGraph`].
//!
//! ```text
//! # ifcgraph edgelist v1
//! node 12 {"id":12,"name":"IfcWall","labels":["IfcWall"],"GlobalId":"..."}
//! edge 12 7 {"type":"ObjectPlacement"}
//! ```
//!
//! Node lines come first, then edges, both in graph insertion order. Files
//! holding only `edge` lines load with bare nodes.

use std::fs;
use std::io::Write;
use std::path::Path;

use super::{EdgeRecord, IfcGraph, NodeKey, NodeRecord};
use crate::error::{IfcGraphError, Result};

pub const HEADER: &str = "# ifcgraph edgelist v1";

/// Serialize `graph` to `writer`.
pub fn write<W: Write>(graph: &IfcGraph, mut writer: W) -> Result<()> {
    writeln!(writer, "{}", HEADER)?;
    for node in graph.nodes() {
        writeln!(writer, "node {} {}", node.id, serde_json::to_string(node)?)?;
    }
    for (source, target, edge) in graph.edges() {
        writeln!(writer, "edge {} {} {}", source, target, serde_json::to_string(edge)?)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn to_string(graph: &IfcGraph) -> Result<String> {
    let mut buf = Vec::new();
    write(graph, &mut buf)?;
    String::from_utf8(buf).map_err(|e| IfcGraphError::Parse(e.to_string()))
}

pub fn save(graph: &IfcGraph, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path)?;
    write(graph, std::io::BufWriter::new(file))?;
    log::info!(
        "Saved edge list ({} nodes, {} edges) to {}",
        graph.node_count(),
        graph.edge_count(),
        path.display()
    );
    Ok(())
}

pub fn load(path: &Path) -> Result<IfcGraph> {
    let text = fs::read_to_string(path)?;
    let graph = parse(&text)?;
    log::info!(
        "Loaded edge list ({} nodes, {} edges) from {}",
        graph.node_count(),
        graph.edge_count(),
        path.display()
    );
    Ok(graph)
}

/// Rebuild a graph from its text form.
pub fn parse(text: &str) -> Result<IfcGraph> {
    let mut graph = IfcGraph::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let err = |msg: String| IfcGraphError::Parse(format!("line {}: {}", line_no, msg));

        let (tag, rest) = line.split_once(' ').unwrap_or((line, ""));
        match tag {
            "node" => {
                let (id, json) = rest
                    .split_once(' ')
                    .ok_or_else(|| err("node line needs an id and a record".to_string()))?;
                let key: NodeKey = id.parse().map_err(|e: IfcGraphError| err(e.to_string()))?;
                let record: NodeRecord =
                    serde_json::from_str(json).map_err(|e| err(format!("bad node record: {}", e)))?;
                if record.id != key {
                    return Err(err(format!("record id {} does not match {}", record.id, key)));
                }
                if !graph.add_node(record) {
                    log::warn!("line {}: node {} repeated, keeping the first", line_no, key);
                }
            }
            "edge" => {
                let mut parts = rest.splitn(3, ' ');
                let (Some(source), Some(target), Some(json)) = (parts.next(), parts.next(), parts.next())
                else {
                    return Err(err("edge line needs source, target and a record".to_string()));
                };
                let source: NodeKey = source.parse().map_err(|e: IfcGraphError| err(e.to_string()))?;
                let target: NodeKey = target.parse().map_err(|e: IfcGraphError| err(e.to_string()))?;
                let edge: EdgeRecord =
                    serde_json::from_str(json).map_err(|e| err(format!("bad edge record: {}", e)))?;
                for key in [&source, &target] {
                    if !graph.contains_node(key) {
                        graph.add_node(NodeRecord::bare(key.clone()));
                    }
                }
                graph.add_edge(&source, &target, &edge.kind)?;
            }
            other => return Err(err(format!("unknown line kind {:?}", other))),
        }
    }

    Ok(graph)
}
