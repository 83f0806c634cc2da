//! Interactive HTML view of a graph (vis-network).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::Result;
use crate::graph::IfcGraph;

const VIS_NETWORK_JS: &str = "https://unpkg.com/vis-network@9.1.9/standalone/umd/vis-network.min.js";

/// Page layout and colours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub height: String,
    pub width: String,
    pub bgcolor: String,
    pub font_color: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            height: "1000px".to_string(),
            width: "100%".to_string(),
            bgcolor: "#222222".to_string(),
            font_color: "white".to_string(),
        }
    }
}

/// JSON safe to place inside a `<script>` element.
fn script_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

/// Attribute values are interpolated into CSS; strip anything that could
/// close the declaration.
fn css_value(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, ';' | '{' | '}' | '<' | '>' | '"' | '\''))
        .collect()
}

fn node_items(graph: &IfcGraph) -> Result<Vec<Value>> {
    let mut items = Vec::with_capacity(graph.node_count());
    for node in graph.nodes() {
        let label = if node.name.is_empty() {
            node.id.to_string()
        } else {
            node.name.clone()
        };
        items.push(json!({
            "id": node.id.to_string(),
            "label": label,
            "title": serde_json::to_string_pretty(node)?,
        }));
    }
    log::debug!("Rendered {} nodes", items.len());
    Ok(items)
}

fn edge_items(graph: &IfcGraph) -> Result<Vec<Value>> {
    let mut items = Vec::with_capacity(graph.edge_count());
    for (source, target, edge) in graph.edges() {
        items.push(json!({
            "from": source.to_string(),
            "to": target.to_string(),
            "label": edge.kind,
            "title": serde_json::to_string(edge)?,
            "arrows": "to",
        }));
    }
    log::debug!("Rendered {} edges", items.len());
    Ok(items)
}

/// Self-contained HTML page showing `graph`.
pub fn render_html(graph: &IfcGraph, options: &RenderOptions) -> Result<String> {
    let nodes = script_json(&Value::Array(node_items(graph)?))?;
    let edges = script_json(&Value::Array(edge_items(graph)?))?;
    let font_color = script_json(&Value::String(options.font_color.clone()))?;

    Ok(format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>ifcgraph</title>
<script src="{script}"></script>
<style>
  body {{ margin: 0; background-color: {bgcolor}; }}
  #graph {{ width: {width}; height: {height}; background-color: {bgcolor}; }}
</style>
</head>
<body>
<div id="graph"></div>
<script>
  const nodes = new vis.DataSet({nodes});
  const edges = new vis.DataSet({edges});
  const options = {{
    nodes: {{ shape: "dot", size: 10, font: {{ color: {font_color} }} }},
    edges: {{ font: {{ color: {font_color}, strokeWidth: 0 }}, smooth: false }},
    physics: {{ stabilization: {{ iterations: 200 }} }}
  }};
  new vis.Network(document.getElementById("graph"), {{ nodes, edges }}, options);
</script>
</body>
</html>
"#,
        script = VIS_NETWORK_JS,
        bgcolor = css_value(&options.bgcolor),
        width = css_value(&options.width),
        height = css_value(&options.height),
        nodes = nodes,
        edges = edges,
        font_color = font_color,
    ))
}

/// Render `graph` and write the page to `path`.
pub fn write_html(graph: &IfcGraph, path: &Path, options: &RenderOptions) -> Result<()> {
    let html = render_html(graph, options)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, html)?;
    log::info!(
        "Wrote visualization of {} nodes and {} edges to {}",
        graph.node_count(),
        graph.edge_count(),
        path.display()
    );
    Ok(())
}
