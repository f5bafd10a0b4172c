use std::fmt::Write;

use indexmap::IndexSet;

use super::graph::{FlowGraph, NodeShape};
use super::ids::{classify_node, escape_label, NodeClass};
use crate::workflows::PipelineSet;

/// Renders a flowchart as Mermaid source.
///
/// Nodes come first, then edges, then a `classDef` for each style in use and
/// one `class` line per styled node. Output depends only on the graph's
/// insertion order.
pub fn render_flowchart(graph: &FlowGraph, pipelines: &PipelineSet) -> String {
    let mut out = String::from("flowchart LR\n");

    for node in graph.nodes() {
        let label = escape_label(&node.label);
        let _ = match node.shape {
            NodeShape::Stadium => writeln!(out, "    {}([\"{label}\"])", node.id),
            NodeShape::Box => writeln!(out, "    {}[\"{label}\"]", node.id),
        };
    }
    out.push('\n');

    for edge in graph.edges() {
        let _ = writeln!(out, "    {} --> {}", edge.from, edge.to);
    }
    out.push('\n');

    let classes: Vec<(&str, NodeClass)> = graph
        .nodes()
        .map(|node| (node.id.as_str(), classify_node(&node.id, pipelines)))
        .collect();
    let used: IndexSet<NodeClass> = classes.iter().map(|(_, class)| *class).collect();

    for definition in NodeClass::STYLED
        .into_iter()
        .filter(|class| used.contains(class))
        .filter_map(NodeClass::definition)
    {
        let _ = writeln!(out, "    {definition}");
    }
    out.push('\n');

    for (id, class) in classes {
        if let Some(name) = class.class_name() {
            let _ = writeln!(out, "    class {id} {name}");
        }
    }

    out
}
