//! Mermaid flowchart generation.
//!
//! `graph` turns loaded workflows into node and edge sets, `render` writes
//! them out as flowchart source, and `dependency` draws the job-level
//! dependency view of a single workflow.

mod dependency;
mod graph;
mod ids;
mod render;

pub use dependency::{render_dependency_diagram, DependencyAnalysis};
pub use graph::{dispatch_graph, overview_graph, trigger_graph};
pub use ids::NodeClass;
pub use render::render_flowchart;
