use std::collections::HashSet;

use indexmap::{IndexMap, IndexSet};
use log::debug;

use super::ids::{job_node_id, pipeline_node_id, trigger_node_id};
use crate::workflows::{Pipeline, PipelineSet, TriggerKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeShape {
    /// `(["label"])`
    Stadium,
    /// `["label"]`
    Box,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: String,
    pub label: String,
    pub shape: NodeShape,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

/// Nodes and edges of one flowchart, in insertion order.
///
/// Adding a node id twice keeps the first label; adding an edge twice is a no-op.
#[derive(Debug, Clone, Default)]
pub struct FlowGraph {
    nodes: IndexMap<String, Node>,
    edges: IndexSet<Edge>,
}

impl FlowGraph {
    pub fn add_node(&mut self, id: &str, label: &str, shape: NodeShape) {
        self.nodes.entry(id.to_string()).or_insert_with(|| Node {
            id: id.to_string(),
            label: label.to_string(),
            shape,
        });
    }

    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.edges.insert(Edge {
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    #[cfg(test)]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    #[cfg(test)]
    pub fn incoming(&self, id: &str) -> usize {
        self.edges.iter().filter(|edge| edge.to == id).count()
    }

    fn add_trigger(&mut self, trigger: TriggerKind) -> String {
        let id = trigger_node_id(trigger);
        self.add_node(&id, trigger.as_str(), NodeShape::Stadium);
        id
    }

    fn add_pipeline(&mut self, pipeline: &Pipeline, label: &str) -> String {
        let id = pipeline_node_id(&pipeline.identity);
        self.add_node(&id, label, NodeShape::Box);
        id
    }
}

/// Per-diagram traversal state, moved into and returned from each expansion.
#[derive(Default)]
struct Expansion {
    graph: FlowGraph,
    /// Workflow node ids whose jobs have been added
    processed: HashSet<String>,
    /// Called workflow node ids already drawn
    called: HashSet<String>,
}

/// Adds the jobs of `pipeline` and, recursively, the workflows they call.
///
/// A workflow is expanded at most once per diagram. A called workflow gets a
/// single node no matter how many jobs call it; every calling job still gets
/// its own edge to that node. Calls that do not resolve to a loaded workflow
/// are left out.
fn expand(mut state: Expansion, pipeline: &Pipeline, pipelines: &PipelineSet) -> Expansion {
    let pipeline_id = pipeline_node_id(&pipeline.identity);
    if !state.processed.insert(pipeline_id.clone()) {
        return state;
    }

    for job in pipeline.jobs.values() {
        let job_id = job_node_id(&pipeline_id, &job.id);
        state
            .graph
            .add_node(&job_id, &job.display_name, NodeShape::Box);
        state.graph.add_edge(&pipeline_id, &job_id);

        let Some(uses) = job.calls_pipeline.as_deref() else {
            continue;
        };
        let Some(called) = pipelines.resolve_call(uses) else {
            debug!("{}: call target {uses} is not a loaded workflow", pipeline.identity);
            continue;
        };

        let called_id = pipeline_node_id(&called.identity);
        if state.called.insert(called_id.clone()) {
            state.graph.add_pipeline(called, called.call_label());
            state = expand(state, called, pipelines);
        }
        state.graph.add_edge(&job_id, &called_id);
    }

    state
}

/// Diagram of every main workflow started by `trigger`.
///
/// Returns `None` when no main workflow uses the trigger.
pub fn trigger_graph(trigger: TriggerKind, pipelines: &PipelineSet) -> Option<FlowGraph> {
    let triggered = pipelines.pipelines_for_trigger(trigger);
    if triggered.is_empty() {
        return None;
    }

    let mut state = Expansion::default();
    let trigger_id = state.graph.add_trigger(trigger);

    for pipeline in triggered {
        let pipeline_id = state.graph.add_pipeline(pipeline, &pipeline.display_name);
        state.graph.add_edge(&trigger_id, &pipeline_id);
        state = expand(state, pipeline, pipelines);
    }

    Some(state.graph)
}

/// Diagram of a single manually dispatched workflow.
pub fn dispatch_graph(pipeline: &Pipeline, pipelines: &PipelineSet) -> FlowGraph {
    let mut state = Expansion::default();
    let trigger_id = state.graph.add_trigger(TriggerKind::ManualDispatch);
    let pipeline_id = state.graph.add_pipeline(pipeline, &pipeline.display_name);
    state.graph.add_edge(&trigger_id, &pipeline_id);

    expand(state, pipeline, pipelines).graph
}

/// Every trigger connected to the main workflows it starts, without jobs.
///
/// Main workflows without a recognized trigger still get a node.
pub fn overview_graph(pipelines: &PipelineSet) -> FlowGraph {
    let mut groups: IndexMap<TriggerKind, Vec<&Pipeline>> = IndexMap::new();
    for pipeline in pipelines.main_pipelines() {
        for trigger in &pipeline.triggers {
            groups.entry(*trigger).or_default().push(pipeline);
        }
    }

    let mut graph = FlowGraph::default();
    for (trigger, triggered) in groups {
        let trigger_id = graph.add_trigger(trigger);
        for pipeline in triggered {
            let pipeline_id = graph.add_pipeline(pipeline, &pipeline.display_name);
            graph.add_edge(&trigger_id, &pipeline_id);
        }
    }

    for pipeline in pipelines.main_pipelines() {
        graph.add_pipeline(pipeline, &pipeline.display_name);
    }

    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::parse_pipeline;
    use std::path::Path;

    fn set(files: &[(&str, &str)]) -> PipelineSet {
        let mut set = PipelineSet::default();
        for (name, yaml) in files {
            set.insert(parse_pipeline(Path::new(name), yaml).unwrap());
        }
        set
    }

    fn node_ids(graph: &FlowGraph) -> Vec<&str> {
        graph.nodes().map(|n| n.id.as_str()).collect()
    }

    fn edge_pairs(graph: &FlowGraph) -> Vec<(&str, &str)> {
        graph
            .edges()
            .map(|e| (e.from.as_str(), e.to.as_str()))
            .collect()
    }

    const REUSABLE: &str = r"
on:
  workflow_call:
    inputs:
      env:
        type: string
jobs:
  compile:
    runs-on: ubuntu-latest
";

    #[test]
    fn test_single_workflow_with_one_job() {
        let pipelines = set(&[(
            "build.yml",
            "on: push\njobs:\n  test:\n    runs-on: ubuntu-latest\n",
        )]);

        let overview = overview_graph(&pipelines);
        assert_eq!(node_ids(&overview), vec!["trigger_push", "build_yml"]);
        assert_eq!(edge_pairs(&overview), vec![("trigger_push", "build_yml")]);

        let push = trigger_graph(TriggerKind::Push, &pipelines).unwrap();
        assert_eq!(
            node_ids(&push),
            vec!["trigger_push", "build_yml", "build_yml_test"]
        );
        assert_eq!(
            edge_pairs(&push),
            vec![
                ("trigger_push", "build_yml"),
                ("build_yml", "build_yml_test")
            ]
        );
    }

    #[test]
    fn test_reusable_workflow_called_twice_is_drawn_once() {
        let pipelines = set(&[
            (
                "ci.yml",
                r"
on: push
jobs:
  build-api:
    uses: ./.github/workflows/reusable-build.yml
  build-web:
    uses: ./.github/workflows/reusable-build.yml
",
            ),
            ("reusable-build.yml", REUSABLE),
        ]);

        let graph = trigger_graph(TriggerKind::Push, &pipelines).unwrap();
        let reusable_nodes = graph
            .nodes()
            .filter(|n| n.id == "reusable_build_yml")
            .count();
        assert_eq!(reusable_nodes, 1);
        assert_eq!(graph.incoming("reusable_build_yml"), 2);
        assert_eq!(
            graph.node("reusable_build_yml").unwrap().label,
            "reusable-build.yml"
        );
        // jobs of the called workflow are added once
        assert_eq!(graph.incoming("reusable_build_yml_compile"), 1);
    }

    #[test]
    fn test_unresolvable_call_is_skipped() {
        let pipelines = set(&[(
            "ci.yml",
            r"
on: push
jobs:
  remote:
    uses: other-org/shared/.github/workflows/missing.yml@main
  action:
    uses: actions/checkout@v4
",
        )]);

        let graph = trigger_graph(TriggerKind::Push, &pipelines).unwrap();
        assert_eq!(
            node_ids(&graph),
            vec!["trigger_push", "ci_yml", "ci_yml_remote", "ci_yml_action"]
        );
        assert_eq!(graph.edges().count(), 3);
    }

    #[test]
    fn test_call_cycles_terminate() {
        let pipelines = set(&[
            (
                "a.yml",
                "on: push\njobs:\n  call-b:\n    uses: ./.github/workflows/b.yml\n  again:\n    uses: ./.github/workflows/a.yml\n",
            ),
            (
                "b.yml",
                "on:\n  workflow_call: {}\njobs:\n  call-a:\n    uses: ./.github/workflows/a.yml\n",
            ),
        ]);

        let graph = trigger_graph(TriggerKind::Push, &pipelines).unwrap();
        assert_eq!(
            node_ids(&graph),
            vec!["trigger_push", "a_yml", "a_yml_call_b", "b_yml", "b_yml_call_a", "a_yml_again"]
        );
        assert!(edge_pairs(&graph).contains(&("b_yml_call_a", "a_yml")));
        assert!(edge_pairs(&graph).contains(&("a_yml_again", "a_yml")));
    }

    #[test]
    fn test_workflow_reached_twice_is_expanded_under_first_parent_only() {
        let pipelines = set(&[
            (
                "one.yml",
                "on: push\njobs:\n  deploy:\n    uses: ./.github/workflows/shared.yml\n",
            ),
            (
                "two.yml",
                "on: push\njobs:\n  deploy:\n    uses: ./.github/workflows/shared.yml\n",
            ),
            ("shared.yml", REUSABLE),
        ]);

        let graph = trigger_graph(TriggerKind::Push, &pipelines).unwrap();
        assert_eq!(graph.incoming("shared_yml"), 2);
        assert_eq!(graph.incoming("shared_yml_compile"), 1);
        assert!(edge_pairs(&graph).contains(&("two_yml_deploy", "shared_yml")));
    }

    #[test]
    fn test_dispatch_graph_covers_one_workflow() {
        let pipelines = set(&[
            ("a.yml", "on: workflow_dispatch\njobs:\n  x: {}\n"),
            ("b.yml", "on: workflow_dispatch\njobs:\n  y: {}\n"),
        ]);
        let a = pipelines.get("a.yml").unwrap();

        let graph = dispatch_graph(a, &pipelines);
        assert_eq!(
            node_ids(&graph),
            vec!["trigger_workflow_dispatch", "a_yml", "a_yml_x"]
        );
    }

    #[test]
    fn test_overview_excludes_reusable_and_keeps_untriggered_main() {
        let pipelines = set(&[
            ("ci.yml", "on: [push, pull_request]\n"),
            ("manual.yml", "name: Manual\non: merge_group\n"),
            ("lib.yml", REUSABLE),
        ]);

        let graph = overview_graph(&pipelines);
        assert_eq!(
            node_ids(&graph),
            vec!["trigger_push", "ci_yml", "trigger_pull_request", "manual_yml"]
        );
        assert_eq!(
            edge_pairs(&graph),
            vec![
                ("trigger_push", "ci_yml"),
                ("trigger_pull_request", "ci_yml")
            ]
        );
    }

    #[test]
    fn test_trigger_without_workflows_has_no_graph() {
        let pipelines = set(&[("ci.yml", "on: push\n")]);
        assert!(trigger_graph(TriggerKind::Release, &pipelines).is_none());
    }
}
