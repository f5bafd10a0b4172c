use std::collections::HashMap;
use std::fmt::Write;

use indexmap::{IndexMap, IndexSet};

use super::ids::{escape_label, sanitize_id};
use crate::workflows::{extract_dependencies, ExternalCategory, Job, JobDependencies, Pipeline};

const DEPENDENCY_CLASS_DEFS: [&str; 6] = [
    "classDef external fill:#fff3e0,stroke:#e65100,stroke-width:2px,color:#000000",
    "classDef job fill:#f1f8e9,stroke:#33691e,stroke-width:2px,color:#000000",
    "classDef mainWorkflow fill:#f3e5f5,fill-opacity:0.15,stroke:#f3e5f5,stroke-width:1px,color:#ffffff",
    "classDef jobSubgraph fill:#f1f8e9,stroke:#33691e,stroke-width:2px,color:#000000",
    "classDef explicit stroke:#2196F3,stroke-width:3px",
    "classDef dataflow stroke:#FF9800,stroke-dasharray: 5 5",
];

/// Dependency analysis of every job in one workflow.
pub struct DependencyAnalysis<'a> {
    pipeline: &'a Pipeline,
    jobs: Vec<(&'a Job, JobDependencies)>,
    variables: HashMap<String, Vec<String>>,
}

impl<'a> DependencyAnalysis<'a> {
    pub fn new(pipeline: &'a Pipeline) -> Self {
        let jobs: Vec<(&Job, JobDependencies)> = pipeline
            .jobs
            .values()
            .map(|job| (job, extract_dependencies(job)))
            .collect();

        let variables: HashMap<String, Vec<String>> = jobs
            .iter()
            .map(|(job, deps)| {
                let vars: Vec<String> = deps
                    .consumed_variables()
                    .into_iter()
                    .map(str::to_owned)
                    .collect();
                (job.id.clone(), vars)
            })
            .collect();

        Self {
            pipeline,
            jobs,
            variables,
        }
    }

    pub fn pipeline(&self) -> &'a Pipeline {
        self.pipeline
    }

    pub fn jobs(&self) -> impl Iterator<Item = (&'a Job, &JobDependencies)> {
        self.jobs.iter().map(|(job, deps)| (*job, deps))
    }

    fn consumed(&self, job_id: &str) -> &[String] {
        self.variables.get(job_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Node id a job is drawn as: its grouping node when it consumes variables.
    fn target_id(&self, job_id: &str) -> String {
        if self.consumed(job_id).is_empty() {
            job_leaf_id(job_id)
        } else {
            job_group_id(job_id)
        }
    }

    /// External references grouped by category, first-seen order.
    fn external_inputs(&self) -> IndexMap<ExternalCategory, IndexSet<&str>> {
        let mut inputs: IndexMap<ExternalCategory, IndexSet<&str>> = IndexMap::new();
        for (_, deps) in &self.jobs {
            for reference in &deps.external {
                inputs
                    .entry(reference.category)
                    .or_default()
                    .insert(&reference.variable);
            }
        }
        inputs
    }

    fn is_job(&self, job_id: &str) -> bool {
        self.pipeline.jobs.contains_key(job_id)
    }

    /// Renders the job-level dependency flowchart.
    ///
    /// `needs` edges are thick and labelled "needs", undeclared output reads
    /// are dashed and labelled with the output, external inputs are dotted.
    pub fn render(&self) -> String {
        let mut out = String::from("flowchart LR\n");
        let mut edges: IndexSet<String> = IndexSet::new();

        let external = self.external_inputs();
        if !external.is_empty() {
            out.push_str("    subgraph \"External Inputs\"\n");
            for (category, names) in &external {
                let category_id = sanitize_id(category.label());
                let _ = writeln!(out, "        {category_id}[\"{}\"]", category.label());
                for name in names {
                    let var_id = sanitize_id(&format!("{category_id}_{name}"));
                    let _ = writeln!(out, "        {var_id}[\"{}\"]", escape_label(name));
                    edges.insert(format!("        {category_id} --> {var_id}"));
                }
            }
            out.push_str("    end\n\n");
        }

        let workflow_id = workflow_subgraph_id(&self.pipeline.identity);
        let _ = writeln!(
            out,
            "    subgraph {workflow_id}[\"{}\"]",
            escape_label(&self.pipeline.display_name)
        );
        for (job, _) in &self.jobs {
            let label = escape_label(&job.display_name);
            let consumed = self.consumed(&job.id);
            if consumed.is_empty() {
                let _ = writeln!(out, "        {}[\"{label}\"]", job_leaf_id(&job.id));
            } else {
                let vars_id = sanitize_id(&format!("vars_{}", job.id));
                let vars_label = consumed
                    .iter()
                    .map(|v| escape_label(v))
                    .collect::<Vec<_>>()
                    .join("<br/>");
                let _ = writeln!(out, "        subgraph {}[\"{label}\"]", job_group_id(&job.id));
                let _ = writeln!(out, "            {vars_id}[\"{vars_label}\"]");
                out.push_str("        end\n");
            }
        }
        out.push_str("    end\n\n");

        for (job, deps) in &self.jobs {
            let target = self.target_id(&job.id);
            for dep in deps.explicit.iter().filter(|d| self.is_job(&d.job)) {
                let source = self.target_id(&dep.job);
                edges.insert(format!("    {source} ==>|\"needs\"| {target}"));
            }
        }

        for (job, deps) in &self.jobs {
            let target = self.target_id(&job.id);
            for dep in deps.implicit.iter().filter(|d| self.is_job(&d.source_job)) {
                let source = self.target_id(&dep.source_job);
                edges.insert(format!(
                    "    {source} -.->|\"{}\"| {target}",
                    escape_label(&dep.variable)
                ));
            }
        }

        for (job, deps) in &self.jobs {
            let target = self.target_id(&job.id);
            for reference in &deps.external {
                let category_id = sanitize_id(reference.category.label());
                let var_id = sanitize_id(&format!("{category_id}_{}", reference.variable));
                edges.insert(format!("    {var_id} -.-> {target}"));
            }
        }

        if !edges.is_empty() {
            for edge in &edges {
                out.push_str(edge);
                out.push('\n');
            }
            out.push('\n');
        }

        for definition in DEPENDENCY_CLASS_DEFS {
            let _ = writeln!(out, "    {definition}");
        }
        out.push('\n');

        let _ = writeln!(out, "    class {workflow_id} mainWorkflow");
        for category in external.keys() {
            let _ = writeln!(out, "    class {} external", sanitize_id(category.label()));
        }
        for (job, _) in &self.jobs {
            let class = if self.consumed(&job.id).is_empty() {
                "job"
            } else {
                "jobSubgraph"
            };
            let _ = writeln!(out, "    class {} {class}", self.target_id(&job.id));
        }

        out
    }
}

/// Job node ids carry a prefix so they never meet the external input ids or
/// Mermaid keywords such as `end`.
fn job_leaf_id(job_id: &str) -> String {
    sanitize_id(&format!("job_{job_id}"))
}

fn job_group_id(job_id: &str) -> String {
    sanitize_id(&format!("group_{job_id}"))
}

/// Id of the subgraph wrapping a workflow's jobs, e.g.
/// `continuous_deployment_workflow` for `continuous-deployment.yml`.
pub fn workflow_subgraph_id(identity: &str) -> String {
    let stem = identity
        .rsplit_once('.')
        .map_or(identity, |(stem, _)| stem);
    sanitize_id(&format!("{stem}_workflow"))
}

pub fn render_dependency_diagram(pipeline: &Pipeline) -> String {
    DependencyAnalysis::new(pipeline).render()
}
