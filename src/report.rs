use std::collections::HashSet;
use std::fmt::Write;

use log::debug;

use crate::diagram::{
    dispatch_graph, overview_graph, render_dependency_diagram, render_flowchart, trigger_graph,
    NodeClass,
};
use crate::workflows::{Pipeline, PipelineSet, TriggerKind};

/// The rendered Markdown document plus counts for the terminal summary.
#[derive(Debug, Clone)]
pub struct Report {
    pub document: String,
    pub stats: ReportStats,
}

#[derive(Debug, Clone, Default)]
pub struct ReportStats {
    pub triggers: Vec<TriggerStats>,
    /// Workflows that got a job dependency diagram, in document order
    pub dependency_diagrams: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerStats {
    pub trigger: TriggerKind,
    pub pipelines: usize,
    /// One diagram per workflow instead of a combined one
    pub individual: bool,
}

impl ReportStats {
    /// Trigger diagrams, dependency diagrams and the overview.
    pub fn total_diagrams(&self) -> usize {
        let trigger_diagrams: usize = self
            .triggers
            .iter()
            .map(|t| if t.individual { t.pipelines } else { 1 })
            .sum();
        trigger_diagrams + self.dependency_diagrams.len() + 1
    }
}

/// Builds the full report for a set of workflows.
///
/// `dependency_diagrams` lists the workflow files that also get a job
/// dependency diagram.
pub fn compose_report(pipelines: &PipelineSet, dependency_diagrams: &[String]) -> Report {
    let mut composer = Composer {
        pipelines,
        eligible: dependency_diagrams,
        emitted: HashSet::new(),
        out: String::new(),
        stats: ReportStats::default(),
    };

    composer.write_summary();
    composer.out.push('\n');
    composer.write_trigger_sections();
    composer.write_overview();
    composer.write_details();

    Report {
        document: composer.out,
        stats: composer.stats,
    }
}

struct Composer<'a> {
    pipelines: &'a PipelineSet,
    eligible: &'a [String],
    emitted: HashSet<String>,
    out: String,
    stats: ReportStats,
}

const LEGEND: [(NodeClass, &str, &str, &str); 4] = [
    (
        NodeClass::Trigger,
        "**Triggers** - Event triggers that start workflows:",
        "trigger_example",
        "([\"trigger (push, schedule, etc.)\"])",
    ),
    (
        NodeClass::MainWorkflow,
        "**Main Workflows** - Primary workflow files that can be triggered directly:",
        "main_workflow_example",
        "[\"Main Workflow\"]",
    ),
    (
        NodeClass::Reusable,
        "**Reusable Workflows** - Workflow files that are called by other workflows:",
        "reusable_workflow_example",
        "[\"Reusable Workflow\"]",
    ),
    (
        NodeClass::Job,
        "**Jobs** - Individual jobs within workflows showing internal dependencies:",
        "job_example",
        "[\"job-name\"]",
    ),
];

impl<'a> Composer<'a> {
    fn write_summary(&mut self) {
        let total = self.pipelines.len();
        let reusable = self.pipelines.reusable_pipelines().count();

        let out = &mut self.out;
        out.push_str("# GitHub Actions Workflow Analysis\n\n");
        out.push_str("## Summary\n");
        let _ = writeln!(out, "- **Total Workflows**: {total}");
        let _ = writeln!(out, "- **Main Workflows**: {}", total - reusable);
        let _ = writeln!(out, "- **Reusable Workflows**: {reusable}\n");

        out.push_str("## Legend\n\n");
        out.push_str(
            "The diagrams use color coding to distinguish different types of workflow components:\n\n",
        );
        for (class, caption, example_id, shape) in LEGEND {
            let (Some(name), Some(definition)) = (class.class_name(), class.definition()) else {
                continue;
            };
            let _ = writeln!(out, "{caption}");
            out.push_str("```mermaid\nflowchart LR\n");
            let _ = writeln!(out, "    {example_id}{shape}");
            let _ = writeln!(out, "    {definition}");
            let _ = writeln!(out, "    class {example_id} {name}");
            out.push_str("```\n\n");
        }
    }

    fn write_trigger_sections(&mut self) {
        let triggers = self.pipelines.triggers();
        if triggers.is_empty() {
            return;
        }

        self.out.push_str("## Workflow Flow Diagrams by Trigger\n\n");
        for trigger in triggers {
            let _ = writeln!(
                self.out,
                "### {} Triggered Workflows\n",
                capitalize(trigger.as_str())
            );
            if trigger == TriggerKind::ManualDispatch {
                self.write_dispatch_section();
            } else {
                self.write_trigger_section(trigger);
            }
        }
    }

    fn write_dispatch_section(&mut self) {
        let pipelines = self.pipelines;
        let dispatched = pipelines.pipelines_for_trigger(TriggerKind::ManualDispatch);
        let _ = writeln!(
            self.out,
            "The `{}` trigger allows manual execution of workflows. Each workflow is shown individually below:\n",
            TriggerKind::ManualDispatch
        );

        for pipeline in dispatched.iter().copied() {
            let graph = dispatch_graph(pipeline, pipelines);
            let _ = writeln!(self.out, "#### {}\n", pipeline.display_name);
            let _ = writeln!(self.out, "Manual execution of `{}`\n", pipeline.identity);
            self.write_mermaid(&render_flowchart(&graph, pipelines));
            self.write_dependency_diagrams(pipeline, 5);
        }

        self.stats.triggers.push(TriggerStats {
            trigger: TriggerKind::ManualDispatch,
            pipelines: dispatched.len(),
            individual: true,
        });
    }

    fn write_trigger_section(&mut self, trigger: TriggerKind) {
        let pipelines = self.pipelines;
        let Some(graph) = trigger_graph(trigger, pipelines) else {
            return;
        };
        let triggered = pipelines.pipelines_for_trigger(trigger);

        let _ = writeln!(self.out, "Workflows triggered by `{trigger}`:");
        for pipeline in &triggered {
            let _ = writeln!(
                self.out,
                "- **{}** (`{}`)",
                pipeline.display_name, pipeline.identity
            );
        }
        self.out.push('\n');
        self.write_mermaid(&render_flowchart(&graph, pipelines));

        for pipeline in triggered.iter().copied() {
            self.write_dependency_diagrams(pipeline, 4);
        }

        self.stats.triggers.push(TriggerStats {
            trigger,
            pipelines: triggered.len(),
            individual: false,
        });
    }

    /// Writes the dependency diagram of `pipeline` and of every workflow it
    /// calls, keeping only allow-listed ones not yet in the document.
    fn write_dependency_diagrams(&mut self, pipeline: &Pipeline, level: usize) {
        if self.is_eligible(pipeline) {
            self.write_dependency_diagram(pipeline, level);
        }

        for called in self.pipelines.reachable_calls(pipeline) {
            if self.is_eligible(called) {
                self.write_dependency_diagram(called, level);
            }
        }
    }

    fn is_eligible(&self, pipeline: &Pipeline) -> bool {
        self.eligible.iter().any(|name| *name == pipeline.identity)
    }

    fn write_dependency_diagram(&mut self, pipeline: &Pipeline, level: usize) {
        if !self.emitted.insert(pipeline.identity.clone()) {
            return;
        }
        debug!("Adding job dependency diagram for {}", pipeline.identity);

        let _ = writeln!(
            self.out,
            "{} {} - Job Dependencies\n",
            "#".repeat(level),
            pipeline.display_name
        );
        let _ = writeln!(
            self.out,
            "This diagram shows the explicit and implicit dependencies between jobs in the `{}` workflow:\n",
            pipeline.identity
        );
        self.write_mermaid(&render_dependency_diagram(pipeline));
        self.stats
            .dependency_diagrams
            .push(pipeline.identity.clone());
    }

    fn write_overview(&mut self) {
        self.out
            .push_str("## Overview: All Triggers and Main Workflows\n\n");
        let graph = overview_graph(self.pipelines);
        self.write_mermaid(&render_flowchart(&graph, self.pipelines));
    }

    fn write_details(&mut self) {
        let pipelines = self.pipelines;
        let out = &mut self.out;
        out.push_str("## Workflow Details\n\n");

        let main: Vec<&Pipeline> = pipelines.main_pipelines().collect();
        if !main.is_empty() {
            out.push_str("### Main Workflows\n");
            for pipeline in main {
                let _ = writeln!(out, "- **{}** (`{}`)", pipeline.display_name, pipeline.identity);
                if !pipeline.triggers.is_empty() {
                    let triggers: Vec<&str> = pipeline.triggers.iter().map(|t| t.as_str()).collect();
                    let _ = writeln!(out, "  - Triggers: {}", triggers.join(", "));
                }
                let _ = writeln!(out, "  - Jobs: {}", pipeline.jobs.len());
            }
            out.push('\n');
        }

        let reusable: Vec<&Pipeline> = pipelines.reusable_pipelines().collect();
        if !reusable.is_empty() {
            out.push_str("### Reusable Workflows\n");
            for pipeline in reusable {
                let _ = writeln!(out, "- **{}** (`{}`)", pipeline.display_name, pipeline.identity);
                let _ = writeln!(out, "  - Jobs: {}", pipeline.jobs.len());
            }
            out.push('\n');
        }
    }

    fn write_mermaid(&mut self, diagram: &str) {
        self.out.push_str("```mermaid\n");
        self.out.push_str(diagram);
        self.out.push_str("```\n\n");
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}
