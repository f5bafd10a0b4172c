use std::fmt::Write;
use std::path::Path;

use comfy_table::Cell;

use crate::diagram::DependencyAnalysis;
use crate::report::ReportStats;
use crate::workflows::{JobDependencies, Pipeline, PipelineSet};

use super::styling::{bright, bright_green, bright_yellow, cyan, dim};
use super::tables::{count_cell, create_cyan_header, create_table, list_cell};

/// Prints what a `generate` run produced to stdout.
///
/// Shows the workflow counts, where the report went, and one table row per
/// trigger section, dependency diagram and the overview.
pub fn print_generation_summary(stats: &ReportStats, pipelines: &PipelineSet, destination: &Path) {
    println!("{}", render_generation_summary(stats, pipelines, destination));
}

/// Prints the per-job dependency table of one workflow to stdout.
pub fn print_dependency_table(analysis: &DependencyAnalysis<'_>) {
    println!("{}", render_dependency_table(analysis));
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", bright(emoji), bright(title).underlined());
}

fn render_generation_summary(
    stats: &ReportStats,
    pipelines: &PipelineSet,
    destination: &Path,
) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "📊", "Overview");
    let reusable = pipelines.reusable_pipelines().count();
    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n",
        dim("Workflows analyzed:"),
        bright_yellow(pipelines.len()),
        dim("Main workflows:"),
        bright_yellow(pipelines.len() - reusable),
        dim("Reusable workflows:"),
        bright_yellow(reusable),
        dim("Diagrams generated:"),
        bright_green(stats.total_diagrams()),
        dim("Report:"),
        cyan(destination.display()),
    );

    add_section_header(&mut output, "🗺️", "Diagrams");
    let mut table = create_table();
    table.set_header(create_cyan_header(&["Section", "Workflows", "Diagrams", "Layout"]));

    for trigger in &stats.triggers {
        let (diagrams, layout) = if trigger.individual {
            (trigger.pipelines, "one per workflow")
        } else {
            (1, "combined")
        };
        table.add_row(vec![
            Cell::new(trigger.trigger),
            count_cell(trigger.pipelines),
            count_cell(diagrams),
            Cell::new(layout),
        ]);
    }
    for identity in &stats.dependency_diagrams {
        table.add_row(vec![
            Cell::new(format!("{identity} (jobs)")),
            count_cell(1),
            count_cell(1),
            Cell::new("job dependencies"),
        ]);
    }
    table.add_row(vec![
        Cell::new("overview"),
        count_cell(pipelines.main_pipelines().count()),
        count_cell(1),
        Cell::new("all triggers"),
    ]);

    let _ = writeln!(output, "{table}");
    output
}

fn explicit_entries(deps: &JobDependencies) -> Vec<String> {
    deps.explicit
        .iter()
        .map(|dep| {
            if dep.used_outputs.is_empty() {
                dep.job.clone()
            } else {
                format!("{} ({})", dep.job, dep.used_outputs.join(", "))
            }
        })
        .collect()
}

fn implicit_entries(deps: &JobDependencies) -> Vec<String> {
    deps.implicit
        .iter()
        .map(|dep| format!("{}.{}", dep.source_job, dep.variable))
        .collect()
}

fn external_entries(deps: &JobDependencies) -> Vec<String> {
    deps.external
        .iter()
        .map(|reference| format!("{}: {}", reference.category.label(), reference.variable))
        .collect()
}

fn render_dependency_table(analysis: &DependencyAnalysis<'_>) -> String {
    let mut output = String::new();
    let pipeline: &Pipeline = analysis.pipeline();

    add_section_header(
        &mut output,
        "🔗",
        &format!("Job Dependencies: {} ({})", pipeline.display_name, pipeline.identity),
    );

    if pipeline.jobs.is_empty() {
        let _ = writeln!(output, "{}", bright_yellow("No jobs defined."));
        return output;
    }

    let mut table = create_table();
    table.set_header(create_cyan_header(&[
        "Job",
        "Needs",
        "Implicit",
        "External",
        "Condition",
    ]));
    for (job, deps) in analysis.jobs() {
        let condition = job.condition.iter().cloned().collect::<Vec<_>>();
        table.add_row(vec![
            Cell::new(&job.id),
            list_cell(&explicit_entries(deps)),
            list_cell(&implicit_entries(deps)),
            list_cell(&external_entries(deps)),
            list_cell(&condition),
        ]);
    }

    let _ = writeln!(output, "{table}");
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::compose_report;
    use crate::workflows::parse_pipeline;

    fn set(files: &[(&str, &str)]) -> PipelineSet {
        let mut set = PipelineSet::default();
        for (name, yaml) in files {
            set.insert(parse_pipeline(Path::new(name), yaml).unwrap());
        }
        set
    }

    #[test]
    fn test_render_generation_summary() {
        let pipelines = set(&[
            ("ci.yml", "on: [push, workflow_dispatch]\njobs:\n  test: {}\n"),
            ("lib.yml", "on:\n  workflow_call: {}\njobs:\n  a: {}\n"),
        ]);
        let report = compose_report(&pipelines, &["ci.yml".to_string()]);

        let output =
            render_generation_summary(&report.stats, &pipelines, Path::new("out/diagram.md"));

        assert!(output.contains("Workflows analyzed:"));
        assert!(output.contains("Reusable workflows:"));
        assert!(output.contains("out/diagram.md"));
        assert!(output.contains("push"));
        assert!(output.contains("combined"));
        assert!(output.contains("workflow_dispatch"));
        assert!(output.contains("one per workflow"));
        assert!(output.contains("ci.yml (jobs)"));
        assert!(output.contains("overview"));
    }

    #[test]
    fn test_render_dependency_table() {
        let pipeline = parse_pipeline(
            Path::new("deploy.yml"),
            r"
on: push
jobs:
  build:
    outputs:
      tag: ${{ steps.meta.outputs.tag }}
  publish:
    needs: build
    env:
      TAG: ${{ needs.build.outputs.tag }}
      TOKEN: ${{ secrets.REGISTRY_TOKEN }}
  notify:
    if: ${{ failure() }}
    env:
      TAG: ${{ needs.build.outputs.tag }}
",
        )
        .unwrap();
        let analysis = DependencyAnalysis::new(&pipeline);

        let output = render_dependency_table(&analysis);

        assert!(output.contains("Job Dependencies: deploy (deploy.yml)"));
        assert!(output.contains("build (tag)"));
        assert!(output.contains("Secrets: REGISTRY_TOKEN"));
        assert!(output.contains("build.tag"));
        assert!(output.contains("failure()"));
        assert!(output.contains("None"));
    }

    #[test]
    fn test_render_dependency_table_without_jobs() {
        let pipeline = parse_pipeline(Path::new("empty.yml"), "on: push\n").unwrap();
        let output = render_dependency_table(&DependencyAnalysis::new(&pipeline));
        assert!(output.contains("No jobs defined."));
    }
}
