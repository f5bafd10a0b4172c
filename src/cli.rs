use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::diagram::DependencyAnalysis;
use crate::output::{print_dependency_table, print_generation_summary, PhaseProgress};
use crate::report::compose_report;
use crate::workflows::{load_pipelines, PipelineSet};

#[derive(Parser)]
#[command(name = "wfgraph")]
#[command(author, version, about = "GitHub Actions workflow diagram generator", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./wfgraph.toml and friends)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the Markdown report with every workflow diagram
    Generate {
        #[arg(short = 'd', long, env = "WFGRAPH_WORKFLOWS_DIR")]
        workflows_dir: Option<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the report instead of writing it to a file
        #[arg(long, default_value_t = false)]
        stdout: bool,

        /// Workflow file that gets a job dependency diagram (repeatable)
        #[arg(long = "dependency-diagram", value_name = "FILE")]
        dependency_diagrams: Vec<String>,
    },
    /// Show the job dependencies of one workflow
    Deps {
        /// Workflow file name, e.g. continuous-deployment.yml
        workflow: String,

        #[arg(short = 'd', long, env = "WFGRAPH_WORKFLOWS_DIR")]
        workflows_dir: Option<PathBuf>,
    },
}

impl Cli {
    fn execute_generate(
        config: &Config,
        workflows_dir: &Path,
        output: &Path,
        to_stdout: bool,
        dependency_diagrams: &[String],
    ) -> Result<()> {
        info!("Generating workflow diagrams from: {}", workflows_dir.display());

        let progress = PhaseProgress::start_loading();
        let pipelines = match load_workflows(workflows_dir) {
            Ok(pipelines) => pipelines,
            Err(err) => {
                progress.abandon();
                return Err(err);
            }
        };

        if pipelines.is_empty() {
            warn!("No workflow definitions found in {}", workflows_dir.display());
        }
        let progress = progress.finish_loading_start_building(pipelines.len());
        let report = compose_report(&pipelines, dependency_diagrams);
        let progress = progress.finish_building_start_writing();

        if to_stdout {
            progress.finish_writing();
            print!("{}", report.document);
            return Ok(());
        }

        if let Err(err) = write_report(output, &report.document) {
            progress.abandon();
            return Err(err);
        }
        progress.finish_writing();
        info!("Diagram written to: {}", output.display());

        if config.output.show_summary {
            print_generation_summary(&report.stats, &pipelines, output);
        }

        Ok(())
    }

    fn execute_deps(workflows_dir: &Path, workflow: &str) -> Result<()> {
        let pipelines = load_workflows(workflows_dir)?;

        // accept a path as well as a bare file name
        let identity = Path::new(workflow)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(workflow);
        let pipeline = pipelines.get(identity).ok_or_else(|| {
            anyhow!(
                "Workflow {} not found in {}",
                identity,
                workflows_dir.display()
            )
        })?;

        let analysis = DependencyAnalysis::new(pipeline);
        print_dependency_table(&analysis);
        println!("```mermaid\n{}```", analysis.render());

        Ok(())
    }

    pub fn execute(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;

        match &self.command {
            Commands::Generate {
                workflows_dir,
                output,
                stdout,
                dependency_diagrams,
            } => {
                let workflows_dir = workflows_dir
                    .as_deref()
                    .unwrap_or(&config.input.workflows_dir);
                let output = output.as_deref().unwrap_or(&config.output.path);
                let dependency_diagrams = if dependency_diagrams.is_empty() {
                    &config.diagrams.dependency_diagrams
                } else {
                    dependency_diagrams
                };
                Self::execute_generate(
                    &config,
                    workflows_dir,
                    output,
                    *stdout,
                    dependency_diagrams,
                )
            }
            Commands::Deps {
                workflow,
                workflows_dir,
            } => {
                let workflows_dir = workflows_dir
                    .as_deref()
                    .unwrap_or(&config.input.workflows_dir);
                Self::execute_deps(workflows_dir, workflow)
            }
        }
    }
}

fn load_workflows(dir: &Path) -> Result<PipelineSet> {
    load_pipelines(dir)
        .with_context(|| format!("Failed to load workflows from: {}", dir.display()))
}

fn write_report(path: &Path, document: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(path, document)
        .with_context(|| format!("Failed to write report: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generate_flags() {
        let cli = Cli::parse_from([
            "wfgraph",
            "generate",
            "-d",
            "flows",
            "--dependency-diagram",
            "a.yml",
            "--dependency-diagram",
            "b.yml",
            "--stdout",
        ]);
        match cli.command {
            Commands::Generate {
                workflows_dir,
                output,
                stdout,
                dependency_diagrams,
            } => {
                assert_eq!(workflows_dir, Some(PathBuf::from("flows")));
                assert_eq!(output, None);
                assert!(stdout);
                assert_eq!(dependency_diagrams, vec!["a.yml", "b.yml"]);
            }
            Commands::Deps { .. } => panic!("expected generate"),
        }
    }

    #[test]
    fn test_parse_global_config_after_subcommand() {
        let cli = Cli::parse_from(["wfgraph", "deps", "ci.yml", "--config", "custom.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert!(matches!(cli.command, Commands::Deps { ref workflow, .. } if workflow == "ci.yml"));
    }

    #[test]
    fn test_generate_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let workflows = dir.path().join("workflows");
        std::fs::create_dir(&workflows).unwrap();
        std::fs::write(workflows.join("ci.yml"), "on: push\njobs:\n  test: {}\n").unwrap();
        let output = dir.path().join("docs/diagram.md");

        let mut config = Config::default();
        config.output.show_summary = false;
        Cli::execute_generate(&config, &workflows, &output, false, &[]).unwrap();

        let document = std::fs::read_to_string(&output).unwrap();
        assert!(document.starts_with("# GitHub Actions Workflow Analysis"));
        assert!(document.contains("### Push Triggered Workflows"));
    }

    #[test]
    fn test_generate_fails_on_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("diagram.md");

        let err = Cli::execute_generate(
            &Config::default(),
            &dir.path().join("missing"),
            &output,
            false,
            &[],
        )
        .unwrap_err();

        assert!(err.to_string().contains("Failed to load workflows"));
        assert!(!output.exists());
    }

    #[test]
    fn test_deps_reports_unknown_workflow() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ci.yml"), "on: push\n").unwrap();

        assert!(Cli::execute_deps(dir.path(), "ci.yml").is_ok());
        assert!(Cli::execute_deps(dir.path(), ".github/workflows/ci.yml").is_ok());
        let err = Cli::execute_deps(dir.path(), "missing.yml").unwrap_err();
        assert!(err.to_string().contains("missing.yml"));
    }
}
