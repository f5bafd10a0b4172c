use std::fs;
use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use log::{debug, info, warn};
use serde_yaml::{Mapping, Value};

use super::types::{Job, Pipeline, PipelineSet, TriggerKind};
use crate::error::{Result, WfGraphError};

/// File extensions recognized as workflow definitions.
pub const DEFINITION_EXTENSIONS: [&str; 2] = ["yml", "yaml"];

/// Loads every workflow definition in `dir`.
///
/// Files are read in file-name order. A file that fails to parse is logged and
/// left out of the result; the remaining files still load.
///
/// # Errors
///
/// Returns [`WfGraphError::MissingDirectory`] when `dir` is not a directory, or
/// an I/O error if the directory cannot be listed.
pub fn load_pipelines(dir: &Path) -> Result<PipelineSet> {
    if !dir.is_dir() {
        return Err(WfGraphError::MissingDirectory(dir.to_path_buf()));
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| is_definition_file(path))
        .collect();
    files.sort();

    let mut pipelines = PipelineSet::default();
    for path in &files {
        match load_pipeline(path) {
            Ok(pipeline) => {
                debug!(
                    "Loaded {} ({} jobs, reusable: {})",
                    pipeline.identity,
                    pipeline.jobs.len(),
                    pipeline.is_reusable
                );
                pipelines.insert(pipeline);
            }
            Err(err) => warn!("Skipping {}: {err}", path.display()),
        }
    }

    info!(
        "Loaded {} of {} workflow files from {}",
        pipelines.len(),
        files.len(),
        dir.display()
    );

    Ok(pipelines)
}

fn is_definition_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| DEFINITION_EXTENSIONS.contains(&ext))
}

/// Reads and parses a single workflow file.
pub fn load_pipeline(path: &Path) -> Result<Pipeline> {
    let content = fs::read_to_string(path)?;
    parse_pipeline(path, &content)
}

/// Parses workflow YAML. The pipeline identity is the file name of `path`.
pub fn parse_pipeline(path: &Path, content: &str) -> Result<Pipeline> {
    let document: Value = serde_yaml::from_str(content).map_err(|source| WfGraphError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let Value::Mapping(document) = document else {
        return Err(WfGraphError::InvalidDefinition {
            path: path.to_path_buf(),
            reason: "top-level document is not a mapping".to_string(),
        });
    };

    let identity = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let trigger_section = trigger_section(&document);

    let display_name = document
        .get("name")
        .and_then(scalar_to_string)
        .unwrap_or_else(|| default_display_name(&identity));

    let jobs = match document.get("jobs") {
        Some(Value::Mapping(jobs)) => parse_jobs(jobs),
        _ => IndexMap::new(),
    };

    Ok(Pipeline {
        display_name,
        is_reusable: is_reusable(trigger_section),
        triggers: extract_triggers(trigger_section),
        jobs,
        identity,
    })
}

/// `on` is a plain string in YAML 1.2, but YAML 1.1 writers may emit it as `true`.
fn trigger_section(document: &Mapping) -> Option<&Value> {
    document
        .get("on")
        .or_else(|| document.get(Value::Bool(true)))
}

fn is_reusable(section: Option<&Value>) -> bool {
    match section {
        Some(Value::Mapping(triggers)) => triggers
            .get(TriggerKind::Callable.as_str())
            .is_some_and(|value| !value.is_null()),
        _ => false,
    }
}

fn extract_triggers(section: Option<&Value>) -> IndexSet<TriggerKind> {
    match section {
        Some(Value::String(key)) => TriggerKind::from_key(key).into_iter().collect(),
        Some(Value::Sequence(keys)) => keys
            .iter()
            .filter_map(Value::as_str)
            .filter_map(TriggerKind::from_key)
            .collect(),
        Some(Value::Mapping(triggers)) => triggers
            .keys()
            .filter_map(Value::as_str)
            .filter_map(TriggerKind::from_key)
            .collect(),
        _ => IndexSet::new(),
    }
}

fn parse_jobs(jobs: &Mapping) -> IndexMap<String, Job> {
    jobs.iter()
        .filter_map(|(key, body)| scalar_to_string(key).map(|id| (id, body)))
        .map(|(id, body)| {
            let field = |name: &str| body.as_mapping().and_then(|m| m.get(name));
            let job = Job {
                display_name: field("name")
                    .and_then(scalar_to_string)
                    .unwrap_or_else(|| id.clone()),
                calls_pipeline: field("uses").and_then(Value::as_str).map(str::to_owned),
                explicit_predecessors: normalize_needs(field("needs")),
                condition: field("if").and_then(scalar_to_string),
                raw_body: body.clone(),
                id: id.clone(),
            };
            (id, job)
        })
        .collect()
}

fn normalize_needs(needs: Option<&Value>) -> Vec<String> {
    match needs {
        Some(Value::String(job)) if !job.is_empty() => vec![job.clone()],
        Some(Value::Sequence(jobs)) => jobs
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_owned)
            .collect(),
        _ => Vec::new(),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn default_display_name(identity: &str) -> String {
    DEFINITION_EXTENSIONS
        .iter()
        .find_map(|ext| identity.strip_suffix(&format!(".{ext}")))
        .unwrap_or(identity)
        .to_string()
}
