use std::collections::BTreeSet;
use std::sync::OnceLock;

use indexmap::{IndexMap, IndexSet};
use regex::{Captures, Regex};
use serde_yaml::Value;

use super::types::Job;

/// Where an external value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternalCategory {
    Secrets,
    Variables,
    AmbientContext,
    CallerInputs,
}

impl ExternalCategory {
    pub fn label(self) -> &'static str {
        match self {
            ExternalCategory::Secrets => "Secrets",
            ExternalCategory::Variables => "Variables",
            ExternalCategory::AmbientContext => "GitHub Context",
            ExternalCategory::CallerInputs => "Workflow Inputs",
        }
    }
}

/// A `needs` predecessor together with the outputs this job reads from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplicitDependency {
    pub job: String,
    pub used_outputs: Vec<String>,
}

/// An output read from a job that is not listed in `needs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImplicitDependency {
    pub source_job: String,
    pub variable: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalReference {
    pub category: ExternalCategory,
    pub variable: String,
}

/// Dependencies of one job, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobDependencies {
    pub explicit: Vec<ExplicitDependency>,
    pub implicit: Vec<ImplicitDependency>,
    pub external: Vec<ExternalReference>,
}

impl JobDependencies {
    /// Outputs read from `needs` predecessors plus external reference names, sorted.
    pub fn consumed_variables(&self) -> Vec<&str> {
        self.explicit
            .iter()
            .flat_map(|dep| dep.used_outputs.iter())
            .chain(self.external.iter().map(|ext| &ext.variable))
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// A single reference found inside a `${{ }}` expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference<'a> {
    Output { job: &'a str, output: &'a str },
    External {
        category: ExternalCategory,
        name: &'a str,
    },
}

/// Depth-first iterator over the string scalars of a YAML tree.
///
/// Mapping keys are not visited.
pub struct StringLeaves<'a> {
    stack: Vec<&'a Value>,
}

impl<'a> Iterator for StringLeaves<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(value) = self.stack.pop() {
            let start = self.stack.len();
            match value {
                Value::String(s) => return Some(s),
                Value::Mapping(mapping) => self.stack.extend(mapping.values()),
                Value::Sequence(items) => self.stack.extend(items.iter()),
                Value::Tagged(tagged) => self.stack.push(&tagged.value),
                Value::Null | Value::Bool(_) | Value::Number(_) => {}
            }
            self.stack[start..].reverse();
        }
        None
    }
}

pub fn string_leaves(value: &Value) -> StringLeaves<'_> {
    StringLeaves { stack: vec![value] }
}

fn expression_regex() -> &'static Regex {
    static EXPRESSION_REGEX: OnceLock<Regex> = OnceLock::new();
    EXPRESSION_REGEX.get_or_init(|| Regex::new(r"(?s)\$\{\{(.*?)\}\}").expect("valid regex"))
}

fn reference_regex() -> &'static Regex {
    static REFERENCE_REGEX: OnceLock<Regex> = OnceLock::new();
    REFERENCE_REGEX.get_or_init(|| {
        Regex::new(
            r"(?:^|[^\w.-])(needs|secrets|vars|github|inputs)\.([\w-]+)(?:\.outputs\.([\w-]+))?",
        )
        .expect("valid regex")
    })
}

fn parse_reference(caps: Captures<'_>) -> Option<Reference<'_>> {
    let name = caps.get(2)?.as_str();
    let category = match caps.get(1)?.as_str() {
        "needs" => {
            return caps.get(3).map(|output| Reference::Output {
                job: name,
                output: output.as_str(),
            })
        }
        "secrets" => ExternalCategory::Secrets,
        "vars" => ExternalCategory::Variables,
        "github" => ExternalCategory::AmbientContext,
        "inputs" => ExternalCategory::CallerInputs,
        _ => return None,
    };
    Some(Reference::External { category, name })
}

/// `if` values of the job and of its steps. GitHub evaluates these as
/// expressions whether or not they are wrapped in `${{ }}`.
fn conditions(body: &Value) -> impl Iterator<Item = &str> {
    let steps = body
        .get("steps")
        .and_then(Value::as_sequence)
        .into_iter()
        .flatten();
    std::iter::once(body)
        .chain(steps)
        .filter_map(|node| node.get("if"))
        .filter_map(Value::as_str)
}

/// All references in every `${{ }}` expression of `body` in document order,
/// then those in bare `if` conditions.
///
/// Each string leaf is scanned on its own, so a match never spans two fields.
pub fn references(body: &Value) -> impl Iterator<Item = Reference<'_>> {
    string_leaves(body)
        .flat_map(|leaf| {
            expression_regex()
                .captures_iter(leaf)
                .filter_map(|caps| caps.get(1))
                .map(|expr| expr.as_str())
        })
        .chain(conditions(body))
        .flat_map(|expr| reference_regex().captures_iter(expr).filter_map(parse_reference))
}

/// Classifies every reference in a job body.
///
/// Output references to a `needs` predecessor are attached to that explicit
/// dependency; output references to any other job become implicit
/// dependencies. Implicit dependencies are unique per (job, output) and
/// external references per (category, name).
pub fn extract_dependencies(job: &Job) -> JobDependencies {
    let mut explicit: IndexMap<&str, IndexSet<&str>> = job
        .explicit_predecessors
        .iter()
        .map(|pred| (pred.as_str(), IndexSet::new()))
        .collect();
    let mut implicit: IndexSet<(&str, &str)> = IndexSet::new();
    let mut external: IndexSet<(ExternalCategory, &str)> = IndexSet::new();

    for reference in references(&job.raw_body) {
        match reference {
            Reference::Output { job: source, output } => match explicit.get_mut(source) {
                Some(used) => {
                    used.insert(output);
                }
                None => {
                    implicit.insert((source, output));
                }
            },
            Reference::External { category, name } => {
                external.insert((category, name));
            }
        }
    }

    JobDependencies {
        explicit: explicit
            .into_iter()
            .map(|(job, used)| ExplicitDependency {
                job: job.to_string(),
                used_outputs: used.into_iter().map(str::to_owned).collect(),
            })
            .collect(),
        implicit: implicit
            .into_iter()
            .map(|(source, variable)| ImplicitDependency {
                source_job: source.to_string(),
                variable: variable.to_string(),
            })
            .collect(),
        external: external
            .into_iter()
            .map(|(category, variable)| ExternalReference {
                category,
                variable: variable.to_string(),
            })
            .collect(),
    }
}
