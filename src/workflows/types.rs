use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use serde_yaml::Value;

/// Workflow trigger events that the diagrams know about.
///
/// Any other key found under `on` is dropped while loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    Push,
    PullRequest,
    ManualDispatch,
    Scheduled,
    Callable,
    UpstreamRun,
    Delete,
    Create,
    Release,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 9] = [
        TriggerKind::Push,
        TriggerKind::PullRequest,
        TriggerKind::ManualDispatch,
        TriggerKind::Scheduled,
        TriggerKind::Callable,
        TriggerKind::UpstreamRun,
        TriggerKind::Delete,
        TriggerKind::Create,
        TriggerKind::Release,
    ];

    /// The event key as written in a workflow file.
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerKind::Push => "push",
            TriggerKind::PullRequest => "pull_request",
            TriggerKind::ManualDispatch => "workflow_dispatch",
            TriggerKind::Scheduled => "schedule",
            TriggerKind::Callable => "workflow_call",
            TriggerKind::UpstreamRun => "workflow_run",
            TriggerKind::Delete => "delete",
            TriggerKind::Create => "create",
            TriggerKind::Release => "release",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == key)
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single workflow file.
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// File name, e.g. `continuous-deployment.yml`
    pub identity: String,
    /// Top-level `name`, or the file name without its extension
    pub display_name: String,
    /// Declares a non-null `workflow_call` trigger
    pub is_reusable: bool,
    pub triggers: IndexSet<TriggerKind>,
    /// Jobs in file order
    pub jobs: IndexMap<String, Job>,
}

impl Pipeline {
    pub fn has_trigger(&self, trigger: TriggerKind) -> bool {
        self.triggers.contains(&trigger)
    }

    /// Label used when this workflow is drawn as the target of a job call.
    pub fn call_label(&self) -> &str {
        if self.is_reusable {
            &self.identity
        } else {
            &self.display_name
        }
    }
}

/// A job within a workflow.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    /// Job `name`, falling back to the job id
    pub display_name: String,
    /// Raw `uses` reference, e.g. `./.github/workflows/build.yml`
    pub calls_pipeline: Option<String>,
    /// Normalized `needs` list
    pub explicit_predecessors: Vec<String>,
    /// Job `if` expression, kept opaque
    pub condition: Option<String>,
    /// Full job body, only used to look for expression references
    pub raw_body: Value,
}

/// All workflows loaded from one directory, ordered by file name.
#[derive(Debug, Clone, Default)]
pub struct PipelineSet {
    pipelines: BTreeMap<String, Pipeline>,
}

impl PipelineSet {
    pub fn insert(&mut self, pipeline: Pipeline) {
        self.pipelines.insert(pipeline.identity.clone(), pipeline);
    }

    pub fn get(&self, identity: &str) -> Option<&Pipeline> {
        self.pipelines.get(identity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pipeline> {
        self.pipelines.values()
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    pub fn main_pipelines(&self) -> impl Iterator<Item = &Pipeline> {
        self.iter().filter(|p| !p.is_reusable)
    }

    pub fn reusable_pipelines(&self) -> impl Iterator<Item = &Pipeline> {
        self.iter().filter(|p| p.is_reusable)
    }

    /// Every trigger used by a main workflow, sorted by event key.
    pub fn triggers(&self) -> Vec<TriggerKind> {
        let mut triggers: Vec<TriggerKind> = self
            .main_pipelines()
            .flat_map(|p| p.triggers.iter().copied())
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect();
        triggers.sort_by_key(|t| t.as_str());
        triggers
    }

    pub fn pipelines_for_trigger(&self, trigger: TriggerKind) -> Vec<&Pipeline> {
        self.main_pipelines()
            .filter(|p| p.has_trigger(trigger))
            .collect()
    }

    /// Resolves a job `uses` reference to a loaded workflow.
    ///
    /// Returns `None` for actions, remote workflows and local workflows that
    /// were not part of this load.
    pub fn resolve_call(&self, uses: &str) -> Option<&Pipeline> {
        call_target(uses).and_then(|file| self.get(file))
    }

    /// Loaded workflows reachable from `pipeline` through job calls,
    /// depth-first in call order, excluding `pipeline` itself.
    pub fn reachable_calls<'a>(&'a self, pipeline: &'a Pipeline) -> Vec<&'a Pipeline> {
        let mut seen: IndexSet<&str> = IndexSet::new();
        seen.insert(&pipeline.identity);
        let mut order = Vec::new();
        self.collect_calls(pipeline, &mut seen, &mut order);
        order
    }

    fn collect_calls<'a>(
        &'a self,
        pipeline: &'a Pipeline,
        seen: &mut IndexSet<&'a str>,
        order: &mut Vec<&'a Pipeline>,
    ) {
        let called = pipeline
            .jobs
            .values()
            .filter_map(|job| job.calls_pipeline.as_deref())
            .filter_map(|uses| self.resolve_call(uses));

        for target in called {
            if seen.insert(&target.identity) {
                order.push(target);
                self.collect_calls(target, seen, order);
            }
        }
    }
}

fn call_target_regex() -> &'static Regex {
    static CALL_TARGET_REGEX: OnceLock<Regex> = OnceLock::new();
    CALL_TARGET_REGEX
        .get_or_init(|| Regex::new(r"\.github/workflows/([^@]+)").expect("valid regex"))
}

/// Extracts the workflow file name from a `uses` reference.
pub fn call_target(uses: &str) -> Option<&str> {
    call_target_regex()
        .captures(uses)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline(identity: &str, reusable: bool, triggers: &[TriggerKind], calls: &[&str]) -> Pipeline {
        let jobs = calls
            .iter()
            .enumerate()
            .map(|(i, target)| {
                let id = format!("job{i}");
                let job = Job {
                    id: id.clone(),
                    display_name: id.clone(),
                    calls_pipeline: Some(format!("./.github/workflows/{target}")),
                    explicit_predecessors: vec![],
                    condition: None,
                    raw_body: Value::Null,
                };
                (id, job)
            })
            .collect();

        Pipeline {
            identity: identity.to_string(),
            display_name: identity.to_string(),
            is_reusable: reusable,
            triggers: triggers.iter().copied().collect(),
            jobs,
        }
    }

    #[test]
    fn test_trigger_kind_round_trips_event_keys() {
        for kind in TriggerKind::ALL {
            assert_eq!(TriggerKind::from_key(kind.as_str()), Some(kind));
        }
        assert_eq!(TriggerKind::from_key("merge_group"), None);
    }

    #[test]
    fn test_call_target_strips_ref() {
        assert_eq!(
            call_target("./.github/workflows/build.yml"),
            Some("build.yml")
        );
        assert_eq!(
            call_target("org/repo/.github/workflows/deploy.yaml@v2"),
            Some("deploy.yaml")
        );
        assert_eq!(call_target("actions/checkout@v4"), None);
    }

    #[test]
    fn test_triggers_are_sorted_and_exclude_reusable_workflows() {
        let mut set = PipelineSet::default();
        set.insert(pipeline(
            "ci.yml",
            false,
            &[TriggerKind::Push, TriggerKind::PullRequest],
            &[],
        ));
        set.insert(pipeline(
            "nightly.yml",
            false,
            &[TriggerKind::Scheduled, TriggerKind::Push],
            &[],
        ));
        set.insert(pipeline(
            "build.yml",
            true,
            &[TriggerKind::Callable, TriggerKind::Release],
            &[],
        ));

        assert_eq!(
            set.triggers(),
            vec![
                TriggerKind::PullRequest,
                TriggerKind::Push,
                TriggerKind::Scheduled
            ]
        );
        let push: Vec<&str> = set
            .pipelines_for_trigger(TriggerKind::Push)
            .iter()
            .map(|p| p.identity.as_str())
            .collect();
        assert_eq!(push, vec!["ci.yml", "nightly.yml"]);
    }

    #[test]
    fn test_reachable_calls_follow_depth_first_and_stop_on_cycles() {
        let mut set = PipelineSet::default();
        set.insert(pipeline("main.yml", false, &[TriggerKind::Push], &["a.yml", "b.yml"]));
        set.insert(pipeline("a.yml", true, &[], &["c.yml", "main.yml"]));
        set.insert(pipeline("b.yml", true, &[], &["a.yml"]));
        set.insert(pipeline("c.yml", true, &[], &["missing.yml"]));

        let main = set.get("main.yml").unwrap();
        let order: Vec<&str> = set
            .reachable_calls(main)
            .iter()
            .map(|p| p.identity.as_str())
            .collect();
        assert_eq!(order, vec!["a.yml", "c.yml", "b.yml"]);
    }
}
