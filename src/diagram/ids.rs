use crate::workflows::{PipelineSet, TriggerKind};

/// Turns arbitrary text into a Mermaid node id.
///
/// Every character outside `[A-Za-z0-9_]` becomes `_` and runs of `_` collapse
/// to one. Distinct inputs can map to the same id (`a-b` and `a.b`); callers
/// accept that aliasing.
pub fn sanitize_id(raw: &str) -> String {
    let mut id = String::with_capacity(raw.len());
    for ch in raw.chars() {
        let ch = if ch.is_ascii_alphanumeric() || ch == '_' {
            ch
        } else {
            '_'
        };
        if ch == '_' && id.ends_with('_') {
            continue;
        }
        id.push(ch);
    }
    id
}

pub fn trigger_node_id(trigger: TriggerKind) -> String {
    format!("trigger_{}", sanitize_id(trigger.as_str()))
}

pub fn pipeline_node_id(identity: &str) -> String {
    sanitize_id(identity)
}

pub fn job_node_id(pipeline_id: &str, job_id: &str) -> String {
    sanitize_id(&format!("{pipeline_id}_{job_id}"))
}

/// Escapes a node label for use inside `["..."]`.
pub fn escape_label(label: &str) -> String {
    label.replace('"', "#quot;")
}

/// Style class of a flowchart node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeClass {
    Trigger,
    MainWorkflow,
    Reusable,
    Job,
    /// Looks like a workflow id but no loaded workflow matches it
    Unknown,
}

impl NodeClass {
    /// Classes in the order their definitions are emitted.
    pub const STYLED: [NodeClass; 4] = [
        NodeClass::Reusable,
        NodeClass::MainWorkflow,
        NodeClass::Trigger,
        NodeClass::Job,
    ];

    pub fn class_name(self) -> Option<&'static str> {
        match self {
            NodeClass::Trigger => Some("trigger"),
            NodeClass::MainWorkflow => Some("mainWorkflow"),
            NodeClass::Reusable => Some("reusable"),
            NodeClass::Job => Some("job"),
            NodeClass::Unknown => None,
        }
    }

    pub fn style(self) -> Option<&'static str> {
        match self {
            NodeClass::Trigger => Some("fill:#fff3e0,stroke:#e65100,stroke-width:2px,color:#000000"),
            NodeClass::MainWorkflow => {
                Some("fill:#f3e5f5,stroke:#4a148c,stroke-width:2px,color:#000000")
            }
            NodeClass::Reusable => Some("fill:#e1f5fe,stroke:#01579b,stroke-width:2px,color:#000000"),
            NodeClass::Job => Some("fill:#f1f8e9,stroke:#33691e,stroke-width:1px,color:#000000"),
            NodeClass::Unknown => None,
        }
    }

    /// The `classDef` line for this class, without indentation.
    pub fn definition(self) -> Option<String> {
        Some(format!("classDef {} {}", self.class_name()?, self.style()?))
    }
}

const PIPELINE_ID_SUFFIXES: [(&str, &str); 2] = [("_yml", ".yml"), ("_yaml", ".yaml")];

/// Reverses [`pipeline_node_id`] by turning `_` back into `-` and restoring the
/// extension. Lossy for file names that contain `_` or other characters.
pub fn pipeline_identity_from_id(node_id: &str) -> Option<String> {
    PIPELINE_ID_SUFFIXES.iter().find_map(|(suffix, extension)| {
        node_id
            .strip_suffix(suffix)
            .filter(|stem| !stem.is_empty())
            .map(|stem| format!("{}{extension}", stem.replace('_', "-")))
    })
}

/// Picks the style class for a node from its id alone.
pub fn classify_node(node_id: &str, pipelines: &PipelineSet) -> NodeClass {
    if node_id.starts_with("trigger_") {
        return NodeClass::Trigger;
    }

    let Some(identity) = pipeline_identity_from_id(node_id) else {
        return NodeClass::Job;
    };

    match pipelines.get(&identity) {
        Some(pipeline) if pipeline.is_reusable => NodeClass::Reusable,
        Some(_) => NodeClass::MainWorkflow,
        None => NodeClass::Unknown,
    }
}
