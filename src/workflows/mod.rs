mod dependencies;
mod loader;
mod types;

pub use dependencies::{extract_dependencies, ExternalCategory, JobDependencies};
pub use loader::load_pipelines;
#[cfg(test)]
pub use loader::parse_pipeline;
pub use types::{Job, Pipeline, PipelineSet, TriggerKind};
