mod progress;
mod styling;
mod summary;
mod tables;

pub use progress::PhaseProgress;
pub use styling::{dim, magenta_bold};
pub use summary::{print_dependency_table, print_generation_summary};

/// Prints the `wfgraph` banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🔀 wfgraph"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Workflow Diagram Generator")
    );
}
