use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{bright, bright_green, bright_yellow};

/// Progress tracking for the load, build and write phases
pub struct PhaseProgress {
    pb: ProgressBar,
}

impl PhaseProgress {
    pub fn start_loading() -> Self {
        eprintln!("{}  {}", bright("⚙️"), bright("Phases").underlined());
        let pb = create_spinner(bright_yellow("Phase 1/3: Loading workflow definitions").to_string());
        Self { pb }
    }

    pub fn finish_loading_start_building(self, workflows: usize) -> Self {
        self.pb.finish_with_message(
            bright_green(format!("Phase 1/3: Loaded {workflows} workflow definitions ✓"))
                .to_string(),
        );
        let pb = create_spinner(bright_yellow("Phase 2/3: Building diagrams").to_string());
        Self { pb }
    }

    pub fn finish_building_start_writing(self) -> Self {
        self.pb
            .finish_with_message(bright_green("Phase 2/3: Built diagrams ✓").to_string());
        let pb = create_spinner(bright_yellow("Phase 3/3: Writing report").to_string());
        Self { pb }
    }

    pub fn finish_writing(self) {
        self.pb
            .finish_with_message(bright_green("Phase 3/3: Report written ✓").to_string());
        eprintln!();
    }

    /// Clears the spinner without a completion message.
    pub fn abandon(self) {
        self.pb.finish_and_clear();
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {msg} {spinner}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
